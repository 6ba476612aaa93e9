//! Terminal User Interface module.
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input handling
//! - `events` - Background task event processing
//! - `render` - Layout and tab bar
//! - `feed_list` - Virtualized list of feed items with its footer
//! - `status` - Status bar widget
//! - `help` - Key binding overlay
//! - `helpers` - Shared utility functions

mod events;
mod feed_list;
mod help;
mod helpers;
mod input;
mod loop_runner;
mod render;
mod status;

pub(crate) use helpers::catch_task_panic;
pub use loop_runner::{run, Action};
