//! Utility functions for common operations.
//!
//! - **Instance URLs**: normalizing what the user typed into an API base
//! - **Text processing**: Unicode-aware width calculation and truncation
//!
//! # Examples
//!
//! ```
//! use voyager::util::{display_width, normalize_instance_url, truncate_to_width};
//!
//! let url = normalize_instance_url("lemmy.world").unwrap();
//! assert_eq!(url.as_str(), "https://lemmy.world/");
//!
//! assert_eq!(display_width("Hello"), 5);
//! assert_eq!(truncate_to_width("Long post title", 9), "Long pos…");
//! ```

mod instance;
mod text;

pub use instance::{normalize_instance_url, InstanceUrlError};
pub use text::{display_width, relative_time, strip_control_chars, truncate_to_width};
