//! Voyager: a terminal Lemmy reader.
//!
//! The [`feed`] module is a Lemmy-agnostic paginated loader; [`lemmy`]
//! plugs the Lemmy API into it and the remaining modules build the
//! terminal application around it.

pub mod app;
pub mod config;
pub mod feed;
pub mod filters;
pub mod lemmy;
pub mod positions;
pub mod storage;
pub mod ui;
pub mod util;
