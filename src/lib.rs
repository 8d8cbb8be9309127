#![forbid(unsafe_code)]

//! logview: terminal viewer for syslog records stored in a SQL table.
//!
//! The heart of the crate is [`buffer::ScreenBuffer`], a windowed record cache
//! over an append-only table:
//! 1. **Window** the visible page plus buffered lines on either side
//! 2. **Refill policy** low-water-mark fetch instructions, forward and backward
//! 3. **Fetch engine** one background worker that owns the backend [`buffer::Driver`]
//!
//! Filters ([`filter::FilterState`]) compile into backend queries with
//! [`filter::QueryCompiler`].
//!
//! # Library usage
//!
//! ```rust,no_run
//! use logview::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use logview::core::config::Config;
//! use logview::buffer::screen_buffer::{BufferConfig, ScreenBuffer};
//! ```

pub mod prelude;

pub mod backend;
pub mod buffer;
#[cfg(feature = "cli")]
pub mod cli;
pub mod core;
pub mod filter;
