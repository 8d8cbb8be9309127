//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use logview::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{LvError, Result};

// Buffer
pub use crate::buffer::{
    BufferConfig, Driver, DriverFactory, EngineState, FetchInstruction, Line, ObserverId, Record,
    ScreenBuffer,
};

// Filter
pub use crate::filter::{FilterState, QueryCompiler};

// Backends
#[cfg(feature = "sqlite")]
pub use crate::backend::sqlite::{SqliteDriver, SqliteDriverFactory};
