//! Concrete backend connectors.

#[cfg(feature = "sqlite")]
pub mod sqlite;
