//! Filter state and the filter-to-query compiler.

pub mod query;
pub mod state;

pub use query::{COLUMNS, DATETIME_FORMAT, DEFAULT_TABLE, QueryCompiler, is_plain_identifier};
pub use state::{FilterState, facility_from_name, level_from_name};
