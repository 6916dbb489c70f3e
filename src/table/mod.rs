//! Arrow tables on disk and the few relational operations the stages need.

pub mod columns;
pub mod group;
pub mod io;

pub use columns::{column, float_values, has_column, text_values};
pub use group::{group_rows, Group, KeyValue};
pub use io::{preview, read_table, write_table};
