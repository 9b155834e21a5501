pub mod query;
pub mod table;

pub use query::{QueryResult, Value};
pub use table::{ColumnInfo, TableInfo, TableSchema};
