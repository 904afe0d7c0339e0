pub mod executor;
pub mod manager;
pub mod repository;
pub mod schema;

pub use executor::{Catalog, PgExecutor, SqlExecutor};
pub use manager::{DatabaseError, DatabaseManager, PoolStats};
pub use repository::{DataOperation, DynamicRepository};
pub use schema::{ColumnInfo, SchemaCache, TableSchema};
