pub mod clause;
pub mod error;
pub mod query;
pub mod query_order;
pub mod query_values;
pub mod query_where;
pub mod search;
pub mod types;
pub mod value;

pub use clause::{parse_clause, parse_fields};
pub use error::QueryError;
pub use query::{build_query, QueryRequest};
pub use query_order::QueryOrder;
pub use query_values::QueryValues;
pub use query_where::{quote_identifier, QueryWhere};
pub use search::{build_search_query, SearchRequest};
pub use types::{Assignment, ClauseInput, ClauseSql, Columns, CompareOp, OrderBy, Predicate, SortDirection, SqlResult, WhereClause};
pub use value::{SqlType, SqlValue};
