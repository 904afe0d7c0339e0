use super::error::QueryError;
use super::query::{join_parts, select_list};
use super::query_where::quote_identifier;
use super::types::{Columns, SqlResult};
use super::value::SqlValue;
use crate::database::schema::TableSchema;

/// Relevance-ranked ILIKE search over a set of columns
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub search_columns: Vec<String>,
    pub result_columns: Columns,
    /// `None` means unbounded
    pub limit: Option<i64>,
}

/// Build the search statement.
///
/// `$1` is the prefix pattern and `$2` the substring pattern. Every prefix branch of the
/// `relevance_score` CASE precedes every substring branch, so a prefix match on any column
/// outranks a substring-only match. Ties fall back to the primary key.
pub fn build_search_query(schema: &TableSchema, request: &SearchRequest) -> Result<SqlResult, QueryError> {
    if schema.is_empty() {
        return Err(QueryError::validation(format!("Schema \"{}\" does not exist", schema.name())));
    }
    if request.query.is_empty() {
        return Err(QueryError::validation("Search query cannot be empty"));
    }
    if request.search_columns.is_empty() {
        return Err(QueryError::validation("At least one search column is required"));
    }
    for column in request.search_columns.iter().chain(request.result_columns.names()) {
        if !schema.has_column(column) {
            return Err(QueryError::unknown_column(column));
        }
    }
    if matches!(request.limit, Some(l) if l < 0) {
        return Err(QueryError::validation("Limit must be non-negative"));
    }

    let targets: Vec<String> = request
        .search_columns
        .iter()
        .map(|c| format!("{}::text", quote_identifier(c)))
        .collect();
    let n = targets.len();

    let prefix_branches = targets
        .iter()
        .enumerate()
        .map(|(i, t)| format!("WHEN {} ILIKE $1 THEN {}", t, i + 1));
    let substring_branches = targets
        .iter()
        .enumerate()
        .map(|(i, t)| format!("WHEN {} ILIKE $2 THEN {}", t, n + i + 1));
    let case = format!(
        "CASE {} ELSE {} END AS relevance_score",
        prefix_branches.chain(substring_branches).collect::<Vec<_>>().join(" "),
        2 * n + 1
    );

    // A prefix match is also a substring match, so $2 alone selects every hit
    let filter = targets
        .iter()
        .map(|t| format!("{} ILIKE $2", t))
        .collect::<Vec<_>>()
        .join(" OR ");

    let order = match schema.primary_key() {
        Some(pk) => format!("ORDER BY relevance_score ASC, {} ASC", quote_identifier(pk)),
        None => "ORDER BY relevance_score ASC".to_string(),
    };

    let escaped = escape_like(&request.query);
    let query = join_parts([
        format!("SELECT {}, {} FROM {}", select_list(&request.result_columns), case, quote_identifier(schema.name())),
        format!("WHERE {}", filter),
        order,
        request.limit.map(|l| format!("LIMIT {}", l)).unwrap_or_default(),
    ]);

    Ok(SqlResult {
        query,
        params: vec![
            SqlValue::Text(format!("{}%", escaped)),
            SqlValue::Text(format!("%{}%", escaped)),
        ],
    })
}

/// Escape LIKE wildcards so the search term matches literally
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
