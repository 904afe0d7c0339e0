use serde::Serialize;
use std::fmt;

use super::value::SqlValue;

/// Comparison operators accepted in WHERE predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompareOp {
    #[serde(rename = "=")] Eq,
    #[serde(rename = "<>")] Neq,
    #[serde(rename = "<")] Lt,
    #[serde(rename = ">")] Gt,
    #[serde(rename = "<=")] Lte,
    #[serde(rename = ">=")] Gte,
}

impl CompareOp {
    /// Longest operators first so `<=` is never read as `<`
    pub const BY_LENGTH: [CompareOp; 6] = [
        CompareOp::Lte,
        CompareOp::Gte,
        CompareOp::Neq,
        CompareOp::Lt,
        CompareOp::Gt,
        CompareOp::Eq,
    ];

    pub fn to_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Neq => "<>",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Lte => "<=",
            CompareOp::Gte => ">=",
        }
    }

    pub fn parse(op: &str) -> Option<CompareOp> {
        Self::BY_LENGTH.into_iter().find(|candidate| candidate.to_sql() == op)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_sql())
    }
}

/// One `column <op> value` condition of a WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub operator: CompareOp,
    pub value: SqlValue,
}

impl Predicate {
    pub fn new(column: impl Into<String>, operator: CompareOp, value: SqlValue) -> Self {
        Self { column: column.into(), operator, value }
    }
}

/// Predicates ANDed together, in request order
pub type WhereClause = Vec<Predicate>;

/// One `column = value` entry of a SET clause or an INSERT row
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: SqlValue,
}

impl Assignment {
    pub fn new(column: impl Into<String>, value: SqlValue) -> Self {
        Self { column: column.into(), value }
    }
}

/// Input of the WHERE/SET clause builder. SET entries always compare with `=`.
#[derive(Debug, Clone, Copy)]
pub enum ClauseInput<'a> {
    Where(&'a [Predicate]),
    Set(&'a [Assignment]),
}

/// Column list of a SELECT or INSERT
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Columns {
    #[default]
    All,
    Named(Vec<String>),
}

impl Columns {
    pub fn named(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Columns::Named(columns.into_iter().map(Into::into).collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Columns::All)
    }

    pub fn names(&self) -> &[String] {
        match self {
            Columns::All => &[],
            Columns::Named(names) => names,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

/// A built statement: SQL text with positional placeholders and the values bound to them, in order
#[derive(Debug, Clone, PartialEq)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlValue>,
}

/// Output of the WHERE/SET clause builder
#[derive(Debug, Clone, PartialEq)]
pub struct ClauseSql {
    /// Clause body without the leading keyword; empty when there were no fields
    pub sql: String,
    pub params: Vec<SqlValue>,
    /// First placeholder index not used by this clause
    pub next_index: usize,
}
