use super::error::QueryError;
use super::query_order::QueryOrder;
use super::query_values::QueryValues;
use super::query_where::{quote_identifier, QueryWhere};
use super::types::{Assignment, ClauseInput, Columns, OrderBy, Predicate, SqlResult};
use super::value::{SqlType, SqlValue};
use crate::database::schema::TableSchema;
use crate::types::Statement;

/// Everything needed to build one statement against one table
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub statement: Statement,
    /// SELECT list, or the INSERT column list (aligned with `values`)
    pub columns: Columns,
    pub where_clause: Vec<Predicate>,
    pub set: Vec<Assignment>,
    pub values: Vec<SqlValue>,
    pub order_by: Option<OrderBy>,
    /// SELECT only; `None` means no LIMIT
    pub limit: Option<i64>,
    /// Check every referenced column against the schema and coerce values to the column types
    pub validate_columns: bool,
}

impl QueryRequest {
    pub fn new(statement: Statement) -> Self {
        Self {
            statement,
            columns: Columns::All,
            where_clause: vec![],
            set: vec![],
            values: vec![],
            order_by: None,
            limit: None,
            validate_columns: true,
        }
    }

    pub fn columns(mut self, columns: Columns) -> Self {
        self.columns = columns;
        self
    }

    pub fn where_clause(mut self, predicates: Vec<Predicate>) -> Self {
        self.where_clause = predicates;
        self
    }

    pub fn set(mut self, assignments: Vec<Assignment>) -> Self {
        self.set = assignments;
        self
    }

    pub fn values(mut self, values: Vec<SqlValue>) -> Self {
        self.values = values;
        self
    }

    pub fn order_by(mut self, order_by: Option<OrderBy>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn limit(mut self, limit: Option<i64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn validate_columns(mut self, validate: bool) -> Self {
        self.validate_columns = validate;
        self
    }
}

/// Assemble a parameterized statement.
///
/// Identifiers are quoted and, with `validate_columns` on, must exist in `schema`. Placeholders are
/// numbered WHERE first, then SET (UPDATE) or VALUES (INSERT).
pub fn build_query(schema: &TableSchema, request: QueryRequest) -> Result<SqlResult, QueryError> {
    if schema.is_empty() {
        return Err(QueryError::validation(format!("Schema \"{}\" does not exist", schema.name())));
    }
    let request = if request.validate_columns {
        validate(schema, request)?
    } else {
        request
    };
    let table = quote_identifier(schema.name());

    match request.statement {
        Statement::Select => {
            let where_sql = QueryWhere::generate(ClauseInput::Where(&request.where_clause), 1)?;
            if let Some(limit) = request.limit {
                if limit < 0 {
                    return Err(QueryError::validation("Limit must be non-negative"));
                }
            }
            let query = join_parts([
                format!("SELECT {} FROM {}", select_list(&request.columns), table),
                prefixed("WHERE", &where_sql.sql),
                QueryOrder::generate(request.order_by.as_ref()),
                request.limit.map(|l| format!("LIMIT {}", l)).unwrap_or_default(),
            ]);
            Ok(SqlResult { query, params: where_sql.params })
        }
        Statement::Insert => {
            let names = request.columns.names();
            if names.is_empty() {
                return Err(QueryError::validation("Fields are required when inserting data"));
            }
            if names.len() != request.values.len() {
                return Err(QueryError::validation(format!(
                    "Insert has {} fields but {} values",
                    names.len(),
                    request.values.len()
                )));
            }
            let values = QueryValues::generate(&request.values, 1)?;
            let query = format!(
                "INSERT INTO {} ({}) {} RETURNING *",
                table,
                column_list(names),
                values.sql
            );
            Ok(SqlResult { query, params: values.params })
        }
        Statement::Update => {
            if request.set.is_empty() {
                return Err(QueryError::validation("Update data is required when updating data"));
            }
            let where_sql = QueryWhere::generate(ClauseInput::Where(&request.where_clause), 1)?;
            let set_sql = QueryWhere::generate(ClauseInput::Set(&request.set), where_sql.next_index)?;
            let query = join_parts([
                format!("UPDATE {} SET {}", table, set_sql.sql),
                prefixed("WHERE", &where_sql.sql),
                "RETURNING *".to_string(),
            ]);
            let mut params = where_sql.params;
            params.extend(set_sql.params);
            Ok(SqlResult { query, params })
        }
        Statement::Delete => {
            let where_sql = QueryWhere::generate(ClauseInput::Where(&request.where_clause), 1)?;
            let query = join_parts([
                format!("DELETE FROM {}", table),
                prefixed("WHERE", &where_sql.sql),
                "RETURNING *".to_string(),
            ]);
            Ok(SqlResult { query, params: where_sql.params })
        }
    }
}

/// Check every referenced column and coerce bound values to their column types
fn validate(schema: &TableSchema, mut request: QueryRequest) -> Result<QueryRequest, QueryError> {
    for name in request.columns.names() {
        require_column(schema, name)?;
    }
    if let Some(order) = &request.order_by {
        require_column(schema, &order.column)?;
    }

    for predicate in request.where_clause.iter_mut() {
        predicate.value = coerce(schema, &predicate.column, predicate.value.clone())?;
    }
    for assignment in request.set.iter_mut() {
        assignment.value = coerce(schema, &assignment.column, assignment.value.clone())?;
    }
    if request.statement == Statement::Insert && request.columns.names().len() == request.values.len() {
        let names = request.columns.names().to_vec();
        request.values = names
            .iter()
            .zip(std::mem::take(&mut request.values))
            .map(|(name, value)| coerce(schema, name, value))
            .collect::<Result<Vec<_>, _>>()?;
    }
    Ok(request)
}

fn require_column(schema: &TableSchema, name: &str) -> Result<(), QueryError> {
    if schema.has_column(name) {
        Ok(())
    } else {
        Err(QueryError::unknown_column(name))
    }
}

fn coerce(schema: &TableSchema, column: &str, value: SqlValue) -> Result<SqlValue, QueryError> {
    let info = schema.column(column).ok_or_else(|| QueryError::unknown_column(column))?;
    match info.sql_type() {
        SqlType::Other => Ok(value.cast_to(&info.pg_type)),
        ty => value.coerce(ty, column),
    }
}

pub(crate) fn select_list(columns: &Columns) -> String {
    match columns {
        Columns::All => "*".to_string(),
        Columns::Named(names) if names.is_empty() => "*".to_string(),
        Columns::Named(names) => column_list(names),
    }
}

pub(crate) fn column_list(names: &[String]) -> String {
    names.iter().map(|c| quote_identifier(c)).collect::<Vec<_>>().join(", ")
}

fn prefixed(keyword: &str, body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!("{} {}", keyword, body)
    }
}

pub(crate) fn join_parts<const N: usize>(parts: [String; N]) -> String {
    parts.into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ")
}
