use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

use super::executor::SqlExecutor;
use super::schema::TableSchema;
use crate::query::{
    build_query, build_search_query, Assignment, Columns, CompareOp, OrderBy, Predicate, QueryError, QueryRequest,
    SearchRequest, SortDirection, SqlResult, SqlValue,
};
use crate::types::{Statement, Verb};

/// One verb-dispatched data operation against a table
#[derive(Debug, Clone)]
pub struct DataOperation {
    pub verb: Verb,
    pub columns: Columns,
    pub where_clause: Vec<Predicate>,
    pub set: Vec<Assignment>,
    pub values: Vec<SqlValue>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<i64>,
    pub check_columns: bool,
}

impl DataOperation {
    pub fn new(verb: Verb) -> Self {
        Self {
            verb,
            columns: Columns::All,
            where_clause: vec![],
            set: vec![],
            values: vec![],
            order_by: None,
            limit: None,
            check_columns: true,
        }
    }
}

/// Generic repository over one introspected table. Rows come back as JSON objects.
pub struct DynamicRepository {
    schema: Arc<TableSchema>,
    executor: Arc<dyn SqlExecutor>,
}

impl DynamicRepository {
    pub fn new(schema: Arc<TableSchema>, executor: Arc<dyn SqlExecutor>) -> Self {
        Self { schema, executor }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// SELECT with validated columns, predicates and ordering
    pub async fn get_schema_data(
        &self,
        columns: Columns,
        where_clause: Vec<Predicate>,
        order_by: Option<OrderBy>,
        limit: Option<i64>,
    ) -> Result<Vec<Value>, QueryError> {
        let request = QueryRequest::new(Statement::Select)
            .columns(columns)
            .where_clause(where_clause)
            .order_by(order_by)
            .limit(limit);
        let sql = build_query(&self.schema, request)?;
        self.execute("select", &sql).await
    }

    /// Dispatch GET→SELECT, POST→INSERT, PUT→UPDATE, DELETE→DELETE
    pub async fn custom_data_operation(&self, op: DataOperation) -> Result<Vec<Value>, QueryError> {
        let statement = op.verb.statement();
        if matches!(statement, Statement::Update | Statement::Delete) && op.where_clause.is_empty() {
            return Err(QueryError::validation(format!(
                "A clause is required for {} requests",
                op.verb
            )));
        }

        let request = QueryRequest::new(statement)
            .columns(op.columns)
            .where_clause(op.where_clause)
            .set(op.set)
            .values(op.values)
            .order_by(op.order_by)
            .limit(if statement == Statement::Select { op.limit } else { None })
            .validate_columns(op.check_columns);
        let sql = build_query(&self.schema, request)?;
        self.execute(statement.as_str(), &sql).await
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<Value>, QueryError> {
        let sql = build_search_query(&self.schema, request)?;
        self.execute("search", &sql).await
    }

    /// Fetch one record by the table's primary key
    pub async fn get_record_by_pk(&self, key: &str) -> Result<Value, QueryError> {
        let pk = self.schema.primary_key().ok_or_else(|| {
            QueryError::not_found(format!("Schema \"{}\" has no primary key", self.schema.name()))
        })?;
        let rows = self
            .get_schema_data(
                Columns::All,
                vec![Predicate::new(pk, CompareOp::Eq, key.into())],
                None,
                Some(1),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| QueryError::not_found(format!("Record not found: {}", key)))
    }

    /// First rows of the table, bounded by `schema.eager_load_max_rows`
    pub async fn snapshot(&self, max_rows: i64) -> Result<Vec<Value>, QueryError> {
        let cap = crate::config::config().schema.eager_load_max_rows;
        let order_by = self.schema.primary_key().map(|pk| OrderBy {
            column: pk.to_string(),
            direction: SortDirection::Asc,
        });
        self.get_schema_data(Columns::All, vec![], order_by, Some(max_rows.clamp(0, cap.max(0))))
            .await
    }

    async fn execute(&self, operation: &str, sql: &SqlResult) -> Result<Vec<Value>, QueryError> {
        debug!("{} on {}: {}", operation, self.schema.name(), sql.query);
        self.executor.fetch(sql).await.map_err(|e| {
            error!(
                "{} on {} failed with {} params: {}",
                operation,
                self.schema.name(),
                sql.params.len(),
                e
            );
            QueryError::Database(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::ColumnInfo;
    use crate::testing::RecordingExecutor;
    use serde_json::json;

    fn repo(executor: Arc<RecordingExecutor>) -> DynamicRepository {
        let schema = TableSchema::new(
            "users",
            vec![
                ColumnInfo::new("id", "int4"),
                ColumnInfo::new("username", "text"),
                ColumnInfo::new("status", "text"),
            ],
            Some("id".into()),
        );
        DynamicRepository::new(Arc::new(schema), executor)
    }

    #[tokio::test]
    async fn dispatches_verbs_to_statements() {
        let executor = Arc::new(RecordingExecutor::new());
        let repo = repo(executor.clone());

        let mut post = DataOperation::new(Verb::Post);
        post.columns = Columns::named(["username"]);
        post.values = vec!["ada".into()];
        repo.custom_data_operation(post).await.unwrap();

        let mut put = DataOperation::new(Verb::Put);
        put.where_clause = vec![Predicate::new("id", CompareOp::Eq, "1".into())];
        put.set = vec![Assignment::new("status", "away".into())];
        repo.custom_data_operation(put).await.unwrap();

        let statements = executor.statements();
        assert!(statements[0].query.starts_with("INSERT INTO \"users\""));
        assert_eq!(
            statements[1].query,
            "UPDATE \"users\" SET \"status\" = $2 WHERE \"id\" = $1 RETURNING *"
        );
        assert_eq!(statements[1].params, vec![SqlValue::Int(1), SqlValue::from("away")]);
    }

    #[tokio::test]
    async fn mutations_without_a_clause_are_rejected() {
        let executor = Arc::new(RecordingExecutor::new());
        let repo = repo(executor.clone());

        let mut put = DataOperation::new(Verb::Put);
        put.set = vec![Assignment::new("status", "away".into())];
        assert!(matches!(repo.custom_data_operation(put).await, Err(QueryError::Validation(_))));
        assert!(repo.custom_data_operation(DataOperation::new(Verb::Delete)).await.is_err());
        assert!(executor.statements().is_empty());
    }

    #[tokio::test]
    async fn record_by_primary_key() {
        let executor = Arc::new(RecordingExecutor::new().with_rows(vec![json!({"id": 3, "username": "ada"})]));
        let repo = repo(executor.clone());
        let row = repo.get_record_by_pk("3").await.unwrap();
        assert_eq!(row["username"], "ada");
        assert_eq!(
            executor.statements()[0].query,
            "SELECT * FROM \"users\" WHERE \"id\" = $1 LIMIT 1"
        );

        let empty = repo_with_no_rows();
        assert!(matches!(empty.get_record_by_pk("9").await, Err(QueryError::NotFound(_))));
    }

    fn repo_with_no_rows() -> DynamicRepository {
        repo(Arc::new(RecordingExecutor::new()))
    }

    #[tokio::test]
    async fn snapshot_is_bounded() {
        let executor = Arc::new(RecordingExecutor::new());
        let repo = repo(executor.clone());
        let cap = crate::config::config().schema.eager_load_max_rows;
        repo.snapshot(i64::MAX).await.unwrap();
        assert_eq!(
            executor.statements()[0].query,
            format!("SELECT * FROM \"users\" ORDER BY \"id\" ASC LIMIT {}", cap)
        );
    }
}
