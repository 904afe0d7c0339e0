use super::error::QueryError;
use super::types::ClauseSql;
use super::value::SqlValue;

pub struct QueryValues;

impl QueryValues {
    /// `VALUES ($n, $n+1, …)` for a single INSERT row
    pub fn generate(values: &[SqlValue], start_index: usize) -> Result<ClauseSql, QueryError> {
        if values.is_empty() {
            return Err(QueryError::validation("Values are required when inserting data"));
        }
        let placeholders: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(i, value)| value.placeholder(start_index + i))
            .collect();
        Ok(ClauseSql {
            sql: format!("VALUES ({})", placeholders.join(", ")),
            params: values.to_vec(),
            next_index: start_index + values.len(),
        })
    }
}
