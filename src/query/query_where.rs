use super::error::QueryError;
use super::types::{ClauseInput, ClauseSql, CompareOp};
use super::value::SqlValue;

/// Builds WHERE and SET clause bodies with positional placeholders.
///
/// All placeholder numbering goes through here. Callers thread `next_index` from one clause
/// into the next so WHERE and SET parameters share one sequence without gaps or reuse.
pub struct QueryWhere {
    param_values: Vec<SqlValue>,
    param_index: usize,
}

impl QueryWhere {
    fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// `start_index` is the number of the first placeholder to emit (1-based)
    pub fn generate(input: ClauseInput<'_>, start_index: usize) -> Result<ClauseSql, QueryError> {
        if start_index == 0 {
            return Err(QueryError::validation("Placeholder numbering starts at 1"));
        }
        let mut builder = Self::new(start_index);
        let sql = match input {
            ClauseInput::Where(predicates) => {
                let mut parts = Vec::with_capacity(predicates.len());
                for predicate in predicates {
                    parts.push(builder.condition(&predicate.column, predicate.operator, &predicate.value)?);
                }
                parts.join(" AND ")
            }
            ClauseInput::Set(assignments) => {
                let mut parts = Vec::with_capacity(assignments.len());
                for assignment in assignments {
                    parts.push(builder.condition(&assignment.column, CompareOp::Eq, &assignment.value)?);
                }
                parts.join(", ")
            }
        };
        Ok(ClauseSql {
            sql,
            params: builder.param_values,
            next_index: builder.param_index,
        })
    }

    fn condition(&mut self, column: &str, operator: CompareOp, value: &SqlValue) -> Result<String, QueryError> {
        if column.is_empty() {
            return Err(QueryError::validation("Column name cannot be empty"));
        }
        Ok(format!("{} {} {}", quote_identifier(column), operator.to_sql(), self.param(value.clone())))
    }

    fn param(&mut self, value: SqlValue) -> String {
        let placeholder = value.placeholder(self.param_index);
        self.param_values.push(value);
        self.param_index += 1;
        placeholder
    }
}

/// Quote an SQL identifier, doubling embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::{Assignment, Predicate};

    #[test]
    fn where_predicates_join_with_and() {
        let predicates = vec![
            Predicate::new("status", CompareOp::Eq, "active".into()),
            Predicate::new("age", CompareOp::Gte, "21".into()),
        ];
        let clause = QueryWhere::generate(ClauseInput::Where(&predicates), 1).unwrap();
        assert_eq!(clause.sql, "\"status\" = $1 AND \"age\" >= $2");
        assert_eq!(clause.params, vec![SqlValue::from("active"), SqlValue::from("21")]);
        assert_eq!(clause.next_index, 3);
    }

    #[test]
    fn set_assignments_continue_numbering() {
        let assignments = vec![
            Assignment::new("name", "Ada".into()),
            Assignment::new("email", "ada@example.com".into()),
        ];
        let clause = QueryWhere::generate(ClauseInput::Set(&assignments), 3).unwrap();
        assert_eq!(clause.sql, "\"name\" = $3, \"email\" = $4");
        assert_eq!(clause.next_index, 5);
    }

    #[test]
    fn empty_input_yields_empty_clause() {
        let clause = QueryWhere::generate(ClauseInput::Where(&[]), 4).unwrap();
        assert!(clause.sql.is_empty());
        assert!(clause.params.is_empty());
        assert_eq!(clause.next_index, 4);
    }

    #[test]
    fn quotes_embedded_quotes() {
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
