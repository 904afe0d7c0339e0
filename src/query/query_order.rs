use super::error::QueryError;
use super::query_where::quote_identifier;
use super::types::{OrderBy, SortDirection};

pub struct QueryOrder;

impl QueryOrder {
    /// Parse `column`, `column asc|desc` or `column:desc`
    pub fn parse(spec: &str) -> Result<Option<OrderBy>, QueryError> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let mut parts = trimmed
            .split(|c: char| c.is_whitespace() || c == ':')
            .filter(|p| !p.is_empty());
        let column = parts.next().unwrap_or_default().to_string();
        let direction = match parts.next() {
            None => SortDirection::Asc,
            Some(d) if d.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Desc,
            Some(d) => {
                return Err(QueryError::validation(format!(
                    "Invalid sort direction \"{}\" (expected ASC or DESC)",
                    d
                )))
            }
        };
        if parts.next().is_some() {
            return Err(QueryError::validation(format!("Invalid orderBy value: {}", trimmed)));
        }
        Ok(Some(OrderBy { column, direction }))
    }

    pub fn generate(order: Option<&OrderBy>) -> String {
        match order {
            Some(o) => format!("ORDER BY {} {}", quote_identifier(&o.column), o.direction.to_sql()),
            None => String::new(),
        }
    }
}
