//! Parsers for the header mini-languages: `clause` (`col<op>value,…`) and `fields` (`a,b` or `*`).

use super::error::QueryError;
use super::types::{Columns, CompareOp, Predicate};

/// Parse a `clause` header into ANDed predicates.
///
/// Each token splits at its first operator character, taking the longest operator found there,
/// so `age>=21` is `age`, `>=`, `21` and `note=a=b` compares `note` with `a=b`. Malformed tokens
/// are rejected rather than skipped.
pub fn parse_clause(header: &str) -> Result<Vec<Predicate>, QueryError> {
    if header.trim().is_empty() {
        return Ok(vec![]);
    }
    header.split(',').map(parse_token).collect()
}

fn parse_token(raw: &str) -> Result<Predicate, QueryError> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(QueryError::validation("Empty clause token"));
    }

    let position = token
        .find(['<', '>', '='])
        .ok_or_else(|| QueryError::validation(format!("Clause \"{}\" has no operator", token)))?;
    let rest = &token[position..];
    let operator = CompareOp::BY_LENGTH
        .into_iter()
        .find(|op| rest.starts_with(op.to_sql()))
        .ok_or_else(|| QueryError::validation(format!("Clause \"{}\" has no operator", token)))?;

    let column = token[..position].trim();
    let value = rest[operator.to_sql().len()..].trim();
    if column.is_empty() {
        return Err(QueryError::validation(format!("Clause \"{}\" is missing a column", token)));
    }
    if value.is_empty() {
        return Err(QueryError::validation(format!("Clause \"{}\" is missing a value", token)));
    }
    Ok(Predicate::new(column, operator, value.into()))
}

/// Parse a `fields` header. `*` selects every column.
pub fn parse_fields(header: &str) -> Result<Columns, QueryError> {
    let header = header.trim();
    if header.is_empty() {
        return Err(QueryError::validation("Fields header cannot be empty"));
    }
    if header == "*" {
        return Ok(Columns::All);
    }
    let mut names = Vec::new();
    for field in header.split(',') {
        let field = field.trim();
        if field.is_empty() {
            return Err(QueryError::validation(format!("Invalid fields list: {}", header)));
        }
        names.push(field.to_string());
    }
    Ok(Columns::Named(names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::value::SqlValue;

    #[test]
    fn parses_status_and_age() {
        let predicates = parse_clause("status=active,age>=21").unwrap();
        assert_eq!(
            predicates,
            vec![
                Predicate::new("status", CompareOp::Eq, SqlValue::from("active")),
                Predicate::new("age", CompareOp::Gte, SqlValue::from("21")),
            ]
        );
    }

    #[test]
    fn picks_the_longest_operator() {
        let ops: Vec<CompareOp> = parse_clause("a<=1,b>=2,c<>3,d<4,e>5,f=6")
            .unwrap()
            .into_iter()
            .map(|p| p.operator)
            .collect();
        assert_eq!(
            ops,
            vec![CompareOp::Lte, CompareOp::Gte, CompareOp::Neq, CompareOp::Lt, CompareOp::Gt, CompareOp::Eq]
        );
    }

    #[test]
    fn value_keeps_later_operator_characters() {
        let p = &parse_clause(" note = a=b ").unwrap()[0];
        assert_eq!(p.column, "note");
        assert_eq!(p.value, SqlValue::from("a=b"));
    }

    #[test]
    fn rejects_malformed_tokens() {
        for bad in ["status", "=active", "status=", "a=1,,b=2", "a=1,"] {
            assert!(parse_clause(bad).is_err(), "{}", bad);
        }
        assert!(parse_clause("   ").unwrap().is_empty());
    }

    #[test]
    fn parses_fields() {
        assert_eq!(parse_fields("*").unwrap(), Columns::All);
        assert_eq!(parse_fields(" id, name ").unwrap(), Columns::named(["id", "name"]));
        assert!(parse_fields("").is_err());
        assert!(parse_fields("id,,name").is_err());
    }
}
