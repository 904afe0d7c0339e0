//! Typed form of a dynamic request, parsed once from headers and body.

use axum::http::HeaderMap;
use serde_json::{Map, Value};

use crate::auth::API_KEY_HEADERS;
use crate::query::{
    parse_clause, parse_fields, Assignment, Columns, OrderBy, Predicate, QueryError, QueryOrder, SqlValue,
};
use crate::types::Verb;

/// `limit` header: absent, `-1` (unbounded) or a non-negative row count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Default,
    Unbounded,
    Rows(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpec {
    pub query: String,
    /// `All` (from `searchfor: *`) is resolved against the table schema by the handler
    pub columns: Columns,
}

/// Single row for POST
#[derive(Debug, Clone, PartialEq)]
pub struct InsertRow {
    pub columns: Vec<String>,
    pub values: Vec<SqlValue>,
}

#[derive(Debug, Clone)]
pub struct DynamicRequest {
    pub verb: Verb,
    pub where_clause: Vec<Predicate>,
    pub columns: Columns,
    pub limit: Limit,
    pub order_by: Option<OrderBy>,
    pub search: Option<SearchSpec>,
    pub formatted_json: bool,
    pub set: Vec<Assignment>,
    pub insert: Option<InsertRow>,
}

impl DynamicRequest {
    /// The presented API key, from the first key header that is set.
    /// A key that is not valid UTF-8 cannot match a stored key and counts as absent.
    pub fn api_key(headers: &HeaderMap) -> Option<String> {
        API_KEY_HEADERS
            .iter()
            .find_map(|name| header(headers, name).ok().flatten())
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }

    pub fn parse(verb: Verb, headers: &HeaderMap, body: Option<&Value>) -> Result<Self, QueryError> {
        let where_clause = match header(headers, "clause")? {
            Some(clause) => parse_clause(clause)?,
            None => vec![],
        };
        let columns = match header(headers, "fields")? {
            Some(fields) => parse_fields(fields)?,
            None => Columns::All,
        };
        let limit = match header(headers, "limit")? {
            Some(raw) => parse_limit(raw)?,
            None => Limit::Default,
        };
        let order_by = match header(headers, "orderby")? {
            Some(raw) => QueryOrder::parse(raw)?,
            None => None,
        };
        let formatted_json = match header(headers, "formattedjson")? {
            Some(raw) => parse_flag("formattedJSON", raw)?,
            None => false,
        };

        let searching = match header(headers, "search")? {
            Some(raw) => parse_flag("search", raw)?,
            None => false,
        };
        if searching && verb != Verb::Get {
            return Err(QueryError::validation("Search is only available for GET requests"));
        }
        let search = if searching { Some(parse_search(headers)?) } else { None };

        let mut request = DynamicRequest {
            verb,
            where_clause,
            columns,
            limit,
            order_by,
            search,
            formatted_json,
            set: vec![],
            insert: None,
        };

        match verb {
            Verb::Put => {
                request.set = parse_update(body)?;
                if request.where_clause.is_empty() {
                    return Err(QueryError::validation("Must provide a clause in order to update data"));
                }
            }
            Verb::Post => {
                request.insert = Some(parse_push(body, &request.columns)?);
            }
            Verb::Delete => {
                if request.where_clause.is_empty() {
                    return Err(QueryError::validation("Must provide a clause in order to delete data"));
                }
            }
            Verb::Get => {}
        }
        Ok(request)
    }
}

/// Trimmed header value; present but not UTF-8 is a validation error naming the header
fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, QueryError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    std::str::from_utf8(value.as_bytes())
        .map(|v| Some(v.trim()))
        .map_err(|_| QueryError::validation(format!("The {} header is not valid UTF-8", name)))
}

fn parse_limit(raw: &str) -> Result<Limit, QueryError> {
    match raw.parse::<i64>() {
        Ok(-1) => Ok(Limit::Unbounded),
        Ok(n) if n >= 0 => Ok(Limit::Rows(n)),
        _ => Err(QueryError::validation(format!(
            "Invalid limit \"{}\" (expected a non-negative integer or -1)",
            raw
        ))),
    }
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, QueryError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(QueryError::validation(format!("Invalid {} flag: {}", name, raw))),
    }
}

fn parse_search(headers: &HeaderMap) -> Result<SearchSpec, QueryError> {
    let query = header(headers, "q")?
        .filter(|q| !q.is_empty())
        .ok_or_else(|| QueryError::validation("Cannot perform a search without the q header"))?;
    let columns = match header(headers, "searchfor")? {
        Some(raw) => parse_fields(raw)?,
        None => return Err(QueryError::validation("The searchfor header must list the columns to search, or *")),
    };
    Ok(SearchSpec { query: query.to_string(), columns })
}

/// `{"update": {"data": {column: value, …}}}`
fn parse_update(body: Option<&Value>) -> Result<Vec<Assignment>, QueryError> {
    let data = body
        .and_then(|b| b.get("update"))
        .and_then(|u| u.get("data"))
        .and_then(Value::as_object)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| QueryError::validation("Missing update data for PUT request"))?;
    Ok(data
        .iter()
        .map(|(column, value)| Assignment::new(column.as_str(), SqlValue::from_json(value)))
        .collect())
}

/// `push` is one row: an object, a one-element array holding an object, or an array of
/// values aligned with the `fields` header
fn parse_push(body: Option<&Value>, fields: &Columns) -> Result<InsertRow, QueryError> {
    let push = body
        .and_then(|b| b.get("push"))
        .ok_or_else(|| QueryError::validation("Missing push data for POST request"))?;

    match push {
        Value::Object(row) => object_row(row),
        Value::Array(items) if items.len() == 1 && items[0].is_object() => match &items[0] {
            Value::Object(row) => object_row(row),
            _ => Err(QueryError::validation("Invalid push data")),
        },
        Value::Array(items) if items.iter().any(Value::is_object) => {
            Err(QueryError::validation("Only a single row can be inserted per request"))
        }
        Value::Array(items) => {
            let columns = match fields {
                Columns::Named(names) => names.clone(),
                Columns::All => {
                    return Err(QueryError::validation("The fields header must name the columns of the pushed values"))
                }
            };
            if items.is_empty() {
                return Err(QueryError::validation("Missing push data for POST request"));
            }
            if columns.len() != items.len() {
                return Err(QueryError::validation(format!(
                    "Push has {} values but fields names {} columns",
                    items.len(),
                    columns.len()
                )));
            }
            Ok(InsertRow {
                columns,
                values: items.iter().map(SqlValue::from_json).collect(),
            })
        }
        _ => Err(QueryError::validation("Invalid push data")),
    }
}

fn object_row(row: &Map<String, Value>) -> Result<InsertRow, QueryError> {
    if row.is_empty() {
        return Err(QueryError::validation("Missing push data for POST request"));
    }
    Ok(InsertRow {
        columns: row.keys().cloned().collect(),
        values: row.values().map(SqlValue::from_json).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{CompareOp, SortDirection};
    use axum::http::HeaderValue;
    use serde_json::json;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn parses_select_headers() {
        let h = headers(&[
            ("api_key", "abc"),
            ("clause", "status=active,age>=21"),
            ("fields", "id,name"),
            ("limit", "5"),
            ("orderby", "name desc"),
        ]);
        let req = DynamicRequest::parse(Verb::Get, &h, None).unwrap();
        assert_eq!(DynamicRequest::api_key(&h).as_deref(), Some("abc"));
        assert_eq!(req.where_clause.len(), 2);
        assert_eq!(req.where_clause[1].operator, CompareOp::Gte);
        assert_eq!(req.columns, Columns::named(["id", "name"]));
        assert_eq!(req.limit, Limit::Rows(5));
        assert_eq!(req.order_by.unwrap().direction, SortDirection::Desc);
        assert!(req.search.is_none());
        assert!(!req.formatted_json);
    }

    #[test]
    fn accepts_alternate_key_headers() {
        assert_eq!(DynamicRequest::api_key(&headers(&[("x-api-key", "k")])).as_deref(), Some("k"));
        assert_eq!(DynamicRequest::api_key(&headers(&[("api-key", "k2")])).as_deref(), Some("k2"));
        assert!(DynamicRequest::api_key(&headers(&[("api_key", "")])).is_none());
        assert!(DynamicRequest::api_key(&headers(&[])).is_none());
    }

    #[test]
    fn rejects_bad_headers() {
        for (name, value) in [("clause", "status"), ("limit", "-5"), ("limit", "ten"), ("orderby", "id up"), ("fields", " ")] {
            assert!(DynamicRequest::parse(Verb::Get, &headers(&[(name, value)]), None).is_err(), "{}: {}", name, value);
        }
    }

    #[test]
    fn parses_search_headers() {
        let h = headers(&[("search", "true"), ("q", "jo"), ("searchfor", "username,full_name"), ("limit", "-1")]);
        let req = DynamicRequest::parse(Verb::Get, &h, None).unwrap();
        let search = req.search.unwrap();
        assert_eq!(search.query, "jo");
        assert_eq!(search.columns, Columns::named(["username", "full_name"]));
        assert_eq!(req.limit, Limit::Unbounded);

        let missing_q = headers(&[("search", "true"), ("searchfor", "username")]);
        assert!(DynamicRequest::parse(Verb::Get, &missing_q, None).is_err());
        let missing_columns = headers(&[("search", "1"), ("q", "jo")]);
        assert!(DynamicRequest::parse(Verb::Get, &missing_columns, None).is_err());

        let every_column = headers(&[("search", "1"), ("q", "jo"), ("searchfor", "*")]);
        let search = DynamicRequest::parse(Verb::Get, &every_column, None).unwrap().search.unwrap();
        assert_eq!(search.columns, Columns::All);
    }

    #[test]
    fn utf8_header_values_are_kept() {
        let mut h = HeaderMap::new();
        h.insert("clause", HeaderValue::from_bytes("full_name=José".as_bytes()).unwrap());
        let req = DynamicRequest::parse(Verb::Get, &h, None).unwrap();
        assert_eq!(req.where_clause[0].value, SqlValue::from("José"));
    }

    #[test]
    fn non_utf8_header_values_are_rejected_by_name() {
        let mut h = HeaderMap::new();
        h.insert("clause", HeaderValue::from_bytes(b"full_name=\xff\xfe").unwrap());
        let err = DynamicRequest::parse(Verb::Get, &h, None).unwrap_err();
        assert!(matches!(&err, QueryError::Validation(msg) if msg.contains("clause")), "{:?}", err);

        let mut h = HeaderMap::new();
        h.insert("api_key", HeaderValue::from_bytes(b"\xff").unwrap());
        assert!(DynamicRequest::api_key(&h).is_none());
    }

    #[test]
    fn put_needs_clause_and_update_data() {
        let body = json!({"update": {"data": {"name": "Ada", "age": 36}}});
        let req = DynamicRequest::parse(Verb::Put, &headers(&[("clause", "id=1")]), Some(&body)).unwrap();
        assert_eq!(req.set.len(), 2);
        assert!(req.set.iter().any(|a| a.column == "age" && a.value == SqlValue::Int(36)));

        assert!(DynamicRequest::parse(Verb::Put, &headers(&[]), Some(&body)).is_err());
        let empty = json!({"update": {"data": {}}});
        assert!(DynamicRequest::parse(Verb::Put, &headers(&[("clause", "id=1")]), Some(&empty)).is_err());
    }

    #[test]
    fn delete_needs_clause() {
        assert!(DynamicRequest::parse(Verb::Delete, &headers(&[]), None).is_err());
        assert!(DynamicRequest::parse(Verb::Delete, &headers(&[("clause", "id=3")]), None).is_ok());
    }

    #[test]
    fn push_forms() {
        let aligned = json!({"push": ["ada", "ada@example.com"]});
        let req = DynamicRequest::parse(Verb::Post, &headers(&[("fields", "username,email")]), Some(&aligned)).unwrap();
        let row = req.insert.unwrap();
        assert_eq!(row.columns, vec!["username".to_string(), "email".to_string()]);
        assert_eq!(row.values[1], SqlValue::from("ada@example.com"));

        let object = json!({"push": {"username": "ada"}});
        let row = DynamicRequest::parse(Verb::Post, &headers(&[]), Some(&object)).unwrap().insert.unwrap();
        assert_eq!(row.columns, vec!["username".to_string()]);

        let wrapped = json!({"push": [{"username": "ada"}]});
        assert!(DynamicRequest::parse(Verb::Post, &headers(&[]), Some(&wrapped)).is_ok());

        let bulk = json!({"push": [{"username": "ada"}, {"username": "bob"}]});
        assert!(DynamicRequest::parse(Verb::Post, &headers(&[]), Some(&bulk)).is_err());
        let misaligned = json!({"push": ["ada"]});
        assert!(DynamicRequest::parse(Verb::Post, &headers(&[("fields", "username,email")]), Some(&misaligned)).is_err());
        assert!(DynamicRequest::parse(Verb::Post, &headers(&[]), None).is_err());
    }
}
