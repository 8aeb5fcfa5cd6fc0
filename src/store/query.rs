//! Listing queries: filtering, sorting, projection and pagination.
//!
//! Built from the de-duplicated query map. `page`, `sort`, `limit` and
//! `fields` are control keys; every other key is a filter, with an optional
//! bracketed operator (`price[gte]=500`). A key that kept several values
//! matches if the document equals any of them.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::http::params::{base_name, QueryParams};
use crate::store::Document;

const CONTROL_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Gt,
    Lte,
    Lt,
}

impl FilterOp {
    fn parse(key: &str) -> Option<Self> {
        match &key[base_name(key).len()..] {
            "" => Some(FilterOp::Eq),
            "[gte]" => Some(FilterOp::Gte),
            "[gt]" => Some(FilterOp::Gt),
            "[lte]" => Some(FilterOp::Lte),
            "[lt]" => Some(FilterOp::Lt),
            _ => None,
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            FilterOp::Eq => ordering == Ordering::Equal,
            FilterOp::Gte => ordering != Ordering::Less,
            FilterOp::Gt => ordering == Ordering::Greater,
            FilterOp::Lte => ordering != Ordering::Greater,
            FilterOp::Lt => ordering == Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub values: Vec<String>,
}

impl Filter {
    /// Equality matches any value; range bounds must all hold.
    fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.field(&self.field) else {
            return false;
        };
        let mut results = self
            .values
            .iter()
            .map(|expected| compare_to_param(&actual, expected).is_some_and(|o| self.op.accepts(o)));
        if self.op == FilterOp::Eq {
            results.any(|ok| ok)
        } else {
            results.all(|ok| ok)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Projection {
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    pub filters: Vec<Filter>,
    pub sort: Vec<SortKey>,
    projection: Projection,
    pub page: usize,
    pub limit: usize,
}

impl Default for DocumentQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: vec![SortKey {
                field: "createdAt".to_string(),
                descending: true,
            }],
            projection: Projection::All,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

fn comma_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

impl DocumentQuery {
    pub fn from_params(params: &QueryParams) -> Self {
        let mut query = DocumentQuery::default();

        for (key, values) in params.iter() {
            if CONTROL_KEYS.contains(&key) {
                continue;
            }
            match FilterOp::parse(key) {
                Some(op) => query.filters.push(Filter {
                    field: base_name(key).to_string(),
                    op,
                    values: values.to_vec(),
                }),
                None => tracing::debug!(key, "Ignoring filter with unknown operator"),
            }
        }

        if let Some(sort) = params.get("sort") {
            let keys: Vec<SortKey> = comma_list(sort)
                .map(|field| match field.strip_prefix('-') {
                    Some(field) => SortKey {
                        field: field.to_string(),
                        descending: true,
                    },
                    None => SortKey {
                        field: field.to_string(),
                        descending: false,
                    },
                })
                .collect();
            if !keys.is_empty() {
                query.sort = keys;
            }
        }

        if let Some(fields) = params.get("fields") {
            let fields: Vec<&str> = comma_list(fields).collect();
            if !fields.is_empty() && fields.iter().all(|f| f.starts_with('-')) {
                query.projection =
                    Projection::Exclude(fields.iter().map(|f| f[1..].to_string()).collect());
            } else if !fields.is_empty() {
                query.projection = Projection::Include(
                    fields
                        .iter()
                        .filter(|f| !f.starts_with('-'))
                        .map(|f| f.to_string())
                        .collect(),
                );
            }
        }

        query.page = params
            .get("page")
            .and_then(|p| p.parse().ok())
            .filter(|p| *p > 0)
            .unwrap_or(DEFAULT_PAGE);
        query.limit = params
            .get("limit")
            .and_then(|l| l.parse().ok())
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIMIT);

        query
    }

    /// Single equality filter.
    pub fn field_equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        let mut query = DocumentQuery::default();
        query.filters.push(Filter {
            field: field.into(),
            op: FilterOp::Eq,
            values: vec![value.into()],
        });
        query
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|filter| filter.matches(doc))
    }

    fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for key in &self.sort {
            let ordering = if key.field == "createdAt" {
                a.created_at.cmp(&b.created_at)
            } else {
                compare_fields(a.field(&key.field).as_ref(), b.field(&key.field).as_ref())
            };
            let ordering = if key.descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Filter, sort and paginate.
    pub fn apply<'a, I>(&self, docs: I) -> Vec<Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut matched: Vec<&Document> = docs.into_iter().filter(|d| self.matches(d)).collect();
        matched.sort_by(|a, b| self.compare(a, b));
        matched
            .into_iter()
            .skip(self.page.saturating_sub(1).saturating_mul(self.limit))
            .take(self.limit)
            .cloned()
            .collect()
    }

    /// Render a document with the requested projection. `id` is always kept.
    pub fn project(&self, doc: &Document) -> Value {
        let Value::Object(full) = doc.to_json() else {
            return Value::Null;
        };
        let projected: Map<String, Value> = match &self.projection {
            Projection::All => full,
            Projection::Include(fields) => full
                .into_iter()
                .filter(|(k, _)| k == "id" || fields.iter().any(|f| f == k))
                .collect(),
            Projection::Exclude(fields) => full
                .into_iter()
                .filter(|(k, _)| !fields.iter().any(|f| f == k))
                .collect(),
        };
        Value::Object(projected)
    }
}

/// Compare a stored value against a query-string value.
fn compare_to_param(actual: &Value, expected: &str) -> Option<Ordering> {
    match actual {
        Value::Number(n) => {
            let expected: f64 = expected.parse().ok()?;
            n.as_f64()?.partial_cmp(&expected)
        }
        Value::String(s) => Some(s.as_str().cmp(expected)),
        Value::Bool(b) => Some(b.to_string().as_str().cmp(expected)),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| compare_to_param(item, expected))
            .find(|o| *o == Ordering::Equal),
        _ => None,
    }
}

/// Missing values sort last.
fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tour(name: &str, price: i64, difficulty: &str) -> Document {
        let Value::Object(fields) = json!({ "name": name, "price": price, "difficulty": difficulty })
        else {
            unreachable!()
        };
        Document::new(fields)
    }

    fn tours() -> Vec<Document> {
        vec![
            tour("The Forest Hiker", 397, "easy"),
            tour("The Sea Explorer", 497, "medium"),
            tour("The Snow Adventurer", 997, "difficult"),
            tour("The City Wanderer", 1197, "easy"),
        ]
    }

    fn names(docs: &[Document]) -> Vec<String> {
        docs.iter()
            .map(|d| d.fields["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_range_filters() {
        let params = QueryParams::parse(Some("price[gte]=497&price[lt]=1197&sort=price"));
        let query = DocumentQuery::from_params(&params);
        let docs = tours();
        assert_eq!(names(&query.apply(&docs)), ["The Sea Explorer", "The Snow Adventurer"]);
    }

    #[test]
    fn test_multi_value_matches_any() {
        let params = QueryParams::parse(Some("difficulty=easy&difficulty=medium&sort=-price"));
        let query = DocumentQuery::from_params(&params);
        let docs = tours();
        assert_eq!(
            names(&query.apply(&docs)),
            ["The City Wanderer", "The Sea Explorer", "The Forest Hiker"]
        );
    }

    #[test]
    fn test_pagination() {
        let params = QueryParams::parse(Some("sort=price&page=2&limit=3"));
        let query = DocumentQuery::from_params(&params);
        let docs = tours();
        assert_eq!(names(&query.apply(&docs)), ["The City Wanderer"]);

        let bad = DocumentQuery::from_params(&QueryParams::parse(Some("page=0&limit=abc")));
        assert_eq!((bad.page, bad.limit), (DEFAULT_PAGE, DEFAULT_LIMIT));
    }

    #[test]
    fn test_projection() {
        let doc = tour("The Forest Hiker", 397, "easy");
        let include = DocumentQuery::from_params(&QueryParams::parse(Some("fields=name,price")));
        let projected = include.project(&doc);
        let keys: Vec<&String> = projected.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(projected["price"], json!(397));
        assert!(projected.get("difficulty").is_none());

        let exclude = DocumentQuery::from_params(&QueryParams::parse(Some("fields=-difficulty")));
        let projected = exclude.project(&doc);
        assert!(projected.get("difficulty").is_none());
        assert!(projected.get("createdAt").is_some());
    }

    #[test]
    fn test_control_keys_are_not_filters() {
        let params = QueryParams::parse(Some("sort=name&page=1&limit=2&fields=name&name=x"));
        let query = DocumentQuery::from_params(&params);
        assert_eq!(query.filters.len(), 1);
        assert_eq!(query.filters[0].field, "name");
    }

    #[test]
    fn test_unknown_operator_ignored() {
        let query = DocumentQuery::from_params(&QueryParams::parse(Some("price[ne]=1")));
        assert!(query.filters.is_empty());
    }
}
