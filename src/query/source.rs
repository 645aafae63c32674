//! Document Source Module
//!
//! The remote document-query capability the query cache fronts, and the
//! constraint types used to describe a query.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// == Document ==
/// A remote document: its id plus its fields, flattened on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

// == Query Constraints ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    ArrayContains,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// One clause of a collection query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QueryConstraint {
    Where {
        field: String,
        op: FilterOp,
        value: Value,
    },
    OrderBy {
        field: String,
        direction: Direction,
    },
    Limit {
        count: usize,
    },
}

impl QueryConstraint {
    pub fn filter(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self::Where {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn order_by(field: impl Into<String>, direction: Direction) -> Self {
        Self::OrderBy {
            field: field.into(),
            direction,
        }
    }

    pub fn limit(count: usize) -> Self {
        Self::Limit { count }
    }
}

// == Derived Cache Key ==
/// Key under which a query's results are cached: the collection name and
/// the JSON form of its constraints, joined by `_`.
///
/// The same collection and constraints always produce the same key.
pub fn derive_cache_key(collection: &str, constraints: &[QueryConstraint]) -> String {
    let encoded = serde_json::to_string(constraints).unwrap_or_else(|_| "[]".to_string());
    format!("{collection}_{encoded}")
}

// == Document Source ==
/// Remote document-query capability.
///
/// Given a collection and constraints, returns the matching documents.
/// Treated as opaque I/O; any failure is reported as an error.
pub trait DocumentSource: Send + Sync {
    fn get_docs(
        &self,
        collection: &str,
        constraints: &[QueryConstraint],
    ) -> impl Future<Output = anyhow::Result<Vec<Document>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_flattens_fields() {
        let doc: Document =
            serde_json::from_value(json!({"id": "p1", "name": "Mug", "price": 12})).unwrap();

        assert_eq!(doc.id, "p1");
        assert_eq!(doc.field("name"), Some(&json!("Mug")));
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({"id": "p1", "name": "Mug", "price": 12})
        );
    }

    #[test]
    fn test_derived_key_is_deterministic() {
        let constraints = vec![
            QueryConstraint::filter("category", FilterOp::Eq, "mugs"),
            QueryConstraint::order_by("price", Direction::Desc),
            QueryConstraint::limit(20),
        ];

        let a = derive_cache_key("products", &constraints);
        let b = derive_cache_key("products", &constraints.clone());

        assert_eq!(a, b);
        assert!(a.starts_with("products_["));
        assert!(a.contains(r#""op":"==""#));
    }

    #[test]
    fn test_derived_key_distinguishes_queries() {
        let mugs = [QueryConstraint::filter("category", FilterOp::Eq, "mugs")];
        let hats = [QueryConstraint::filter("category", FilterOp::Eq, "hats")];

        assert_ne!(
            derive_cache_key("products", &mugs),
            derive_cache_key("products", &hats)
        );
        assert_ne!(
            derive_cache_key("products", &mugs),
            derive_cache_key("orders", &mugs)
        );
        assert_eq!(derive_cache_key("products", &[]), "products_[]");
    }
}
