//! Firestore REST API types.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Firestore document value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String), // Firestore sends integers as strings
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    pub fields: Option<HashMap<String, Value>>,
}

impl MapValue {
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            fields: Some(fields),
        }
    }
}

/// Firestore document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Document fields
    pub fields: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    /// Create a new document with the given fields.
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        }
    }

    /// Trailing path segment of the resource name.
    pub fn id(&self) -> Option<&str> {
        self.name.as_deref().and_then(|n| n.rsplit('/').next())
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.as_ref().and_then(|f| f.get(key))
    }
}

// ============================================================================
// Structured queries
// ============================================================================

/// Body of a `:runQuery` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    pub structured_query: StructuredQuery,
}

/// One element of the streamed `:runQuery` response array.
///
/// Firestore emits a trailing element with only `readTime` when the
/// result set is exhausted or empty.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResponse {
    pub document: Option<Document>,
    pub read_time: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    pub from: Vec<CollectionSelector>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
}

impl StructuredQuery {
    /// Query over a single top-level collection.
    pub fn collection(collection_id: impl Into<String>) -> Self {
        Self {
            from: vec![CollectionSelector {
                collection_id: collection_id.into(),
            }],
            filter: None,
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// AND the given field filters together.
    pub fn filter_all(mut self, filters: Vec<FieldFilter>) -> Self {
        let mut filters: Vec<Filter> = filters.into_iter().map(Filter::field).collect();
        self.filter = match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Filter {
                composite_filter: Some(CompositeFilter {
                    op: CompositeOperator::And,
                    filters,
                }),
                field_filter: None,
            }),
        };
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by.push(Order {
            field: FieldReference::new(field),
            direction,
        });
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSelector {
    pub collection_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite_filter: Option<CompositeFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_filter: Option<FieldFilter>,
}

impl Filter {
    fn field(filter: FieldFilter) -> Self {
        Self {
            composite_filter: None,
            field_filter: Some(filter),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompositeFilter {
    pub op: CompositeOperator,
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompositeOperator {
    And,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldFilter {
    pub field: FieldReference,
    pub op: FieldOperator,
    pub value: Value,
}

impl FieldFilter {
    pub fn new(field: &str, op: FieldOperator, value: Value) -> Self {
        Self {
            field: FieldReference::new(field),
            op,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldOperator {
    Equal,
    LessThan,
    GreaterThanOrEqual,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReference {
    pub field_path: String,
}

impl FieldReference {
    pub fn new(path: &str) -> Self {
        Self {
            field_path: path.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub field: FieldReference,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Ascending,
    Descending,
}

// ============================================================================
// Value conversion
// ============================================================================

/// Convert a Rust value to Firestore Value.
pub trait ToFirestoreValue {
    fn to_firestore_value(&self) -> Value;
}

impl ToFirestoreValue for String {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.clone())
    }
}

impl ToFirestoreValue for &str {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.to_string())
    }
}

impl ToFirestoreValue for u32 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for f64 {
    fn to_firestore_value(&self) -> Value {
        Value::DoubleValue(*self)
    }
}

impl ToFirestoreValue for DateTime<Utc> {
    fn to_firestore_value(&self) -> Value {
        // Firestore keeps microsecond precision
        Value::TimestampValue(self.to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

impl<T: ToFirestoreValue> ToFirestoreValue for Option<T> {
    fn to_firestore_value(&self) -> Value {
        match self {
            Some(v) => v.to_firestore_value(),
            None => Value::NullValue(()),
        }
    }
}

/// Convert Firestore Value to Rust type.
pub trait FromFirestoreValue: Sized {
    fn from_firestore_value(value: &Value) -> Option<Self>;
}

impl FromFirestoreValue for String {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::StringValue(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromFirestoreValue for u32 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(f) if *f >= 0.0 && f.fract() == 0.0 => Some(*f as u32),
            _ => None,
        }
    }
}

impl FromFirestoreValue for f64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::DoubleValue(f) => Some(*f),
            Value::IntegerValue(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl FromFirestoreValue for DateTime<Utc> {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::TimestampValue(s) => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.into()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_value_wire_format() {
        let v = 12u32.to_firestore_value();
        assert_eq!(serde_json::to_value(&v).unwrap(), json!({"integerValue": "12"}));

        let v = Value::NullValue(());
        assert_eq!(serde_json::to_value(&v).unwrap(), json!({"nullValue": null}));
    }

    #[test]
    fn test_timestamp_round_trip() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        let v = at.to_firestore_value();
        assert_eq!(v, Value::TimestampValue("2024-05-01T10:30:00.000000Z".into()));
        assert_eq!(DateTime::<Utc>::from_firestore_value(&v), Some(at));
    }

    #[test]
    fn test_structured_query_serialization() {
        let query = StructuredQuery::collection("camera_metrics")
            .filter_all(vec![
                FieldFilter::new("zone_id", FieldOperator::Equal, "north".to_firestore_value()),
                FieldFilter::new(
                    "timestamp",
                    FieldOperator::GreaterThanOrEqual,
                    Value::TimestampValue("2024-05-01T00:00:00.000000Z".into()),
                ),
            ])
            .order_by("timestamp", Direction::Ascending);

        let body = serde_json::to_value(RunQueryRequest {
            structured_query: query,
        })
        .unwrap();

        let sq = &body["structuredQuery"];
        assert_eq!(sq["from"][0]["collectionId"], "camera_metrics");
        assert_eq!(sq["where"]["compositeFilter"]["op"], "AND");
        let filters = sq["where"]["compositeFilter"]["filters"].as_array().unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0]["fieldFilter"]["op"], "EQUAL");
        assert_eq!(filters[1]["fieldFilter"]["op"], "GREATER_THAN_OR_EQUAL");
        assert_eq!(sq["orderBy"][0]["field"]["fieldPath"], "timestamp");
        assert_eq!(sq["orderBy"][0]["direction"], "ASCENDING");
        assert!(sq.get("limit").is_none());
    }

    #[test]
    fn test_single_filter_is_not_composite() {
        let query = StructuredQuery::collection("alerts").filter_all(vec![FieldFilter::new(
            "zone_id",
            FieldOperator::Equal,
            "a".to_firestore_value(),
        )]);
        let body = serde_json::to_value(&query).unwrap();
        assert!(body["where"].get("compositeFilter").is_none());
        assert_eq!(body["where"]["fieldFilter"]["field"]["fieldPath"], "zone_id");
    }

    #[test]
    fn test_run_query_response_without_document() {
        let raw = r#"[{"readTime": "2024-05-01T00:00:00Z"}]"#;
        let parsed: Vec<RunQueryResponse> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(parsed[0].document.is_none());
    }

    #[test]
    fn test_document_id_from_name() {
        let mut doc = Document::new(HashMap::new());
        doc.name = Some("projects/p/databases/(default)/documents/alerts/abc123".into());
        assert_eq!(doc.id(), Some("abc123"));
    }
}
