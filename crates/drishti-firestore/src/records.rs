//! Append-only repositories for camera metrics and alerts.
//!
//! Records are written as flat documents keyed by a random id. Field names
//! match the JSON form of the records so the documents can be read by
//! other consumers of the same collections.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use drishti_models::{AlertRecord, CameraId, MetricRecord, TimeRange, ZoneId};
use tracing::debug;
use uuid::Uuid;

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{
    Direction, Document, FieldFilter, FieldOperator, FromFirestoreValue, MapValue,
    StructuredQuery, ToFirestoreValue, Value,
};

pub const DEFAULT_METRICS_COLLECTION: &str = "camera_metrics";
pub const DEFAULT_ALERTS_COLLECTION: &str = "alerts";

/// Collection names for the two record streams.
#[derive(Debug, Clone)]
pub struct CollectionNames {
    pub metrics: String,
    pub alerts: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            metrics: DEFAULT_METRICS_COLLECTION.to_string(),
            alerts: DEFAULT_ALERTS_COLLECTION.to_string(),
        }
    }
}

impl CollectionNames {
    pub fn from_env() -> Self {
        Self {
            metrics: std::env::var("METRICS_COLLECTION")
                .unwrap_or_else(|_| DEFAULT_METRICS_COLLECTION.to_string()),
            alerts: std::env::var("ALERTS_COLLECTION")
                .unwrap_or_else(|_| DEFAULT_ALERTS_COLLECTION.to_string()),
        }
    }
}

/// Repository for per-frame metric records.
#[derive(Clone)]
pub struct MetricsRepository {
    client: FirestoreClient,
    collection: String,
}

impl MetricsRepository {
    pub fn new(client: FirestoreClient, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Append a record; returns the document id.
    pub async fn append(&self, record: &MetricRecord) -> FirestoreResult<String> {
        create_idempotent(&self.client, &self.collection, metric_to_fields(record)).await
    }

    /// Records for `zone` inside `range`, oldest first.
    pub async fn query_zone(
        &self,
        zone: &ZoneId,
        range: &TimeRange,
    ) -> FirestoreResult<Vec<MetricRecord>> {
        let mut filters = vec![
            FieldFilter::new("zone_id", FieldOperator::Equal, zone.as_str().to_firestore_value()),
            FieldFilter::new(
                "timestamp",
                FieldOperator::GreaterThanOrEqual,
                range.start.to_firestore_value(),
            ),
        ];
        if let Some(end) = range.end {
            filters.push(FieldFilter::new(
                "timestamp",
                FieldOperator::LessThan,
                end.to_firestore_value(),
            ));
        }

        let query = StructuredQuery::collection(&self.collection)
            .filter_all(filters)
            .order_by("timestamp", Direction::Ascending);

        let documents = self
            .client
            .with_retry("query_metrics", || self.client.run_query(query.clone()))
            .await?;

        let records = documents
            .iter()
            .map(document_to_metric)
            .collect::<FirestoreResult<Vec<_>>>()?;

        debug!(zone = %zone, count = records.len(), "Queried zone metrics");
        Ok(records)
    }

    pub async fn check_connectivity(&self) -> FirestoreResult<()> {
        self.client.check_connectivity(&self.collection).await
    }
}

/// Repository for alert records.
#[derive(Clone)]
pub struct AlertRepository {
    client: FirestoreClient,
    collection: String,
}

impl AlertRepository {
    pub fn new(client: FirestoreClient, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }

    /// Append an alert; returns the document id.
    pub async fn append(&self, alert: &AlertRecord) -> FirestoreResult<String> {
        create_idempotent(&self.client, &self.collection, alert_to_fields(alert)).await
    }
}

/// Create a document under a fresh id, retrying transient failures.
///
/// The id is fixed before the first attempt, so a retry that collides with
/// an earlier attempt which actually landed counts as success.
async fn create_idempotent(
    client: &FirestoreClient,
    collection: &str,
    fields: HashMap<String, Value>,
) -> FirestoreResult<String> {
    let doc_id = Uuid::new_v4().simple().to_string();
    let result = client
        .with_retry("append", || {
            client.create_document(collection, &doc_id, fields.clone())
        })
        .await;

    match result {
        Ok(_) | Err(FirestoreError::AlreadyExists(_)) => Ok(doc_id),
        Err(e) => Err(e),
    }
}

// ============================================================================
// Field mapping
// ============================================================================

pub(crate) fn metric_to_fields(record: &MetricRecord) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("camera_id".into(), record.camera_id.as_str().to_firestore_value());
    fields.insert("zone_id".into(), record.zone_id.as_str().to_firestore_value());
    fields.insert("person_count".into(), record.person_count.to_firestore_value());
    fields.insert("density".into(), record.density.to_firestore_value());
    fields.insert("flow_speed".into(), record.flow_speed.to_firestore_value());
    fields.insert("frame_locator".into(), record.frame_locator.to_firestore_value());
    fields.insert("timestamp".into(), record.timestamp.to_firestore_value());
    // Absent coordinates are omitted rather than written as null
    if let Some(lat) = record.lat {
        fields.insert("lat".into(), lat.to_firestore_value());
    }
    if let Some(lon) = record.lon {
        fields.insert("lon".into(), lon.to_firestore_value());
    }
    fields
}

pub(crate) fn alert_to_fields(alert: &AlertRecord) -> HashMap<String, Value> {
    let mut fields = metric_to_fields(&alert.metric);

    let mut info = HashMap::new();
    info.insert("level".to_string(), alert.alert.level.as_str().to_firestore_value());
    info.insert("message".to_string(), alert.alert.message.to_firestore_value());
    fields.insert("alert".into(), Value::MapValue(MapValue::new(info)));
    fields.insert("generated_at".into(), alert.generated_at.to_firestore_value());
    fields
}

fn required<T: FromFirestoreValue>(doc: &Document, key: &str) -> FirestoreResult<T> {
    doc.field(key)
        .and_then(T::from_firestore_value)
        .ok_or_else(|| {
            FirestoreError::invalid_response(format!(
                "document {} missing or invalid field '{}'",
                doc.id().unwrap_or("?"),
                key
            ))
        })
}

fn optional<T: FromFirestoreValue>(doc: &Document, key: &str) -> Option<T> {
    doc.field(key).and_then(T::from_firestore_value)
}

pub(crate) fn document_to_metric(doc: &Document) -> FirestoreResult<MetricRecord> {
    let camera: String = required(doc, "camera_id")?;
    let zone: String = required(doc, "zone_id")?;
    let timestamp: DateTime<Utc> = required(doc, "timestamp")?;

    Ok(MetricRecord {
        camera_id: CameraId::parse(camera)
            .map_err(|e| FirestoreError::invalid_response(e.to_string()))?,
        zone_id: ZoneId::parse(zone).map_err(|e| FirestoreError::invalid_response(e.to_string()))?,
        person_count: required(doc, "person_count")?,
        density: required(doc, "density")?,
        flow_speed: required(doc, "flow_speed")?,
        frame_locator: required(doc, "frame_locator")?,
        timestamp,
        lat: optional(doc, "lat"),
        lon: optional(doc, "lon"),
    })
}
