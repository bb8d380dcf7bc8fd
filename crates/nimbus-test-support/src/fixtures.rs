//! Sample activation records.

use chrono::{DateTime, Utc};
use nimbus_activation::{ActivationRef, Annotation};
use serde_json::{Value, json};

/// Fixed end timestamp used by fixtures (2024-03-05T14:07:09Z).
pub const SAMPLE_END_MILLIS: i64 = 1_709_647_629_000;

/// Action activation summary as the listing endpoint returns it.
#[must_use]
pub fn action_activation(activation_id: &str, name: &str) -> ActivationRef {
    ActivationRef {
        activation_id: activation_id.to_string(),
        name: Some(name.to_string()),
        namespace: Some("guest".to_string()),
        version: Some("0.0.1".to_string()),
        status_code: Some(0),
        start: DateTime::<Utc>::from_timestamp_millis(SAMPLE_END_MILLIS - 120),
        end: DateTime::<Utc>::from_timestamp_millis(SAMPLE_END_MILLIS),
        duration: Some(120),
        annotations: vec![
            Annotation {
                key: "kind".to_string(),
                value: json!("nodejs:18"),
            },
            Annotation {
                key: "path".to_string(),
                value: json!(format!("guest/{name}")),
            },
        ],
        ..ActivationRef::default()
    }
}

/// Trigger activation summary (no duration, no kind).
#[must_use]
pub fn trigger_activation(activation_id: &str, name: &str) -> ActivationRef {
    ActivationRef {
        activation_id: activation_id.to_string(),
        name: Some(name.to_string()),
        namespace: Some("guest".to_string()),
        version: Some("0.0.1".to_string()),
        status_code: Some(0),
        start: DateTime::<Utc>::from_timestamp_millis(SAMPLE_END_MILLIS),
        end: DateTime::<Utc>::from_timestamp_millis(SAMPLE_END_MILLIS),
        ..ActivationRef::default()
    }
}

/// Full activation record in wire format.
#[must_use]
pub fn activation_record(activation_id: &str, name: &str) -> Value {
    json!({
        "activationId": activation_id,
        "name": name,
        "namespace": "guest",
        "version": "0.0.1",
        "start": SAMPLE_END_MILLIS - 120,
        "end": SAMPLE_END_MILLIS,
        "duration": 120,
        "statusCode": 0,
        "response": {
            "status": "success",
            "statusCode": 0,
            "success": true,
            "result": {"greeting": format!("hello from {name}")}
        },
        "logs": [],
        "annotations": [{"key": "kind", "value": "nodejs:18"}]
    })
}
