//! Metric events and the collector wire envelope

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single telemetry event handed to the reporting pipeline
///
/// Created by an instrumentation collaborator and never mutated afterwards.
/// It is dropped once its one delivery attempt completes.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEvent {
    event_name: String,
    payload: Value,
    captured_at: DateTime<Utc>,
}

impl MetricEvent {
    pub fn new(event_name: impl Into<String>, payload: Value) -> Self {
        Self::captured(event_name, payload, Utc::now())
    }

    pub fn captured(
        event_name: impl Into<String>,
        payload: Value,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self { event_name: event_name.into(), payload, captured_at }
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Wrap the event for the wire, stamped with the send time.
    pub fn into_envelope(self, revision: &str, sent_at: DateTime<Utc>) -> Envelope {
        Envelope {
            event: self.event_name,
            payload: self.payload,
            sent_at: sent_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            revision: revision.to_string(),
        }
    }
}

/// JSON body posted to the collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    pub payload: Value,
    /// ISO-8601 UTC timestamp
    pub sent_at: String,
    /// Deploy identifier
    pub revision: String,
}
