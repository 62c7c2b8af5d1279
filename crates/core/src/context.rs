//! Request-scoped telemetry context
//!
//! A context is created when a unit of work (web request or job) starts,
//! collects sub-events such as SQL queries or cache calls while it runs, and
//! posts one aggregated event when it finishes. The sampling decision is made
//! once at [`RequestContext::begin`], so a request is either reported whole
//! or not at all.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use vigil_domain::constants::{EVENT_EXCEPTION, EVENT_JOB, EVENT_REQUEST};

use crate::reporting::ReportingClient;
use crate::sampling::{qualified_name, ScopeKind};

/// Sub-events kept per category before further ones are only counted
pub const MAX_EVENTS_PER_CATEGORY: usize = 1_000;

/// Well-known sub-event categories
pub mod category {
    pub const SQL: &str = "sql";
    pub const CACHE: &str = "cache";
    pub const VIEW: &str = "view";
    pub const HTTP: &str = "http";
    pub const QUEUE: &str = "queue";
    pub const MEMORY: &str = "memory";
}

#[derive(Debug, Default)]
struct CategoryEvents {
    events: Vec<Value>,
    dropped: u64,
}

/// Telemetry accumulated for one unit of work
#[derive(Debug)]
pub struct RequestContext {
    client: Arc<ReportingClient>,
    kind: ScopeKind,
    scope: String,
    subscope: Option<String>,
    sampled: bool,
    started_at: DateTime<Utc>,
    started: Instant,
    metadata: Map<String, Value>,
    categories: BTreeMap<String, CategoryEvents>,
}

impl RequestContext {
    /// Start a context and decide once whether it will be reported.
    ///
    /// The context is inactive when the client is inactive, when the scope is
    /// filtered out, or when the sampling draw says no.
    pub fn begin(
        client: Arc<ReportingClient>,
        kind: ScopeKind,
        scope: impl Into<String>,
        subscope: Option<&str>,
    ) -> Self {
        let scope = scope.into();
        let subscope = subscope.map(str::to_string);
        let sampled = client.is_active()
            && client.filters().allows(kind, &scope, subscope.as_deref())
            && client.sample();

        Self {
            client,
            kind,
            scope,
            subscope,
            sampled,
            started_at: Utc::now(),
            started: Instant::now(),
            metadata: Map::new(),
            categories: BTreeMap::new(),
        }
    }

    /// Whether this context will post an event on finish
    pub fn is_sampled(&self) -> bool {
        self.sampled
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn subscope(&self) -> Option<&str> {
        self.subscope.as_deref()
    }

    /// `scope#subscope`, or just the scope
    pub fn name(&self) -> String {
        qualified_name(&self.scope, self.subscope.as_deref())
    }

    /// Attach a top-level field to the finished payload.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        if self.sampled {
            self.metadata.insert(key.into(), value);
        }
    }

    /// Record a sub-event under `category`. No-op when not sampled.
    pub fn record(&mut self, category: &str, data: Value) {
        if !self.sampled {
            return;
        }

        let entry = self.categories.entry(category.to_string()).or_default();
        if entry.events.len() < MAX_EVENTS_PER_CATEGORY {
            entry.events.push(data);
        } else {
            entry.dropped += 1;
        }
    }

    /// Number of sub-events kept under `category`
    pub fn recorded(&self, category: &str) -> usize {
        self.categories.get(category).map_or(0, |entry| entry.events.len())
    }

    /// Report a failure immediately, bypassing sampling and scope filters.
    pub fn capture_exception<E: Display + ?Sized>(&self, error: &E) {
        let payload = json!({
            "scope": self.scope,
            "subscope": self.subscope,
            "kind": kind_label(self.kind),
            "message": error.to_string(),
            "occurred_at": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        self.client.post_unsampled_metric(EVENT_EXCEPTION, payload);
    }

    /// Post the aggregated event, if sampled.
    pub fn finish(self) {
        if !self.sampled {
            return;
        }

        let event_name = match self.kind {
            ScopeKind::Action => EVENT_REQUEST,
            ScopeKind::Job => EVENT_JOB,
        };
        let duration_ms = self.started.elapsed().as_secs_f64() * 1_000.0;

        let mut events = Map::new();
        let mut dropped = Map::new();
        for (category, entry) in self.categories {
            if entry.dropped > 0 {
                dropped.insert(category.clone(), json!(entry.dropped));
            }
            events.insert(category, Value::Array(entry.events));
        }

        let mut payload = self.metadata;
        payload.insert("scope".into(), json!(self.scope));
        payload.insert("subscope".into(), json!(self.subscope));
        payload.insert(
            "started_at".into(),
            json!(self.started_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        payload.insert("duration_ms".into(), json!(duration_ms));
        payload.insert("events".into(), Value::Object(events));
        if !dropped.is_empty() {
            payload.insert("dropped_events".into(), Value::Object(dropped));
        }

        // Sampling was decided at begin.
        self.client.post_unsampled_metric(event_name, Value::Object(payload));
    }
}

fn kind_label(kind: ScopeKind) -> &'static str {
    match kind {
        ScopeKind::Action => "action",
        ScopeKind::Job => "job",
    }
}
