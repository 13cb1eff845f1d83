//! Session summaries and the persistence seam
//!
//! The profiler never stores anything itself. Finished sessions are turned into
//! [`SessionSummary`] records and handed to a [`HistoryStore`] supplied by the
//! host.

use crate::classifier::NPlusOneVerdict;
use crate::errors::Result;
use crate::session::MetricsSnapshot;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Finished measurement plus its classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub snapshot: MetricsSnapshot,
    pub verdict: NPlusOneVerdict,
    /// SHA-256 hex of the most repeated normalized query, when one repeated
    pub dominant_signature: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl SessionSummary {
    pub fn new(snapshot: MetricsSnapshot, dominant_signature: Option<String>) -> Self {
        let verdict = snapshot.verdict();
        Self {
            snapshot,
            verdict,
            dominant_signature,
            recorded_at: Utc::now(),
        }
    }

    pub fn class_name(&self) -> Option<&str> {
        split_operation_name(&self.snapshot.operation_name).0
    }

    pub fn method_name(&self) -> &str {
        split_operation_name(&self.snapshot.operation_name).1
    }

    pub fn suggestion(&self) -> &'static str {
        self.verdict.suggestion()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Split `"Class.method"` or `"module::Class::method"` at the last separator.
///
/// Names without a separator have no class.
pub fn split_operation_name(name: &str) -> (Option<&str>, &str) {
    let dot = name.rfind('.').map(|i| (i, i + 1));
    let colons = name.rfind("::").map(|i| (i, i + 2));
    match dot.max(colons) {
        Some((class_end, method_start)) => (Some(&name[..class_end]), &name[method_start..]),
        None => (None, name),
    }
}

/// Read-back criteria; `None` fields match everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryFilter {
    pub class: Option<String>,
    pub method: Option<String>,
    pub operation_type: Option<String>,
    /// Inclusive lower bound on the session's wall-clock start
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the session's wall-clock start
    pub until: Option<DateTime<Utc>>,
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn operation_type(mut self, operation_type: impl Into<String>) -> Self {
        self.operation_type = Some(operation_type.into());
        self
    }

    pub fn between(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    pub fn matches(&self, summary: &SessionSummary) -> bool {
        let (class, method) = split_operation_name(&summary.snapshot.operation_name);
        let started_at = summary.snapshot.started_at;

        self.class.as_deref().map_or(true, |c| class == Some(c))
            && self.method.as_deref().map_or(true, |m| method == m)
            && self
                .operation_type
                .as_deref()
                .map_or(true, |t| summary.snapshot.operation_type == t)
            && self.since.map_or(true, |since| started_at >= since)
            && self.until.map_or(true, |until| started_at < until)
    }
}

/// Durable home for finished sessions, implemented by the host
#[cfg_attr(test, mockall::automock)]
pub trait HistoryStore: Send + Sync {
    fn save(&self, summary: &SessionSummary) -> Result<()>;

    /// Stored summaries matching `filter`, oldest first
    fn query(&self, filter: &HistoryFilter) -> Result<Vec<SessionSummary>>;
}

/// Process-local store, mainly for tests and short-lived tools
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    summaries: RwLock<Vec<SessionSummary>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.summaries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.read().is_empty()
    }

    pub fn clear(&self) {
        self.summaries.write().clear();
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn save(&self, summary: &SessionSummary) -> Result<()> {
        self.summaries.write().push(summary.clone());
        Ok(())
    }

    fn query(&self, filter: &HistoryFilter) -> Result<Vec<SessionSummary>> {
        let mut matching: Vec<_> = self
            .summaries
            .read()
            .iter()
            .filter(|summary| filter.matches(summary))
            .cloned()
            .collect();
        matching.sort_by_key(|summary| summary.recorded_at);
        Ok(matching)
    }
}
