//! N+1 query classification
//!
//! Pure functions mapping a query count (and, for cause estimation, the average
//! per-query latency) to a severity, a probable cause and a remediation hint.
//! The same table is used for finished sessions and for the query analyzer's
//! aggregate state.
//!
//! Severity breakpoints:
//!
//! | queries | severity |
//! |---------|----------|
//! | 0       | None     |
//! | 1-9     | Mild     |
//! | 10-19   | Moderate |
//! | 20-24   | High     |
//! | 25-49   | Severe   |
//! | 50+     | Critical |
//!
//! A pattern is reported from 12 queries on, which covers the paginated
//! "1 parent + N children" shapes (21 = 1 + 20, 51 = 1 + 50).

use crate::common::constants::{
    CAUSE_COMPLEX_MIN, CAUSE_HIGH_COUNT_MIN, FAST_QUERY_THRESHOLD_MS, N_PLUS_ONE_THRESHOLD,
    SEVERITY_CRITICAL_MIN, SEVERITY_HIGH_MIN, SEVERITY_MODERATE_MIN, SEVERITY_SEVERE_MIN,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    None,
    Mild,
    Moderate,
    High,
    Severe,
    Critical,
}

impl Severity {
    /// Numeric level, 0 (none) through 5 (critical)
    pub fn level(&self) -> u8 {
        match self {
            Severity::None => 0,
            Severity::Mild => 1,
            Severity::Moderate => 2,
            Severity::High => 3,
            Severity::Severe => 4,
            Severity::Critical => 5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::None => "NONE",
            Severity::Mild => "MILD",
            Severity::Moderate => "MODERATE",
            Severity::High => "HIGH",
            Severity::Severe => "SEVERE",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Cause {
    #[default]
    None,
    SerializerNPlusOne,
    RelatedModelNPlusOne,
    ForeignKeyNPlusOne,
    ComplexNPlusOne,
}

impl Cause {
    pub fn code(&self) -> u8 {
        match self {
            Cause::None => 0,
            Cause::SerializerNPlusOne => 1,
            Cause::RelatedModelNPlusOne => 2,
            Cause::ForeignKeyNPlusOne => 3,
            Cause::ComplexNPlusOne => 4,
        }
    }
}

pub const NO_PATTERN_SUGGESTION: &str = "No N+1 query pattern detected.";
pub const NO_METRICS_SUGGESTION: &str = "No metrics available for N+1 analysis.";

pub fn severity(query_count: u64) -> Severity {
    match query_count {
        0 => Severity::None,
        n if n >= SEVERITY_CRITICAL_MIN => Severity::Critical,
        n if n >= SEVERITY_SEVERE_MIN => Severity::Severe,
        n if n >= SEVERITY_HIGH_MIN => Severity::High,
        n if n >= SEVERITY_MODERATE_MIN => Severity::Moderate,
        _ => Severity::Mild,
    }
}

pub fn is_pattern(query_count: u64) -> bool {
    query_count >= N_PLUS_ONE_THRESHOLD
}

/// Severity at or above `Severe`
pub fn is_severe(query_count: u64) -> bool {
    severity(query_count) >= Severity::Severe
}

/// Severity at or above `Moderate`
pub fn is_moderate(query_count: u64) -> bool {
    severity(query_count) >= Severity::Moderate
}

/// Guess why an N+1 happened.
///
/// `avg_query_ms` separates the 20-49 band: many cheap queries point at a
/// serializer walking a relation, slower ones at unindexed foreign-key lookups.
/// Without a timing signal that band falls back to `RelatedModelNPlusOne`.
pub fn estimate_cause(query_count: u64, avg_query_ms: Option<f64>) -> Cause {
    if !is_pattern(query_count) {
        return Cause::None;
    }
    if query_count >= CAUSE_COMPLEX_MIN {
        return Cause::ComplexNPlusOne;
    }
    if query_count < CAUSE_HIGH_COUNT_MIN {
        return Cause::RelatedModelNPlusOne;
    }
    match avg_query_ms {
        Some(avg) if avg.is_finite() && avg < FAST_QUERY_THRESHOLD_MS => Cause::SerializerNPlusOne,
        Some(avg) if avg.is_finite() => Cause::ForeignKeyNPlusOne,
        _ => Cause::RelatedModelNPlusOne,
    }
}

pub fn fix_suggestion(cause: Cause) -> &'static str {
    match cause {
        Cause::None => NO_PATTERN_SUGGESTION,
        Cause::SerializerNPlusOne => {
            "Serializer N+1: nested serializer fields load one related object per row. \
             Bulk-prefetch the associated objects with prefetch_related() before serializing."
        }
        Cause::RelatedModelNPlusOne => {
            "Related model N+1: a single relation is loaded lazily inside a loop. \
             Eager-load it with select_related() on the parent queryset."
        }
        Cause::ForeignKeyNPlusOne => {
            "Foreign key N+1: repeated slow lookups through a foreign key. \
             Add an index on the foreign key column or denormalize the field you read."
        }
        Cause::ComplexNPlusOne => {
            "Complex N+1: queries fan out across several relations. \
             Restructure into a single aggregate query (annotate/Subquery) or use raw SQL."
        }
    }
}

/// Combined classifier output for one measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct NPlusOneVerdict {
    pub query_count: u64,
    pub is_pattern: bool,
    pub severity: Severity,
    pub cause: Cause,
}

impl NPlusOneVerdict {
    pub fn suggestion(&self) -> &'static str {
        fix_suggestion(self.cause)
    }
}

pub fn classify(query_count: u64, avg_query_ms: Option<f64>) -> NPlusOneVerdict {
    NPlusOneVerdict {
        query_count,
        is_pattern: is_pattern(query_count),
        severity: severity(query_count),
        cause: estimate_cause(query_count, avg_query_ms),
    }
}
