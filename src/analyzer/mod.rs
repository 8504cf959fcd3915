pub mod advisor;
pub mod gke;
pub mod matcher;
pub mod severity;
pub mod sql;

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analyzer::severity::severity_for;

/// Ordinal drift classification. Declared in ascending order so the derived
/// `Ord` agrees with "critical outranks high outranks medium outranks low".
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Error)]
#[error("unknown severity: {0}")]
pub struct SeverityParseError(pub String);

impl FromStr for Severity {
    type Err = SeverityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(SeverityParseError(s.to_string())),
        }
    }
}

/// A single detected mismatch between an observed field value and its
/// baseline-expected value. Created fresh per comparison, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Drift {
    pub field: String,
    pub expected: String,
    pub actual: String,
    pub severity: Severity,
}

impl Drift {
    /// Builds a drift for a field whose severity comes straight from the
    /// static table. `field` is both the display path and the table key.
    pub fn for_field(field: &str, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            expected: expected.into(),
            actual: actual.into(),
            severity: severity_for(field),
        }
    }

    /// Like [`Drift::for_field`] but with a severity-table key that differs
    /// from the display path (set-valued fields, node pool entries).
    pub fn keyed(
        key: &str,
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
            severity: severity_for(key),
        }
    }
}

/// Truncates a version string to its major.minor projection so patch-level
/// managed upgrades do not register as drift.
/// "1.33.5-gke.1308000" -> "1.33"; strings without two dots pass through.
pub fn minor_version(version: &str) -> &str {
    match version.match_indices('.').nth(1) {
        Some((idx, _)) => &version[..idx],
        None => version,
    }
}

/// Compares two string lists as sets. Elements required by the baseline but
/// missing from the actual list produce one drift under `<field>.required`;
/// elements present but absent from the baseline produce a second drift
/// under `<field>.extra`. Both may fire for the same field.
pub fn compare_string_sets(field: &str, expected: &[String], actual: &[String], out: &mut Vec<Drift>) {
    let expected_set: BTreeSet<&str> = expected.iter().map(String::as_str).collect();
    let actual_set: BTreeSet<&str> = actual.iter().map(String::as_str).collect();

    let required: Vec<&str> = expected_set.difference(&actual_set).copied().collect();
    let extra: Vec<&str> = actual_set.difference(&expected_set).copied().collect();

    if !required.is_empty() {
        out.push(Drift::keyed(
            &format!("{field}.required"),
            field,
            format!("Required: {required:?}"),
            format!("{actual:?}"),
        ));
    }
    if !extra.is_empty() {
        out.push(Drift::keyed(
            &format!("{field}.extra"),
            field,
            format!("{expected:?}"),
            format!("Extra: {extra:?}"),
        ));
    }
}
