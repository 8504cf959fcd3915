//! Report aggregation.
//!
//! Per-resource drift lists are collected into a report after every worker
//! has finished; severity tallying is a global reduction over the finished
//! report, never an incremental count.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyzer::{Drift, Severity};
use crate::schema::SchemaValidationResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub generated_at: DateTime<Utc>,
    pub total_resources: usize,
    pub drifted_resources: usize,
    pub resources: Vec<ResourceDriftRecord>,
    #[serde(default)]
    pub failures: Vec<ScanFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDriftRecord {
    pub project: String,
    pub name: String,
    pub location: String,
    pub state: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Name of the baseline that claimed this resource, if any.
    pub baseline: Option<String>,
    pub drifts: Vec<Drift>,
    pub advisories: Vec<String>,
}

impl ResourceDriftRecord {
    pub fn identity(&self) -> String {
        format!("{}/{}", self.project, self.name)
    }
}

/// A resource or project that could not be evaluated. Failures are reported
/// alongside the results and never abort the rest of the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanFailure {
    pub resource: String,
    pub error: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeverityTotals {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityTotals {
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

impl DriftReport {
    pub fn from_records(records: Vec<ResourceDriftRecord>, failures: Vec<ScanFailure>) -> Self {
        let drifted = records.iter().filter(|r| !r.drifts.is_empty()).count();
        Self {
            generated_at: Utc::now(),
            total_resources: records.len(),
            drifted_resources: drifted,
            resources: records,
            failures,
        }
    }

    pub fn severity_totals(&self) -> SeverityTotals {
        let mut totals = SeverityTotals::default();
        for resource in &self.resources {
            for drift in &resource.drifts {
                match drift.severity {
                    Severity::Critical => totals.critical += 1,
                    Severity::High => totals.high += 1,
                    Severity::Medium => totals.medium += 1,
                    Severity::Low => totals.low += 1,
                }
            }
        }
        totals
    }

    pub fn compliance_rate(&self) -> f64 {
        if self.total_resources == 0 {
            return 100.0;
        }
        (self.total_resources - self.drifted_resources) as f64 / self.total_resources as f64 * 100.0
    }
}

/// Results of one batch of schema audits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaAuditReport {
    pub generated_at: DateTime<Utc>,
    pub audits: Vec<SchemaAuditRecord>,
    #[serde(default)]
    pub failures: Vec<ScanFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaAuditRecord {
    pub name: String,
    pub database: String,
    pub result: SchemaValidationResult,
}

impl SchemaAuditReport {
    pub fn from_records(audits: Vec<SchemaAuditRecord>, failures: Vec<ScanFailure>) -> Self {
        Self {
            generated_at: Utc::now(),
            audits,
            failures,
        }
    }

    pub fn drifted_count(&self) -> usize {
        self.audits.iter().filter(|a| a.result.has_drift).count()
    }
}
