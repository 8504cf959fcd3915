use serde::{Deserialize, Serialize};

use crate::alert::rules::AlertEventKind;
use crate::analyzer::Severity;
use crate::report::DriftReport;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: AlertEventKind,
    pub title: String,
    pub body: String,
}

/// Diffs the previous report against the current one and turns the deltas
/// into alert events. With no previous report, every drifted resource counts
/// as newly drifted.
pub fn evaluate_alerts(previous: Option<&DriftReport>, current: &DriftReport) -> Vec<AlertEvent> {
    let mut events = Vec::new();

    for resource in &current.resources {
        let identity = resource.identity();
        let was_drifted = previous
            .map(|report| {
                report
                    .resources
                    .iter()
                    .any(|prior| prior.identity() == identity && !prior.drifts.is_empty())
            })
            .unwrap_or(false);

        if !resource.drifts.is_empty() && !was_drifted {
            let worst = resource
                .drifts
                .iter()
                .map(|d| d.severity)
                .max()
                .unwrap_or(Severity::Low);
            events.push(AlertEvent {
                kind: AlertEventKind::DriftDetected,
                title: format!("Drift detected on {identity}"),
                body: format!(
                    "{} drifts against baseline {}; worst severity: {worst}",
                    resource.drifts.len(),
                    resource.baseline.as_deref().unwrap_or("(none)"),
                ),
            });
        } else if resource.drifts.is_empty() && was_drifted {
            events.push(AlertEvent {
                kind: AlertEventKind::DriftResolved,
                title: format!("Drift resolved on {identity}"),
                body: "Resource matches its baseline again.".to_string(),
            });
        }
    }

    let totals = current.severity_totals();
    if totals.critical > 0 {
        events.push(AlertEvent {
            kind: AlertEventKind::CriticalDrift,
            title: format!("{} critical drifts present", totals.critical),
            body: format!(
                "{} of {} resources deviate from baseline",
                current.drifted_resources, current.total_resources
            ),
        });
    }

    for failure in &current.failures {
        events.push(AlertEvent {
            kind: AlertEventKind::ScanFailed,
            title: format!("Scan failed for {}", failure.resource),
            body: failure.error.clone(),
        });
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Drift;
    use crate::report::{ResourceDriftRecord, ScanFailure};

    fn record(name: &str, drifts: Vec<Drift>) -> ResourceDriftRecord {
        ResourceDriftRecord {
            project: "demo".to_string(),
            name: name.to_string(),
            location: "us-east1".to_string(),
            state: "RUNNABLE".to_string(),
            labels: Default::default(),
            baseline: Some("default".to_string()),
            drifts,
            advisories: Vec::new(),
        }
    }

    fn drift(severity: Severity) -> Drift {
        Drift {
            field: "tier".to_string(),
            expected: "a".to_string(),
            actual: "b".to_string(),
            severity,
        }
    }

    #[test]
    fn new_drift_and_critical_presence_both_alert() {
        let current = DriftReport::from_records(
            vec![record("db", vec![drift(Severity::Critical)])],
            Vec::new(),
        );
        let events = evaluate_alerts(None, &current);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, AlertEventKind::DriftDetected);
        assert_eq!(events[1].kind, AlertEventKind::CriticalDrift);
    }

    #[test]
    fn resolved_drift_alerts_once() {
        let previous = DriftReport::from_records(
            vec![record("db", vec![drift(Severity::Medium)])],
            Vec::new(),
        );
        let current = DriftReport::from_records(vec![record("db", Vec::new())], Vec::new());
        let events = evaluate_alerts(Some(&previous), &current);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AlertEventKind::DriftResolved);
    }

    #[test]
    fn persisting_drift_does_not_re_alert() {
        let previous = DriftReport::from_records(
            vec![record("db", vec![drift(Severity::Medium)])],
            Vec::new(),
        );
        let current = DriftReport::from_records(
            vec![record("db", vec![drift(Severity::Medium)])],
            Vec::new(),
        );
        let events = evaluate_alerts(Some(&previous), &current);
        assert!(events.is_empty());
    }

    #[test]
    fn failures_surface_as_events() {
        let current = DriftReport::from_records(
            Vec::new(),
            vec![ScanFailure {
                resource: "demo-project".to_string(),
                error: "HTTP 403".to_string(),
            }],
        );
        let events = evaluate_alerts(None, &current);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AlertEventKind::ScanFailed);
    }
}
