use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::analyzer::Severity;
use crate::report::{DriftReport, SchemaAuditReport};
use crate::schema::ViolationKind;

fn severity_cell(severity: Severity) -> Cell {
    let cell = Cell::new(severity.to_string().to_uppercase());
    match severity {
        Severity::Critical => cell.fg(Color::Red),
        Severity::High => cell.fg(Color::DarkYellow),
        Severity::Medium => cell.fg(Color::Yellow),
        Severity::Low => cell.fg(Color::Grey),
    }
}

pub fn render_report_table(report: &DriftReport) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Resource", "Baseline", "Field", "Severity", "Expected", "Actual"]);

    for resource in &report.resources {
        if resource.drifts.is_empty() {
            table.add_row(Row::from(vec![
                Cell::new(resource.identity()),
                Cell::new(resource.baseline.as_deref().unwrap_or("-")),
                Cell::new("-"),
                Cell::new("OK").fg(Color::Green),
                Cell::new("-"),
                Cell::new("-"),
            ]));
            continue;
        }
        for drift in &resource.drifts {
            table.add_row(Row::from(vec![
                Cell::new(resource.identity()),
                Cell::new(resource.baseline.as_deref().unwrap_or("-")),
                Cell::new(&drift.field),
                severity_cell(drift.severity),
                Cell::new(&drift.expected),
                Cell::new(&drift.actual),
            ]));
        }
    }

    let mut out = format_report_summary(report);
    out.push('\n');
    out.push_str(&table.to_string());
    if !report.failures.is_empty() {
        out.push_str("\nFailures:\n");
        for failure in &report.failures {
            out.push_str(&format!("  {} - {}\n", failure.resource, failure.error));
        }
    }
    out
}

pub fn format_report_summary(report: &DriftReport) -> String {
    let totals = report.severity_totals();
    format!(
        "Generated: {}\nTotal resources: {}\nResources with drift: {}\nCompliance rate: {:.1}%\nSeverity: {} critical, {} high, {} medium, {} low",
        report.generated_at.to_rfc3339(),
        report.total_resources,
        report.drifted_resources,
        report.compliance_rate(),
        totals.critical,
        totals.high,
        totals.medium,
        totals.low,
    )
}

pub fn render_advisories(report: &DriftReport) -> String {
    let mut out = String::new();
    for resource in &report.resources {
        if resource.advisories.is_empty() {
            continue;
        }
        out.push_str(&format!("{}:\n", resource.identity()));
        for advisory in &resource.advisories {
            out.push_str(&format!("  - {advisory}\n"));
        }
    }
    out
}

pub fn render_schema_table(report: &SchemaAuditReport) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Audit", "Finding", "Object", "Detail"]);

    for audit in &report.audits {
        let result = &audit.result;
        if !result.has_drift {
            table.add_row(Row::from(vec![
                Cell::new(&audit.name),
                Cell::new("OK").fg(Color::Green),
                Cell::new(&audit.database),
                Cell::new("matches baseline"),
            ]));
            continue;
        }
        for mismatch in &result.count_mismatches {
            table.add_row(Row::from(vec![
                Cell::new(&audit.name),
                Cell::new("count").fg(Color::Yellow),
                Cell::new(mismatch.object_kind.plural()),
                Cell::new(format!(
                    "expected {}, found {} (diff: {:+})",
                    mismatch.expected,
                    mismatch.actual,
                    mismatch.diff()
                )),
            ]));
        }
        for missing in &result.missing_objects {
            table.add_row(Row::from(vec![
                Cell::new(&audit.name),
                Cell::new("missing").fg(Color::Red),
                Cell::new(format!("{}: {}", missing.object_kind, missing.name)),
                Cell::new("required object not found"),
            ]));
        }
        for forbidden in &result.forbidden_objects {
            table.add_row(Row::from(vec![
                Cell::new(&audit.name),
                Cell::new("forbidden").fg(Color::Red),
                Cell::new(format!("{}: {}", forbidden.object_kind, forbidden.name)),
                Cell::new("object should not exist"),
            ]));
        }
        for violation in &result.ownership_violations {
            let label = match violation.kind {
                ViolationKind::ForbiddenOwner => Cell::new("forbidden owner").fg(Color::Red),
                ViolationKind::DatabaseOwner => Cell::new("database owner").fg(Color::Red),
                ViolationKind::WrongOwner => Cell::new("wrong owner").fg(Color::Yellow),
            };
            table.add_row(Row::from(vec![
                Cell::new(&audit.name),
                label,
                Cell::new(format!("{}: {}", violation.object_kind, violation.object_name)),
                Cell::new(format!(
                    "owner {}, expected {}",
                    violation.actual_owner, violation.expected_owner
                )),
            ]));
        }
    }

    let mut out = table.to_string();
    if !report.failures.is_empty() {
        out.push_str("\nFailures:\n");
        for failure in &report.failures {
            out.push_str(&format!("  {} - {}\n", failure.resource, failure.error));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Drift;
    use crate::report::ResourceDriftRecord;

    #[test]
    fn summary_reports_counts_and_compliance() {
        let report = DriftReport::from_records(
            vec![ResourceDriftRecord {
                project: "demo".to_string(),
                name: "db".to_string(),
                location: "us-east1".to_string(),
                state: "RUNNABLE".to_string(),
                labels: Default::default(),
                baseline: Some("default".to_string()),
                drifts: vec![Drift {
                    field: "tier".to_string(),
                    expected: "a".to_string(),
                    actual: "b".to_string(),
                    severity: Severity::High,
                }],
                advisories: Vec::new(),
            }],
            Vec::new(),
        );

        let summary = format_report_summary(&report);
        assert!(summary.contains("Total resources: 1"));
        assert!(summary.contains("Compliance rate: 0.0%"));
        assert!(summary.contains("1 high"));
    }
}
