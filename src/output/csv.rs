use anyhow::Result;

use crate::report::{DriftReport, SchemaAuditReport};

pub fn report_to_csv(report: &DriftReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "project",
        "name",
        "baseline",
        "field",
        "severity",
        "expected",
        "actual",
    ])?;
    for resource in &report.resources {
        for drift in &resource.drifts {
            writer.write_record([
                resource.project.clone(),
                resource.name.clone(),
                resource.baseline.clone().unwrap_or_default(),
                drift.field.clone(),
                drift.severity.to_string(),
                drift.expected.clone(),
                drift.actual.clone(),
            ])?;
        }
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn schema_report_to_csv(report: &SchemaAuditReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["audit", "finding", "object_kind", "object", "detail"])?;
    for audit in &report.audits {
        let result = &audit.result;
        for mismatch in &result.count_mismatches {
            writer.write_record([
                audit.name.clone(),
                "count_mismatch".to_string(),
                mismatch.object_kind.to_string(),
                mismatch.object_kind.plural().to_string(),
                format!(
                    "expected {} actual {} diff {:+}",
                    mismatch.expected,
                    mismatch.actual,
                    mismatch.diff()
                ),
            ])?;
        }
        for missing in &result.missing_objects {
            writer.write_record([
                audit.name.clone(),
                "missing_object".to_string(),
                missing.object_kind.to_string(),
                missing.name.clone(),
                String::new(),
            ])?;
        }
        for forbidden in &result.forbidden_objects {
            writer.write_record([
                audit.name.clone(),
                "forbidden_object".to_string(),
                forbidden.object_kind.to_string(),
                forbidden.name.clone(),
                String::new(),
            ])?;
        }
        for violation in &result.ownership_violations {
            writer.write_record([
                audit.name.clone(),
                "ownership_violation".to_string(),
                violation.object_kind.to_string(),
                violation.object_name.clone(),
                format!(
                    "owner {} expected {}",
                    violation.actual_owner, violation.expected_owner
                ),
            ])?;
        }
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{Drift, Severity};
    use crate::report::ResourceDriftRecord;

    #[test]
    fn drift_rows_carry_severity_labels() {
        let report = DriftReport::from_records(
            vec![ResourceDriftRecord {
                project: "demo".to_string(),
                name: "db".to_string(),
                location: "us-east1".to_string(),
                state: "RUNNABLE".to_string(),
                labels: Default::default(),
                baseline: Some("default".to_string()),
                drifts: vec![Drift {
                    field: "settings.backup_enabled".to_string(),
                    expected: "true".to_string(),
                    actual: "false".to_string(),
                    severity: Severity::Critical,
                }],
                advisories: Vec::new(),
            }],
            Vec::new(),
        );

        let csv = report_to_csv(&report).expect("render csv");
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("project,name,baseline,field,severity,expected,actual")
        );
        assert_eq!(
            lines.next(),
            Some("demo,db,default,settings.backup_enabled,critical,true,false")
        );
    }
}
