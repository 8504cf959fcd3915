//! Best-effort remediation text derived from a resource's drift list.
//!
//! This is advisory output, not a decision engine: a static table keyed on
//! field paths drives the messages, and message order follows table order.

use crate::analyzer::{Drift, Severity};
use crate::resource::DatabaseInstance;

/// field path, optional actual-value trigger, message. A `None` trigger fires
/// on any drift for that field.
const ADVICE: &[(&str, Option<&str>, &str)] = &[
    (
        "settings.backup_enabled",
        Some("false"),
        "Enable backups immediately to protect data",
    ),
    (
        "settings.ip_configuration.require_ssl",
        Some("false"),
        "Enable SSL requirement to secure connections",
    ),
    (
        "tier",
        None,
        "Tier mismatch may affect performance and cost",
    ),
    (
        "cluster.private_cluster",
        Some("false"),
        "Restrict the control plane to a private endpoint",
    ),
    (
        "cluster.database_encryption",
        Some("false"),
        "Enable application-layer secrets encryption",
    ),
];

pub fn advise(drifts: &[Drift]) -> Vec<String> {
    if drifts.is_empty() {
        return vec!["No drift detected - resource matches baseline".to_string()];
    }

    let mut advisories = Vec::new();
    if drifts.iter().any(|d| d.severity == Severity::Critical) {
        advisories.push("CRITICAL drifts detected - immediate action required".to_string());
    }

    for drift in drifts {
        for (field, trigger, message) in ADVICE {
            if drift.field != *field {
                continue;
            }
            if trigger.map(|value| value == drift.actual).unwrap_or(true) {
                advisories.push((*message).to_string());
            }
        }
    }

    advisories
}

/// Advisories for an instance no baseline claimed. Mirrors what an operator
/// would flag on a first pass over an unmanaged instance.
pub fn best_practice_advisories(instance: &DatabaseInstance) -> Vec<String> {
    let mut advisories = Vec::new();
    let config = &instance.config;

    if let Some(settings) = &config.settings {
        if !settings.backup_enabled {
            advisories.push("CRITICAL: Enable automated backups".to_string());
        }
        if !settings.point_in_time_recovery {
            advisories.push("HIGH: Enable point-in-time recovery for better RPO".to_string());
        }
        if settings.availability_type != "REGIONAL" {
            advisories
                .push("HIGH: Consider REGIONAL availability for production workloads".to_string());
        }
        if let Some(ip) = &settings.ip_configuration {
            if !ip.require_ssl {
                advisories.push("CRITICAL: Enable SSL requirement for all connections".to_string());
            }
            if ip.ipv4_enabled {
                advisories
                    .push("MEDIUM: Consider using private IP instead of public IPv4".to_string());
            }
        }
        let insights_on = settings
            .insights_config
            .as_ref()
            .map(|insights| insights.query_insights_enabled)
            .unwrap_or(false);
        if !insights_on {
            advisories
                .push("LOW: Enable Query Insights for better performance monitoring".to_string());
        }
    }

    if !config.disk_autoresize {
        advisories.push("MEDIUM: Enable disk autoresize to prevent storage issues".to_string());
    }

    if config.database_version.as_str() < "POSTGRES_14" {
        advisories.push(
            "MEDIUM: Consider upgrading to PostgreSQL 14+ for better performance and features"
                .to_string(),
        );
    }

    if instance.maintenance_window.is_none() {
        advisories.push("LOW: Set a maintenance window for predictable updates".to_string());
    }

    advisories
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{DatabaseConfig, InstanceSettings, IpConfiguration};

    #[test]
    fn clean_resource_gets_a_single_match_message() {
        let advisories = advise(&[]);
        assert_eq!(advisories.len(), 1);
        assert!(advisories[0].contains("matches baseline"));
    }

    #[test]
    fn critical_drift_adds_the_blanket_warning() {
        let drifts = vec![Drift {
            field: "settings.backup_enabled".to_string(),
            expected: "true".to_string(),
            actual: "false".to_string(),
            severity: Severity::Critical,
        }];
        let advisories = advise(&drifts);
        assert_eq!(advisories.len(), 2);
        assert!(advisories[0].starts_with("CRITICAL drifts detected"));
        assert!(advisories[1].contains("Enable backups"));
    }

    #[test]
    fn tier_advice_fires_regardless_of_value() {
        let drifts = vec![Drift {
            field: "tier".to_string(),
            expected: "db-custom-4-15360".to_string(),
            actual: "db-custom-2-7680".to_string(),
            severity: Severity::High,
        }];
        let advisories = advise(&drifts);
        assert_eq!(advisories.len(), 1);
        assert!(advisories[0].contains("Tier mismatch"));
    }

    #[test]
    fn best_practice_pass_flags_unprotected_instances() {
        let instance = DatabaseInstance {
            project: "demo".to_string(),
            name: "legacy-db".to_string(),
            region: "us-east1".to_string(),
            state: "RUNNABLE".to_string(),
            labels: Default::default(),
            databases: Vec::new(),
            config: DatabaseConfig {
                database_version: "POSTGRES_13".to_string(),
                disk_autoresize: false,
                settings: Some(InstanceSettings {
                    availability_type: "ZONAL".to_string(),
                    backup_enabled: false,
                    point_in_time_recovery: false,
                    ip_configuration: Some(IpConfiguration {
                        ipv4_enabled: true,
                        require_ssl: false,
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            maintenance_window: None,
        };

        let advisories = best_practice_advisories(&instance);
        assert!(advisories.iter().any(|a| a.contains("automated backups")));
        assert!(advisories.iter().any(|a| a.contains("SSL requirement")));
        assert!(advisories.iter().any(|a| a.contains("PostgreSQL 14+")));
        assert!(advisories.iter().any(|a| a.contains("maintenance window")));
    }
}
