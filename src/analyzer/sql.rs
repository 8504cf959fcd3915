//! Field drift comparison for database instances.
//!
//! Only fields the baseline sets are checked. Numeric fields that use zero as
//! their unset sentinel (disk size, retention days, insight rates) keep that
//! convention even when the baseline supplies an explicit value. The
//! comparator is total: malformed or absent baseline fields are skipped,
//! never surfaced as errors.

use std::collections::BTreeSet;

use crate::analyzer::{compare_string_sets, minor_version, Drift};
use crate::baseline::{InstanceConfigBaseline, SettingsBaseline};
use crate::resource::{DatabaseInstance, InstanceSettings};

pub fn compare_instance(instance: &DatabaseInstance, baseline: &InstanceConfigBaseline) -> Vec<Drift> {
    let mut drifts = Vec::new();
    let config = &instance.config;

    if let Some(expected) = &baseline.database_version {
        if minor_version(&config.database_version) != minor_version(expected) {
            drifts.push(Drift::for_field(
                "database_version",
                expected,
                &config.database_version,
            ));
        }
    }

    if let Some(expected) = &baseline.tier {
        if &config.tier != expected {
            drifts.push(Drift::for_field("tier", expected, &config.tier));
        }
    }

    if let Some(expected) = &baseline.disk_type {
        if &config.disk_type != expected {
            drifts.push(Drift::for_field("disk_type", expected, &config.disk_type));
        }
    }

    if let Some(expected) = baseline.disk_size_gb {
        if expected > 0 && config.disk_size_gb != expected {
            drifts.push(Drift::for_field(
                "disk_size_gb",
                expected.to_string(),
                config.disk_size_gb.to_string(),
            ));
        }
    }

    if let Some(expected) = baseline.disk_autoresize {
        if config.disk_autoresize != expected {
            drifts.push(Drift::for_field(
                "disk_autoresize",
                expected.to_string(),
                config.disk_autoresize.to_string(),
            ));
        }
    }

    compare_database_flags(instance, baseline, &mut drifts);

    if let (Some(actual), Some(expected)) = (&config.settings, &baseline.settings) {
        compare_settings(actual, expected, &mut drifts);
    }

    check_required_databases(instance, baseline, &mut drifts);

    drifts
}

/// Map-valued comparison: baseline keys missing from the instance or set to a
/// different value are medium, keys the baseline does not mention are low.
fn compare_database_flags(
    instance: &DatabaseInstance,
    baseline: &InstanceConfigBaseline,
    drifts: &mut Vec<Drift>,
) {
    let actual = &instance.config.database_flags;

    for (key, expected) in &baseline.database_flags {
        match actual.get(key) {
            None => drifts.push(Drift::keyed(
                "database_flags",
                format!("database_flags.{key}"),
                expected,
                "not set",
            )),
            Some(value) if value != expected => drifts.push(Drift::keyed(
                "database_flags",
                format!("database_flags.{key}"),
                expected,
                value,
            )),
            Some(_) => {}
        }
    }

    for (key, value) in actual {
        if !baseline.database_flags.contains_key(key) {
            drifts.push(Drift::keyed(
                "database_flags.extra",
                format!("database_flags.{key}"),
                "not set",
                value,
            ));
        }
    }
}

fn compare_settings(actual: &InstanceSettings, baseline: &SettingsBaseline, drifts: &mut Vec<Drift>) {
    if let Some(expected) = &baseline.availability_type {
        if &actual.availability_type != expected {
            drifts.push(Drift::for_field(
                "settings.availability_type",
                expected,
                &actual.availability_type,
            ));
        }
    }

    if let Some(expected) = baseline.backup_enabled {
        if actual.backup_enabled != expected {
            drifts.push(Drift::for_field(
                "settings.backup_enabled",
                expected.to_string(),
                actual.backup_enabled.to_string(),
            ));
        }
    }

    if let Some(expected) = baseline.point_in_time_recovery {
        if actual.point_in_time_recovery != expected {
            drifts.push(Drift::for_field(
                "settings.point_in_time_recovery",
                expected.to_string(),
                actual.point_in_time_recovery.to_string(),
            ));
        }
    }

    if let Some(expected) = baseline.backup_retention_days {
        if expected > 0 && actual.backup_retention_days != expected {
            drifts.push(Drift::for_field(
                "settings.backup_retention_days",
                expected.to_string(),
                actual.backup_retention_days.to_string(),
            ));
        }
    }

    if let Some(expected) = baseline.transaction_log_retention_days {
        if expected > 0 && actual.transaction_log_retention_days != expected {
            drifts.push(Drift::for_field(
                "settings.transaction_log_retention_days",
                expected.to_string(),
                actual.transaction_log_retention_days.to_string(),
            ));
        }
    }

    if let Some(expected) = &baseline.backup_start_time {
        if !expected.is_empty() && &actual.backup_start_time != expected {
            drifts.push(Drift::for_field(
                "settings.backup_start_time",
                expected,
                &actual.backup_start_time,
            ));
        }
    }

    if let Some(expected) = &baseline.pricing_plan {
        if &actual.pricing_plan != expected {
            drifts.push(Drift::for_field(
                "settings.pricing_plan",
                expected,
                &actual.pricing_plan,
            ));
        }
    }

    if let Some(expected) = &baseline.replication_type {
        if &actual.replication_type != expected {
            drifts.push(Drift::for_field(
                "settings.replication_type",
                expected,
                &actual.replication_type,
            ));
        }
    }

    // Sub-records are only compared when both sides carry one; a baseline
    // leaving the whole record unset skips every child field.
    if let (Some(actual_ip), Some(expected_ip)) = (&actual.ip_configuration, &baseline.ip_configuration)
    {
        if let Some(expected) = expected_ip.ipv4_enabled {
            if actual_ip.ipv4_enabled != expected {
                drifts.push(Drift::for_field(
                    "settings.ip_configuration.ipv4_enabled",
                    expected.to_string(),
                    actual_ip.ipv4_enabled.to_string(),
                ));
            }
        }
        if let Some(expected) = expected_ip.require_ssl {
            if actual_ip.require_ssl != expected {
                drifts.push(Drift::for_field(
                    "settings.ip_configuration.require_ssl",
                    expected.to_string(),
                    actual_ip.require_ssl.to_string(),
                ));
            }
        }
        if !expected_ip.authorized_networks.is_empty() {
            compare_string_sets(
                "settings.ip_configuration.authorized_networks",
                &expected_ip.authorized_networks,
                &actual_ip.authorized_networks,
                drifts,
            );
        }
    }

    if let (Some(actual_insights), Some(expected_insights)) =
        (&actual.insights_config, &baseline.insights_config)
    {
        if let Some(expected) = expected_insights.query_insights_enabled {
            if actual_insights.query_insights_enabled != expected {
                drifts.push(Drift::for_field(
                    "settings.insights_config.query_insights_enabled",
                    expected.to_string(),
                    actual_insights.query_insights_enabled.to_string(),
                ));
            }
        }
        if let Some(expected) = expected_insights.query_plans_per_minute {
            if expected > 0 && actual_insights.query_plans_per_minute != expected {
                drifts.push(Drift::for_field(
                    "settings.insights_config.query_plans_per_minute",
                    expected.to_string(),
                    actual_insights.query_plans_per_minute.to_string(),
                ));
            }
        }
        if let Some(expected) = expected_insights.query_string_length {
            if expected > 0 && actual_insights.query_string_length != expected {
                drifts.push(Drift::for_field(
                    "settings.insights_config.query_string_length",
                    expected.to_string(),
                    actual_insights.query_string_length.to_string(),
                ));
            }
        }
    }
}

fn check_required_databases(
    instance: &DatabaseInstance,
    baseline: &InstanceConfigBaseline,
    drifts: &mut Vec<Drift>,
) {
    if baseline.required_databases.is_empty() {
        return;
    }

    let existing: BTreeSet<&str> = instance.databases.iter().map(String::as_str).collect();
    let required: BTreeSet<&str> = baseline
        .required_databases
        .iter()
        .map(String::as_str)
        .collect();

    let missing: Vec<&str> = required.difference(&existing).copied().collect();
    let extra: Vec<&str> = existing.difference(&required).copied().collect();

    if !missing.is_empty() {
        drifts.push(Drift::keyed(
            "required_databases.missing",
            "required_databases",
            format!("{:?}", baseline.required_databases),
            format!("Missing: {missing:?}"),
        ));
    }
    if !extra.is_empty() {
        drifts.push(Drift::keyed(
            "required_databases.extra",
            "required_databases",
            format!("{:?}", baseline.required_databases),
            format!("Extra: {extra:?}"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Severity;
    use crate::baseline::{InsightsBaseline, IpConfigBaseline};
    use crate::resource::{DatabaseConfig, InsightsConfig, IpConfiguration};

    fn instance() -> DatabaseInstance {
        DatabaseInstance {
            project: "demo".to_string(),
            name: "primary-db".to_string(),
            region: "us-east1".to_string(),
            state: "RUNNABLE".to_string(),
            labels: Default::default(),
            databases: vec!["app".to_string(), "scratch".to_string()],
            config: DatabaseConfig {
                database_version: "POSTGRES_15".to_string(),
                tier: "db-custom-2-7680".to_string(),
                disk_size_gb: 100,
                disk_type: "PD_SSD".to_string(),
                disk_autoresize: true,
                database_flags: [("max_connections".to_string(), "200".to_string())]
                    .into_iter()
                    .collect(),
                settings: Some(InstanceSettings {
                    availability_type: "ZONAL".to_string(),
                    backup_enabled: false,
                    backup_start_time: "03:00".to_string(),
                    backup_retention_days: 7,
                    point_in_time_recovery: false,
                    transaction_log_retention_days: 7,
                    pricing_plan: "PER_USE".to_string(),
                    replication_type: "SYNCHRONOUS".to_string(),
                    ip_configuration: Some(IpConfiguration {
                        ipv4_enabled: true,
                        require_ssl: false,
                        private_network: String::new(),
                        authorized_networks: vec!["0.0.0.0/0".to_string()],
                    }),
                    insights_config: Some(InsightsConfig {
                        query_insights_enabled: false,
                        query_plans_per_minute: 5,
                        query_string_length: 1024,
                    }),
                }),
            },
            maintenance_window: None,
        }
    }

    #[test]
    fn vacuous_baseline_yields_no_drift() {
        let drifts = compare_instance(&instance(), &InstanceConfigBaseline::default());
        assert!(drifts.is_empty(), "unexpected drifts: {drifts:?}");
    }

    #[test]
    fn version_comparison_ignores_patch_suffix() {
        let mut inst = instance();
        inst.config.database_version = "POSTGRES_15.4.2".to_string();
        let baseline = InstanceConfigBaseline {
            database_version: Some("POSTGRES_15.4.9".to_string()),
            ..Default::default()
        };
        assert!(compare_instance(&inst, &baseline).is_empty());

        let baseline = InstanceConfigBaseline {
            database_version: Some("POSTGRES_14.1.0".to_string()),
            ..Default::default()
        };
        let drifts = compare_instance(&inst, &baseline);
        assert_eq!(drifts.len(), 1);
        assert_eq!(drifts[0].field, "database_version");
        assert_eq!(drifts[0].severity, Severity::Medium);
    }

    #[test]
    fn disabled_backups_are_critical() {
        let baseline = InstanceConfigBaseline {
            settings: Some(SettingsBaseline {
                backup_enabled: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let drifts = compare_instance(&instance(), &baseline);
        assert_eq!(drifts.len(), 1);
        assert_eq!(drifts[0].field, "settings.backup_enabled");
        assert_eq!(drifts[0].severity, Severity::Critical);
        assert_eq!(drifts[0].expected, "true");
        assert_eq!(drifts[0].actual, "false");
    }

    #[test]
    fn zero_retention_in_baseline_is_treated_as_unset() {
        let baseline = InstanceConfigBaseline {
            disk_size_gb: Some(0),
            settings: Some(SettingsBaseline {
                backup_retention_days: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(compare_instance(&instance(), &baseline).is_empty());
    }

    #[test]
    fn database_flag_drift_covers_missing_mismatched_and_extra() {
        let baseline = InstanceConfigBaseline {
            database_flags: [
                ("max_connections".to_string(), "500".to_string()),
                ("log_statement".to_string(), "all".to_string()),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let drifts = compare_instance(&instance(), &baseline);

        let mismatch = drifts
            .iter()
            .find(|d| d.field == "database_flags.max_connections")
            .expect("mismatched flag");
        assert_eq!(mismatch.severity, Severity::Medium);
        assert_eq!(mismatch.expected, "500");

        let missing = drifts
            .iter()
            .find(|d| d.field == "database_flags.log_statement")
            .expect("missing flag");
        assert_eq!(missing.actual, "not set");
        assert_eq!(missing.severity, Severity::Medium);
    }

    #[test]
    fn extra_database_flag_is_low() {
        let mut inst = instance();
        inst.config
            .database_flags
            .insert("work_mem".to_string(), "64MB".to_string());
        let baseline = InstanceConfigBaseline {
            database_flags: [("max_connections".to_string(), "200".to_string())]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let drifts = compare_instance(&inst, &baseline);
        assert_eq!(drifts.len(), 1);
        assert_eq!(drifts[0].field, "database_flags.work_mem");
        assert_eq!(drifts[0].severity, Severity::Low);
        assert_eq!(drifts[0].expected, "not set");
    }

    #[test]
    fn authorized_networks_report_required_and_extra_together() {
        let baseline = InstanceConfigBaseline {
            settings: Some(SettingsBaseline {
                ip_configuration: Some(IpConfigBaseline {
                    authorized_networks: vec!["10.0.0.0/8".to_string()],
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let drifts = compare_instance(&instance(), &baseline);
        assert_eq!(drifts.len(), 2);
        assert!(drifts
            .iter()
            .any(|d| d.severity == Severity::High && d.expected.starts_with("Required:")));
        assert!(drifts
            .iter()
            .any(|d| d.severity == Severity::Medium && d.actual.starts_with("Extra:")));
    }

    #[test]
    fn unset_sub_record_skips_all_children() {
        let mut inst = instance();
        inst.config.settings = None;
        let baseline = InstanceConfigBaseline {
            settings: Some(SettingsBaseline {
                backup_enabled: Some(true),
                ip_configuration: Some(IpConfigBaseline {
                    require_ssl: Some(true),
                    ..Default::default()
                }),
                insights_config: Some(InsightsBaseline {
                    query_insights_enabled: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(compare_instance(&inst, &baseline).is_empty());
    }

    #[test]
    fn missing_required_database_is_high_extra_is_medium() {
        let baseline = InstanceConfigBaseline {
            required_databases: vec!["app".to_string(), "ledger".to_string()],
            ..Default::default()
        };
        let drifts = compare_instance(&instance(), &baseline);
        assert_eq!(drifts.len(), 2);

        let missing = drifts
            .iter()
            .find(|d| d.actual.starts_with("Missing:"))
            .expect("missing databases drift");
        assert_eq!(missing.severity, Severity::High);
        assert!(missing.actual.contains("ledger"));

        let extra = drifts
            .iter()
            .find(|d| d.actual.starts_with("Extra:"))
            .expect("extra databases drift");
        assert_eq!(extra.severity, Severity::Medium);
        assert!(extra.actual.contains("scratch"));
    }
}
