//! Cloud SQL instance discovery.

use std::collections::BTreeMap;

use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

use crate::discovery::{bool_field, fetch_json, i64_field, str_field};
use crate::report::ScanFailure;
use crate::resource::{
    DatabaseConfig, DatabaseInstance, InsightsConfig, InstanceSettings, IpConfiguration,
    MaintenanceWindow,
};

const SQL_ADMIN_BASE: &str = "https://sqladmin.googleapis.com/v1";

/// Lists PostgreSQL instances across the given projects, fanning out up to
/// `limit` projects at a time. Failed projects land in the failure list.
pub async fn discover_instances(
    client: &Client,
    token: &str,
    projects: &[String],
    limit: usize,
) -> (Vec<DatabaseInstance>, Vec<ScanFailure>) {
    let results: Vec<_> = stream::iter(projects.iter().cloned())
        .map(|project| async move {
            let discovered = discover_project(client, token, &project).await;
            (project, discovered)
        })
        .buffer_unordered(limit.max(1))
        .collect()
        .await;

    let mut instances = Vec::new();
    let mut failures = Vec::new();
    for (project, result) in results {
        match result {
            Ok(found) => instances.extend(found),
            Err(error) => failures.push(ScanFailure {
                resource: project,
                error: error.to_string(),
            }),
        }
    }

    // Stable report order regardless of which project answered first.
    instances.sort_by(|a, b| a.identity().cmp(&b.identity()));
    (instances, failures)
}

async fn discover_project(
    client: &Client,
    token: &str,
    project: &str,
) -> anyhow::Result<Vec<DatabaseInstance>> {
    let url = format!("{SQL_ADMIN_BASE}/projects/{project}/instances");
    let payload = fetch_json(client, &url, token).await?;

    let mut instances = Vec::new();
    for item in payload
        .get("items")
        .and_then(Value::as_array)
        .unwrap_or(&Vec::new())
    {
        if !is_postgres(&str_field(item, "databaseVersion")) {
            continue;
        }
        let mut instance = extract_instance(project, item);
        match list_databases(client, token, project, &instance.name).await {
            Ok(databases) => instance.databases = databases,
            // Database listing is not critical; keep the instance.
            Err(error) => warn!(
                "failed listing databases for {}: {error}",
                instance.identity()
            ),
        }
        instances.push(instance);
    }
    Ok(instances)
}

async fn list_databases(
    client: &Client,
    token: &str,
    project: &str,
    instance: &str,
) -> anyhow::Result<Vec<String>> {
    let url = format!("{SQL_ADMIN_BASE}/projects/{project}/instances/{instance}/databases");
    let payload = fetch_json(client, &url, token).await?;

    let mut databases = Vec::new();
    for item in payload
        .get("items")
        .and_then(Value::as_array)
        .unwrap_or(&Vec::new())
    {
        let name = str_field(item, "name");
        if name != "template0" && name != "template1" && !name.is_empty() {
            databases.push(name);
        }
    }
    Ok(databases)
}

fn is_postgres(version: &str) -> bool {
    version.starts_with("POSTGRES")
}

fn extract_instance(project: &str, item: &Value) -> DatabaseInstance {
    let empty = Value::Null;
    let settings = item.get("settings").unwrap_or(&empty);

    let labels: BTreeMap<String, String> = settings
        .get("userLabels")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    let database_flags: BTreeMap<String, String> = settings
        .get("databaseFlags")
        .and_then(Value::as_array)
        .map(|flags| {
            flags
                .iter()
                .map(|flag| (str_field(flag, "name"), str_field(flag, "value")))
                .filter(|(name, _)| !name.is_empty())
                .collect()
        })
        .unwrap_or_default();

    DatabaseInstance {
        project: project.to_string(),
        name: str_field(item, "name"),
        region: str_field(item, "region"),
        state: str_field(item, "state"),
        labels,
        databases: Vec::new(),
        config: DatabaseConfig {
            database_version: str_field(item, "databaseVersion"),
            tier: str_field(settings, "tier"),
            disk_size_gb: i64_field(settings, "dataDiskSizeGb"),
            disk_type: str_field(settings, "dataDiskType"),
            disk_autoresize: bool_field(settings, "storageAutoResize"),
            database_flags,
            settings: Some(extract_settings(settings)),
        },
        maintenance_window: extract_maintenance_window(settings),
    }
}

fn extract_settings(settings: &Value) -> InstanceSettings {
    let empty = Value::Null;
    let backup = settings.get("backupConfiguration").unwrap_or(&empty);

    let ip_configuration = settings.get("ipConfiguration").map(|ip| IpConfiguration {
        ipv4_enabled: bool_field(ip, "ipv4Enabled"),
        require_ssl: bool_field(ip, "requireSsl"),
        private_network: str_field(ip, "privateNetwork"),
        authorized_networks: ip
            .get("authorizedNetworks")
            .and_then(Value::as_array)
            .map(|nets| {
                nets.iter()
                    .map(|net| str_field(net, "value"))
                    .filter(|value| !value.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
    });

    let insights_config = settings.get("insightsConfig").map(|insights| InsightsConfig {
        query_insights_enabled: bool_field(insights, "queryInsightsEnabled"),
        query_plans_per_minute: i64_field(insights, "queryPlansPerMinute"),
        query_string_length: i64_field(insights, "queryStringLength"),
    });

    InstanceSettings {
        availability_type: str_field(settings, "availabilityType"),
        backup_enabled: bool_field(backup, "enabled"),
        backup_start_time: str_field(backup, "startTime"),
        backup_retention_days: backup
            .get("backupRetentionSettings")
            .map(|retention| i64_field(retention, "retainedBackups"))
            .unwrap_or(0),
        point_in_time_recovery: bool_field(backup, "pointInTimeRecoveryEnabled"),
        transaction_log_retention_days: i64_field(backup, "transactionLogRetentionDays"),
        pricing_plan: str_field(settings, "pricingPlan"),
        replication_type: str_field(settings, "replicationType"),
        ip_configuration,
        insights_config,
    }
}

fn extract_maintenance_window(settings: &Value) -> Option<MaintenanceWindow> {
    settings.get("maintenanceWindow").map(|window| MaintenanceWindow {
        day: i64_field(window, "day") as u32,
        hour: i64_field(window, "hour") as u32,
        update_track: str_field(window, "updateTrack"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_postgres_versions_are_filtered() {
        assert!(is_postgres("POSTGRES_15"));
        assert!(!is_postgres("MYSQL_8_0"));
        assert!(!is_postgres(""));
    }

    #[test]
    fn extracts_nested_settings_from_api_shape() {
        let item = json!({
            "name": "primary-db",
            "region": "us-east1",
            "state": "RUNNABLE",
            "databaseVersion": "POSTGRES_15",
            "settings": {
                "tier": "db-custom-2-7680",
                "dataDiskSizeGb": "100",
                "dataDiskType": "PD_SSD",
                "storageAutoResize": true,
                "availabilityType": "REGIONAL",
                "pricingPlan": "PER_USE",
                "replicationType": "SYNCHRONOUS",
                "userLabels": {"role": "vault"},
                "databaseFlags": [
                    {"name": "max_connections", "value": "200"}
                ],
                "backupConfiguration": {
                    "enabled": true,
                    "startTime": "03:00",
                    "pointInTimeRecoveryEnabled": true,
                    "transactionLogRetentionDays": 7,
                    "backupRetentionSettings": {"retainedBackups": 14}
                },
                "ipConfiguration": {
                    "ipv4Enabled": false,
                    "requireSsl": true,
                    "authorizedNetworks": [{"value": "10.0.0.0/8"}]
                },
                "maintenanceWindow": {"day": 7, "hour": 3, "updateTrack": "stable"}
            }
        });

        let instance = extract_instance("demo", &item);
        assert_eq!(instance.identity(), "demo/primary-db");
        assert_eq!(instance.labels.get("role").map(String::as_str), Some("vault"));
        assert_eq!(instance.config.disk_size_gb, 100);
        assert_eq!(
            instance.config.database_flags.get("max_connections").map(String::as_str),
            Some("200")
        );

        let settings = instance.config.settings.expect("settings");
        assert!(settings.backup_enabled);
        assert_eq!(settings.backup_retention_days, 14);
        let ip = settings.ip_configuration.expect("ip configuration");
        assert!(ip.require_ssl);
        assert_eq!(ip.authorized_networks, vec!["10.0.0.0/8".to_string()]);
        let window = instance.maintenance_window.expect("maintenance window");
        assert_eq!(window.day, 7);
    }
}
