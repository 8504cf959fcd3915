//! Baseline specifications.
//!
//! A baseline is a partially-populated expected configuration: every field is
//! optional and an unset field means "do not check this field", never "expect
//! empty or zero". Baselines load from a YAML document that groups instance,
//! cluster, and schema baselines in one file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analyzer::matcher::BaselineSelector;
use crate::schema::inspect::ConnectionSpec;
use crate::schema::SchemaBaseline;

/// The full baselines document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineSet {
    pub projects: Vec<String>,
    pub sql: Vec<InstanceBaseline>,
    pub gke: Vec<ClusterBaseline>,
    pub schema: Vec<SchemaAudit>,
}

impl BaselineSet {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed reading baselines: {}", path.display()))?;
        let parsed: Self = serde_yaml::from_str(&data)
            .with_context(|| format!("failed parsing YAML baselines: {}", path.display()))?;
        Ok(parsed)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceBaseline {
    pub name: String,
    pub filter_labels: BTreeMap<String, String>,
    pub config: InstanceConfigBaseline,
}

impl BaselineSelector for InstanceBaseline {
    fn name(&self) -> &str {
        &self.name
    }

    fn filter_labels(&self) -> &BTreeMap<String, String> {
        &self.filter_labels
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfigBaseline {
    pub database_version: Option<String>,
    pub tier: Option<String>,
    pub disk_size_gb: Option<i64>,
    pub disk_type: Option<String>,
    pub disk_autoresize: Option<bool>,
    pub database_flags: BTreeMap<String, String>,
    pub required_databases: Vec<String>,
    pub settings: Option<SettingsBaseline>,
}

impl InstanceConfigBaseline {
    /// Seeds a baseline from a discovered instance, pinning every observed
    /// value. Meant as a starting point for `sql --generate-baseline`.
    pub fn from_snapshot(config: &crate::resource::DatabaseConfig) -> Self {
        Self {
            database_version: Some(config.database_version.clone()),
            tier: Some(config.tier.clone()),
            disk_size_gb: Some(config.disk_size_gb),
            disk_type: Some(config.disk_type.clone()),
            disk_autoresize: Some(config.disk_autoresize),
            database_flags: config.database_flags.clone(),
            required_databases: Vec::new(),
            settings: config.settings.as_ref().map(|settings| SettingsBaseline {
                availability_type: Some(settings.availability_type.clone()),
                backup_enabled: Some(settings.backup_enabled),
                backup_start_time: Some(settings.backup_start_time.clone()),
                backup_retention_days: Some(settings.backup_retention_days),
                point_in_time_recovery: Some(settings.point_in_time_recovery),
                transaction_log_retention_days: Some(settings.transaction_log_retention_days),
                pricing_plan: Some(settings.pricing_plan.clone()),
                replication_type: Some(settings.replication_type.clone()),
                ip_configuration: settings.ip_configuration.as_ref().map(|ip| IpConfigBaseline {
                    ipv4_enabled: Some(ip.ipv4_enabled),
                    require_ssl: Some(ip.require_ssl),
                    authorized_networks: ip.authorized_networks.clone(),
                }),
                insights_config: settings.insights_config.as_ref().map(|insights| {
                    InsightsBaseline {
                        query_insights_enabled: Some(insights.query_insights_enabled),
                        query_plans_per_minute: Some(insights.query_plans_per_minute),
                        query_string_length: Some(insights.query_string_length),
                    }
                }),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsBaseline {
    pub availability_type: Option<String>,
    pub backup_enabled: Option<bool>,
    pub backup_start_time: Option<String>,
    pub backup_retention_days: Option<i64>,
    pub point_in_time_recovery: Option<bool>,
    pub transaction_log_retention_days: Option<i64>,
    pub pricing_plan: Option<String>,
    pub replication_type: Option<String>,
    pub ip_configuration: Option<IpConfigBaseline>,
    pub insights_config: Option<InsightsBaseline>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IpConfigBaseline {
    pub ipv4_enabled: Option<bool>,
    pub require_ssl: Option<bool>,
    pub authorized_networks: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsBaseline {
    pub query_insights_enabled: Option<bool>,
    pub query_plans_per_minute: Option<i64>,
    pub query_string_length: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterBaseline {
    pub name: String,
    pub filter_labels: BTreeMap<String, String>,
    pub config: ClusterConfigBaseline,
    pub node_pool: Option<NodePoolBaseline>,
}

impl BaselineSelector for ClusterBaseline {
    fn name(&self) -> &str {
        &self.name
    }

    fn filter_labels(&self) -> &BTreeMap<String, String> {
        &self.filter_labels
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfigBaseline {
    pub master_version: Option<String>,
    pub release_channel: Option<String>,

    pub network: Option<String>,
    pub subnetwork: Option<String>,
    pub private_cluster: Option<bool>,
    pub master_global_access: Option<bool>,
    pub master_authorized_networks: Vec<String>,
    pub datapath_provider: Option<String>,
    pub ip_allocation_policy: Option<IpAllocationBaseline>,

    pub workload_identity: Option<bool>,
    pub network_policy: Option<bool>,
    pub binary_authorization: Option<bool>,
    pub shielded_nodes: Option<bool>,
    pub database_encryption: Option<bool>,
    pub security_posture: Option<String>,

    pub logging: Option<LoggingBaseline>,
    pub monitoring: Option<MonitoringBaseline>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IpAllocationBaseline {
    pub stack_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingBaseline {
    pub system_logs: Option<bool>,
    pub workload_logs: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringBaseline {
    pub system_metrics: Option<bool>,
    pub apiserver_metrics: Option<bool>,
    pub controller_metrics: Option<bool>,
    pub scheduler_metrics: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodePoolBaseline {
    pub version: Option<String>,
    pub machine_type: Option<String>,
    pub disk_size_gb: Option<i64>,
    pub image_type: Option<String>,
    pub auto_upgrade: Option<bool>,
    pub auto_repair: Option<bool>,
}

/// One schema audit: where to connect and what the schema should look like.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaAudit {
    pub name: String,
    pub connection: ConnectionSpec,
    pub baseline: SchemaBaseline,
}
