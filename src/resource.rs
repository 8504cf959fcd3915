//! Observed resource snapshots.
//!
//! These records are produced by the discovery collaborators (or loaded from
//! the snapshot cache) and are read-only once captured. Labels use ordered
//! maps so serialized reports stay byte-stable between runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One discovered Cloud SQL PostgreSQL instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseInstance {
    pub project: String,
    pub name: String,
    pub region: String,
    pub state: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub databases: Vec<String>,
    pub config: DatabaseConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_window: Option<MaintenanceWindow>,
}

impl DatabaseInstance {
    pub fn identity(&self) -> String {
        format!("{}/{}", self.project, self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub database_version: String,
    pub tier: String,
    pub disk_size_gb: i64,
    pub disk_type: String,
    pub disk_autoresize: bool,
    #[serde(default)]
    pub database_flags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<InstanceSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceSettings {
    pub availability_type: String,
    pub backup_enabled: bool,
    #[serde(default)]
    pub backup_start_time: String,
    #[serde(default)]
    pub backup_retention_days: i64,
    pub point_in_time_recovery: bool,
    #[serde(default)]
    pub transaction_log_retention_days: i64,
    #[serde(default)]
    pub pricing_plan: String,
    #[serde(default)]
    pub replication_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_configuration: Option<IpConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insights_config: Option<InsightsConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpConfiguration {
    pub ipv4_enabled: bool,
    pub require_ssl: bool,
    #[serde(default)]
    pub private_network: String,
    #[serde(default)]
    pub authorized_networks: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsightsConfig {
    pub query_insights_enabled: bool,
    #[serde(default)]
    pub query_plans_per_minute: i64,
    #[serde(default)]
    pub query_string_length: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    pub day: u32,
    pub hour: u32,
    #[serde(default)]
    pub update_track: String,
}

/// One discovered GKE cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInstance {
    pub project: String,
    pub name: String,
    pub location: String,
    pub status: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub config: ClusterConfig,
    #[serde(default)]
    pub node_pools: Vec<NodePool>,
}

impl ClusterInstance {
    pub fn identity(&self) -> String {
        format!("{}/{}", self.project, self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub master_version: String,
    #[serde(default)]
    pub release_channel: String,

    // Networking
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub subnetwork: String,
    pub private_cluster: bool,
    pub master_global_access: bool,
    #[serde(default)]
    pub master_authorized_networks: Vec<String>,
    #[serde(default)]
    pub datapath_provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_allocation_policy: Option<IpAllocationPolicy>,

    // Security
    pub workload_identity: bool,
    pub network_policy: bool,
    pub binary_authorization: bool,
    pub shielded_nodes: bool,
    pub database_encryption: bool,
    #[serde(default)]
    pub security_posture: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<ClusterLogging>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<ClusterMonitoring>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpAllocationPolicy {
    pub use_ip_aliases: bool,
    #[serde(default)]
    pub cluster_ipv4_cidr: String,
    #[serde(default)]
    pub services_ipv4_cidr: String,
    #[serde(default)]
    pub stack_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterLogging {
    pub system_logs: bool,
    pub workload_logs: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterMonitoring {
    pub system_metrics: bool,
    pub apiserver_metrics: bool,
    pub controller_metrics: bool,
    pub scheduler_metrics: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodePool {
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub machine_type: String,
    pub disk_size_gb: i64,
    #[serde(default)]
    pub disk_type: String,
    #[serde(default)]
    pub image_type: String,
    #[serde(default)]
    pub initial_node_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<Autoscaling>,
    pub auto_upgrade: bool,
    pub auto_repair: bool,
    #[serde(default)]
    pub service_account: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub taints: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Autoscaling {
    pub enabled: bool,
    pub min_node_count: i64,
    pub max_node_count: i64,
}
