//! Static field-path -> severity assignments.
//!
//! Comparators never decide how serious a mismatch is at the call site; they
//! look the field up here. Set-valued fields carry `.required` / `.extra`
//! subkeys for the two directions of a set difference, and map-valued fields
//! carry an `.extra` subkey for keys the baseline does not mention.

use std::borrow::Cow;

use crate::analyzer::Severity;

use Severity::{Critical, High, Low, Medium};

pub const FIELD_SEVERITIES: &[(&str, Severity)] = &[
    // Database instance
    ("database_version", Medium),
    ("tier", High),
    ("disk_type", Medium),
    ("disk_size_gb", Medium),
    ("disk_autoresize", Low),
    ("database_flags", Medium),
    ("database_flags.extra", Low),
    ("required_databases.missing", High),
    ("required_databases.extra", Medium),
    ("settings.availability_type", High),
    ("settings.backup_enabled", Critical),
    ("settings.point_in_time_recovery", High),
    ("settings.backup_retention_days", Medium),
    ("settings.transaction_log_retention_days", Medium),
    ("settings.backup_start_time", Low),
    ("settings.pricing_plan", Low),
    ("settings.replication_type", Medium),
    ("settings.ip_configuration.ipv4_enabled", Medium),
    ("settings.ip_configuration.require_ssl", Critical),
    ("settings.ip_configuration.authorized_networks.required", High),
    ("settings.ip_configuration.authorized_networks.extra", Medium),
    ("settings.insights_config.query_insights_enabled", Low),
    ("settings.insights_config.query_plans_per_minute", Low),
    ("settings.insights_config.query_string_length", Low),
    // Kubernetes cluster
    ("cluster.master_version", High),
    ("cluster.release_channel", Medium),
    ("cluster.network", Medium),
    ("cluster.subnetwork", Medium),
    ("cluster.private_cluster", Critical),
    ("cluster.master_global_access", Medium),
    ("cluster.datapath_provider", Medium),
    ("cluster.master_authorized_networks.required", High),
    ("cluster.master_authorized_networks.extra", Medium),
    ("cluster.ip_allocation_policy.stack_type", High),
    ("cluster.workload_identity", High),
    ("cluster.network_policy", High),
    ("cluster.binary_authorization", High),
    ("cluster.shielded_nodes", High),
    ("cluster.database_encryption", Critical),
    ("cluster.security_posture", High),
    ("cluster.logging_config.enable_system_logs", Medium),
    ("cluster.logging_config.enable_workload_logs", Low),
    ("cluster.monitoring_config.enable_system_metrics", Medium),
    ("cluster.monitoring_config.enable_apiserver_metrics", Low),
    ("cluster.monitoring_config.enable_controller_metrics", Low),
    ("cluster.monitoring_config.enable_scheduler_metrics", Low),
    // Node pools (looked up with the pool name stripped)
    ("nodepool.version", High),
    ("nodepool.machine_type", High),
    ("nodepool.disk_size_gb", Medium),
    ("nodepool.image_type", Medium),
    ("nodepool.auto_upgrade", High),
    ("nodepool.auto_repair", High),
];

pub fn severity_for(key: &str) -> Severity {
    if let Some(severity) = exact(key) {
        return severity;
    }
    if let Some(severity) = exact(&normalize_key(key)) {
        return severity;
    }
    Medium
}

fn exact(key: &str) -> Option<Severity> {
    FIELD_SEVERITIES
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, severity)| *severity)
}

/// Collapses dynamic path segments onto their table keys:
/// `database_flags.max_connections` -> `database_flags`,
/// `nodepool[default-pool].machine_type` -> `nodepool.machine_type`.
fn normalize_key(key: &str) -> Cow<'_, str> {
    if key.starts_with("database_flags.") {
        return Cow::Borrowed("database_flags");
    }
    if let Some(rest) = key.strip_prefix("nodepool[") {
        if let Some((_, suffix)) = rest.split_once("].") {
            return Cow::Owned(format!("nodepool.{suffix}"));
        }
    }
    Cow::Borrowed(key)
}
