//! Field drift comparison for Kubernetes clusters and their node pools.

use crate::analyzer::{compare_string_sets, minor_version, Drift};
use crate::baseline::{ClusterBaseline, ClusterConfigBaseline, NodePoolBaseline};
use crate::resource::{ClusterConfig, ClusterInstance, NodePool};

pub fn compare_cluster(cluster: &ClusterInstance, baseline: &ClusterBaseline) -> Vec<Drift> {
    let mut drifts = Vec::new();

    compare_cluster_config(&cluster.config, &baseline.config, &mut drifts);

    if let Some(pool_baseline) = &baseline.node_pool {
        for pool in &cluster.node_pools {
            compare_node_pool(pool, pool_baseline, &mut drifts);
        }
    }

    drifts
}

fn compare_cluster_config(actual: &ClusterConfig, baseline: &ClusterConfigBaseline, drifts: &mut Vec<Drift>) {
    if let Some(expected) = &baseline.master_version {
        if minor_version(&actual.master_version) != minor_version(expected) {
            drifts.push(Drift::for_field(
                "cluster.master_version",
                expected,
                &actual.master_version,
            ));
        }
    }

    if let Some(expected) = &baseline.release_channel {
        if &actual.release_channel != expected {
            drifts.push(Drift::for_field(
                "cluster.release_channel",
                expected,
                &actual.release_channel,
            ));
        }
    }

    if let Some(expected) = &baseline.network {
        if &actual.network != expected {
            drifts.push(Drift::for_field("cluster.network", expected, &actual.network));
        }
    }

    if let Some(expected) = &baseline.subnetwork {
        if &actual.subnetwork != expected {
            drifts.push(Drift::for_field(
                "cluster.subnetwork",
                expected,
                &actual.subnetwork,
            ));
        }
    }

    if let Some(expected) = baseline.private_cluster {
        if actual.private_cluster != expected {
            drifts.push(Drift::for_field(
                "cluster.private_cluster",
                expected.to_string(),
                actual.private_cluster.to_string(),
            ));
        }
    }

    if let Some(expected) = baseline.master_global_access {
        if actual.master_global_access != expected {
            drifts.push(Drift::for_field(
                "cluster.master_global_access",
                expected.to_string(),
                actual.master_global_access.to_string(),
            ));
        }
    }

    if let Some(expected) = &baseline.datapath_provider {
        if &actual.datapath_provider != expected {
            drifts.push(Drift::for_field(
                "cluster.datapath_provider",
                expected,
                &actual.datapath_provider,
            ));
        }
    }

    if !baseline.master_authorized_networks.is_empty() {
        compare_string_sets(
            "cluster.master_authorized_networks",
            &baseline.master_authorized_networks,
            &actual.master_authorized_networks,
            drifts,
        );
    }

    if let (Some(actual_policy), Some(expected_policy)) =
        (&actual.ip_allocation_policy, &baseline.ip_allocation_policy)
    {
        if let Some(expected) = &expected_policy.stack_type {
            if &actual_policy.stack_type != expected {
                drifts.push(Drift::for_field(
                    "cluster.ip_allocation_policy.stack_type",
                    expected,
                    &actual_policy.stack_type,
                ));
            }
        }
    }

    compare_security(actual, baseline, drifts);

    if let (Some(actual_logging), Some(expected_logging)) = (&actual.logging, &baseline.logging) {
        if let Some(expected) = expected_logging.system_logs {
            if actual_logging.system_logs != expected {
                drifts.push(Drift::for_field(
                    "cluster.logging_config.enable_system_logs",
                    expected.to_string(),
                    actual_logging.system_logs.to_string(),
                ));
            }
        }
        if let Some(expected) = expected_logging.workload_logs {
            if actual_logging.workload_logs != expected {
                drifts.push(Drift::for_field(
                    "cluster.logging_config.enable_workload_logs",
                    expected.to_string(),
                    actual_logging.workload_logs.to_string(),
                ));
            }
        }
    }

    if let (Some(actual_monitoring), Some(expected_monitoring)) =
        (&actual.monitoring, &baseline.monitoring)
    {
        let checks = [
            (
                "cluster.monitoring_config.enable_system_metrics",
                expected_monitoring.system_metrics,
                actual_monitoring.system_metrics,
            ),
            (
                "cluster.monitoring_config.enable_apiserver_metrics",
                expected_monitoring.apiserver_metrics,
                actual_monitoring.apiserver_metrics,
            ),
            (
                "cluster.monitoring_config.enable_controller_metrics",
                expected_monitoring.controller_metrics,
                actual_monitoring.controller_metrics,
            ),
            (
                "cluster.monitoring_config.enable_scheduler_metrics",
                expected_monitoring.scheduler_metrics,
                actual_monitoring.scheduler_metrics,
            ),
        ];
        for (field, expected, actual_value) in checks {
            if let Some(expected) = expected {
                if actual_value != expected {
                    drifts.push(Drift::for_field(
                        field,
                        expected.to_string(),
                        actual_value.to_string(),
                    ));
                }
            }
        }
    }
}

fn compare_security(actual: &ClusterConfig, baseline: &ClusterConfigBaseline, drifts: &mut Vec<Drift>) {
    let checks = [
        (
            "cluster.workload_identity",
            baseline.workload_identity,
            actual.workload_identity,
        ),
        (
            "cluster.network_policy",
            baseline.network_policy,
            actual.network_policy,
        ),
        (
            "cluster.binary_authorization",
            baseline.binary_authorization,
            actual.binary_authorization,
        ),
        (
            "cluster.shielded_nodes",
            baseline.shielded_nodes,
            actual.shielded_nodes,
        ),
        (
            "cluster.database_encryption",
            baseline.database_encryption,
            actual.database_encryption,
        ),
    ];
    for (field, expected, actual_value) in checks {
        if let Some(expected) = expected {
            if actual_value != expected {
                drifts.push(Drift::for_field(
                    field,
                    expected.to_string(),
                    actual_value.to_string(),
                ));
            }
        }
    }

    if let Some(expected) = &baseline.security_posture {
        if &actual.security_posture != expected {
            drifts.push(Drift::for_field(
                "cluster.security_posture",
                expected,
                &actual.security_posture,
            ));
        }
    }
}

fn compare_node_pool(pool: &NodePool, baseline: &NodePoolBaseline, drifts: &mut Vec<Drift>) {
    let prefix = format!("nodepool[{}]", pool.name);

    if let Some(expected) = &baseline.version {
        if minor_version(&pool.version) != minor_version(expected) {
            drifts.push(Drift::keyed(
                "nodepool.version",
                format!("{prefix}.version"),
                expected,
                &pool.version,
            ));
        }
    }

    if let Some(expected) = &baseline.machine_type {
        if &pool.machine_type != expected {
            drifts.push(Drift::keyed(
                "nodepool.machine_type",
                format!("{prefix}.machine_type"),
                expected,
                &pool.machine_type,
            ));
        }
    }

    if let Some(expected) = baseline.disk_size_gb {
        if expected > 0 && pool.disk_size_gb != expected {
            drifts.push(Drift::keyed(
                "nodepool.disk_size_gb",
                format!("{prefix}.disk_size_gb"),
                expected.to_string(),
                pool.disk_size_gb.to_string(),
            ));
        }
    }

    if let Some(expected) = &baseline.image_type {
        if &pool.image_type != expected {
            drifts.push(Drift::keyed(
                "nodepool.image_type",
                format!("{prefix}.image_type"),
                expected,
                &pool.image_type,
            ));
        }
    }

    if let Some(expected) = baseline.auto_upgrade {
        if pool.auto_upgrade != expected {
            drifts.push(Drift::keyed(
                "nodepool.auto_upgrade",
                format!("{prefix}.auto_upgrade"),
                expected.to_string(),
                pool.auto_upgrade.to_string(),
            ));
        }
    }

    if let Some(expected) = baseline.auto_repair {
        if pool.auto_repair != expected {
            drifts.push(Drift::keyed(
                "nodepool.auto_repair",
                format!("{prefix}.auto_repair"),
                expected.to_string(),
                pool.auto_repair.to_string(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Severity;

    fn cluster() -> ClusterInstance {
        ClusterInstance {
            project: "demo".to_string(),
            name: "prod-cluster".to_string(),
            location: "us-east1".to_string(),
            status: "RUNNING".to_string(),
            labels: Default::default(),
            config: ClusterConfig {
                master_version: "1.33.5-gke.1308000".to_string(),
                release_channel: "REGULAR".to_string(),
                network: "prod-vpc".to_string(),
                subnetwork: "prod-subnet".to_string(),
                private_cluster: false,
                master_global_access: false,
                master_authorized_networks: vec!["203.0.113.0/24".to_string()],
                datapath_provider: "ADVANCED_DATAPATH".to_string(),
                ip_allocation_policy: None,
                workload_identity: true,
                network_policy: false,
                binary_authorization: false,
                shielded_nodes: true,
                database_encryption: false,
                security_posture: "BASIC".to_string(),
                logging: None,
                monitoring: None,
            },
            node_pools: vec![NodePool {
                name: "default-pool".to_string(),
                version: "1.33.5-gke.1308000".to_string(),
                machine_type: "e2-standard-4".to_string(),
                disk_size_gb: 100,
                auto_upgrade: false,
                auto_repair: true,
                ..Default::default()
            }],
        }
    }

    #[test]
    fn vacuous_baseline_yields_no_drift() {
        let drifts = compare_cluster(&cluster(), &ClusterBaseline::default());
        assert!(drifts.is_empty(), "unexpected drifts: {drifts:?}");
    }

    #[test]
    fn master_version_compares_minor_projection_only() {
        let baseline = ClusterBaseline {
            config: ClusterConfigBaseline {
                master_version: Some("1.33.1-gke.99".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(compare_cluster(&cluster(), &baseline).is_empty());

        let baseline = ClusterBaseline {
            config: ClusterConfigBaseline {
                master_version: Some("1.34.0-gke.100".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let drifts = compare_cluster(&cluster(), &baseline);
        assert_eq!(drifts.len(), 1);
        assert_eq!(drifts[0].field, "cluster.master_version");
        assert_eq!(drifts[0].severity, Severity::High);
    }

    #[test]
    fn public_cluster_against_private_baseline_is_critical() {
        let baseline = ClusterBaseline {
            config: ClusterConfigBaseline {
                private_cluster: Some(true),
                ..Default::default()
            },
            ..Default::default()
        };
        let drifts = compare_cluster(&cluster(), &baseline);
        assert_eq!(drifts.len(), 1);
        assert_eq!(drifts[0].severity, Severity::Critical);
        assert_eq!(drifts[0].actual, "false");
    }

    #[test]
    fn master_authorized_networks_compare_as_sets() {
        let baseline = ClusterBaseline {
            config: ClusterConfigBaseline {
                master_authorized_networks: vec![
                    "203.0.113.0/24".to_string(),
                    "198.51.100.0/24".to_string(),
                ],
                ..Default::default()
            },
            ..Default::default()
        };
        let drifts = compare_cluster(&cluster(), &baseline);
        assert_eq!(drifts.len(), 1);
        assert_eq!(drifts[0].field, "cluster.master_authorized_networks");
        assert_eq!(drifts[0].severity, Severity::High);
        assert!(drifts[0].expected.contains("198.51.100.0/24"));
    }

    #[test]
    fn node_pool_drift_carries_the_pool_name() {
        let baseline = ClusterBaseline {
            node_pool: Some(NodePoolBaseline {
                machine_type: Some("n2-standard-8".to_string()),
                auto_upgrade: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let drifts = compare_cluster(&cluster(), &baseline);
        assert_eq!(drifts.len(), 2);
        assert_eq!(drifts[0].field, "nodepool[default-pool].machine_type");
        assert_eq!(drifts[0].severity, Severity::High);
        assert_eq!(drifts[1].field, "nodepool[default-pool].auto_upgrade");
    }

    #[test]
    fn unset_monitoring_record_skips_children() {
        let baseline = ClusterBaseline {
            config: ClusterConfigBaseline {
                monitoring: Some(crate::baseline::MonitoringBaseline {
                    system_metrics: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        // Cluster carries no monitoring record, so nothing is compared.
        assert!(compare_cluster(&cluster(), &baseline).is_empty());
    }
}
