//! GKE cluster discovery.

use std::collections::BTreeMap;

use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use serde_json::Value;

use crate::discovery::{bool_field, fetch_json, i64_field, str_field};
use crate::report::ScanFailure;
use crate::resource::{
    Autoscaling, ClusterConfig, ClusterInstance, ClusterLogging, ClusterMonitoring,
    IpAllocationPolicy, NodePool,
};

const CONTAINER_BASE: &str = "https://container.googleapis.com/v1";

pub async fn discover_clusters(
    client: &Client,
    token: &str,
    projects: &[String],
    limit: usize,
) -> (Vec<ClusterInstance>, Vec<ScanFailure>) {
    let results: Vec<_> = stream::iter(projects.iter().cloned())
        .map(|project| async move {
            let discovered = discover_project(client, token, &project).await;
            (project, discovered)
        })
        .buffer_unordered(limit.max(1))
        .collect()
        .await;

    let mut clusters = Vec::new();
    let mut failures = Vec::new();
    for (project, result) in results {
        match result {
            Ok(found) => clusters.extend(found),
            Err(error) => failures.push(ScanFailure {
                resource: project,
                error: error.to_string(),
            }),
        }
    }

    clusters.sort_by(|a, b| a.identity().cmp(&b.identity()));
    (clusters, failures)
}

async fn discover_project(
    client: &Client,
    token: &str,
    project: &str,
) -> anyhow::Result<Vec<ClusterInstance>> {
    let url = format!("{CONTAINER_BASE}/projects/{project}/locations/-/clusters");
    let payload = fetch_json(client, &url, token).await?;

    let mut clusters = Vec::new();
    for item in payload
        .get("clusters")
        .and_then(Value::as_array)
        .unwrap_or(&Vec::new())
    {
        clusters.push(extract_cluster(project, item));
    }
    Ok(clusters)
}

fn extract_cluster(project: &str, item: &Value) -> ClusterInstance {
    let labels: BTreeMap<String, String> = item
        .get("resourceLabels")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    ClusterInstance {
        project: project.to_string(),
        name: str_field(item, "name"),
        location: str_field(item, "location"),
        status: str_field(item, "status"),
        labels,
        config: extract_config(item),
        node_pools: extract_node_pools(item),
    }
}

fn extract_config(item: &Value) -> ClusterConfig {
    let empty = Value::Null;
    let network_config = item.get("networkConfig").unwrap_or(&empty);
    let private_config = item.get("privateClusterConfig").unwrap_or(&empty);

    let master_authorized_networks = item
        .get("masterAuthorizedNetworksConfig")
        .and_then(|config| config.get("cidrBlocks"))
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .map(|block| str_field(block, "cidrBlock"))
                .filter(|cidr| !cidr.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let ip_allocation_policy = item.get("ipAllocationPolicy").map(|policy| IpAllocationPolicy {
        use_ip_aliases: bool_field(policy, "useIpAliases"),
        cluster_ipv4_cidr: str_field(policy, "clusterIpv4CidrBlock"),
        services_ipv4_cidr: str_field(policy, "servicesIpv4CidrBlock"),
        stack_type: str_field(policy, "stackType"),
    });

    let logging = item.get("loggingConfig").map(|config| {
        let components = enabled_components(config);
        ClusterLogging {
            system_logs: components.iter().any(|c| c == "SYSTEM_COMPONENTS"),
            workload_logs: components.iter().any(|c| c == "WORKLOADS"),
        }
    });

    let monitoring = item.get("monitoringConfig").map(|config| {
        let components = enabled_components(config);
        ClusterMonitoring {
            system_metrics: components.iter().any(|c| c == "SYSTEM_COMPONENTS"),
            apiserver_metrics: components.iter().any(|c| c == "APISERVER"),
            controller_metrics: components.iter().any(|c| c == "CONTROLLER_MANAGER"),
            scheduler_metrics: components.iter().any(|c| c == "SCHEDULER"),
        }
    });

    ClusterConfig {
        master_version: str_field(item, "currentMasterVersion"),
        release_channel: item
            .get("releaseChannel")
            .map(|channel| str_field(channel, "channel"))
            .unwrap_or_default(),
        network: str_field(item, "network"),
        subnetwork: str_field(item, "subnetwork"),
        private_cluster: bool_field(private_config, "enablePrivateNodes"),
        master_global_access: private_config
            .get("masterGlobalAccessConfig")
            .map(|config| bool_field(config, "enabled"))
            .unwrap_or(false),
        master_authorized_networks,
        datapath_provider: str_field(network_config, "datapathProvider"),
        ip_allocation_policy,
        workload_identity: item
            .get("workloadIdentityConfig")
            .and_then(|config| config.get("workloadPool"))
            .and_then(Value::as_str)
            .map(|pool| !pool.is_empty())
            .unwrap_or(false),
        network_policy: item
            .get("networkPolicy")
            .map(|policy| bool_field(policy, "enabled"))
            .unwrap_or(false),
        binary_authorization: item
            .get("binaryAuthorization")
            .map(|auth| bool_field(auth, "enabled"))
            .unwrap_or(false),
        shielded_nodes: item
            .get("shieldedNodes")
            .map(|nodes| bool_field(nodes, "enabled"))
            .unwrap_or(false),
        database_encryption: item
            .get("databaseEncryption")
            .map(|enc| str_field(enc, "state") == "ENCRYPTED")
            .unwrap_or(false),
        security_posture: item
            .get("securityPostureConfig")
            .map(|posture| str_field(posture, "mode"))
            .unwrap_or_default(),
        logging,
        monitoring,
    }
}

fn enabled_components(config: &Value) -> Vec<String> {
    config
        .get("componentConfig")
        .and_then(|component| component.get("enableComponents"))
        .and_then(Value::as_array)
        .map(|components| {
            components
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn extract_node_pools(item: &Value) -> Vec<NodePool> {
    let mut pools = Vec::new();
    for pool in item
        .get("nodePools")
        .and_then(Value::as_array)
        .unwrap_or(&Vec::new())
    {
        let empty = Value::Null;
        let node_config = pool.get("config").unwrap_or(&empty);
        let management = pool.get("management").unwrap_or(&empty);

        let labels: BTreeMap<String, String> = node_config
            .get("labels")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let taints = node_config
            .get("taints")
            .and_then(Value::as_array)
            .map(|taints| {
                taints
                    .iter()
                    .map(|taint| {
                        format!(
                            "{}={}:{}",
                            str_field(taint, "key"),
                            str_field(taint, "value"),
                            str_field(taint, "effect")
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        let autoscaling = pool
            .get("autoscaling")
            .filter(|scaling| bool_field(scaling, "enabled"))
            .map(|scaling| Autoscaling {
                enabled: true,
                min_node_count: i64_field(scaling, "minNodeCount"),
                max_node_count: i64_field(scaling, "maxNodeCount"),
            });

        pools.push(NodePool {
            name: str_field(pool, "name"),
            version: str_field(pool, "version"),
            machine_type: str_field(node_config, "machineType"),
            disk_size_gb: i64_field(node_config, "diskSizeGb"),
            disk_type: str_field(node_config, "diskType"),
            image_type: str_field(node_config, "imageType"),
            initial_node_count: i64_field(pool, "initialNodeCount"),
            autoscaling,
            auto_upgrade: bool_field(management, "autoUpgrade"),
            auto_repair: bool_field(management, "autoRepair"),
            service_account: str_field(node_config, "serviceAccount"),
            labels,
            taints,
        });
    }
    pools
}
