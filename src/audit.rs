//! Audit orchestration.
//!
//! Discovery fans out across worker tasks bounded by the configured
//! concurrency limit; evaluation is a pure pass over the collected snapshots
//! and the report is assembled only after every worker has reported back.
//! Collaborator failures are folded into the report, never propagated as a
//! batch abort.

use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::analyzer::advisor::{advise, best_practice_advisories};
use crate::analyzer::gke::compare_cluster;
use crate::analyzer::matcher::pair_with_baselines;
use crate::analyzer::sql::compare_instance;
use crate::baseline::BaselineSet;
use crate::config::Config;
use crate::discovery;
use crate::report::{
    DriftReport, ResourceDriftRecord, ScanFailure, SchemaAuditRecord, SchemaAuditReport,
};
use crate::schema::inspect::inspect_database;
use crate::schema::validator::validate_schema;
use crate::store::{content_hash, ResourceKind, SnapshotStore};

/// Projects come from the baselines document first, the app config second.
pub fn effective_projects(config: &Config, baselines: &BaselineSet) -> Vec<String> {
    if !baselines.projects.is_empty() {
        return baselines.projects.clone();
    }
    config.scan.projects.clone()
}

/// Persists one snapshot per resource, skipping writes when the content hash
/// matches the last stored copy.
fn cache_snapshots<T, I>(store: Option<&SnapshotStore>, kind: ResourceKind, snapshots: I)
where
    T: serde::Serialize,
    I: IntoIterator<Item = (String, T)>,
{
    let Some(store) = store else {
        return;
    };
    for (identity, snapshot) in snapshots {
        let hash = content_hash(&snapshot);
        let unchanged = matches!(
            store.latest_snapshot_hash(kind, &identity),
            Ok(Some(previous)) if previous == hash
        );
        if unchanged {
            continue;
        }
        if let Err(error) = store.insert_snapshot(kind, &identity, &snapshot) {
            warn!("failed caching snapshot for {identity}: {error}");
        }
    }
}

pub async fn run_sql_audit(
    config: &Config,
    baselines: &BaselineSet,
    store: Option<&SnapshotStore>,
) -> anyhow::Result<DriftReport> {
    let client = discovery::http_client(config.scan.request_timeout_secs)?;
    let token = discovery::access_token(config)?;
    let projects = effective_projects(config, baselines);

    let (instances, failures) = discovery::sql::discover_instances(
        &client,
        &token,
        &projects,
        config.scan.max_concurrent_scans,
    )
    .await;
    info!(
        "discovered {} database instances across {} projects",
        instances.len(),
        projects.len()
    );
    cache_snapshots(
        store,
        ResourceKind::Sql,
        instances.iter().map(|i| (i.identity(), i)),
    );

    let mut records = Vec::with_capacity(instances.len());
    for (instance, baseline) in pair_with_baselines(&instances, &baselines.sql) {
        let (drifts, advisories, baseline_name) = match baseline {
            Some(baseline) => {
                let drifts = compare_instance(instance, &baseline.config);
                let advisories = advise(&drifts);
                (drifts, advisories, Some(baseline.name.clone()))
            }
            None => (
                Vec::new(),
                best_practice_advisories(instance),
                None,
            ),
        };
        records.push(ResourceDriftRecord {
            project: instance.project.clone(),
            name: instance.name.clone(),
            location: instance.region.clone(),
            state: instance.state.clone(),
            labels: instance.labels.clone(),
            baseline: baseline_name,
            drifts,
            advisories,
        });
    }

    Ok(DriftReport::from_records(records, failures))
}

pub async fn run_gke_audit(
    config: &Config,
    baselines: &BaselineSet,
    store: Option<&SnapshotStore>,
) -> anyhow::Result<DriftReport> {
    let client = discovery::http_client(config.scan.request_timeout_secs)?;
    let token = discovery::access_token(config)?;
    let projects = effective_projects(config, baselines);

    let (clusters, failures) = discovery::gke::discover_clusters(
        &client,
        &token,
        &projects,
        config.scan.max_concurrent_scans,
    )
    .await;
    info!(
        "discovered {} clusters across {} projects",
        clusters.len(),
        projects.len()
    );
    cache_snapshots(
        store,
        ResourceKind::Gke,
        clusters.iter().map(|c| (c.identity(), c)),
    );

    let mut records = Vec::with_capacity(clusters.len());
    for (cluster, baseline) in pair_with_baselines(&clusters, &baselines.gke) {
        let (drifts, advisories, baseline_name) = match baseline {
            Some(baseline) => {
                let drifts = compare_cluster(cluster, baseline);
                let advisories = advise(&drifts);
                (drifts, advisories, Some(baseline.name.clone()))
            }
            None => (Vec::new(), Vec::new(), None),
        };
        records.push(ResourceDriftRecord {
            project: cluster.project.clone(),
            name: cluster.name.clone(),
            location: cluster.location.clone(),
            state: cluster.status.clone(),
            labels: cluster.labels.clone(),
            baseline: baseline_name,
            drifts,
            advisories,
        });
    }

    Ok(DriftReport::from_records(records, failures))
}

/// Runs every configured schema audit, optionally restricted by name. Each
/// audit connects, snapshots the catalog, and validates in its own worker;
/// one unreachable database never aborts the rest.
/// One schema audit inspection, returned alongside its source audit so the
/// caller can pair outcomes back to their baselines.
async fn inspect_one_audit(
    audit: &crate::baseline::SchemaAudit,
) -> (
    &crate::baseline::SchemaAudit,
    anyhow::Result<crate::schema::DatabaseSchema>,
) {
    let outcome = inspect_database(&audit.connection).await;
    (audit, outcome)
}

pub async fn run_schema_audits(
    config: &Config,
    baselines: &BaselineSet,
    only: Option<&str>,
) -> SchemaAuditReport {
    let selected: Vec<_> = baselines
        .schema
        .iter()
        .filter(|audit| only.map(|name| audit.name == name).unwrap_or(true))
        .collect();

    let results: Vec<_> = stream::iter(selected)
        .map(inspect_one_audit)
        .buffer_unordered(config.scan.max_concurrent_scans.max(1))
        .collect()
        .await;

    let mut audits = Vec::new();
    let mut failures = Vec::new();
    for (audit, outcome) in results {
        match outcome {
            Ok(schema) => {
                let result = validate_schema(&schema, Some(&audit.baseline));
                audits.push(SchemaAuditRecord {
                    name: audit.name.clone(),
                    database: schema.database_name.clone(),
                    result,
                });
            }
            Err(error) => failures.push(ScanFailure {
                resource: audit.name.clone(),
                error: format!("{error:#}"),
            }),
        }
    }

    audits.sort_by(|a, b| a.name.cmp(&b.name));
    SchemaAuditReport::from_records(audits, failures)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_audit_with_no_baselines_is_empty() {
        let report = tokio_test::block_on(run_schema_audits(
            &Config::default(),
            &BaselineSet::default(),
            None,
        ));
        assert!(report.audits.is_empty());
        assert!(report.failures.is_empty());
    }

    #[test]
    fn baseline_projects_take_precedence_over_config() {
        let mut config = Config::default();
        config.scan.projects = vec!["from-config".to_string()];
        let mut baselines = BaselineSet::default();
        assert_eq!(
            effective_projects(&config, &baselines),
            vec!["from-config".to_string()]
        );

        baselines.projects = vec!["from-baselines".to_string()];
        assert_eq!(
            effective_projects(&config, &baselines),
            vec!["from-baselines".to_string()]
        );
    }
}
