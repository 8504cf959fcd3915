//! Partitions discovered resources across an ordered list of baselines.
//!
//! Every key in a baseline's label filter must exist on the resource with an
//! exactly equal value; an empty filter matches everything. Baselines claim
//! resources in list order and a claimed resource is never evaluated again,
//! so the first-listed baseline wins ties deterministically.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::resource::{ClusterInstance, DatabaseInstance};

/// A resource snapshot that can be routed by its label mapping.
pub trait Labeled {
    fn labels(&self) -> &BTreeMap<String, String>;
    fn identity(&self) -> String;
}

impl Labeled for DatabaseInstance {
    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    fn identity(&self) -> String {
        DatabaseInstance::identity(self)
    }
}

impl Labeled for ClusterInstance {
    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    fn identity(&self) -> String {
        ClusterInstance::identity(self)
    }
}

/// A baseline that can claim resources via an optional label filter.
pub trait BaselineSelector {
    fn name(&self) -> &str;
    fn filter_labels(&self) -> &BTreeMap<String, String>;
}

pub fn matches_labels(labels: &BTreeMap<String, String>, filter: &BTreeMap<String, String>) -> bool {
    filter
        .iter()
        .all(|(key, value)| labels.get(key).map(|actual| actual == value).unwrap_or(false))
}

/// Produces exactly one (resource, baseline) pairing per resource. Resources
/// matching no baseline come last with `baseline: None` so the caller can
/// still count them and fall back to best-practice advisories.
pub fn pair_with_baselines<'a, R, B>(
    resources: &'a [R],
    baselines: &'a [B],
) -> Vec<(&'a R, Option<&'a B>)>
where
    R: Labeled,
    B: BaselineSelector,
{
    let mut claimed: BTreeSet<String> = BTreeSet::new();
    let mut paired = Vec::with_capacity(resources.len());

    for baseline in baselines {
        for resource in resources {
            let key = resource.identity();
            if claimed.contains(&key) {
                continue;
            }
            if !matches_labels(resource.labels(), baseline.filter_labels()) {
                continue;
            }
            claimed.insert(key);
            paired.push((resource, Some(baseline)));
        }
    }

    for resource in resources {
        if !claimed.contains(&resource.identity()) {
            paired.push((resource, None));
        }
    }

    paired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::{InstanceBaseline, InstanceConfigBaseline};
    use crate::resource::DatabaseConfig;

    fn labeled(name: &str, labels: &[(&str, &str)]) -> DatabaseInstance {
        DatabaseInstance {
            project: "demo".to_string(),
            name: name.to_string(),
            region: "us-east1".to_string(),
            state: "RUNNABLE".to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            databases: Vec::new(),
            config: DatabaseConfig::default(),
            maintenance_window: None,
        }
    }

    fn baseline(name: &str, filter: &[(&str, &str)]) -> InstanceBaseline {
        InstanceBaseline {
            name: name.to_string(),
            filter_labels: filter
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            config: InstanceConfigBaseline::default(),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let labels = [("env".to_string(), "prod".to_string())].into_iter().collect();
        assert!(matches_labels(&labels, &BTreeMap::new()));
    }

    #[test]
    fn missing_key_never_matches() {
        let labels: BTreeMap<String, String> =
            [("env".to_string(), "prod".to_string())].into_iter().collect();
        let filter: BTreeMap<String, String> =
            [("role".to_string(), "vault".to_string())].into_iter().collect();
        assert!(!matches_labels(&labels, &filter));
    }

    #[test]
    fn value_mismatch_never_matches() {
        let labels: BTreeMap<String, String> =
            [("env".to_string(), "dev".to_string())].into_iter().collect();
        let filter: BTreeMap<String, String> =
            [("env".to_string(), "prod".to_string())].into_iter().collect();
        assert!(!matches_labels(&labels, &filter));
    }

    #[test]
    fn first_listed_baseline_claims_the_resource() {
        let instances = vec![
            labeled("vault-db", &[("role", "vault")]),
            labeled("app-db", &[("role", "app")]),
        ];
        let baselines = vec![
            baseline("vault", &[("role", "vault")]),
            baseline("catch-all", &[]),
        ];

        let paired = pair_with_baselines(&instances, &baselines);
        assert_eq!(paired.len(), 2);

        let vault = paired
            .iter()
            .find(|(resource, _)| resource.name == "vault-db")
            .expect("vault-db paired");
        assert_eq!(vault.1.map(|b| b.name.as_str()), Some("vault"));

        // The labelled instance must never be double-counted by the
        // catch-all baseline listed second.
        let claimed_by_catch_all = paired
            .iter()
            .filter(|(_, b)| b.map(|b| b.name.as_str()) == Some("catch-all"))
            .count();
        assert_eq!(claimed_by_catch_all, 1);
    }

    #[test]
    fn unmatched_resources_are_kept_without_a_baseline() {
        let instances = vec![labeled("stray-db", &[("role", "scratch")])];
        let baselines = vec![baseline("vault", &[("role", "vault")])];

        let paired = pair_with_baselines(&instances, &baselines);
        assert_eq!(paired.len(), 1);
        assert!(paired[0].1.is_none());
    }
}
