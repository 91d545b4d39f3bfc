//! Installation-Order Resolver (§4.4): builds a dependency graph over
//! declared Features' soft `installsAfter` edges and emits a topological
//! order with a deterministic lexicographic tie-break.

use crate::errors::ResolverError;
use crate::features::{FeatureSet, FeatureSetRef, InstallationPlan, ResolvedFeature};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, instrument};

/// Resolve the installation order across every Feature in every given set.
///
/// Unknown ids named in `installsAfter` are silently ignored (soft edges).
/// A node with nonzero indegree once the main loop drains is a cycle.
#[instrument(level = "debug", skip(feature_sets))]
pub fn resolve_installation_order(
    feature_sets: &[FeatureSet],
) -> Result<InstallationPlan, ResolverError> {
    let mut nodes: BTreeMap<String, (ResolvedFeature, Vec<String>)> = BTreeMap::new();

    for set in feature_sets {
        let set_ref = FeatureSetRef {
            internal_version: set.internal_version.clone(),
            computed_digest: set.computed_digest.clone(),
        };
        for feature in &set.features {
            let cache_path = feature.cache_path.clone().unwrap_or_default();
            let resolved = ResolvedFeature {
                feature: feature.clone(),
                feature_set: set_ref.clone(),
                cache_path,
                consecutive_id: 0,
            };
            nodes.insert(
                feature.id.clone(),
                (resolved, feature.installs_after.clone()),
            );
        }
    }

    let known_ids: BTreeSet<String> = nodes.keys().cloned().collect();

    // indegree[f] counts edges dep -> f for deps that resolve to known nodes.
    let mut indegree: HashMap<String, usize> = HashMap::new();
    // successors[dep] lists the nodes that must wait on dep.
    let mut successors: HashMap<String, Vec<String>> = HashMap::new();
    for id in &known_ids {
        indegree.entry(id.clone()).or_insert(0);
    }
    for (id, (_, installs_after)) in &nodes {
        for dep in installs_after {
            if known_ids.contains(dep) {
                *indegree.entry(id.clone()).or_insert(0) += 1;
                successors.entry(dep.clone()).or_default().push(id.clone());
            }
        }
    }

    let mut frontier: Vec<String> = known_ids
        .iter()
        .filter(|id| indegree[*id] == 0)
        .cloned()
        .collect();
    frontier.sort();

    let mut emitted: BTreeSet<String> = BTreeSet::new();
    let mut order: Vec<String> = Vec::new();

    while !frontier.is_empty() {
        frontier.sort();
        let front = std::mem::take(&mut frontier);
        for id in &front {
            order.push(id.clone());
            emitted.insert(id.clone());
        }
        let mut next_frontier = BTreeSet::new();
        for id in &front {
            if let Some(succs) = successors.get(id) {
                for succ in succs {
                    let entry = indegree.get_mut(succ).expect("known node");
                    *entry -= 1;
                    if *entry == 0 && !emitted.contains(succ) {
                        next_frontier.insert(succ.clone());
                    }
                }
            }
        }
        frontier = next_frontier.into_iter().collect();
    }

    for id in &order {
        indegree.remove(id);
    }
    let remaining: Vec<String> = indegree.keys().cloned().collect();
    if !remaining.is_empty() {
        let mut ids = remaining;
        ids.sort();
        return Err(ResolverError::Cycle { ids });
    }

    debug!(order = ?order, "resolved installation order");

    let mut ordered = Vec::with_capacity(order.len());
    for (consecutive_id, id) in order.into_iter().enumerate() {
        let (mut resolved, _) = nodes.remove(&id).expect("node present");
        resolved.consecutive_id = consecutive_id as u64;
        ordered.push(resolved);
    }

    Ok(InstallationPlan { ordered })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_ref::SourceInformation;
    use crate::features::Feature;

    fn feature(id: &str, installs_after: &[&str]) -> Feature {
        Feature {
            id: id.to_string(),
            installs_after: installs_after.iter().map(|s| s.to_string()).collect(),
            ..Feature::minimal(id)
        }
    }

    fn set(features: Vec<Feature>) -> FeatureSet {
        FeatureSet {
            features,
            source_information: SourceInformation::Cached {
                user_feature_id: "test".to_string(),
            },
            internal_version: "2".to_string(),
            computed_digest: None,
        }
    }

    #[test]
    fn lexicographic_tie_break_on_roots() {
        let plan = resolve_installation_order(&[set(vec![
            feature("c", &[]),
            feature("a", &[]),
            feature("b", &["a"]),
        ])])
        .unwrap();
        let ids: Vec<_> = plan.ordered.iter().map(|r| r.feature.id.clone()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }

    #[test]
    fn unknown_installs_after_is_soft() {
        let plan = resolve_installation_order(&[set(vec![feature("a", &["nonexistent"])])]).unwrap();
        assert_eq!(plan.ordered.len(), 1);
        assert_eq!(plan.ordered[0].feature.id, "a");
    }

    #[test]
    fn cycle_is_rejected() {
        let err = resolve_installation_order(&[set(vec![
            feature("a", &["b"]),
            feature("b", &["a"]),
        ])])
        .unwrap_err();
        match err {
            ResolverError::Cycle { ids } => {
                assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
            }
        }
    }

    #[test]
    fn islands_join_the_emission_front() {
        let plan = resolve_installation_order(&[set(vec![
            feature("z", &[]),
            feature("root", &[]),
            feature("leaf", &["root"]),
        ])])
        .unwrap();
        let ids: Vec<_> = plan.ordered.iter().map(|r| r.feature.id.clone()).collect();
        // "root" and "z" both have indegree 0 and emit together in the first
        // front, lexicographically ordered; "leaf" only becomes ready once
        // "root" has emitted.
        assert_eq!(ids, vec!["root", "z", "leaf"]);
    }

    #[test]
    fn consecutive_ids_follow_emission_order() {
        let plan = resolve_installation_order(&[set(vec![feature("a", &[]), feature("b", &["a"])])])
            .unwrap();
        assert_eq!(plan.ordered[0].consecutive_id, 0);
        assert_eq!(plan.ordered[1].consecutive_id, 1);
    }
}
