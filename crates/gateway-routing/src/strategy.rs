//! Preference orderings per routing strategy.
//!
//! Every ordering is a stable sort over candidates given in declaration
//! order, so equal keys keep configuration order and identical inputs always
//! produce the same result.

use gateway_core::{EndpointDescriptor, RoutingStrategy};
use std::collections::HashSet;
use std::sync::Arc;

type Candidate = Arc<EndpointDescriptor>;

/// Order `candidates` by preference under `strategy`.
///
/// `candidates` must already be filtered to routable providers serving the
/// model, in declaration order. Providers a strategy refuses (cloud under
/// `local-first` without fallback) are dropped.
#[must_use]
pub fn preference_order(
    strategy: RoutingStrategy,
    candidates: &[Candidate],
    allow_cloud_fallback: bool,
) -> Vec<Candidate> {
    match strategy {
        RoutingStrategy::CostOptimized => by_cost(candidates),
        RoutingStrategy::LatencyOptimized => by_latency(candidates),
        RoutingStrategy::LocalFirst => local_first(candidates, allow_cloud_fallback),
        RoutingStrategy::Balanced => balanced(candidates),
        RoutingStrategy::QualityOptimized => {
            let mut ordered = candidates.to_vec();
            ordered.sort_by_key(|e| e.priority_tier);
            ordered
        }
    }
}

fn by_cost(candidates: &[Candidate]) -> Vec<Candidate> {
    let mut ordered = candidates.to_vec();
    ordered.sort_by(|a, b| a.unit_cost.total_cmp(&b.unit_cost));
    ordered
}

fn by_latency(candidates: &[Candidate]) -> Vec<Candidate> {
    let mut ordered = candidates.to_vec();
    ordered.sort_by_key(|e| e.avg_latency_ms);
    ordered
}

fn local_first(candidates: &[Candidate], allow_cloud_fallback: bool) -> Vec<Candidate> {
    let local: Vec<Candidate> = candidates
        .iter()
        .filter(|e| e.is_self_hosted())
        .cloned()
        .collect();

    if !local.is_empty() || !allow_cloud_fallback {
        return local;
    }
    by_cost(candidates)
}

fn balanced(candidates: &[Candidate]) -> Vec<Candidate> {
    let cost = by_cost(candidates);
    let latency = by_latency(candidates);

    let mut seen = HashSet::new();
    let mut ordered = Vec::with_capacity(candidates.len());
    for (cheap, fast) in cost.iter().zip(latency.iter()) {
        for endpoint in [cheap, fast] {
            if seen.insert(endpoint.provider_id.clone()) {
                ordered.push(Arc::clone(endpoint));
            }
        }
    }
    ordered
}
