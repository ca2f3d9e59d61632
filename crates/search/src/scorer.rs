use crate::config::RelevanceConfig;
use crate::factor::RelevanceFactor;
use crate::proximity::directory_proximity;
use crate::signals::RelevanceSignals;
use crate::terms::matching_terms;
use context_protocol::{CandidateFile, FileSelection};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevanceScore {
    pub path: String,
    pub score: f64,
    /// Only factors that contributed a non-zero amount.
    pub factors: BTreeMap<RelevanceFactor, f64>,
}

impl RelevanceScore {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            score: 0.0,
            factors: BTreeMap::new(),
        }
    }

    fn add(&mut self, factor: RelevanceFactor, amount: f64) {
        if amount == 0.0 {
            return;
        }
        self.score += amount;
        *self.factors.entry(factor).or_insert(0.0) += amount;
    }
}

/// Scores every candidate and returns them best first.
///
/// Pure: equal inputs give equal output, ties ordered by path.
pub fn score(
    candidates: &[CandidateFile],
    signals: &RelevanceSignals,
    config: &RelevanceConfig,
) -> Vec<RelevanceScore> {
    let mut scored: Vec<RelevanceScore> = candidates
        .iter()
        .map(|candidate| score_one(&candidate.path, signals, config))
        .collect();
    scored.sort_by(compare_scores);
    scored.dedup_by(|a, b| a.path == b.path);
    scored
}

/// Top `config.max_candidates` of [`score`] as whole-file selections.
pub fn rank(
    candidates: &[CandidateFile],
    signals: &RelevanceSignals,
    config: &RelevanceConfig,
) -> Vec<FileSelection> {
    let scored = score(candidates, signals, config);
    log::debug!(
        "Ranked {} candidates; top: {:?}",
        scored.len(),
        scored.first().map(|s| (&s.path, s.score))
    );
    scored
        .into_iter()
        .take(config.max_candidates)
        .map(|s| FileSelection::whole(s.path))
        .collect()
}

fn score_one(path: &str, signals: &RelevanceSignals, config: &RelevanceConfig) -> RelevanceScore {
    let mut result = RelevanceScore::new(path);
    let mut apply = |factor: RelevanceFactor, units: f64| {
        if units == 0.0 {
            return;
        }
        if let Some(weight) = config.effective_weight(factor) {
            result.add(factor, weight * units);
        }
    };
    let hit = |matched: bool| if matched { 1.0 } else { 0.0 };

    apply(RelevanceFactor::ActiveFile, hit(signals.is_active(path)));

    let symbols = &signals.symbols;
    apply(
        RelevanceFactor::Definition,
        hit(symbols.definitions.contains(path)),
    );
    apply(
        RelevanceFactor::TypeDefinition,
        hit(symbols.type_definitions.contains(path)),
    );
    apply(
        RelevanceFactor::Implementation,
        hit(symbols.implementations.contains(path)),
    );
    apply(
        RelevanceFactor::ReferencedType,
        hit(symbols.referenced_types.contains(path)),
    );
    apply(
        RelevanceFactor::CallHierarchy,
        hit(symbols.call_hierarchy.contains(path)),
    );

    apply(
        RelevanceFactor::ForwardDependency,
        hit(signals.is_forward_dependency(path)),
    );
    apply(
        RelevanceFactor::ReverseDependency,
        hit(signals.is_reverse_dependency(path)),
    );

    if let Some(active) = signals.active_file.as_deref() {
        let proximity = directory_proximity(active, path);
        apply(RelevanceFactor::SameDirectory, hit(proximity.same_directory));
        apply(RelevanceFactor::NeighborDirectory, hit(proximity.neighbor));
        apply(
            RelevanceFactor::SharedAncestor,
            proximity.shared_segments as f64,
        );
    }

    apply(
        RelevanceFactor::QueryTerm,
        matching_terms(path, &signals.query_terms) as f64,
    );

    result
}

fn compare_scores(a: &RelevanceScore, b: &RelevanceScore) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.path.cmp(&b.path))
}
