use std::collections::BTreeMap;

use tracing::warn;

use crate::error::ExternalServiceError;
use crate::needs::types::{CategoryScore, FusedNeedsProfile, NeedsCategory, NeedsSignal};

/// Result of the inference-model branch. A failed call is a first-class outcome that
/// fusion handles, never an error for the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutcome {
    Available(Vec<NeedsSignal>),
    Degraded { reason: String },
}

impl ModelOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

impl From<Result<Vec<NeedsSignal>, ExternalServiceError>> for ModelOutcome {
    fn from(result: Result<Vec<NeedsSignal>, ExternalServiceError>) -> Self {
        match result {
            Ok(signals) => Self::Available(signals),
            Err(err) => Self::Degraded {
                reason: err.to_string(),
            },
        }
    }
}

fn max_confidence(signals: &[NeedsSignal]) -> f64 {
    signals.iter().map(|s| s.confidence).fold(0.0, f64::max)
}

fn merge_into(categories: &mut BTreeMap<NeedsCategory, CategoryScore>, signals: &[NeedsSignal]) {
    for signal in signals {
        for (&category, &score) in &signal.scores {
            let candidate = CategoryScore {
                score: score.clamp(0.0, 1.0),
                source: signal.source,
            };
            categories
                .entry(category)
                .and_modify(|current| {
                    if candidate.outranks(current) {
                        *current = candidate;
                    }
                })
                .or_insert(candidate);
        }
    }
}

/// Merges per-source signals into one profile. Pure and idempotent.
///
/// The local estimate per category is the rule score, replaced by the cultural score
/// wherever the cultural tables re-weighted it. The model then competes with that
/// estimate: the higher score wins, the model on ties. Overall confidence is the max
/// of rule and model confidence, or the rule confidence alone when the model branch
/// degraded. Raw rule signals are kept in `signals` either way.
pub fn fuse(
    rule: &[NeedsSignal],
    model: &ModelOutcome,
    cultural: &[NeedsSignal],
) -> FusedNeedsProfile {
    let model_signals: &[NeedsSignal] = match model {
        ModelOutcome::Available(signals) => signals,
        ModelOutcome::Degraded { .. } => &[],
    };

    let mut categories: BTreeMap<NeedsCategory, CategoryScore> = BTreeMap::new();
    merge_into(&mut categories, rule);

    let mut adjusted = BTreeMap::new();
    merge_into(&mut adjusted, cultural);
    for (category, candidate) in adjusted {
        match categories.get_mut(&category) {
            Some(current) if current.score != candidate.score => *current = candidate,
            Some(_) => {}
            None => {
                categories.insert(category, candidate);
            }
        }
    }

    merge_into(&mut categories, model_signals);

    let rule_confidence = max_confidence(rule);
    let (confidence, degraded_reason) = match model {
        ModelOutcome::Available(signals) => (rule_confidence.max(max_confidence(signals)), None),
        ModelOutcome::Degraded { reason } => {
            warn!(reason = %reason, "model analyzer unavailable, fusing rule and cultural signals only");
            (rule_confidence, Some(reason.clone()))
        }
    };

    let signals = rule
        .iter()
        .chain(model_signals)
        .chain(cultural)
        .cloned()
        .collect();

    FusedNeedsProfile {
        categories,
        confidence,
        fallback_used: degraded_reason.is_some(),
        degraded_reason,
        signals,
    }
}
