use tracing::warn;

use crate::error::ConfigurationError;
use crate::needs::config::{CategoryWeights, CulturalWeights};
use crate::needs::types::{CulturalContext, NeedsSignal, SignalSource};

pub struct CulturalAdjuster {
    weights: CulturalWeights,
}

impl CulturalAdjuster {
    pub fn new(weights: CulturalWeights) -> Self {
        Self { weights }
    }

    /// Reweights `signals` by the table for `cultural_tag`. Unknown tags are neutral.
    pub fn adjust(&self, signals: &[NeedsSignal], cultural_tag: &str) -> Vec<NeedsSignal> {
        let culture = self.culture_weights(cultural_tag).unwrap_or_else(|err| {
            warn!(error = %err, "applying neutral cultural weights");
            None
        });
        apply(signals, &[culture])
    }

    /// Applies both the cultural-background and socioeconomic tables of `context`.
    pub fn adjust_for_context(
        &self,
        signals: &[NeedsSignal],
        context: &CulturalContext,
    ) -> Vec<NeedsSignal> {
        let culture = self
            .culture_weights(&context.cultural_background)
            .unwrap_or_else(|err| {
                warn!(error = %err, "applying neutral cultural weights");
                None
            });
        let socioeconomic = self
            .socioeconomic_weights(&context.socioeconomic_context)
            .unwrap_or_else(|err| {
                warn!(error = %err, "applying neutral socioeconomic weights");
                None
            });
        apply(signals, &[culture, socioeconomic])
    }

    fn culture_weights(&self, tag: &str) -> Result<Option<&CategoryWeights>, ConfigurationError> {
        lookup(&self.weights.by_culture, tag)
            .map(Some)
            .ok_or_else(|| ConfigurationError::UnknownCulture(tag.to_string()))
    }

    fn socioeconomic_weights(
        &self,
        tag: &str,
    ) -> Result<Option<&CategoryWeights>, ConfigurationError> {
        lookup(&self.weights.by_socioeconomic, tag)
            .map(Some)
            .ok_or_else(|| ConfigurationError::UnknownSocioeconomicContext(tag.to_string()))
    }
}

impl Default for CulturalAdjuster {
    fn default() -> Self {
        Self::new(CulturalWeights::default())
    }
}

fn lookup<'a>(
    table: &'a std::collections::BTreeMap<String, CategoryWeights>,
    tag: &str,
) -> Option<&'a CategoryWeights> {
    let key = tag.trim().to_lowercase().replace([' ', '_'], "-");
    table.get(&key)
}

fn apply(signals: &[NeedsSignal], tables: &[Option<&CategoryWeights>]) -> Vec<NeedsSignal> {
    signals
        .iter()
        .map(|signal| {
            let scores = signal
                .scores
                .iter()
                .map(|(category, score)| {
                    let weight: f64 = tables
                        .iter()
                        .flatten()
                        .filter_map(|table| table.get(category))
                        .product();
                    (*category, (score * weight).clamp(0.0, 1.0))
                })
                .collect();
            NeedsSignal {
                scores,
                confidence: signal.confidence,
                source: SignalSource::Cultural,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::needs::types::NeedsCategory;

    fn rule_signal() -> NeedsSignal {
        let mut signal = NeedsSignal::single(
            NeedsCategory::LowEngagement,
            0.8,
            0.7,
            SignalSource::Rule,
        );
        signal.scores.insert(NeedsCategory::ReadingProcessingDifficulty, 0.6);
        signal
    }

    #[test]
    fn test_known_culture_downweights_engagement() {
        let adjusted = CulturalAdjuster::default().adjust(&[rule_signal()], "East-Asian");
        assert_eq!(adjusted.len(), 1);
        assert_eq!(adjusted[0].source, SignalSource::Cultural);
        let engagement = adjusted[0].score(NeedsCategory::LowEngagement).unwrap();
        assert!((engagement - 0.56).abs() < 1e-9);
        assert_eq!(adjusted[0].score(NeedsCategory::ReadingProcessingDifficulty), Some(0.6));
        assert_eq!(adjusted[0].confidence, 0.7);
    }

    #[test]
    fn test_unknown_culture_is_neutral() {
        let adjusted = CulturalAdjuster::default().adjust(&[rule_signal()], "atlantean");
        assert_eq!(adjusted[0].score(NeedsCategory::LowEngagement), Some(0.8));
    }

    #[test]
    fn test_context_applies_both_tables() {
        let context = CulturalContext {
            language: "hi".into(),
            cultural_background: "south-asian".into(),
            socioeconomic_context: "low-income".into(),
        };
        let adjusted = CulturalAdjuster::default().adjust_for_context(&[rule_signal()], &context);
        let engagement = adjusted[0].score(NeedsCategory::LowEngagement).unwrap();
        assert!((engagement - 0.8 * 0.8 * 0.8).abs() < 1e-9);
    }
}
