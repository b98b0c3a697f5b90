use std::collections::BTreeMap;

use crate::needs::config::RuleThresholds;
use crate::needs::types::{NeedsCategory, NeedsSignal, NormalizedFeatureVector, SignalSource};

/// Base score assigned once a rule's thresholds are crossed.
const TRIGGERED_BASE: f64 = 0.5;

/// How far `value` sits above `threshold`, in units of `span`, clamped to [0, 1].
fn excess(value: f64, threshold: f64, span: f64) -> f64 {
    ((value - threshold) / span.max(f64::EPSILON)).clamp(0.0, 1.0)
}

/// Relative shortfall of `value` below `threshold`, clamped to [0, 1].
fn deficit(value: f64, threshold: f64) -> f64 {
    ((threshold - value) / threshold.max(f64::EPSILON)).clamp(0.0, 1.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn threshold_confidence(excesses: &[f64]) -> f64 {
    (TRIGGERED_BASE + 0.5 * mean(excesses)).clamp(0.0, 1.0)
}

pub struct RuleAnalyzer {
    thresholds: RuleThresholds,
}

impl RuleAnalyzer {
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }

    /// Deterministic heuristics over a normalized vector. Never fails; a sensory
    /// preference signal is always present.
    pub fn analyze(&self, vector: &NormalizedFeatureVector) -> Vec<NeedsSignal> {
        let mut signals: Vec<NeedsSignal> = [
            self.reading_processing(vector),
            self.math_processing(vector),
            self.attention_load(vector),
            self.scaffolding(vector),
            self.low_engagement(vector),
            self.processing_speed(vector),
        ]
        .into_iter()
        .flatten()
        .collect();

        signals.push(sensory_preference(vector));
        signals
    }

    fn reading_processing(&self, v: &NormalizedFeatureVector) -> Option<NeedsSignal> {
        let t = &self.thresholds;
        let letter_confusions = v.reading_errors.reversals + v.reading_errors.transpositions;
        if letter_confusions < t.reversal_threshold || v.reading_speed >= t.slow_reading_wpm {
            return None;
        }

        let excesses = [
            excess(letter_confusions, t.reversal_threshold, t.reversal_span),
            deficit(v.reading_speed, t.slow_reading_wpm),
        ];
        let confidence = threshold_confidence(&excesses);
        Some(NeedsSignal::single(
            NeedsCategory::ReadingProcessingDifficulty,
            confidence + v.error_rate,
            confidence,
            SignalSource::Rule,
        ))
    }

    fn math_processing(&self, v: &NormalizedFeatureVector) -> Option<NeedsSignal> {
        let t = &self.thresholds;
        let structural_errors = v.math_errors.conceptual + v.math_errors.procedural;
        if v.math_accuracy >= t.low_math_accuracy || structural_errors < t.math_error_threshold {
            return None;
        }

        let excesses = [
            deficit(v.math_accuracy, t.low_math_accuracy),
            excess(structural_errors, t.math_error_threshold, t.math_error_span),
        ];
        let confidence = threshold_confidence(&excesses);
        Some(NeedsSignal::single(
            NeedsCategory::MathProcessingDifficulty,
            confidence,
            confidence,
            SignalSource::Rule,
        ))
    }

    fn attention_load(&self, v: &NormalizedFeatureVector) -> Option<NeedsSignal> {
        let t = &self.thresholds;
        let short_span = v.attention_span < t.min_attention_minutes;
        let erratic = v.response_times.outliers >= t.outlier_threshold;
        if !short_span && !erratic {
            return None;
        }

        let mut excesses = Vec::with_capacity(2);
        if short_span {
            excesses.push(deficit(v.attention_span, t.min_attention_minutes));
        }
        if erratic {
            excesses.push(excess(v.response_times.outliers, t.outlier_threshold, t.outlier_span));
        }
        let strongest = excesses.iter().copied().fold(0.0, f64::max);
        Some(NeedsSignal::single(
            NeedsCategory::AttentionCognitiveLoad,
            TRIGGERED_BASE + 0.5 * strongest,
            threshold_confidence(&excesses),
            SignalSource::Rule,
        ))
    }

    fn scaffolding(&self, v: &NormalizedFeatureVector) -> Option<NeedsSignal> {
        let t = &self.thresholds;
        if !v.repetition_needed || v.task_completion >= t.low_task_completion {
            return None;
        }

        let excesses = [
            excess(v.help_requests, t.help_request_threshold, t.help_request_span),
            deficit(v.task_completion, t.low_task_completion),
        ];
        let confidence = threshold_confidence(&excesses);
        Some(NeedsSignal::single(
            NeedsCategory::NeedsMoreScaffolding,
            confidence,
            confidence,
            SignalSource::Rule,
        ))
    }

    /// Low completion without any help-seeking.
    fn low_engagement(&self, v: &NormalizedFeatureVector) -> Option<NeedsSignal> {
        let t = &self.thresholds;
        if v.task_completion >= t.disengaged_completion || v.help_requests > 0.0 {
            return None;
        }

        let shortfall = deficit(v.task_completion, t.disengaged_completion);
        Some(NeedsSignal::single(
            NeedsCategory::LowEngagement,
            TRIGGERED_BASE + 0.5 * shortfall,
            threshold_confidence(&[shortfall]),
            SignalSource::Rule,
        ))
    }

    fn processing_speed(&self, v: &NormalizedFeatureVector) -> Option<NeedsSignal> {
        let t = &self.thresholds;
        if v.response_times.mean <= t.slow_response_ms {
            return None;
        }

        let over = excess(v.response_times.mean, t.slow_response_ms, t.slow_response_span_ms);
        Some(NeedsSignal::single(
            NeedsCategory::SlowProcessingSpeed,
            TRIGGERED_BASE + 0.5 * over,
            threshold_confidence(&[over]),
            SignalSource::Rule,
        ))
    }
}

impl Default for RuleAnalyzer {
    fn default() -> Self {
        Self::new(RuleThresholds::default())
    }
}

/// Scores are the normalized triple; confidence is the dominant modality's margin.
fn sensory_preference(v: &NormalizedFeatureVector) -> NeedsSignal {
    let mut shares: Vec<f64> = v.sensory.as_categories().iter().map(|(_, s)| *s).collect();
    shares.sort_by(|a, b| b.total_cmp(a));
    let margin = shares[0] - shares[1];

    let scores: BTreeMap<NeedsCategory, f64> = v
        .sensory
        .as_categories()
        .into_iter()
        .map(|(category, share)| (category, share.clamp(0.0, 1.0)))
        .collect();

    NeedsSignal {
        scores,
        confidence: margin.clamp(0.0, 1.0),
        source: SignalSource::Rule,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::needs::types::{
        CulturalContext, MathErrors, ReadingErrors, ResponseTimeStats, SensoryPreferences,
        SessionContext,
    };

    fn baseline() -> NormalizedFeatureVector {
        NormalizedFeatureVector {
            reading_speed: 90.0,
            reading_accuracy: 0.9,
            reading_comprehension: 0.85,
            math_accuracy: 0.8,
            math_speed: 10.0,
            attention_span: 20.0,
            task_completion: 0.9,
            help_requests: 1.0,
            sensory: SensoryPreferences { auditory: 0.2, visual: 0.5, kinesthetic: 0.3 },
            reading_errors: ReadingErrors {
                substitutions: 0.0,
                omissions: 0.0,
                insertions: 0.0,
                reversals: 0.0,
                transpositions: 0.0,
            },
            math_errors: MathErrors { calculation: 0.0, procedural: 0.0, conceptual: 0.0, visual: 0.0 },
            response_times: ResponseTimeStats { mean: 3000.0, variance: 100.0, outliers: 0.0 },
            cultural: CulturalContext {
                language: "en".into(),
                cultural_background: "western".into(),
                socioeconomic_context: "middle-income".into(),
            },
            session: SessionContext::default(),
            error_rate: 0.0,
            repetition_needed: false,
        }
    }

    fn category_score(signals: &[NeedsSignal], category: NeedsCategory) -> Option<f64> {
        signals.iter().find_map(|s| s.score(category))
    }

    #[test]
    fn test_typical_learner_only_reports_sensory_preference() {
        let signals = RuleAnalyzer::default().analyze(&baseline());
        assert_eq!(signals.len(), 1);
        assert_eq!(category_score(&signals, NeedsCategory::VisualPreference), Some(0.5));
        assert!((signals[0].confidence - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_reading_rule_needs_both_conditions() {
        let mut v = baseline();
        v.reading_errors.reversals = 6.0;
        let signals = RuleAnalyzer::default().analyze(&v);
        assert_eq!(category_score(&signals, NeedsCategory::ReadingProcessingDifficulty), None);

        v.reading_speed = 40.0;
        let signals = RuleAnalyzer::default().analyze(&v);
        let score = category_score(&signals, NeedsCategory::ReadingProcessingDifficulty).unwrap();
        assert!(score > 0.5);
    }

    #[test]
    fn test_reading_score_grows_with_severity() {
        let analyzer = RuleAnalyzer::default();
        let mut mild = baseline();
        mild.reading_errors.reversals = 3.0;
        mild.reading_speed = 55.0;
        let mut severe = mild.clone();
        severe.reading_errors.reversals = 8.0;
        severe.reading_speed = 20.0;

        let mild_score =
            category_score(&analyzer.analyze(&mild), NeedsCategory::ReadingProcessingDifficulty).unwrap();
        let severe_score =
            category_score(&analyzer.analyze(&severe), NeedsCategory::ReadingProcessingDifficulty).unwrap();
        assert!(severe_score > mild_score);
    }

    #[test]
    fn test_scaffolding_rule() {
        let mut v = baseline();
        v.help_requests = 6.0;
        v.repetition_needed = true;
        v.task_completion = 0.3;
        let signals = RuleAnalyzer::default().analyze(&v);
        let signal = signals
            .iter()
            .find(|s| s.score(NeedsCategory::NeedsMoreScaffolding).is_some())
            .unwrap();
        assert!(signal.confidence > 0.5 && signal.confidence <= 1.0);
    }

    #[test]
    fn test_low_engagement_requires_no_help_seeking() {
        let mut v = baseline();
        v.task_completion = 0.2;
        v.help_requests = 0.0;
        let signals = RuleAnalyzer::default().analyze(&v);
        assert!(category_score(&signals, NeedsCategory::LowEngagement).is_some());

        v.help_requests = 2.0;
        let signals = RuleAnalyzer::default().analyze(&v);
        assert!(category_score(&signals, NeedsCategory::LowEngagement).is_none());
    }

    #[test]
    fn test_attention_rule_fires_on_outliers() {
        let mut v = baseline();
        v.response_times.outliers = 8.0;
        let signals = RuleAnalyzer::default().analyze(&v);
        assert_eq!(category_score(&signals, NeedsCategory::AttentionCognitiveLoad), Some(1.0));
    }

    #[test]
    fn test_all_confidences_bounded() {
        let mut v = baseline();
        v.reading_errors.reversals = 50.0;
        v.reading_speed = 1.0;
        v.math_accuracy = 0.0;
        v.math_errors.conceptual = 40.0;
        v.attention_span = 0.0;
        v.response_times.mean = 90_000.0;
        v.error_rate = 0.9;
        for signal in RuleAnalyzer::default().analyze(&v) {
            assert!((0.0..=1.0).contains(&signal.confidence));
            assert!(signal.scores.values().all(|s| (0.0..=1.0).contains(s)));
        }
    }
}
