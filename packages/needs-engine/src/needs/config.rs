use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::needs::types::NeedsCategory;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Allowed distance of the sensory-preference sum from 1.0 before a warning is logged.
    pub sensory_tolerance: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            sensory_tolerance: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleThresholds {
    pub slow_reading_wpm: f64,
    pub reversal_threshold: f64,
    pub reversal_span: f64,
    pub low_math_accuracy: f64,
    pub math_error_threshold: f64,
    pub math_error_span: f64,
    pub min_attention_minutes: f64,
    pub outlier_threshold: f64,
    pub outlier_span: f64,
    pub help_request_threshold: f64,
    pub help_request_span: f64,
    pub low_task_completion: f64,
    pub disengaged_completion: f64,
    pub slow_response_ms: f64,
    pub slow_response_span_ms: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            slow_reading_wpm: 60.0,
            reversal_threshold: 3.0,
            reversal_span: 5.0,
            low_math_accuracy: 0.6,
            math_error_threshold: 3.0,
            math_error_span: 5.0,
            min_attention_minutes: 10.0,
            outlier_threshold: 3.0,
            outlier_span: 5.0,
            help_request_threshold: 3.0,
            help_request_span: 5.0,
            low_task_completion: 0.6,
            disengaged_completion: 0.4,
            slow_response_ms: 8000.0,
            slow_response_span_ms: 8000.0,
        }
    }
}

pub type CategoryWeights = BTreeMap<NeedsCategory, f64>;

/// Multiplicative weight tables. Tags are matched case-insensitively; a known tag with
/// an empty table is neutral without being reported as unknown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CulturalWeights {
    pub by_culture: BTreeMap<String, CategoryWeights>,
    pub by_socioeconomic: BTreeMap<String, CategoryWeights>,
}

fn weights(entries: &[(NeedsCategory, f64)]) -> CategoryWeights {
    entries.iter().copied().collect()
}

impl Default for CulturalWeights {
    fn default() -> Self {
        use NeedsCategory::*;

        let mut by_culture = BTreeMap::new();
        by_culture.insert("western".to_string(), CategoryWeights::new());
        by_culture.insert(
            "east-asian".to_string(),
            weights(&[(LowEngagement, 0.7), (NeedsMoreScaffolding, 0.85)]),
        );
        by_culture.insert(
            "south-asian".to_string(),
            weights(&[(LowEngagement, 0.8), (NeedsMoreScaffolding, 0.9)]),
        );
        by_culture.insert(
            "middle-eastern".to_string(),
            weights(&[(LowEngagement, 0.85)]),
        );
        by_culture.insert(
            "sub-saharan-african".to_string(),
            weights(&[(LowEngagement, 0.8), (SlowProcessingSpeed, 0.9)]),
        );
        by_culture.insert(
            "indigenous".to_string(),
            weights(&[(LowEngagement, 0.75), (SlowProcessingSpeed, 0.85)]),
        );
        by_culture.insert(
            "latin-american".to_string(),
            weights(&[(LowEngagement, 0.9)]),
        );

        let mut by_socioeconomic = BTreeMap::new();
        by_socioeconomic.insert("middle-income".to_string(), CategoryWeights::new());
        by_socioeconomic.insert("high-income".to_string(), CategoryWeights::new());
        by_socioeconomic.insert(
            "low-income".to_string(),
            weights(&[(LowEngagement, 0.8)]),
        );
        by_socioeconomic.insert(
            "rural".to_string(),
            weights(&[(LowEngagement, 0.85), (SlowProcessingSpeed, 0.9)]),
        );

        Self {
            by_culture,
            by_socioeconomic,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NeedsConfig {
    pub validator: ValidatorConfig,
    pub rules: RuleThresholds,
    pub cultural: CulturalWeights,
}

impl NeedsConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("NEEDS_SENSORY_TOLERANCE") {
            config.validator.sensory_tolerance = val
                .parse()
                .unwrap_or(config.validator.sensory_tolerance);
        }
        if let Ok(val) = std::env::var("NEEDS_SLOW_READING_WPM") {
            config.rules.slow_reading_wpm = val.parse().unwrap_or(config.rules.slow_reading_wpm);
        }

        config
    }
}
