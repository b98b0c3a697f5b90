use serde::{Deserialize, Serialize};

use crate::assessment::types::DifficultyLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyConfig {
    pub initial: DifficultyLevel,
    /// Consecutive correct answers that advance one level.
    pub escalation_streak: u32,
    /// Consecutive incorrect answers that retreat one level.
    pub deescalation_streak: u32,
    /// Attention/cognitive-load score above which sessions start one level easier.
    pub bias_threshold: f64,
    pub default_question_count: u32,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            initial: DifficultyLevel::Medium,
            escalation_streak: 3,
            deescalation_streak: 2,
            bias_threshold: 0.6,
            default_question_count: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightConfig {
    pub intermediate_from: f64,
    pub advanced_from: f64,
    pub expert_from: f64,
    pub weakness_threshold: f64,
    pub strength_threshold: f64,
    pub preference_strength: f64,
    pub next_step_floor: f64,
    pub max_recommendations: usize,
    pub level_accuracy_strong: f64,
    pub level_accuracy_weak: f64,
    pub min_level_answers: u32,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            intermediate_from: 60.0,
            advanced_from: 75.0,
            expert_from: 90.0,
            weakness_threshold: 0.6,
            strength_threshold: 0.3,
            preference_strength: 0.5,
            next_step_floor: 0.3,
            max_recommendations: 3,
            level_accuracy_strong: 0.75,
            level_accuracy_weak: 0.5,
            min_level_answers: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssessmentConfig {
    pub difficulty: DifficultyConfig,
    pub insight: InsightConfig,
}

impl AssessmentConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("NEEDS_ESCALATION_STREAK") {
            config.difficulty.escalation_streak = val
                .parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .unwrap_or(config.difficulty.escalation_streak);
        }
        if let Ok(val) = std::env::var("NEEDS_DEESCALATION_STREAK") {
            config.difficulty.deescalation_streak = val
                .parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .unwrap_or(config.difficulty.deescalation_streak);
        }
        if let Ok(val) = std::env::var("NEEDS_BIAS_THRESHOLD") {
            config.difficulty.bias_threshold = val.parse().unwrap_or(config.difficulty.bias_threshold);
        }
        if let Ok(val) = std::env::var("NEEDS_QUESTION_COUNT") {
            config.difficulty.default_question_count = val
                .parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .unwrap_or(config.difficulty.default_question_count);
        }

        config
    }
}
