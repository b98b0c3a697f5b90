use std::collections::BTreeMap;

use crate::assessment::config::InsightConfig;
use crate::assessment::types::{
    AssessmentState, AssessmentSummary, DifficultyLevel, LevelStats, MasteryLevel,
};
use crate::needs::types::{FusedNeedsProfile, NeedsCategory};

fn recommendation_for(category: NeedsCategory) -> &'static str {
    match category {
        NeedsCategory::ReadingProcessingDifficulty => {
            "Use multisensory phonics practice and allow extra reading time for reading processing"
        }
        NeedsCategory::MathProcessingDifficulty => {
            "Introduce math concepts with concrete manipulatives before abstract notation"
        }
        NeedsCategory::AttentionCognitiveLoad => {
            "Break tasks into short segments with scheduled breaks to manage cognitive load"
        }
        NeedsCategory::NeedsMoreScaffolding => {
            "Provide worked examples and step-by-step hints before independent practice"
        }
        NeedsCategory::LowEngagement => {
            "Offer choice in topics and frequent low-stakes wins to rebuild engagement"
        }
        NeedsCategory::SlowProcessingSpeed => {
            "Remove time pressure and extend response windows to support processing speed"
        }
        NeedsCategory::AuditoryPreference
        | NeedsCategory::VisualPreference
        | NeedsCategory::KinestheticPreference => {
            "Keep presenting material in the learner's preferred modality"
        }
    }
}

fn next_step_for(category: NeedsCategory) -> &'static str {
    match category {
        NeedsCategory::ReadingProcessingDifficulty => "Schedule a focused reading fluency session",
        NeedsCategory::MathProcessingDifficulty => "Revisit foundational number concepts",
        NeedsCategory::AttentionCognitiveLoad => "Try a shorter session with built-in breaks",
        NeedsCategory::NeedsMoreScaffolding => "Practice with guided hints enabled",
        NeedsCategory::LowEngagement => "Pick a high-interest topic for the next session",
        NeedsCategory::SlowProcessingSpeed => "Repeat the assessment untimed",
        NeedsCategory::AuditoryPreference => "Add narrated explanations",
        NeedsCategory::VisualPreference => "Add diagrams and visual organizers",
        NeedsCategory::KinestheticPreference => "Add hands-on activities",
    }
}

fn preference_strength(category: NeedsCategory) -> &'static str {
    match category {
        NeedsCategory::AuditoryPreference => "Learns well through listening",
        NeedsCategory::VisualPreference => "Learns well through visual material",
        _ => "Learns well through hands-on activities",
    }
}

pub struct InsightGenerator {
    config: InsightConfig,
}

impl InsightGenerator {
    pub fn new(config: InsightConfig) -> Self {
        Self { config }
    }

    pub fn mastery_level(&self, score_percentage: f64) -> MasteryLevel {
        if score_percentage < self.config.intermediate_from {
            MasteryLevel::Beginner
        } else if score_percentage < self.config.advanced_from {
            MasteryLevel::Intermediate
        } else if score_percentage < self.config.expert_from {
            MasteryLevel::Advanced
        } else {
            MasteryLevel::Expert
        }
    }

    /// Pure derivation from the finished session and the profile it was biased by.
    pub fn summarize(
        &self,
        state: &AssessmentState,
        profile: &FusedNeedsProfile,
    ) -> AssessmentSummary {
        let total_count = state.history.len() as u32;
        let correct_count = state.history.iter().filter(|a| a.correct).count() as u32;
        let score_percentage = if total_count == 0 {
            0.0
        } else {
            f64::from(correct_count) / f64::from(total_count) * 100.0
        };
        let mastery_level = self.mastery_level(score_percentage);

        let mean_response_time_ms = if total_count == 0 {
            0.0
        } else {
            state.history.iter().map(|a| a.response_time_ms as f64).sum::<f64>()
                / f64::from(total_count)
        };

        let elapsed_ms = state
            .history
            .last()
            .map(|last| (last.answered_at - state.started_at).num_milliseconds().max(0) as u64)
            .unwrap_or(0);

        let mut by_difficulty: BTreeMap<DifficultyLevel, LevelStats> = BTreeMap::new();
        for answer in &state.history {
            let stats = by_difficulty.entry(answer.difficulty).or_default();
            stats.answered += 1;
            if answer.correct {
                stats.correct += 1;
            }
        }

        let ranked = profile.ranked_needs();
        let weak: Vec<NeedsCategory> = ranked
            .iter()
            .filter(|(_, score)| *score >= self.config.weakness_threshold)
            .map(|(category, _)| *category)
            .collect();

        let mut weaknesses: Vec<String> = weak
            .iter()
            .map(|category| format!("Needs support with {}", category.display_name()))
            .collect();
        let mut strengths: Vec<String> = ranked
            .iter()
            .filter(|(_, score)| *score <= self.config.strength_threshold)
            .map(|(category, _)| format!("Solid {}", category.display_name()))
            .collect();

        for (category, score) in profile.categories.iter().filter(|(c, _)| c.is_preference()) {
            if score.score >= self.config.preference_strength {
                strengths.push(preference_strength(*category).to_string());
            }
        }

        self.level_insights(&by_difficulty, &mut strengths, &mut weaknesses);

        let mut recommendations: Vec<String> = weak
            .iter()
            .take(self.config.max_recommendations)
            .map(|category| recommendation_for(*category).to_string())
            .collect();
        if recommendations.is_empty() {
            recommendations.push(
                match mastery_level {
                    MasteryLevel::Beginner => "Review core material before the next assessment",
                    MasteryLevel::Intermediate => "Keep practicing at the current level",
                    MasteryLevel::Advanced => "Mix in harder questions to build fluency",
                    MasteryLevel::Expert => "Move on to enrichment material",
                }
                .to_string(),
            );
        }

        let mut next_steps: Vec<String> = ranked
            .iter()
            .filter(|(_, score)| *score >= self.config.next_step_floor)
            .map(|(category, _)| next_step_for(*category).to_string())
            .collect();
        next_steps.push(
            match mastery_level {
                MasteryLevel::Beginner | MasteryLevel::Intermediate => {
                    "Retake the assessment after targeted practice"
                }
                MasteryLevel::Advanced | MasteryLevel::Expert => {
                    "Advance to the next unit"
                }
            }
            .to_string(),
        );

        AssessmentSummary {
            session_id: state.session_id,
            learner_id: state.learner_id.clone(),
            score_percentage,
            correct_count,
            total_count,
            elapsed_ms,
            mean_response_time_ms,
            mastery_level,
            final_difficulty: state.current_difficulty,
            by_difficulty,
            strengths,
            weaknesses,
            recommendations,
            next_steps,
        }
    }

    fn level_insights(
        &self,
        by_difficulty: &BTreeMap<DifficultyLevel, LevelStats>,
        strengths: &mut Vec<String>,
        weaknesses: &mut Vec<String>,
    ) {
        let qualified = |level: DifficultyLevel| {
            by_difficulty
                .get(&level)
                .filter(|s| s.answered >= self.config.min_level_answers)
                .and_then(LevelStats::accuracy)
        };

        if let Some(accuracy) = qualified(DifficultyLevel::Hard) {
            if accuracy >= self.config.level_accuracy_strong {
                strengths.push("Handles hard questions well".to_string());
            }
        }
        if let Some(accuracy) = qualified(DifficultyLevel::Easy) {
            if accuracy < self.config.level_accuracy_weak {
                weaknesses.push("Struggles with foundational questions".to_string());
            }
        }
    }
}

impl Default for InsightGenerator {
    fn default() -> Self {
        Self::new(InsightConfig::default())
    }
}
