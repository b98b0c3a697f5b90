use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::assessment::config::DifficultyConfig;
use crate::assessment::types::{
    AnswerRecord, AssessmentState, DifficultyChange, DifficultyLevel, SessionId, TransitionReason,
};
use crate::needs::types::{FusedNeedsProfile, NeedsCategory};

/// Hysteretic easy/medium/hard state machine. Holds only configuration; all mutable
/// state lives in the session's [`AssessmentState`].
pub struct DifficultyController {
    config: DifficultyConfig,
}

impl DifficultyController {
    pub fn new(config: DifficultyConfig) -> Self {
        Self { config }
    }

    pub fn initial_difficulty(&self, profile: Option<&FusedNeedsProfile>) -> DifficultyLevel {
        let attention = profile
            .map(|p| p.score(NeedsCategory::AttentionCognitiveLoad))
            .unwrap_or(0.0);
        if attention > self.config.bias_threshold {
            self.config.initial.easier()
        } else {
            self.config.initial
        }
    }

    pub fn start(
        &self,
        session_id: SessionId,
        learner_id: &str,
        question_count: u32,
        profile: Option<Arc<FusedNeedsProfile>>,
        started_at: DateTime<Utc>,
    ) -> AssessmentState {
        AssessmentState {
            session_id,
            learner_id: learner_id.to_string(),
            current_difficulty: self.initial_difficulty(profile.as_deref()),
            consecutive_correct: 0,
            consecutive_incorrect: 0,
            history: Vec::new(),
            profile,
            question_count,
            started_at,
            completed: false,
        }
    }

    /// Records one answer and applies the streak rules. Returns the transition, if any.
    /// Never fails: event well-formedness is checked before the controller sees it.
    pub fn apply(
        &self,
        state: &mut AssessmentState,
        correct: bool,
        response_time_ms: u64,
        answered_at: DateTime<Utc>,
    ) -> Option<DifficultyChange> {
        let sequence = state.next_sequence();
        state.history.push(AnswerRecord {
            sequence,
            correct,
            response_time_ms,
            difficulty: state.current_difficulty,
            answered_at,
        });

        let old = state.current_difficulty;
        let change = if correct {
            state.consecutive_correct += 1;
            state.consecutive_incorrect = 0;
            if state.consecutive_correct >= self.config.escalation_streak
                && old != DifficultyLevel::Hard
            {
                let streak = state.consecutive_correct;
                state.current_difficulty = old.harder();
                state.consecutive_correct = 0;
                Some(DifficultyChange {
                    old,
                    new: state.current_difficulty,
                    reason: TransitionReason::CorrectStreak { streak },
                })
            } else {
                None
            }
        } else {
            state.consecutive_incorrect += 1;
            state.consecutive_correct = 0;
            if state.consecutive_incorrect >= self.config.deescalation_streak
                && old != DifficultyLevel::Easy
            {
                let streak = state.consecutive_incorrect;
                state.current_difficulty = old.easier();
                state.consecutive_incorrect = 0;
                Some(DifficultyChange {
                    old,
                    new: state.current_difficulty,
                    reason: TransitionReason::IncorrectStreak { streak },
                })
            } else {
                None
            }
        };

        debug!(
            session_id = %state.session_id,
            correct,
            difficulty = state.current_difficulty.as_str(),
            correct_streak = state.consecutive_correct,
            incorrect_streak = state.consecutive_incorrect,
            "answer applied"
        );

        change
    }
}

impl Default for DifficultyController {
    fn default() -> Self {
        Self::new(DifficultyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::needs::types::{CategoryScore, SignalSource};

    fn state(controller: &DifficultyController, profile: Option<FusedNeedsProfile>) -> AssessmentState {
        controller.start(SessionId::new(), "learner-1", 20, profile.map(Arc::new), Utc::now())
    }

    fn attention_profile(score: f64) -> FusedNeedsProfile {
        let mut profile = FusedNeedsProfile::default();
        profile.categories.insert(
            NeedsCategory::AttentionCognitiveLoad,
            CategoryScore { score, source: SignalSource::Model },
        );
        profile
    }

    #[test]
    fn test_initial_difficulty_defaults_to_medium() {
        let controller = DifficultyController::default();
        assert_eq!(controller.initial_difficulty(None), DifficultyLevel::Medium);
        assert_eq!(
            controller.initial_difficulty(Some(&attention_profile(0.6))),
            DifficultyLevel::Medium
        );
        assert_eq!(
            controller.initial_difficulty(Some(&attention_profile(0.8))),
            DifficultyLevel::Easy
        );
    }

    #[test]
    fn test_three_correct_escalates_once_and_resets_streak() {
        let controller = DifficultyController::default();
        let mut s = state(&controller, None);

        assert!(controller.apply(&mut s, true, 1000, Utc::now()).is_none());
        assert!(controller.apply(&mut s, true, 1000, Utc::now()).is_none());
        let change = controller.apply(&mut s, true, 1000, Utc::now()).unwrap();
        assert_eq!(change.old, DifficultyLevel::Medium);
        assert_eq!(change.new, DifficultyLevel::Hard);
        assert_eq!(change.reason, TransitionReason::CorrectStreak { streak: 3 });
        assert_eq!(s.consecutive_correct, 0);

        assert!(controller.apply(&mut s, true, 1000, Utc::now()).is_none());
        assert_eq!(s.current_difficulty, DifficultyLevel::Hard);
        assert_eq!(s.consecutive_correct, 1);
    }

    #[test]
    fn test_hard_is_a_ceiling() {
        let controller = DifficultyController::default();
        let mut s = state(&controller, None);
        s.current_difficulty = DifficultyLevel::Hard;
        for _ in 0..6 {
            assert!(controller.apply(&mut s, true, 800, Utc::now()).is_none());
        }
        assert_eq!(s.consecutive_correct, 6);
    }

    #[test]
    fn test_two_incorrect_retreats_one_level() {
        let controller = DifficultyController::default();
        let mut s = state(&controller, None);
        s.current_difficulty = DifficultyLevel::Hard;

        assert!(controller.apply(&mut s, false, 4000, Utc::now()).is_none());
        let change = controller.apply(&mut s, false, 4000, Utc::now()).unwrap();
        assert_eq!(change.new, DifficultyLevel::Medium);
        assert_eq!(s.consecutive_incorrect, 0);
    }

    #[test]
    fn test_mixed_answers_reset_opposite_streak() {
        let controller = DifficultyController::default();
        let mut s = state(&controller, None);
        controller.apply(&mut s, true, 1000, Utc::now());
        controller.apply(&mut s, true, 1000, Utc::now());
        controller.apply(&mut s, false, 1000, Utc::now());
        assert_eq!(s.consecutive_correct, 0);
        assert_eq!(s.consecutive_incorrect, 1);
        controller.apply(&mut s, true, 1000, Utc::now());
        assert_eq!(s.consecutive_incorrect, 0);
        assert_eq!(s.current_difficulty, DifficultyLevel::Medium);
    }

    #[test]
    fn test_every_transition_is_one_step() {
        let controller = DifficultyController::default();
        let mut s = state(&controller, None);
        let pattern = [true, true, true, false, false, false, false, true, true, true, true, true, true];
        for correct in pattern.iter().cycle().take(60) {
            if let Some(change) = controller.apply(&mut s, *correct, 1200, Utc::now()) {
                let distance = (change.old as i32 - change.new as i32).abs();
                assert_eq!(distance, 1);
            }
        }
        assert_eq!(s.history.len(), 60);
        assert_eq!(s.history.last().unwrap().sequence, 60);
    }
}
