use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::needs::types::FusedNeedsProfile;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl DifficultyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    pub fn harder(&self) -> Self {
        match self {
            Self::Easy => Self::Medium,
            _ => Self::Hard,
        }
    }

    pub fn easier(&self) -> Self {
        match self {
            Self::Hard => Self::Medium,
            _ => Self::Easy,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Answer event at the caller boundary. `sequence` starts at 1 per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEvent {
    pub session_id: SessionId,
    pub sequence: u64,
    pub answer_correct: bool,
    pub response_time_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub sequence: u64,
    pub correct: bool,
    pub response_time_ms: u64,
    /// Difficulty the question was served at.
    pub difficulty: DifficultyLevel,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum TransitionReason {
    CorrectStreak { streak: u32 },
    IncorrectStreak { streak: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyChange {
    pub old: DifficultyLevel,
    pub new: DifficultyLevel,
    pub reason: TransitionReason,
}

/// Session-scoped controller state. Owned by exactly one session.
#[derive(Debug, Clone)]
pub struct AssessmentState {
    pub session_id: SessionId,
    pub learner_id: String,
    pub current_difficulty: DifficultyLevel,
    pub consecutive_correct: u32,
    pub consecutive_incorrect: u32,
    pub history: Vec<AnswerRecord>,
    pub profile: Option<Arc<FusedNeedsProfile>>,
    pub question_count: u32,
    pub started_at: DateTime<Utc>,
    /// Set under the session lock once a summary has been taken; later answers are refused.
    pub completed: bool,
}

impl AssessmentState {
    pub fn next_sequence(&self) -> u64 {
        self.history.len() as u64 + 1
    }

    pub fn is_finished(&self) -> bool {
        self.history.len() as u64 >= u64::from(self.question_count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasteryLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl MasteryLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelStats {
    pub answered: u32,
    pub correct: u32,
}

impl LevelStats {
    pub fn accuracy(&self) -> Option<f64> {
        (self.answered > 0).then(|| f64::from(self.correct) / f64::from(self.answered))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSummary {
    pub session_id: SessionId,
    pub learner_id: String,
    pub score_percentage: f64,
    pub correct_count: u32,
    pub total_count: u32,
    pub elapsed_ms: u64,
    pub mean_response_time_ms: f64,
    pub mastery_level: MasteryLevel,
    pub final_difficulty: DifficultyLevel,
    pub by_difficulty: BTreeMap<DifficultyLevel, LevelStats>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    pub session_id: SessionId,
    pub current_difficulty: DifficultyLevel,
    pub question_count: u32,
}

/// Caller-facing result of one assessment step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResponse {
    pub current_difficulty: DifficultyLevel,
    pub difficulty_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<DifficultyChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<AssessmentSummary>,
}
