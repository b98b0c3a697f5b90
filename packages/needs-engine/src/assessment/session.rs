use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::assessment::config::AssessmentConfig;
use crate::assessment::controller::DifficultyController;
use crate::assessment::insight::InsightGenerator;
use crate::assessment::types::{
    AnswerEvent, AssessmentState, AssessmentSummary, DifficultyLevel, SessionId, SessionStart,
    StepResponse,
};
use crate::core::{
    AssessmentEvent, DifficultyChangedPayload, EventBus, SessionCompletedPayload,
    SessionStartedPayload,
};
use crate::error::SessionError;
use crate::needs::types::FusedNeedsProfile;

type SessionSlot = Arc<Mutex<AssessmentState>>;

/// Arena of live sessions keyed by id. Each session's state sits behind its own lock,
/// so steps for different sessions never contend beyond the map lookup.
pub struct SessionRegistry {
    controller: DifficultyController,
    insight: InsightGenerator,
    default_question_count: u32,
    sessions: RwLock<HashMap<SessionId, SessionSlot>>,
    events: Arc<EventBus>,
}

impl SessionRegistry {
    pub fn new(config: AssessmentConfig, events: Arc<EventBus>) -> Self {
        Self {
            default_question_count: config.difficulty.default_question_count,
            controller: DifficultyController::new(config.difficulty),
            insight: InsightGenerator::new(config.insight),
            sessions: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn start_session(
        &self,
        learner_id: &str,
        question_count: Option<u32>,
        profile: Option<Arc<FusedNeedsProfile>>,
    ) -> Result<SessionStart, SessionError> {
        let question_count = question_count.unwrap_or(self.default_question_count);
        if question_count == 0 {
            return Err(SessionError::EmptySession);
        }

        let session_id = SessionId::new();
        let state = self
            .controller
            .start(session_id, learner_id, question_count, profile, Utc::now());
        let current_difficulty = state.current_difficulty;

        self.sessions
            .write()
            .insert(session_id, Arc::new(Mutex::new(state)));

        info!(
            session_id = %session_id,
            learner_id,
            difficulty = current_difficulty.as_str(),
            question_count,
            "assessment session started"
        );
        self.events
            .publish(AssessmentEvent::SessionStarted(SessionStartedPayload {
                learner_id: learner_id.to_string(),
                session_id,
                initial_difficulty: current_difficulty,
                question_count,
                timestamp: Utc::now(),
            }));

        Ok(SessionStart {
            session_id,
            current_difficulty,
            question_count,
        })
    }

    /// Applies one answer. Events must arrive with `sequence` equal to the next expected
    /// number; retries and gaps are rejected without touching state.
    pub fn submit_answer(&self, event: AnswerEvent) -> Result<StepResponse, SessionError> {
        let slot = self.slot(event.session_id)?;
        let mut state = slot.lock();
        // Lost a race with the step or caller that completed this session.
        if state.completed || state.is_finished() {
            return Err(SessionError::UnknownSession(event.session_id));
        }

        let expected = state.next_sequence();
        if event.sequence < expected {
            warn!(session_id = %event.session_id, expected, received = event.sequence, "stale answer event");
            return Err(SessionError::StaleSequence {
                session_id: event.session_id,
                expected,
                received: event.sequence,
            });
        }
        if event.sequence > expected {
            warn!(session_id = %event.session_id, expected, received = event.sequence, "out-of-order answer event");
            return Err(SessionError::OutOfOrder {
                session_id: event.session_id,
                expected,
                received: event.sequence,
            });
        }

        let change = self.controller.apply(
            &mut state,
            event.answer_correct,
            event.response_time_ms,
            Utc::now(),
        );

        if let Some(change) = change {
            info!(
                session_id = %state.session_id,
                old = change.old.as_str(),
                new = change.new.as_str(),
                "difficulty changed"
            );
            self.events
                .publish(AssessmentEvent::DifficultyChanged(DifficultyChangedPayload {
                    learner_id: state.learner_id.clone(),
                    session_id: state.session_id,
                    change,
                    timestamp: Utc::now(),
                }));
        }

        let current_difficulty = state.current_difficulty;
        let summary = if state.is_finished() {
            state.completed = true;
            let summary = self.finish(&state);
            drop(state);
            self.sessions.write().remove(&event.session_id);
            Some(summary)
        } else {
            None
        };

        Ok(StepResponse {
            current_difficulty,
            difficulty_changed: change.is_some(),
            change,
            summary,
        })
    }

    /// Ends a session early at the caller's request.
    pub fn complete(&self, session_id: SessionId) -> Result<AssessmentSummary, SessionError> {
        let slot = self
            .sessions
            .write()
            .remove(&session_id)
            .ok_or(SessionError::UnknownSession(session_id))?;
        let mut state = slot.lock();
        if state.completed {
            return Err(SessionError::UnknownSession(session_id));
        }
        state.completed = true;
        Ok(self.finish(&state))
    }

    pub fn current_difficulty(&self, session_id: SessionId) -> Result<DifficultyLevel, SessionError> {
        Ok(self.slot(session_id)?.lock().current_difficulty)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.read().len()
    }

    fn slot(&self, session_id: SessionId) -> Result<SessionSlot, SessionError> {
        self.sessions
            .read()
            .get(&session_id)
            .cloned()
            .ok_or(SessionError::UnknownSession(session_id))
    }

    fn finish(&self, state: &AssessmentState) -> AssessmentSummary {
        let summary = match state.profile.as_deref() {
            Some(profile) => self.insight.summarize(state, profile),
            None => self.insight.summarize(state, &FusedNeedsProfile::default()),
        };

        info!(
            session_id = %state.session_id,
            score = summary.score_percentage,
            mastery = summary.mastery_level.as_str(),
            "assessment session completed"
        );
        self.events
            .publish(AssessmentEvent::SessionCompleted(SessionCompletedPayload {
                learner_id: state.learner_id.clone(),
                session_id: state.session_id,
                score_percentage: summary.score_percentage,
                mastery_level: summary.mastery_level,
                timestamp: Utc::now(),
            }));

        summary
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(AssessmentConfig::default(), Arc::new(EventBus::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(session_id: SessionId, sequence: u64, correct: bool) -> AnswerEvent {
        AnswerEvent {
            session_id,
            sequence,
            answer_correct: correct,
            response_time_ms: 1500,
        }
    }

    #[test]
    fn test_zero_question_session_is_rejected() {
        let registry = SessionRegistry::default();
        assert!(matches!(
            registry.start_session("l1", Some(0), None),
            Err(SessionError::EmptySession)
        ));
        assert_eq!(registry.active_sessions(), 0);
    }

    #[test]
    fn test_sequence_gating() {
        let registry = SessionRegistry::default();
        let start = registry.start_session("l1", Some(5), None).unwrap();
        let id = start.session_id;

        assert!(matches!(
            registry.submit_answer(answer(id, 2, true)),
            Err(SessionError::OutOfOrder { expected: 1, received: 2, .. })
        ));
        registry.submit_answer(answer(id, 1, true)).unwrap();
        assert!(matches!(
            registry.submit_answer(answer(id, 1, true)),
            Err(SessionError::StaleSequence { expected: 2, received: 1, .. })
        ));
        registry.submit_answer(answer(id, 2, true)).unwrap();
    }

    #[test]
    fn test_unknown_session() {
        let registry = SessionRegistry::default();
        let id = SessionId::new();
        assert!(matches!(
            registry.submit_answer(answer(id, 1, true)),
            Err(SessionError::UnknownSession(missing)) if missing == id
        ));
        assert!(registry.current_difficulty(id).is_err());
    }

    #[test]
    fn test_session_completes_at_question_count() {
        let registry = SessionRegistry::default();
        let mut rx = registry.events().subscribe_global();
        let id = registry.start_session("l1", Some(3), None).unwrap().session_id;

        assert!(registry.submit_answer(answer(id, 1, true)).unwrap().summary.is_none());
        assert!(registry.submit_answer(answer(id, 2, true)).unwrap().summary.is_none());
        let last = registry.submit_answer(answer(id, 3, true)).unwrap();

        assert!(last.difficulty_changed);
        assert_eq!(last.current_difficulty, DifficultyLevel::Hard);
        let summary = last.summary.unwrap();
        assert_eq!(summary.total_count, 3);
        assert_eq!(summary.correct_count, 3);
        assert_eq!(registry.active_sessions(), 0);
        assert!(registry.submit_answer(answer(id, 4, true)).is_err());

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.event.event_type())
            .collect();
        assert_eq!(
            kinds,
            vec!["SESSION_STARTED", "DIFFICULTY_CHANGED", "SESSION_COMPLETED"]
        );
    }

    #[test]
    fn test_early_completion() {
        let registry = SessionRegistry::default();
        let id = registry.start_session("l1", None, None).unwrap().session_id;
        registry.submit_answer(answer(id, 1, false)).unwrap();

        let summary = registry.complete(id).unwrap();
        assert_eq!(summary.total_count, 1);
        assert_eq!(summary.score_percentage, 0.0);
        assert!(matches!(
            registry.complete(id),
            Err(SessionError::UnknownSession(_))
        ));
    }

    #[test]
    fn test_answer_queued_behind_completion_is_refused() {
        let registry = Arc::new(SessionRegistry::default());
        let id = registry.start_session("l1", Some(5), None).unwrap().session_id;
        registry.submit_answer(answer(id, 1, true)).unwrap();

        let slot = registry.slot(id).unwrap();
        let mut guard = slot.lock();

        let late = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || registry.submit_answer(answer(id, 2, true)))
        };
        std::thread::sleep(std::time::Duration::from_millis(50));

        registry.sessions.write().remove(&id);
        guard.completed = true;
        let summary = registry.finish(&guard);
        drop(guard);

        assert!(matches!(
            late.join().unwrap(),
            Err(SessionError::UnknownSession(missing)) if missing == id
        ));
        assert_eq!(summary.total_count, 1);
        assert_eq!(slot.lock().history.len(), 1);
    }

    #[test]
    fn test_completion_is_published_once() {
        let registry = SessionRegistry::default();
        let mut rx = registry.events().subscribe_global();
        let id = registry.start_session("l1", Some(2), None).unwrap().session_id;
        let slot = registry.slot(id).unwrap();

        registry.complete(id).unwrap();
        assert!(slot.lock().completed);
        assert!(registry.submit_answer(answer(id, 1, true)).is_err());

        let completions = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| e.event.event_type() == "SESSION_COMPLETED")
            .count();
        assert_eq!(completions, 1);
    }
}
