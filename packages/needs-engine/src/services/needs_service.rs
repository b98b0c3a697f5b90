use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::assessment::{AnswerEvent, AssessmentSummary, SessionId, SessionRegistry, SessionStart, StepResponse};
use crate::error::{SessionError, ValidationError};
use crate::needs::{AnalysisContext, DetectionResponse, InferenceClient, InteractionSample, NeedsEngine};
use crate::services::profile_store::ProfileStore;

/// Ties detection to assessment: every profile produced for a learner is stored, and
/// new sessions start from the learner's most recent profile.
pub struct NeedsService<C, S> {
    engine: NeedsEngine<C>,
    sessions: Arc<SessionRegistry>,
    store: Arc<S>,
}

impl<C: InferenceClient, S: ProfileStore> NeedsService<C, S> {
    pub fn new(engine: NeedsEngine<C>, sessions: Arc<SessionRegistry>, store: Arc<S>) -> Self {
        Self {
            engine,
            sessions,
            store,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn analyze_learner(
        &self,
        learner_id: &str,
        sample: &InteractionSample,
        context: &AnalysisContext,
    ) -> Result<DetectionResponse, ValidationError> {
        let response = self.engine.detect(sample, context).await?;
        self.store
            .save(learner_id, Arc::new(response.profile.clone()), Utc::now());
        Ok(response)
    }

    pub fn start_assessment(
        &self,
        learner_id: &str,
        question_count: Option<u32>,
    ) -> Result<SessionStart, SessionError> {
        let profile = self.store.latest(learner_id).map(|stored| stored.profile);
        if profile.is_none() {
            info!(learner_id, "no stored needs profile, starting unbiased session");
        }
        self.sessions.start_session(learner_id, question_count, profile)
    }

    pub fn submit_answer(&self, event: AnswerEvent) -> Result<StepResponse, SessionError> {
        self.sessions.submit_answer(event)
    }

    pub fn complete_assessment(
        &self,
        session_id: SessionId,
    ) -> Result<AssessmentSummary, SessionError> {
        self.sessions.complete(session_id)
    }
}
