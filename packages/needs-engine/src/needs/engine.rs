use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::ValidationError;
use crate::needs::config::NeedsConfig;
use crate::needs::cultural::CulturalAdjuster;
use crate::needs::fusion::{fuse, ModelOutcome};
use crate::needs::model::{InferenceClient, ModelAnalyzer};
use crate::needs::rules::RuleAnalyzer;
use crate::needs::types::{AnalysisContext, DetectionResponse, NeedsSignal};
use crate::needs::validator::{InteractionSample, Validator};

/// Validate → {rules + cultural, model} → fuse.
pub struct NeedsEngine<C> {
    validator: Validator,
    rules: RuleAnalyzer,
    model: ModelAnalyzer<C>,
    cultural: CulturalAdjuster,
}

impl<C: InferenceClient> NeedsEngine<C> {
    pub fn new(config: NeedsConfig, client: C, model_timeout: Duration) -> Self {
        Self {
            validator: Validator::new(config.validator),
            rules: RuleAnalyzer::new(config.rules),
            model: ModelAnalyzer::new(client, model_timeout),
            cultural: CulturalAdjuster::new(config.cultural),
        }
    }

    /// Only validation failures reach the caller; a failing model degrades the profile.
    pub async fn detect(
        &self,
        sample: &InteractionSample,
        context: &AnalysisContext,
    ) -> Result<DetectionResponse, ValidationError> {
        let start_time = Instant::now();
        let vector = self.validator.validate(sample)?;
        let cultural_context = vector.cultural.clone();

        let local_path = async {
            let rule_signals = self.rules.analyze(&vector);
            let cultural_signals = self
                .cultural
                .adjust_for_context(&rule_signals, &cultural_context);
            (rule_signals, cultural_signals)
        };

        let (model_result, (rule_signals, cultural_signals)) = tokio::join!(
            self.model.analyze(&vector, &cultural_context, context),
            local_path
        );

        let outcome = ModelOutcome::from(model_result);
        let profile = fuse(&rule_signals, &outcome, &cultural_signals);
        let model_source = profile.model_source();

        debug!(
            rule_signals = rule_signals.len(),
            cultural_signals = cultural_signals.len(),
            categories = profile.categories.len(),
            "needs signals fused"
        );
        info!(
            model_source = model_source.as_str(),
            confidence = profile.confidence,
            duration_ms = start_time.elapsed().as_millis() as u64,
            "needs detection complete"
        );

        Ok(DetectionResponse {
            profile,
            model_source,
        })
    }

    /// Rule path only, for callers that must not wait on the collaborator.
    pub fn rule_signals(
        &self,
        sample: &InteractionSample,
    ) -> Result<Vec<NeedsSignal>, ValidationError> {
        let vector = self.validator.validate(sample)?;
        Ok(self.rules.analyze(&vector))
    }
}
