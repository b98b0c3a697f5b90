use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ExternalServiceError;
use crate::needs::types::{
    AnalysisContext, CulturalContext, NeedsCategory, NeedsSignal, NormalizedFeatureVector,
    SignalSource,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceRequest {
    pub feature_vector: BTreeMap<String, f64>,
    pub cultural_context: CulturalContext,
    pub context: AnalysisContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceResponse {
    pub category_probabilities: BTreeMap<String, f64>,
    pub confidence: f64,
}

/// External scoring collaborator. Implementations perform the call; the analyzer owns
/// the timeout and response checks.
pub trait InferenceClient: Send + Sync {
    fn score(
        &self,
        request: &InferenceRequest,
    ) -> impl Future<Output = Result<InferenceResponse, ExternalServiceError>> + Send;
}

pub struct ModelAnalyzer<C> {
    client: C,
    timeout: Duration,
}

impl<C: InferenceClient> ModelAnalyzer<C> {
    pub fn new(client: C, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn analyze(
        &self,
        vector: &NormalizedFeatureVector,
        cultural: &CulturalContext,
        context: &AnalysisContext,
    ) -> Result<Vec<NeedsSignal>, ExternalServiceError> {
        let request = InferenceRequest {
            feature_vector: vector.to_feature_map(),
            cultural_context: cultural.clone(),
            context: *context,
        };

        let response = tokio::time::timeout(self.timeout, self.client.score(&request))
            .await
            .map_err(|_| ExternalServiceError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            })??;

        signals_from_response(response)
    }
}

fn is_probability(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

fn signals_from_response(
    response: InferenceResponse,
) -> Result<Vec<NeedsSignal>, ExternalServiceError> {
    if !is_probability(response.confidence) {
        return Err(ExternalServiceError::Malformed(format!(
            "confidence {} outside [0, 1]",
            response.confidence
        )));
    }

    let mut scores = BTreeMap::new();
    for (label, probability) in response.category_probabilities {
        if !is_probability(probability) {
            return Err(ExternalServiceError::Malformed(format!(
                "probability {probability} for `{label}` outside [0, 1]"
            )));
        }
        match NeedsCategory::parse(&label) {
            Some(category) => {
                scores.insert(category, probability);
            }
            None => debug!(label = %label, "ignoring unknown model category"),
        }
    }

    Ok(vec![NeedsSignal {
        scores,
        confidence: response.confidence,
        source: SignalSource::Model,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(pairs: &[(&str, f64)], confidence: f64) -> InferenceResponse {
        InferenceResponse {
            category_probabilities: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            confidence,
        }
    }

    #[test]
    fn test_known_labels_become_model_signal() {
        let signals = signals_from_response(response(
            &[("attention-cognitive-load", 0.7), ("made-up", 0.9)],
            0.8,
        ))
        .unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].source, SignalSource::Model);
        assert_eq!(signals[0].scores.len(), 1);
        assert_eq!(signals[0].score(NeedsCategory::AttentionCognitiveLoad), Some(0.7));
    }

    #[test]
    fn test_out_of_range_probability_is_malformed() {
        let err = signals_from_response(response(&[("low-engagement", 1.5)], 0.8)).unwrap_err();
        assert!(matches!(err, ExternalServiceError::Malformed(_)));
    }

    #[test]
    fn test_nan_confidence_is_malformed() {
        let err = signals_from_response(response(&[], f64::NAN)).unwrap_err();
        assert!(matches!(err, ExternalServiceError::Malformed(_)));
    }
}
