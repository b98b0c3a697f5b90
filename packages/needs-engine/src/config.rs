use crate::assessment::AssessmentConfig;
use crate::needs::NeedsConfig;
use crate::services::InferenceConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub needs: NeedsConfig,
    pub assessment: AssessmentConfig,
    pub inference: InferenceConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            log_level,
            needs: NeedsConfig::from_env(),
            assessment: AssessmentConfig::from_env(),
            inference: InferenceConfig::from_env(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            needs: NeedsConfig::default(),
            assessment: AssessmentConfig::default(),
            inference: InferenceConfig::default(),
        }
    }
}
