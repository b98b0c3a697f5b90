pub mod config;
pub mod cultural;
pub mod engine;
pub mod fusion;
pub mod model;
pub mod rules;
pub mod types;
pub mod validator;

pub use config::NeedsConfig;
pub use engine::NeedsEngine;
pub use fusion::{fuse, ModelOutcome};
pub use model::{InferenceClient, InferenceRequest, InferenceResponse, ModelAnalyzer};
pub use validator::{InteractionSample, Validator};
pub use types::*;
