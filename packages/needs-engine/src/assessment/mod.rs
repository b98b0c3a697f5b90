pub mod config;
pub mod controller;
pub mod insight;
pub mod session;
pub mod types;

pub use config::{AssessmentConfig, DifficultyConfig, InsightConfig};
pub use controller::DifficultyController;
pub use insight::InsightGenerator;
pub use session::SessionRegistry;
pub use types::*;
