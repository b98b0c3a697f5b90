pub mod inference_provider;
pub mod needs_service;
pub mod profile_store;

pub use inference_provider::{HttpInferenceProvider, InferenceConfig};
pub use needs_service::NeedsService;
pub use profile_store::{InMemoryProfileStore, ProfileStore, StoredProfile};
