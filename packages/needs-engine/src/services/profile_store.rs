use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::needs::types::FusedNeedsProfile;

const MAX_HISTORY_PER_LEARNER: usize = 50;

#[derive(Debug, Clone)]
pub struct StoredProfile {
    pub profile: Arc<FusedNeedsProfile>,
    pub recorded_at: DateTime<Utc>,
}

/// Persistence seam for fused profiles. The engine only needs append and latest;
/// durable backends live outside this crate.
pub trait ProfileStore: Send + Sync {
    fn save(&self, learner_id: &str, profile: Arc<FusedNeedsProfile>, recorded_at: DateTime<Utc>);

    fn latest(&self, learner_id: &str) -> Option<StoredProfile>;

    fn history(&self, learner_id: &str) -> Vec<StoredProfile>;
}

#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, Vec<StoredProfile>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn learner_count(&self) -> usize {
        self.profiles.read().len()
    }
}

impl ProfileStore for InMemoryProfileStore {
    /// Entries stay ordered by `recorded_at`, so the cap always evicts the oldest by time
    /// even when saves arrive out of order.
    fn save(&self, learner_id: &str, profile: Arc<FusedNeedsProfile>, recorded_at: DateTime<Utc>) {
        let mut profiles = self.profiles.write();
        let entries = profiles.entry(learner_id.to_string()).or_default();
        let at = entries.partition_point(|e| e.recorded_at <= recorded_at);
        entries.insert(at, StoredProfile { profile, recorded_at });
        if entries.len() > MAX_HISTORY_PER_LEARNER {
            let overflow = entries.len() - MAX_HISTORY_PER_LEARNER;
            entries.drain(..overflow);
        }
    }

    fn latest(&self, learner_id: &str) -> Option<StoredProfile> {
        self.profiles
            .read()
            .get(learner_id)
            .and_then(|entries| entries.last().cloned())
    }

    fn history(&self, learner_id: &str) -> Vec<StoredProfile> {
        self.profiles
            .read()
            .get(learner_id)
            .cloned()
            .unwrap_or_default()
    }
}
