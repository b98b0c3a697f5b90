use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::assessment::types::{DifficultyChange, DifficultyLevel, MasteryLevel, SessionId};

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum AssessmentEvent {
    #[serde(rename = "SESSION_STARTED")]
    SessionStarted(SessionStartedPayload),

    #[serde(rename = "DIFFICULTY_CHANGED")]
    DifficultyChanged(DifficultyChangedPayload),

    #[serde(rename = "SESSION_COMPLETED")]
    SessionCompleted(SessionCompletedPayload),
}

impl AssessmentEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            AssessmentEvent::SessionStarted(_) => "SESSION_STARTED",
            AssessmentEvent::DifficultyChanged(_) => "DIFFICULTY_CHANGED",
            AssessmentEvent::SessionCompleted(_) => "SESSION_COMPLETED",
        }
    }

    pub fn learner_id(&self) -> &str {
        match self {
            AssessmentEvent::SessionStarted(p) => &p.learner_id,
            AssessmentEvent::DifficultyChanged(p) => &p.learner_id,
            AssessmentEvent::SessionCompleted(p) => &p.learner_id,
        }
    }

    pub fn session_id(&self) -> SessionId {
        match self {
            AssessmentEvent::SessionStarted(p) => p.session_id,
            AssessmentEvent::DifficultyChanged(p) => p.session_id,
            AssessmentEvent::SessionCompleted(p) => p.session_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartedPayload {
    pub learner_id: String,
    pub session_id: SessionId,
    pub initial_difficulty: DifficultyLevel,
    pub question_count: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyChangedPayload {
    pub learner_id: String,
    pub session_id: SessionId,
    pub change: DifficultyChange,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCompletedPayload {
    pub learner_id: String,
    pub session_id: SessionId,
    pub score_percentage: f64,
    pub mastery_level: MasteryLevel,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub id: String,
    pub event: AssessmentEvent,
    pub created_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: AssessmentEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event,
            created_at: Utc::now(),
        }
    }
}

type SubscriberId = String;

struct Subscriber {
    learner_id: Option<String>,
    session_id: Option<SessionId>,
    sender: broadcast::Sender<EventEnvelope>,
}

impl Subscriber {
    fn matches(&self, envelope: &EventEnvelope) -> bool {
        if let Some(ref learner_id) = self.learner_id {
            if envelope.event.learner_id() != learner_id {
                return false;
            }
        }

        if let Some(session_id) = self.session_id {
            if envelope.event.session_id() != session_id {
                return false;
            }
        }

        true
    }
}

/// Fan-out of assessment notifications. Publishing never blocks and never fails;
/// events with no listener are dropped.
pub struct EventBus {
    global_sender: broadcast::Sender<EventEnvelope>,
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    event_count: RwLock<u64>,
}

impl EventBus {
    pub fn new() -> Self {
        let (global_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            global_sender,
            subscribers: RwLock::new(HashMap::new()),
            event_count: RwLock::new(0),
        }
    }

    pub fn publish(&self, event: AssessmentEvent) {
        let envelope = EventEnvelope::new(event);
        let event_type = envelope.event.event_type();

        *self.event_count.write() += 1;

        let mut sent_count = 0usize;
        for subscriber in self.subscribers.read().values() {
            if subscriber.matches(&envelope) && subscriber.sender.send(envelope.clone()).is_ok() {
                sent_count += 1;
            }
        }

        if self.global_sender.send(envelope.clone()).is_err() {
            debug!("No global subscribers for event");
        }

        debug!(
            event_type = event_type,
            learner_id = envelope.event.learner_id(),
            sent_to = sent_count,
            "Event published"
        );
    }

    pub fn subscribe_global(&self) -> broadcast::Receiver<EventEnvelope> {
        self.global_sender.subscribe()
    }

    pub fn subscribe_filtered(
        &self,
        learner_id: Option<String>,
        session_id: Option<SessionId>,
    ) -> (SubscriberId, broadcast::Receiver<EventEnvelope>) {
        let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
        let subscriber_id = uuid::Uuid::new_v4().to_string();

        self.subscribers.write().insert(
            subscriber_id.clone(),
            Subscriber {
                learner_id,
                session_id,
                sender,
            },
        );

        debug!(subscriber_id = %subscriber_id, "New filtered subscription created");

        (subscriber_id, receiver)
    }

    pub fn unsubscribe(&self, subscriber_id: &str) {
        if self.subscribers.write().remove(subscriber_id).is_some() {
            debug!(subscriber_id = %subscriber_id, "Subscription removed");
        }
    }

    pub fn event_count(&self) -> u64 {
        *self.event_count.read()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
