mod event_bus;

pub use event_bus::{
    AssessmentEvent, DifficultyChangedPayload, EventBus, EventEnvelope, SessionCompletedPayload,
    SessionStartedPayload,
};
