// ============================================================================
// Engine Events
// ============================================================================
//
// Lifecycle notifications published by an engine handle. The registry only
// reacts to `EngineEnded`; everything else passes through untouched.
//
// ============================================================================

pub mod bus;

pub use bus::ListenerBus;

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Event published on an engine's bus
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The engine finished starting up
    EngineStarted {
        app_name: String,
        time: DateTime<Utc>,
    },
    /// The engine has shut down; every context wrapping it is now stopped
    EngineEnded { time: DateTime<Utc> },
    /// Any other application-defined notification
    Custom { name: String },
}

impl EngineEvent {
    pub fn started(app_name: &str) -> Self {
        Self::EngineStarted {
            app_name: app_name.to_string(),
            time: Utc::now(),
        }
    }

    pub fn ended() -> Self {
        Self::EngineEnded { time: Utc::now() }
    }

    pub fn is_engine_ended(&self) -> bool {
        matches!(self, Self::EngineEnded { .. })
    }
}

/// Receiver of engine events
pub trait EngineListener: Send + Sync {
    fn on_event(&self, event: &EngineEvent);
}

/// Publish/subscribe surface of an engine
pub trait EventBus: Send + Sync {
    /// Register a listener for every subsequent event
    fn subscribe(&self, listener: Arc<dyn EngineListener>);

    /// Deliver an event to every current subscriber
    fn post(&self, event: EngineEvent);

    /// Number of subscriptions made so far
    fn subscription_count(&self) -> usize;
}
