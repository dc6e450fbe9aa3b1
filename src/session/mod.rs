// ============================================================================
// Session Collaborator
// ============================================================================
//
// The registry never looks inside a session. It only needs to know whether
// the session is stopped and which engine handle it wraps; the engine in turn
// provides the event bus and an optional UI surface.
//
// ============================================================================

pub mod local;

pub use local::{LocalEngine, LocalSession, RecordingUi};

use crate::events::EventBus;
use crate::registry::LifecycleListener;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Execution engine wrapped by one or more sessions
pub trait EngineHandle: Send + Sync {
    /// Unique id of this engine instance
    fn engine_id(&self) -> Uuid;

    /// Human readable application name
    fn app_name(&self) -> &str;

    /// Whether the engine has shut down
    fn is_stopped(&self) -> bool;

    /// Bus on which the engine publishes lifecycle events
    fn event_bus(&self) -> Arc<dyn EventBus>;

    /// Monitoring UI, if the engine runs one
    fn ui(&self) -> Option<Arc<dyn UiSurface>>;
}

/// Opaque session handle owned by a [`Context`](crate::Context)
pub trait Session: Send + Sync {
    fn is_stopped(&self) -> bool;

    fn wrapped_handle(&self) -> Arc<dyn EngineHandle>;
}

/// Monitoring UI that accepts extra tabs
pub trait UiSurface: Send + Sync {
    fn attach_tab(&self, tab: MonitorTab);
}

/// UI tab bound to the registry's lifecycle listener
#[derive(Clone)]
pub struct MonitorTab {
    title: String,
    listener: Arc<LifecycleListener>,
}

impl MonitorTab {
    pub const TITLE: &'static str = "Sessions";

    pub fn new(listener: Arc<LifecycleListener>) -> Self {
        Self {
            title: Self::TITLE.to_string(),
            listener,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn listener(&self) -> &Arc<LifecycleListener> {
        &self.listener
    }
}

impl fmt::Debug for MonitorTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorTab")
            .field("title", &self.title)
            .field("listener", &self.listener.snapshot())
            .finish()
    }
}
