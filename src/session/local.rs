//! In-process engine and session implementations.
//!
//! These are complete, if minimal, collaborators: an engine with a real
//! [`ListenerBus`], a session that can be closed on its own, and a UI that
//! records the tabs attached to it. Tests and embedders that have no engine of
//! their own use them directly.

use super::{EngineHandle, MonitorTab, Session, UiSurface};
use crate::events::{EngineEvent, EventBus, ListenerBus};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{Level, event};
use uuid::Uuid;

/// Engine running inside the current process
pub struct LocalEngine {
    id: Uuid,
    app_name: String,
    bus: Arc<ListenerBus>,
    ui: Option<Arc<RecordingUi>>,
    stopped: AtomicBool,
}

impl LocalEngine {
    /// Start an engine without a UI
    pub fn new(app_name: &str) -> Arc<Self> {
        Self::build(app_name, None)
    }

    /// Start an engine that exposes the given UI
    pub fn with_ui(app_name: &str, ui: Arc<RecordingUi>) -> Arc<Self> {
        Self::build(app_name, Some(ui))
    }

    fn build(app_name: &str, ui: Option<Arc<RecordingUi>>) -> Arc<Self> {
        let engine = Arc::new(Self {
            id: Uuid::new_v4(),
            app_name: app_name.to_string(),
            bus: Arc::new(ListenerBus::new()),
            ui,
            stopped: AtomicBool::new(false),
        });
        engine.bus.post(EngineEvent::started(app_name));
        engine
    }

    /// Concrete bus, for posting events directly
    pub fn bus(&self) -> &Arc<ListenerBus> {
        &self.bus
    }

    /// Shut the engine down and announce it on the bus
    ///
    /// Only the first call posts `EngineEnded`.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        event!(Level::INFO, engine = %self.id, app = %self.app_name, "engine stopping");
        self.bus.post(EngineEvent::ended());
    }
}

impl EngineHandle for LocalEngine {
    fn engine_id(&self) -> Uuid {
        self.id
    }

    fn app_name(&self) -> &str {
        &self.app_name
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn event_bus(&self) -> Arc<dyn EventBus> {
        self.bus.clone()
    }

    fn ui(&self) -> Option<Arc<dyn UiSurface>> {
        self.ui.clone().map(|ui| ui as Arc<dyn UiSurface>)
    }
}

impl fmt::Debug for LocalEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalEngine")
            .field("id", &self.id)
            .field("app_name", &self.app_name)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Session over a shared [`LocalEngine`]
///
/// A session is stopped when its engine is, or once it is closed itself.
#[derive(Debug)]
pub struct LocalSession {
    engine: Arc<LocalEngine>,
    closed: AtomicBool,
}

impl LocalSession {
    pub fn new(engine: Arc<LocalEngine>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            closed: AtomicBool::new(false),
        })
    }

    pub fn engine(&self) -> &Arc<LocalEngine> {
        &self.engine
    }

    /// Close this session without touching the engine
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Session for LocalSession {
    fn is_stopped(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.engine.is_stopped()
    }

    fn wrapped_handle(&self) -> Arc<dyn EngineHandle> {
        self.engine.clone()
    }
}

/// UI surface that keeps every tab attached to it
#[derive(Default)]
pub struct RecordingUi {
    tabs: Mutex<Vec<MonitorTab>>,
}

impl RecordingUi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn tabs(&self) -> Vec<MonitorTab> {
        self.tabs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl UiSurface for RecordingUi {
    fn attach_tab(&self, tab: MonitorTab) {
        self.tabs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tab);
    }
}
