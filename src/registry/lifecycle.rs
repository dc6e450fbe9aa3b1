use super::listener::ListenerSlot;
use super::slot::ContextSlot;
use crate::core::RegistryId;
use crate::events::{EngineEvent, EngineListener};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Weak;
use tracing::{Level, event};
use uuid::Uuid;

/// Listener that tears a registry down when its engine ends
///
/// It holds only weak references to the registry, so an engine bus that
/// outlives the registry does not keep it alive.
pub struct LifecycleListener {
    registry: RegistryId,
    engine_id: Uuid,
    contexts: Weak<ContextSlot>,
    listeners: Weak<ListenerSlot>,
    attached_at: DateTime<Utc>,
    engine_ended: AtomicU64,
    detached: AtomicBool,
}

/// Point-in-time view of a [`LifecycleListener`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSnapshot {
    pub registry: RegistryId,
    pub engine_id: Uuid,
    pub attached_at: DateTime<Utc>,
    pub engine_ended_events: u64,
    pub detached: bool,
}

impl LifecycleListener {
    pub(crate) fn new(
        registry: RegistryId,
        engine_id: Uuid,
        contexts: Weak<ContextSlot>,
        listeners: Weak<ListenerSlot>,
    ) -> Self {
        Self {
            registry,
            engine_id,
            contexts,
            listeners,
            attached_at: Utc::now(),
            engine_ended: AtomicU64::new(0),
            detached: AtomicBool::new(false),
        }
    }

    pub fn engine_id(&self) -> Uuid {
        self.engine_id
    }

    pub fn snapshot(&self) -> ListenerSnapshot {
        ListenerSnapshot {
            registry: self.registry,
            engine_id: self.engine_id,
            attached_at: self.attached_at,
            engine_ended_events: self.engine_ended.load(Ordering::SeqCst),
            detached: self.is_detached(),
        }
    }

    /// Stop reacting to events
    ///
    /// Called when the registry rebinds to a newer engine. The listener stays
    /// subscribed to the old engine's bus but no longer touches the registry.
    pub(crate) fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    fn handle_engine_ended(&self) {
        let seen = self.engine_ended.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(contexts) = self.contexts.upgrade() {
            contexts.clear();
            contexts.counters().record_engine_ended();
        }
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.clear();
        }

        event!(
            Level::INFO,
            registry = %self.registry,
            engine = %self.engine_id,
            seen,
            "engine ended, registry cleared"
        );
    }
}

impl EngineListener for LifecycleListener {
    fn on_event(&self, event: &EngineEvent) {
        if event.is_engine_ended() && !self.is_detached() {
            self.handle_engine_ended();
        }
    }
}
