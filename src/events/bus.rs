use super::{EngineEvent, EngineListener, EventBus};
use log::{debug, error};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

/// In-process event bus
///
/// Delivery is synchronous on the posting thread. A listener that panics is
/// logged and skipped; the remaining listeners still see the event.
pub struct ListenerBus {
    listeners: RwLock<Vec<Arc<dyn EngineListener>>>,
    posted: AtomicU64,
}

impl ListenerBus {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            posted: AtomicU64::new(0),
        }
    }

    /// Post an event from a freshly spawned thread
    ///
    /// Models an engine whose shutdown notification arrives asynchronously.
    pub fn post_detached(self: &Arc<Self>, event: EngineEvent) -> JoinHandle<()> {
        let bus = Arc::clone(self);
        thread::spawn(move || bus.post(event))
    }

    /// Total number of events posted
    pub fn posted_count(&self) -> u64 {
        self.posted.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> Vec<Arc<dyn EngineListener>> {
        // Listeners run outside the lock so they may subscribe or post themselves.
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for ListenerBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for ListenerBus {
    fn subscribe(&self, listener: Arc<dyn EngineListener>) {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        listeners.push(listener);
        debug!("listener subscribed ({} total)", listeners.len());
    }

    fn post(&self, event: EngineEvent) {
        self.posted.fetch_add(1, Ordering::SeqCst);

        for listener in self.snapshot() {
            let delivered = catch_unwind(AssertUnwindSafe(|| listener.on_event(&event)));
            if delivered.is_err() {
                error!("listener panicked while handling {:?}", event);
            }
        }
    }

    fn subscription_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
