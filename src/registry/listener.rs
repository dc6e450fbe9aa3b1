use super::lifecycle::LifecycleListener;
use crate::session::{EngineHandle, MonitorTab};
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tracing::{Level, event};

/// Slot holding the registry's single attached listener
pub struct ListenerSlot {
    current: ArcSwapOption<LifecycleListener>,
}

impl ListenerSlot {
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
        }
    }

    pub fn get(&self) -> Option<Arc<LifecycleListener>> {
        self.current.load_full()
    }

    /// Return the attached listener, attaching `make()` to `engine` if none is
    ///
    /// Racing callers may each build a candidate, but only the one whose
    /// compare-and-swap succeeds subscribes it and attaches the UI tab.
    pub fn ensure_attached<F>(
        &self,
        engine: &dyn EngineHandle,
        ui_enabled: bool,
        make: F,
    ) -> Arc<LifecycleListener>
    where
        F: FnOnce() -> LifecycleListener,
    {
        if let Some(listener) = self.current.load_full() {
            return listener;
        }

        let candidate = Arc::new(make());
        let empty: Option<Arc<LifecycleListener>> = None;
        let prev = self
            .current
            .compare_and_swap(&empty, Some(Arc::clone(&candidate)));

        if let Some(winner) = &*prev {
            return Arc::clone(winner);
        }

        Self::attach(engine, ui_enabled, &candidate);
        candidate
    }

    /// Like [`ensure_attached`](Self::ensure_attached), but bound to `engine`
    ///
    /// A listener attached to a different engine is replaced: the candidate
    /// is swapped in, subscribed to `engine`, and the old listener is
    /// detached so its engine can no longer tear the registry down.
    pub fn ensure_bound<F>(
        &self,
        engine: &dyn EngineHandle,
        ui_enabled: bool,
        make: F,
    ) -> Arc<LifecycleListener>
    where
        F: FnOnce() -> LifecycleListener,
    {
        let engine_id = engine.engine_id();
        let current = self.current.load_full();
        if let Some(listener) = current.as_ref().filter(|l| l.engine_id() == engine_id) {
            return Arc::clone(listener);
        }

        let candidate = Arc::new(make());
        let mut current = current;
        loop {
            let prev = self
                .current
                .compare_and_swap(&current, Some(Arc::clone(&candidate)));

            let won = match (&*prev, &current) {
                (None, None) => true,
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            };
            if won {
                if let Some(old) = current {
                    old.detach();
                }
                Self::attach(engine, ui_enabled, &candidate);
                return candidate;
            }

            // Someone else changed the slot; their listener may already fit
            current = (*prev).clone();
            if let Some(listener) = current.as_ref().filter(|l| l.engine_id() == engine_id) {
                return Arc::clone(listener);
            }
        }
    }

    fn attach(engine: &dyn EngineHandle, ui_enabled: bool, listener: &Arc<LifecycleListener>) {
        engine.event_bus().subscribe(listener.clone());
        if ui_enabled {
            if let Some(ui) = engine.ui() {
                ui.attach_tab(MonitorTab::new(Arc::clone(listener)));
            }
        }

        event!(
            Level::INFO,
            engine = %engine.engine_id(),
            app = engine.app_name(),
            "lifecycle listener attached"
        );
    }

    /// Forget the attached listener. Idempotent.
    pub fn clear(&self) {
        self.current.store(None);
    }
}

impl Default for ListenerSlot {
    fn default() -> Self {
        Self::new()
    }
}
