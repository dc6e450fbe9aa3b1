use super::stats::RegistryCounters;
use crate::context::{Context, ContextInner};
use crate::core::Result;
use arc_swap::ArcSwapOption;
use std::sync::{Mutex, PoisonError};
use tracing::{Level, event};

/// Slot holding the instantiated (default) context
///
/// Reads are lock-free. Writers that must not overwrite a live context
/// serialize on `publish_lock` and re-check before storing.
pub struct ContextSlot {
    current: ArcSwapOption<ContextInner>,
    publish_lock: Mutex<()>,
    counters: RegistryCounters,
}

impl ContextSlot {
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
            publish_lock: Mutex::new(()),
            counters: RegistryCounters::default(),
        }
    }

    /// Current value, stopped or not
    pub fn load(&self) -> Option<Context> {
        self.current.load_full().map(Context::from_inner)
    }

    /// Current value if it is not stopped
    pub fn live(&self) -> Option<Context> {
        self.load().filter(|ctx| !ctx.is_stopped())
    }

    /// Return the live context, building and publishing one if there is none
    ///
    /// `factory` runs at most once per call and only while the publish lock
    /// is held, so concurrent callers never build duplicates. It must not call
    /// back into this slot's writers. The flag is true when this call
    /// published the returned context.
    pub fn get_or_create<F>(&self, factory: F) -> (Context, bool)
    where
        F: FnOnce() -> Context,
    {
        if let Some(ctx) = self.live() {
            return (ctx, false);
        }

        let _guard = self.publish_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have published while we waited for the lock.
        if let Some(ctx) = self.live() {
            return (ctx, false);
        }

        let ctx = factory();
        self.current.store(Some(ctx.share_inner()));
        self.counters.record_published();
        event!(Level::DEBUG, context = %ctx.id(), root = ctx.is_root(), "context published");
        (ctx, true)
    }

    /// Publish `ctx` unless a live context already occupies the slot
    ///
    /// The first writer wins. A losing candidate is left to the caller, who
    /// normally just drops it.
    pub fn set_if_absent_or_stopped(&self, ctx: &Context) -> bool {
        let _guard = self.publish_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = self.live() {
            if !Context::ptr_eq(&existing, ctx) {
                self.counters.record_discarded();
                event!(
                    Level::DEBUG,
                    candidate = %ctx.id(),
                    winner = %existing.id(),
                    "context candidate discarded"
                );
            }
            return false;
        }

        self.current.store(Some(ctx.share_inner()));
        self.counters.record_published();
        event!(Level::DEBUG, context = %ctx.id(), root = ctx.is_root(), "context published");
        true
    }

    /// Unconditionally replace the slot's value
    pub fn set(&self, ctx: &Context) {
        let _guard = self.publish_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.current.store(Some(ctx.share_inner()));
        self.counters.record_published();
    }

    /// Replace the slot's value once `check` accepts the current live value
    ///
    /// `check` runs under the publish lock, so no other writer can publish
    /// between the check and the store.
    pub fn set_checked<C>(&self, ctx: &Context, check: C) -> Result<()>
    where
        C: FnOnce(Option<Context>) -> Result<()>,
    {
        let _guard = self.publish_lock.lock().unwrap_or_else(PoisonError::into_inner);
        check(self.live())?;
        self.current.store(Some(ctx.share_inner()));
        self.counters.record_published();
        event!(Level::DEBUG, context = %ctx.id(), root = ctx.is_root(), "context replaced");
        Ok(())
    }

    /// Empty the slot. Idempotent.
    pub fn clear(&self) {
        if let Some(previous) = self.current.swap(None).map(Context::from_inner) {
            self.counters.record_cleared();
            event!(Level::DEBUG, context = %previous.id(), "context cleared");
        }
    }

    pub(crate) fn counters(&self) -> &RegistryCounters {
        &self.counters
    }
}

impl Default for ContextSlot {
    fn default() -> Self {
        Self::new()
    }
}
