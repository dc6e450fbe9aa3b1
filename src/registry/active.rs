//! Thread-scoped active overrides.
//!
//! Every thread owns one table mapping registry ids to the context that
//! thread is pinned to. Nothing here is shared between threads, so no
//! locking is involved. Inheritance is explicit: [`ActiveSnapshot::capture`]
//! copies the current thread's table, and the spawn helpers install that
//! copy in the child before running it. Parent and child evolve
//! independently afterwards.
//!
//! Entries are never pruned on their own. An override keeps its context (and
//! through it the session and engine) alive until the owning thread calls
//! `clear_active` or exits, even after the registry itself is dropped.

use crate::context::Context;
use crate::core::RegistryId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use std::thread::{self, JoinHandle};

thread_local! {
    static ACTIVE: RefCell<HashMap<RegistryId, Context>> = RefCell::new(HashMap::new());
}

pub(crate) fn set(registry: RegistryId, ctx: Context) -> Option<Context> {
    ACTIVE.with(|table| table.borrow_mut().insert(registry, ctx))
}

pub(crate) fn get(registry: RegistryId) -> Option<Context> {
    ACTIVE.with(|table| table.borrow().get(&registry).cloned())
}

pub(crate) fn clear(registry: RegistryId) -> Option<Context> {
    ACTIVE.with(|table| table.borrow_mut().remove(&registry))
}

fn restore(registry: RegistryId, prev: Option<Context>) {
    match prev {
        Some(ctx) => {
            set(registry, ctx);
        }
        None => {
            clear(registry);
        }
    }
}

/// Guard that restores the previous override of one registry on drop.
pub struct ActiveGuard {
    registry: RegistryId,
    prev: Option<Context>,
    _not_send: PhantomData<*const ()>,
}

impl ActiveGuard {
    pub(crate) fn enter(registry: RegistryId, ctx: Context) -> Self {
        let prev = set(registry, ctx);
        Self {
            registry,
            prev,
            _not_send: PhantomData,
        }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        restore(self.registry, self.prev.take());
    }
}

/// Copy of a thread's active overrides, taken at one instant
#[derive(Clone, Default)]
pub struct ActiveSnapshot {
    entries: HashMap<RegistryId, Context>,
}

impl ActiveSnapshot {
    /// Capture the calling thread's overrides
    pub fn capture() -> Self {
        let entries = ACTIVE.with(|table| table.borrow().clone());
        Self { entries }
    }

    pub fn get(&self, registry: RegistryId) -> Option<&Context> {
        self.entries.get(&registry)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Install this snapshot as the calling thread's whole table
    ///
    /// The thread's previous table comes back when the guard drops.
    pub fn enter(&self) -> SnapshotGuard {
        let prev = ACTIVE.with(|table| table.replace(self.entries.clone()));
        SnapshotGuard {
            prev: Some(prev),
            _not_send: PhantomData,
        }
    }

    /// Run `f` with this snapshot installed
    pub fn run<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = self.enter();
        f()
    }

    /// Wrap a future so that it runs with its own copy of this snapshot
    ///
    /// The copy is installed around every poll and taken back out afterwards,
    /// so overrides the future sets or clears persist across `.await` points
    /// and never leak into the polling thread. Needed on multi-threaded
    /// executors, where consecutive polls of one task may land on different
    /// worker threads.
    pub fn instrument<F>(self, future: F) -> WithActive<F>
    where
        F: Future,
    {
        WithActive {
            table: self.entries,
            inner: Box::pin(future),
        }
    }
}

impl std::fmt::Debug for ActiveSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v.id())))
            .finish()
    }
}

/// Guard returned by [`ActiveSnapshot::enter`]
pub struct SnapshotGuard {
    prev: Option<HashMap<RegistryId, Context>>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for SnapshotGuard {
    fn drop(&mut self) {
        if let Some(prev) = self.prev.take() {
            ACTIVE.with(|table| {
                *table.borrow_mut() = prev;
            });
        }
    }
}

/// Future that owns its override table across polls
pub struct WithActive<F: Future> {
    table: HashMap<RegistryId, Context>,
    inner: Pin<Box<F>>,
}

/// Swaps an owned table into the thread for one poll, and back out on drop
struct TableSwap<'a> {
    owned: &'a mut HashMap<RegistryId, Context>,
}

impl<'a> TableSwap<'a> {
    fn enter(owned: &'a mut HashMap<RegistryId, Context>) -> Self {
        ACTIVE.with(|table| std::mem::swap(&mut *table.borrow_mut(), owned));
        Self { owned }
    }
}

impl Drop for TableSwap<'_> {
    fn drop(&mut self) {
        ACTIVE.with(|table| std::mem::swap(&mut *table.borrow_mut(), self.owned));
    }
}

impl<F: Future> Future for WithActive<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let _swap = TableSwap::enter(&mut this.table);
        this.inner.as_mut().poll(cx)
    }
}

/// Spawn a thread that inherits the caller's active overrides
pub fn spawn<F, T>(f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let snapshot = ActiveSnapshot::capture();
    thread::spawn(move || snapshot.run(f))
}

/// Named variant of [`spawn`]
pub fn spawn_named<F, T>(name: impl Into<String>, f: F) -> io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let snapshot = ActiveSnapshot::capture();
    thread::Builder::new()
        .name(name.into())
        .spawn(move || snapshot.run(f))
}

/// Spawn a tokio task that inherits the caller's active overrides
pub fn spawn_task<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(ActiveSnapshot::capture().instrument(future))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{LocalEngine, LocalSession};

    fn new_ctx() -> Context {
        Context::root(LocalSession::new(LocalEngine::new("active-test")))
    }

    #[test]
    fn test_set_get_clear() {
        let id = RegistryId::next();
        let ctx = new_ctx();

        assert!(get(id).is_none());
        set(id, ctx.clone());
        assert_eq!(get(id), Some(ctx));

        clear(id);
        assert!(get(id).is_none());
    }

    #[test]
    fn test_registries_do_not_share_entries() {
        let a = RegistryId::next();
        let b = RegistryId::next();
        set(a, new_ctx());

        assert!(get(b).is_none());
        clear(a);
    }

    #[test]
    fn test_guard_restores_previous() {
        let id = RegistryId::next();
        let outer = new_ctx();
        let inner = new_ctx();
        set(id, outer.clone());

        {
            let _guard = ActiveGuard::enter(id, inner.clone());
            assert_eq!(get(id), Some(inner));
        }

        assert_eq!(get(id), Some(outer));
        clear(id);
    }

    #[test]
    fn test_guard_restores_absence() {
        let id = RegistryId::next();
        {
            let _guard = ActiveGuard::enter(id, new_ctx());
            assert!(get(id).is_some());
        }
        assert!(get(id).is_none());
    }

    #[test]
    fn test_spawned_thread_gets_snapshot() {
        let id = RegistryId::next();
        let ctx = new_ctx();
        set(id, ctx.clone());

        let seen = spawn(move || get(id)).join().unwrap();

        assert_eq!(seen, Some(ctx));
        clear(id);
    }

    #[test]
    fn test_plain_thread_does_not_inherit() {
        let id = RegistryId::next();
        set(id, new_ctx());

        let seen = thread::spawn(move || get(id)).join().unwrap();

        assert!(seen.is_none());
        clear(id);
    }

    #[test]
    fn test_child_changes_do_not_leak_to_parent() {
        let id = RegistryId::next();
        let ctx = new_ctx();
        set(id, ctx.clone());

        spawn_named("child", move || {
            clear(id);
            assert!(get(id).is_none());
        })
        .unwrap()
        .join()
        .unwrap();

        assert_eq!(get(id), Some(ctx));
        clear(id);
    }

    #[test]
    fn test_snapshot_guard_restores_table() {
        let id = RegistryId::next();
        let snapshot = {
            let _guard = ActiveGuard::enter(id, new_ctx());
            ActiveSnapshot::capture()
        };
        assert!(get(id).is_none());

        snapshot.run(|| assert!(get(id).is_some()));

        assert!(get(id).is_none());
    }

    #[test]
    fn test_instrumented_future_keeps_its_own_changes() {
        let id = RegistryId::next();
        let inherited = new_ctx();
        let replaced = new_ctx();
        let snapshot = {
            let _guard = ActiveGuard::enter(id, inherited.clone());
            ActiveSnapshot::capture()
        };

        let expected = replaced.clone();
        let seen = tokio_test::block_on(snapshot.instrument(async move {
            set(id, replaced);
            tokio::task::yield_now().await;
            let after_set = get(id);
            clear(id);
            tokio::task::yield_now().await;
            (after_set, get(id))
        }));

        assert_eq!(seen, (Some(expected), None));
        // Nothing the future did reached the polling thread
        assert!(get(id).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_spawn_task_inherits_override() {
        let id = RegistryId::next();
        let ctx = new_ctx();
        set(id, ctx.clone());

        let seen = spawn_task(async move {
            tokio::task::yield_now().await;
            get(id)
        })
        .await
        .unwrap();

        assert_eq!(seen, Some(ctx));
        clear(id);
    }
}
