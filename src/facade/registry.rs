use crate::config::RegistryConfig;
use crate::context::Context;
use crate::core::{RegistryError, RegistryId, Result};
use crate::registry::active::{self, ActiveGuard};
use crate::registry::{ContextSlot, LifecycleListener, ListenerSlot, RegistryStats, RootGuard};
use crate::session::{EngineHandle, Session};
use lazy_static::lazy_static;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use tracing::{Level, event, info_span};

// Process-wide registry, configured from the environment on first use
lazy_static! {
    static ref GLOBAL_REGISTRY: SessionRegistry = SessionRegistry::from_env_or_default();
}

struct RegistryInner {
    id: RegistryId,
    config: RegistryConfig,
    contexts: Arc<ContextSlot>,
    listeners: Arc<ListenerSlot>,
    guard: RootGuard,
}

/// Context registry with thread-scoped active overrides
///
/// Cloning is cheap and yields a handle to the same registry. Independent
/// registries never see each other's contexts or overrides.
///
/// # Examples
///
/// ```
/// use sessionhub::{Context, LocalEngine, LocalSession, SessionRegistry};
///
/// let registry = SessionRegistry::default();
/// let engine = LocalEngine::new("example");
///
/// let ctx = registry.get_or_create(|| Context::root(LocalSession::new(engine.clone())));
/// assert_eq!(registry.get_instantiated_option(), Some(ctx.clone()));
///
/// // Shutting the engine down invalidates the registry
/// engine.stop();
/// assert!(registry.get_instantiated_option().is_none());
/// ```
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    /// Get the process-wide registry
    ///
    /// Configured from `SESSIONHUB_*` environment variables the first time it
    /// is used. Prefer an explicit registry wherever one can be passed down.
    pub fn global() -> &'static SessionRegistry {
        &GLOBAL_REGISTRY
    }

    /// Create an independent registry
    pub fn new(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RegistryConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                id: RegistryId::next(),
                guard: RootGuard::new(config.allow_multiple_roots),
                config,
                contexts: Arc::new(ContextSlot::new()),
                listeners: Arc::new(ListenerSlot::new()),
            }),
        }
    }

    fn from_env_or_default() -> Self {
        let config = RegistryConfig::from_env().unwrap_or_else(|err| {
            event!(Level::WARN, error = %err, "ignoring invalid registry environment");
            RegistryConfig::default()
        });
        Self::new(config).unwrap_or_default()
    }

    pub fn id(&self) -> RegistryId {
        self.inner.id
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    // ------------------------------------------------------------------
    // Instantiated context
    // ------------------------------------------------------------------

    /// Return the context the calling thread should use, creating one if needed
    ///
    /// A live active override wins. Otherwise the live instantiated context
    /// is returned, or `factory` builds one that is published as the new
    /// instantiated context. Concurrent callers racing on an empty registry
    /// all receive the same context.
    ///
    /// `factory` runs under the registry's publication lock and must not call
    /// `create_root`, `set_instantiated` or `get_or_create` on this registry.
    pub fn get_or_create<F>(&self, factory: F) -> Context
    where
        F: FnOnce() -> Context,
    {
        if let Some(ctx) = self.get_active().filter(|ctx| !ctx.is_stopped()) {
            return ctx;
        }

        let (ctx, published) = self.inner.contexts.get_or_create(factory);
        if published {
            self.bind_listener(&ctx);
        }
        ctx
    }

    /// Construct a root context over `session` under the uniqueness guard
    ///
    /// Fails with [`RegistryError::DuplicateRoot`] when multiple roots are not
    /// allowed and a live root is already instantiated. On success the new
    /// context is offered to the registry; it becomes the instantiated
    /// context only if none is live, and only then is the lifecycle listener
    /// bound to its engine.
    #[track_caller]
    pub fn create_root(&self, session: Arc<dyn Session>) -> Result<Context> {
        let call_site = Location::caller();
        let span = info_span!("create_root", registry = %self.inner.config.name, site = %call_site);
        let _enter = span.enter();

        let _ticket = self.inner.guard.begin(call_site);
        self.inner.guard.check(&self.inner.contexts)?;

        let ctx = Context::root_at(session, call_site);
        if self.inner.contexts.set_if_absent_or_stopped(&ctx) {
            self.bind_listener(&ctx);
        }

        event!(Level::DEBUG, context = %ctx.id(), "root context constructed");
        Ok(ctx)
    }

    /// Publish `ctx` unless a live context is already instantiated
    pub fn set_if_absent_or_stopped(&self, ctx: &Context) -> bool {
        let published = self.inner.contexts.set_if_absent_or_stopped(ctx);
        if published {
            self.bind_listener(ctx);
        }
        published
    }

    /// Make `ctx` the instantiated context, replacing whatever is there
    ///
    /// A root context is subject to the uniqueness guard: unless multiple
    /// roots are allowed, replacing a different live root fails with
    /// [`RegistryError::DuplicateRoot`] and leaves the registry unchanged.
    /// Derived contexts are always accepted.
    pub fn set_instantiated(&self, ctx: &Context) -> Result<()> {
        if ctx.is_root() {
            let guard = &self.inner.guard;
            self.inner.contexts.set_checked(ctx, |live| {
                guard.check_live(live.filter(|existing| !Context::ptr_eq(existing, ctx)))
            })?;
            self.bind_listener(ctx);
        } else {
            self.inner.contexts.set(ctx);
        }
        Ok(())
    }

    /// Forget the instantiated context. Idempotent.
    pub fn clear_instantiated(&self) {
        self.inner.contexts.clear();
    }

    /// The instantiated context, whether or not it is stopped
    pub fn get_instantiated_option(&self) -> Option<Context> {
        self.inner.contexts.load()
    }

    // ------------------------------------------------------------------
    // Active override (calling thread only)
    // ------------------------------------------------------------------

    /// Pin the calling thread to `ctx`
    ///
    /// Threads spawned through [`active::spawn`](crate::active::spawn) after
    /// this call inherit a copy of the override.
    pub fn set_active(&self, ctx: &Context) {
        if ctx.is_stopped() {
            event!(
                Level::WARN,
                context = %ctx.id(),
                "active override set to a stopped context; get_or_create will ignore it"
            );
        }
        active::set(self.inner.id, ctx.clone());
    }

    /// Remove the calling thread's override
    pub fn clear_active(&self) {
        active::clear(self.inner.id);
    }

    /// The calling thread's override, whether or not it is stopped
    pub fn get_active(&self) -> Option<Context> {
        active::get(self.inner.id)
    }

    /// Pin the calling thread to `ctx` until the guard drops
    pub fn enter_active(&self, ctx: &Context) -> ActiveGuard {
        ActiveGuard::enter(self.inner.id, ctx.clone())
    }

    /// Run `f` with the calling thread pinned to `ctx`
    pub fn with_active<F, R>(&self, ctx: &Context, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = self.enter_active(ctx);
        f()
    }

    /// The live override, else the live instantiated context
    pub fn active(&self) -> Result<Context> {
        self.get_active()
            .filter(|ctx| !ctx.is_stopped())
            .or_else(|| self.inner.contexts.live())
            .ok_or(RegistryError::NoActiveContext)
    }

    /// Clear the calling thread's override and the instantiated context
    pub fn cleanup_any_existing(&self) {
        self.clear_active();
        self.clear_instantiated();
    }

    // ------------------------------------------------------------------
    // Lifecycle listener
    // ------------------------------------------------------------------

    /// Attach the lifecycle listener to `sc`'s bus, once
    ///
    /// Only the first engine ever gets a listener; later calls return it
    /// whatever engine they pass. The registry itself rebinds when a root
    /// over another engine is published.
    pub fn ensure_listener_attached(&self, sc: &dyn EngineHandle) -> Arc<LifecycleListener> {
        let inner = &self.inner;
        inner
            .listeners
            .ensure_attached(sc, inner.config.ui_enabled, || self.make_listener(sc))
    }

    // Bind the listener to the engine of a freshly published root, replacing
    // a listener left on an older engine
    fn bind_listener(&self, ctx: &Context) {
        if !ctx.is_root() {
            return;
        }
        let handle = ctx.wrapped_handle();
        let sc = handle.as_ref();
        self.inner
            .listeners
            .ensure_bound(sc, self.inner.config.ui_enabled, || self.make_listener(sc));
    }

    fn make_listener(&self, sc: &dyn EngineHandle) -> LifecycleListener {
        LifecycleListener::new(
            self.inner.id,
            sc.engine_id(),
            Arc::downgrade(&self.inner.contexts),
            Arc::downgrade(&self.inner.listeners),
        )
    }

    /// The attached lifecycle listener, if any
    pub fn listener(&self) -> Option<Arc<LifecycleListener>> {
        self.inner.listeners.get()
    }

    pub fn stats(&self) -> RegistryStats {
        self.inner.contexts.counters().snapshot()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::build(RegistryConfig::default())
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("id", &self.inner.id)
            .field("name", &self.inner.config.name)
            .field("instantiated", &self.inner.contexts.load().map(|ctx| ctx.id()))
            .field("listener_attached", &self.inner.listeners.get().is_some())
            .finish()
    }
}
