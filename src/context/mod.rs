// ============================================================================
// Context Handle
// ============================================================================
//
// A Context is a cheap, clonable reference to a session. Clones share one
// allocation; equality is pointer identity of that allocation, so two
// contexts compare equal only if one is a clone of the other.
//
// ============================================================================

use crate::core::ContextId;
use crate::session::{EngineHandle, Session};
use chrono::{DateTime, Utc};
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

pub(crate) struct ContextInner {
    id: ContextId,
    session: Arc<dyn Session>,
    is_root: bool,
    parent: Option<ContextId>,
    created_at: DateTime<Utc>,
    call_site: &'static Location<'static>,
}

/// Shared handle to a session
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Build a root context over `session`
    ///
    /// This does not consult any registry. Use
    /// [`SessionRegistry::create_root`](crate::SessionRegistry::create_root)
    /// to construct a root under the uniqueness guard.
    #[track_caller]
    pub fn root(session: Arc<dyn Session>) -> Self {
        Self::root_at(session, Location::caller())
    }

    pub(crate) fn root_at(session: Arc<dyn Session>, call_site: &'static Location<'static>) -> Self {
        Self::build(session, true, None, call_site)
    }

    /// Build a non-root context whose parent is `self`
    #[track_caller]
    pub fn derive(&self, session: Arc<dyn Session>) -> Self {
        Self::build(session, false, Some(self.inner.id), Location::caller())
    }

    fn build(
        session: Arc<dyn Session>,
        is_root: bool,
        parent: Option<ContextId>,
        call_site: &'static Location<'static>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: ContextId::new(),
                session,
                is_root,
                parent,
                created_at: Utc::now(),
                call_site,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ContextInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn share_inner(&self) -> Arc<ContextInner> {
        Arc::clone(&self.inner)
    }

    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub fn is_root(&self) -> bool {
        self.inner.is_root
    }

    /// Id of the context this one was derived from
    pub fn parent(&self) -> Option<ContextId> {
        self.inner.parent
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.inner.session
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.inner.session.is_stopped()
    }

    pub fn wrapped_handle(&self) -> Arc<dyn EngineHandle> {
        self.inner.session.wrapped_handle()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// Source location that constructed this context
    pub fn call_site(&self) -> &'static Location<'static> {
        self.inner.call_site
    }

    /// Whether both contexts wrap the same engine instance
    pub fn same_engine(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.wrapped_handle(), &other.wrapped_handle())
    }

    pub fn ptr_eq(a: &Context, b: &Context) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        Context::ptr_eq(self, other)
    }
}

impl Eq for Context {}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("is_root", &self.inner.is_root)
            .field("parent", &self.inner.parent)
            .field("stopped", &self.is_stopped())
            .field("call_site", &format_args!("{}", self.inner.call_site))
            .finish()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{LocalEngine, LocalSession};

    #[test]
    fn test_root_context_records_call_site() {
        let engine = LocalEngine::new("ctx-test");
        let ctx = Context::root(LocalSession::new(engine));

        assert!(ctx.is_root());
        assert!(ctx.parent().is_none());
        assert_eq!(ctx.call_site().file(), file!());
    }

    #[test]
    fn test_derived_context_shares_engine() {
        let engine = LocalEngine::new("ctx-test");
        let root = Context::root(LocalSession::new(engine.clone()));
        let child = root.derive(LocalSession::new(engine));

        assert!(!child.is_root());
        assert_eq!(child.parent(), Some(root.id()));
        assert!(child.same_engine(&root));
        assert_ne!(child, root);
    }

    #[test]
    fn test_clones_are_identical() {
        let ctx = Context::root(LocalSession::new(LocalEngine::new("ctx-test")));
        let clone = ctx.clone();

        assert_eq!(ctx, clone);
        assert!(Context::ptr_eq(&ctx, &clone));
    }

    #[test]
    fn test_stopped_follows_session() {
        let session = LocalSession::new(LocalEngine::new("ctx-test"));
        let ctx = Context::root(session.clone());
        assert!(!ctx.is_stopped());

        session.close();
        assert!(ctx.is_stopped());
    }
}
