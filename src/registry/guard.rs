use super::slot::ContextSlot;
use crate::context::Context;
use crate::core::{RegistryError, Result};
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{Level, event};

#[derive(Debug, Clone, Copy)]
struct ConstructionMarker {
    token: u64,
    call_site: &'static Location<'static>,
}

/// Root uniqueness guard
///
/// Besides rejecting a second live root, it remembers which root
/// constructions are in flight so that overlapping constructions are logged.
/// Markers stack: a nested construction does not hide the outer one.
pub struct RootGuard {
    allow_multiple_roots: bool,
    constructing: Mutex<Vec<ConstructionMarker>>,
    next_token: AtomicU64,
}

impl RootGuard {
    pub fn new(allow_multiple_roots: bool) -> Self {
        Self {
            allow_multiple_roots,
            constructing: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }
    }

    pub fn allows_multiple_roots(&self) -> bool {
        self.allow_multiple_roots
    }

    /// Fail if a live root already occupies `slot` and multiple roots are not allowed
    pub fn check(&self, slot: &ContextSlot) -> Result<()> {
        self.check_live(slot.live())
    }

    /// Fail if `live` is a root and multiple roots are not allowed
    pub fn check_live(&self, live: Option<Context>) -> Result<()> {
        if self.allow_multiple_roots {
            return Ok(());
        }

        match live.filter(|ctx| ctx.is_root()) {
            Some(existing) => {
                event!(
                    Level::WARN,
                    existing = %existing.id(),
                    created_at = %existing.call_site(),
                    "rejected construction of a second root context"
                );
                Err(RegistryError::DuplicateRoot {
                    existing: existing.id(),
                    created_at: existing.call_site().to_string(),
                })
            }
            None => Ok(()),
        }
    }

    /// Mark a root construction as in flight until the ticket drops
    pub fn begin(&self, call_site: &'static Location<'static>) -> ConstructionTicket<'_> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let mut constructing = self
            .constructing
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(other) = constructing.last() {
            event!(
                Level::WARN,
                other = %other.call_site,
                this = %call_site,
                "another root context is being constructed concurrently; \
                 this may indicate an error"
            );
        }
        constructing.push(ConstructionMarker { token, call_site });

        ConstructionTicket { guard: self, token }
    }

    /// Call site of the most recent root construction still in flight, if any
    pub fn in_flight(&self) -> Option<&'static Location<'static>> {
        self.constructing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|marker| marker.call_site)
    }

    /// Number of root constructions in flight
    pub fn in_flight_count(&self) -> usize {
        self.constructing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Removes its construction marker on drop
pub struct ConstructionTicket<'a> {
    guard: &'a RootGuard,
    token: u64,
}

impl Drop for ConstructionTicket<'_> {
    fn drop(&mut self) {
        let mut constructing = self
            .guard
            .constructing
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = constructing.iter().rposition(|m| m.token == self.token) {
            constructing.remove(pos);
        }
    }
}
