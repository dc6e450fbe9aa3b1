// ============================================================================
// sessionhub Library
// ============================================================================
//
// Process-wide context registry with thread-scoped active overrides.
//
// Callers share one instantiated context per registry, created on demand by
// whichever caller gets there first. Any thread may pin itself (and the
// threads it spawns) to a different context. When the engine behind the
// instantiated context ends, the registry clears itself and the next caller
// starts fresh.
//
// ============================================================================

pub mod config;
pub mod context;
pub mod core;
pub mod events;
pub mod facade;
pub mod registry;
pub mod session;

// Re-export main types for convenience
pub use config::RegistryConfig;
pub use context::Context;
pub use crate::core::{ContextId, RegistryError, RegistryId, Result};
pub use events::{EngineEvent, EngineListener, EventBus, ListenerBus};
pub use facade::SessionRegistry;
pub use registry::active;
pub use registry::{
    ActiveGuard, ActiveSnapshot, LifecycleListener, ListenerSnapshot, RegistryStats, WithActive,
};
pub use session::{EngineHandle, LocalEngine, LocalSession, MonitorTab, RecordingUi, Session, UiSurface};
