// ============================================================================
// Context Registry Internals
// ============================================================================
//
// - slot:      the instantiated context (lock-free reads, locked publication)
// - active:    per-thread overrides and their propagation to child threads
// - listener:  the single lifecycle listener attached to the engine bus
// - lifecycle: clears both slots when the engine ends
// - guard:     root uniqueness check
//
// ============================================================================

pub mod active;
pub mod guard;
pub mod lifecycle;
pub mod listener;
pub mod slot;
pub mod stats;

pub use active::{ActiveGuard, ActiveSnapshot, SnapshotGuard, WithActive};
pub use guard::RootGuard;
pub use lifecycle::{LifecycleListener, ListenerSnapshot};
pub use listener::ListenerSlot;
pub use slot::ContextSlot;
pub use stats::RegistryStats;
