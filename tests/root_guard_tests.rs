/// Root uniqueness tests

use sessionhub::{
    Context, LocalEngine, LocalSession, RegistryConfig, RegistryError, SessionRegistry,
};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_second_live_root_is_rejected() {
    let registry = SessionRegistry::default();
    let first = registry
        .create_root(LocalSession::new(LocalEngine::new("first")))
        .unwrap();

    let err = registry
        .create_root(LocalSession::new(LocalEngine::new("second")))
        .unwrap_err();

    assert_eq!(
        err,
        RegistryError::DuplicateRoot {
            existing: first.id(),
            created_at: first.call_site().to_string(),
        }
    );
    let message = err.to_string();
    assert!(message.contains("get_or_create"));
    assert!(message.contains(file!()));
}

#[test]
fn test_root_after_stopped_root_succeeds() {
    let registry = SessionRegistry::default();
    let session = LocalSession::new(LocalEngine::new("first"));
    let first = registry.create_root(session.clone()).unwrap();

    session.close();

    let second = registry
        .create_root(LocalSession::new(LocalEngine::new("second")))
        .unwrap();
    assert_ne!(first, second);
    assert_eq!(registry.get_instantiated_option(), Some(second));
}

#[test]
fn test_root_after_engine_end_succeeds() {
    let registry = SessionRegistry::default();
    let engine = LocalEngine::new("first");
    registry.create_root(LocalSession::new(engine.clone())).unwrap();

    engine.stop();

    assert!(registry
        .create_root(LocalSession::new(LocalEngine::new("second")))
        .is_ok());
}

#[test]
fn test_get_or_create_root_blocks_direct_construction() {
    let registry = SessionRegistry::default();
    let engine = LocalEngine::new("shared");
    registry.get_or_create(|| Context::root(LocalSession::new(engine.clone())));

    let result = registry.create_root(LocalSession::new(engine.clone()));

    assert!(matches!(result, Err(RegistryError::DuplicateRoot { .. })));
}

#[test]
fn test_multiple_roots_when_allowed() {
    let config = RegistryConfig::new().allow_multiple_roots(true);
    let registry = SessionRegistry::new(config).unwrap();

    let roots: Vec<Context> = (0..3)
        .map(|i| {
            registry
                .create_root(LocalSession::new(LocalEngine::new(&format!("root-{}", i))))
                .unwrap()
        })
        .collect();

    assert_eq!(registry.get_instantiated_option(), Some(roots[0].clone()));
    assert_eq!(registry.stats().discarded, 2);
}

#[test]
fn test_derived_contexts_skip_the_guard() {
    let registry = SessionRegistry::default();
    let engine = LocalEngine::new("derived");
    let root = registry
        .create_root(LocalSession::new(engine.clone()))
        .unwrap();

    let child = root.derive(LocalSession::new(engine.clone()));
    registry.set_active(&child);

    assert!(!child.is_root());
    assert_eq!(registry.get_or_create(|| unreachable!()), child);
    registry.clear_active();
}

#[test]
fn test_concurrent_root_construction_publishes_one() {
    let registry = SessionRegistry::default();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = registry.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let session = LocalSession::new(LocalEngine::new(&format!("racer-{}", i)));
                barrier.wait();
                registry.create_root(session)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let instantiated = registry.get_instantiated_option().unwrap();

    // Every success is either the published root or a loser that was offered
    // while the winner had not been stored yet; every failure names the winner.
    for result in &results {
        match result {
            Ok(_) => {}
            Err(RegistryError::DuplicateRoot { existing, .. }) => {
                assert_eq!(*existing, instantiated.id())
            }
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert!(results.iter().any(|r| matches!(r, Ok(ctx) if *ctx == instantiated)));
    assert_eq!(registry.stats().published, 1);
}
