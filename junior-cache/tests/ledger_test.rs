use std::sync::Arc;
use std::time::Duration;

use junior_cache::cache::CacheConfig;
use junior_cache::{CacheManager, HashEmbedder, ManualClock};
use serde_json::json;
use tempfile::TempDir;

fn open_manager(tmp: &TempDir, clock: &ManualClock) -> CacheManager {
    CacheManager::open_with_clock(
        CacheConfig::in_dir(tmp.path()),
        Arc::new(HashEmbedder::default()),
        Arc::new(clock.clone()),
    )
    .unwrap()
}

/// Test: after N > M adds the ledger holds the last M payloads, oldest first
#[test]
fn test_ledger_bound() {
    let tmp = TempDir::new().unwrap();
    let manager = open_manager(&tmp, &ManualClock::new());

    for i in 0..12 {
        manager.add_to_context(json!({"turn": i})).unwrap();
        manager.add_to_memory(json!({"step": i})).unwrap();
    }

    let context: Vec<_> = manager
        .get_recent_context()
        .unwrap()
        .into_iter()
        .map(|e| e.payload)
        .collect();
    let expected: Vec<_> = (7..12).map(|i| json!({"turn": i})).collect();
    assert_eq!(context, expected);

    let memory = manager.get_memory_steps().unwrap();
    assert_eq!(memory.len(), 10);
    assert_eq!(memory[0].payload, json!({"step": 2}));
    assert_eq!(memory[9].payload, json!({"step": 11}));
}

/// Test: context and memory are independent
#[test]
fn test_ledgers_are_independent() {
    let tmp = TempDir::new().unwrap();
    let manager = open_manager(&tmp, &ManualClock::new());

    manager.add_to_context(json!("question")).unwrap();
    assert!(manager.get_memory_steps().unwrap().is_empty());
    assert_eq!(manager.get_recent_context().unwrap().len(), 1);
}

/// Test: entries carry the time they were added
#[test]
fn test_entries_are_timestamped_in_order() {
    let tmp = TempDir::new().unwrap();
    let clock = ManualClock::new();
    let manager = open_manager(&tmp, &clock);

    let start = manager.add_to_memory(json!("lint")).unwrap().timestamp;
    clock.advance(Duration::from_secs(5));
    manager.add_to_memory(json!("analyze")).unwrap();

    let steps = manager.get_memory_steps().unwrap();
    assert_eq!(steps[0].timestamp, start);
    assert_eq!(steps[1].timestamp - start, chrono::Duration::seconds(5));
}

/// Test: the persisted ledger matches memory after every add
#[test]
fn test_ledger_file_written_on_add() {
    let tmp = TempDir::new().unwrap();
    let manager = open_manager(&tmp, &ManualClock::new());
    let path = manager.config().context_path();

    assert!(!path.exists());
    manager.add_to_context(json!({"file": "main.py"})).unwrap();
    assert!(path.exists());

    let saved: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(saved["kind"], json!("context"));
    assert_eq!(saved["entries"][0]["payload"], json!({"file": "main.py"}));
}
