//! Durability and crash-safety tests for the memory store.

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use std::thread;

use patchguard_memory::policy::keys;
use patchguard_memory::{MemoryRecord, MemoryStore};
use serde_json::json;

#[test]
fn records_survive_reopen_in_insertion_order() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = MemoryStore::open(dir.path()).unwrap();
        store
            .append(MemoryRecord::new("bug_fix", "first").with_solution("return 200"))
            .unwrap();
        store.append(MemoryRecord::new("pattern", "second")).unwrap();
    }

    let reopened = MemoryStore::open(dir.path()).unwrap();
    let all = reopened.read_all().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].description, "first");
    assert_eq!(all[0].solution.as_deref(), Some("return 200"));
    assert_eq!(all[1].description, "second");
}

#[test]
fn appends_after_existing_records_only_extend_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::open(dir.path()).unwrap();
    store.append(MemoryRecord::new("seed", "pre-existing")).unwrap();
    let before = store.read_all().unwrap();

    for i in 0..3 {
        store
            .append(MemoryRecord::new("bug_fix", format!("session {i}")))
            .unwrap();
    }

    let after = store.read_all().unwrap();
    assert_eq!(after.len(), before.len() + 3);
    assert_eq!(&after[..before.len()], &before[..]);
}

#[test]
fn torn_append_is_discarded_on_next_open() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = MemoryStore::open(dir.path()).unwrap();
        store.append(MemoryRecord::new("bug_fix", "intact")).unwrap();
    }

    // Simulate a crash halfway through writing the second line.
    let mut f = OpenOptions::new()
        .append(true)
        .open(dir.path().join("learnings.jsonl"))
        .unwrap();
    f.write_all(br#"{"seq":2,"digest":"0123"#).unwrap();
    drop(f);

    let store = MemoryStore::open(dir.path()).unwrap();
    assert!(!store.recovery().was_clean());
    assert_eq!(store.recovery().records, 1);

    store.append(MemoryRecord::new("bug_fix", "after crash")).unwrap();
    let all = store.read_all().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].description, "after crash");
}

#[test]
fn concurrent_appends_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::open(dir.path()).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..10 {
                    store
                        .append(MemoryRecord::new("bug_fix", format!("t{t}-{i}")))
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(store.read_all().unwrap().len(), 80);
    // A fresh handle sees an intact, gap-free log.
    let fresh = MemoryStore::open(dir.path()).unwrap();
    assert!(fresh.recovery().was_clean());
    assert_eq!(fresh.len().unwrap(), 80);
}

#[test]
fn policy_update_is_visible_to_a_fresh_instance() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = MemoryStore::open(dir.path()).unwrap();
        store.set_policy(keys::MAX_ATTEMPTS, 3).unwrap();
        store.set_policy(keys::MAX_ATTEMPTS, 4).unwrap();
    }
    let store = MemoryStore::open(dir.path()).unwrap();
    assert_eq!(store.get_policy(keys::MAX_ATTEMPTS).unwrap(), Some(json!(4)));
}

#[test]
fn policy_file_is_always_a_complete_document() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::open(dir.path()).unwrap();
    for i in 0..20 {
        store.set_policy(keys::MIN_QUALITY_SCORE, 5.0 + i as f64 / 10.0).unwrap();
        let raw = std::fs::read(dir.path().join("policy.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert!(parsed.is_object());
    }
}
