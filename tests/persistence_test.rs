mod helpers;

use std::fs;

use helpers::{config_with_capacity, hashed, test_config};
use mnemo::snapshot::format::{staged_path, METADATA_FILE, VECTORS_FILE};
use mnemo::{Importance, MemoryError, MemoryStore};
use tempfile::TempDir;

#[tokio::test]
async fn snapshot_round_trip_across_reopen() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());

    let store = MemoryStore::open(&config, hashed()).unwrap();
    let a = store
        .remember("Sarah's birthday is March 5th", Importance::High, &["family"])
        .await
        .unwrap();
    store.remember("gym on mondays and thursdays", Importance::Low, &[]).await.unwrap();
    store.recall("Sarah birthday", 1).await.unwrap();
    let before = store.snapshot_index().await;
    store.close().await.unwrap();

    assert!(tmp.path().join(VECTORS_FILE).exists());
    assert!(tmp.path().join(METADATA_FILE).exists());

    let reopened = MemoryStore::open(&config, hashed()).unwrap();
    let after = reopened.snapshot_index().await;
    assert_eq!(after.records(), before.records());
    assert_eq!(after.next_id(), before.next_id());
    assert_eq!(
        after.vectors().values().collect::<Vec<_>>(),
        before.vectors().values().collect::<Vec<_>>()
    );

    let results = reopened.recall("Sarah's birthday is March 5th", 1).await.unwrap();
    assert_eq!(results[0].id, a.id);
    assert!((results[0].score - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn missing_directory_opens_empty() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp.path().join("not-yet-created"));
    let store = MemoryStore::open(&config, hashed()).unwrap();
    assert_eq!(store.stats().await.count, 0);
}

#[tokio::test]
async fn without_autosave_only_flush_writes() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.storage.autosave = false;

    let store = MemoryStore::open(&config, hashed()).unwrap();
    let outcome = store.remember("unsaved thought", Importance::Normal, &[]).await.unwrap();
    assert!(!outcome.persisted);
    assert!(store.is_dirty());
    assert!(!tmp.path().join(VECTORS_FILE).exists());

    store.flush().await.unwrap();
    assert!(!store.is_dirty());
    assert!(tmp.path().join(VECTORS_FILE).exists());
}

#[tokio::test]
async fn missing_metadata_file_is_corruption() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = MemoryStore::open(&config, hashed()).unwrap();
    store.remember("something to lose", Importance::Normal, &[]).await.unwrap();
    store.close().await.unwrap();

    fs::remove_file(tmp.path().join(METADATA_FILE)).unwrap();
    assert!(matches!(
        MemoryStore::open(&config, hashed()),
        Err(MemoryError::Corruption { .. })
    ));
}

#[tokio::test]
async fn length_mismatch_is_corruption() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = MemoryStore::open(&config, hashed()).unwrap();
    store.remember("first fact about apples", Importance::Normal, &[]).await.unwrap();
    store.remember("second fact about rockets", Importance::Normal, &[]).await.unwrap();
    store.close().await.unwrap();

    // drop one record from the ledger, leaving two vectors
    let path = tmp.path().join(METADATA_FILE);
    let mut json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    json["records"].as_array_mut().unwrap().pop();
    fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();

    match MemoryStore::open(&config, hashed()) {
        Err(MemoryError::Corruption { reason, .. }) => assert!(reason.contains("2 vectors but 1")),
        Err(e) => panic!("expected corruption, got {e}"),
        Ok(_) => panic!("expected corruption, store opened"),
    }
}

#[tokio::test]
async fn record_with_missing_field_is_corruption() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = MemoryStore::open(&config, hashed()).unwrap();
    store.remember("a well formed record", Importance::Normal, &[]).await.unwrap();
    store.close().await.unwrap();

    let path = tmp.path().join(METADATA_FILE);
    let mut json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    json["records"][0].as_object_mut().unwrap().remove("importance");
    fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();

    assert!(matches!(
        MemoryStore::open(&config, hashed()),
        Err(MemoryError::Corruption { .. })
    ));
}

#[tokio::test]
async fn backups_are_bounded() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = MemoryStore::open(&config, hashed()).unwrap();
    for i in 0..9 {
        store
            .remember(&format!("distinct entry {i} zebra{i} quokka{i}"), Importance::Normal, &[])
            .await
            .unwrap();
    }

    let backups = store.list_backups().await.unwrap();
    assert_eq!(backups.len(), config.storage.max_backups);
    // newest first
    assert!(backups.windows(2).all(|w| w[0].name > w[1].name));
}

#[tokio::test]
async fn restore_recovers_from_corrupt_snapshot() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = MemoryStore::open(&config, hashed()).unwrap();
    store.remember("the spare key is under the mat", Importance::High, &[]).await.unwrap();
    store.remember("wifi password is on the fridge", Importance::Normal, &[]).await.unwrap();
    store.close().await.unwrap();

    fs::write(tmp.path().join(VECTORS_FILE), b"truncated").unwrap();
    assert!(MemoryStore::open(&config, hashed()).is_err());

    // the newest backup holds the pair written by the first remember
    let dir = mnemo::snapshot::SnapshotDir::new(tmp.path(), config.storage.max_backups);
    let (info, index) = dir.restore_backup(None).unwrap();
    assert_eq!(info.records, Some(1));
    assert_eq!(index.len(), 1);

    let store = MemoryStore::open(&config, hashed()).unwrap();
    assert_eq!(store.stats().await.count, 1);
}

#[tokio::test]
async fn store_restore_replaces_live_index() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = MemoryStore::open(&config, hashed()).unwrap();
    let keep = store.remember("umbrella is in the car", Importance::Normal, &[]).await.unwrap();
    let oops = store.remember("ignore this accidental note", Importance::Normal, &[]).await.unwrap();

    let info = store.restore_backup(None).await.unwrap();
    assert_eq!(info.records, Some(1));
    assert!(store.get(keep.id).await.is_ok());
    assert!(store.get(oops.id).await.is_err());
    assert!(!store.is_dirty());
}

#[tokio::test]
async fn lowered_capacity_trims_on_open() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::open(&config_with_capacity(tmp.path(), 10), hashed()).unwrap();
    for text in ["alpha particles", "baking sourdough", "cycling routes", "dentist tuesday"] {
        store.remember(text, Importance::Normal, &[]).await.unwrap();
    }
    store.close().await.unwrap();

    let store = MemoryStore::open(&config_with_capacity(tmp.path(), 2), hashed()).unwrap();
    assert_eq!(store.stats().await.count, 2);
    assert!(store.is_dirty());
}

#[tokio::test]
async fn failed_write_keeps_previous_snapshot_loadable() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.storage.max_backups = 0;

    let store = MemoryStore::open(&config, hashed()).unwrap();
    let kept = store
        .remember("the boiler was serviced in May", Importance::Normal, &[])
        .await
        .unwrap();
    assert!(kept.persisted);

    // a directory where the ledger is staged makes every write fail halfway
    let blocker = staged_path(&tmp.path().join(METADATA_FILE));
    fs::create_dir(&blocker).unwrap();
    let unsaved = store
        .remember("the cat's vet is Dr Patel", Importance::Normal, &[])
        .await
        .unwrap();
    assert!(!unsaved.persisted);
    assert!(store.is_dirty());
    assert!(store.flush().await.is_err());
    drop(store);
    fs::remove_dir(&blocker).unwrap();

    let reopened = MemoryStore::open(&config, hashed()).unwrap();
    assert_eq!(reopened.stats().await.count, 1);
    assert_eq!(reopened.get(kept.id).await.unwrap().text, "the boiler was serviced in May");
}

#[tokio::test]
async fn remember_during_restore_lands_after_it() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = MemoryStore::open(&config, hashed()).unwrap();
    store.remember("the spare key is under the mat", Importance::High, &[]).await.unwrap();
    store.remember("wifi password is on the fridge", Importance::Normal, &[]).await.unwrap();

    // restore is polled first and holds the index until the swap is done
    let (restored, added) = tokio::join!(
        store.restore_backup(None),
        store.remember("the gate code is 4410", Importance::Normal, &[]),
    );
    assert_eq!(restored.unwrap().records, Some(1));
    let added = added.unwrap();
    assert!(!added.merged);
    assert_eq!(store.get(added.id).await.unwrap().text, "the gate code is 4410");
    assert_eq!(store.stats().await.count, 2);
    store.close().await.unwrap();

    let reopened = MemoryStore::open(&config, hashed()).unwrap();
    assert_eq!(reopened.stats().await.count, 2);
    assert!(reopened.get(added.id).await.is_ok());
}
