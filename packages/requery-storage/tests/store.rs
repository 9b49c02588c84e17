use std::sync::Arc;

use tokio::task::JoinSet;

use requery_storage::{ByteStore, Error, FileStore, MemoryStore};

#[test]
fn file_store_shards_keys_into_blocks() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let store = FileStore::new(dir.path(), 4);
	let path = store.path_for("abcdefghij").expect("Key must be valid.");

	assert_eq!(path, dir.path().join("abcd").join("efgh").join("abcdefghij"));
}

#[tokio::test]
async fn file_store_round_trips_and_misses() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let store = FileStore::new(dir.path(), 8);
	let key = requery_storage::hash_cache_key(&serde_json::json!({ "query": "asthma" }))
		.expect("Failed to hash.");

	assert_eq!(store.get(&key).await.expect("Failed to read entry."), None);

	store.put(&key, b"[\"d1\",\"d2\"]").await.expect("Failed to write entry.");

	assert_eq!(
		store.get(&key).await.expect("Failed to read entry."),
		Some(b"[\"d1\",\"d2\"]".to_vec())
	);
	assert!(store.contains(&key).await.expect("Failed to probe entry."));

	store.put(&key, b"[\"d1\",\"d2\"]").await.expect("Failed to overwrite entry.");

	assert_eq!(
		store.get(&key).await.expect("Failed to read entry."),
		Some(b"[\"d1\",\"d2\"]".to_vec())
	);
}

#[tokio::test]
async fn file_store_rejects_path_like_keys() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let store = FileStore::new(dir.path(), 8);

	assert!(matches!(store.get("../escape").await, Err(Error::InvalidKey { .. })));
	assert!(matches!(store.put("", b"x").await, Err(Error::InvalidKey { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_of_one_key_leave_one_value() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let store = Arc::new(FileStore::new(dir.path(), 2));
	let mut writers = JoinSet::new();

	for _ in 0..8 {
		let store = Arc::clone(&store);

		writers.spawn(async move { store.put("cafebabe", b"same-content").await });
	}

	while let Some(joined) = writers.join_next().await {
		joined.expect("Writer panicked.").expect("Failed to write entry.");
	}

	assert_eq!(
		store.get("cafebabe").await.expect("Failed to read entry."),
		Some(b"same-content".to_vec())
	);
}

#[tokio::test]
async fn memory_store_overwrites() {
	let store = MemoryStore::new();

	assert!(store.is_empty());

	store.put("k", b"one").await.expect("Failed to write entry.");
	store.put("k", b"two").await.expect("Failed to write entry.");

	assert_eq!(store.len(), 1);
	assert_eq!(store.get("k").await.expect("Failed to read entry."), Some(b"two".to_vec()));
}
