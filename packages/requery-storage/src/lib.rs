//! Content-addressed byte stores shared by the statistics and document caches.
//!
//! Keys are derived from the content they describe, so concurrent writers of the same key
//! always write equivalent bytes and last-writer-wins is safe.

pub mod file;
pub mod memory;

mod error;

pub use error::Error;
pub use file::FileStore;
pub use memory::MemoryStore;

pub type Result<T, E = Error> = std::result::Result<T, E>;

use std::{future::Future, pin::Pin};

use serde_json::Value;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait ByteStore
where
	Self: Send + Sync,
{
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>>;

	fn put<'a>(&'a self, key: &'a str, value: &'a [u8]) -> BoxFuture<'a, Result<()>>;

	fn contains<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(self.get(key).await?.is_some()) })
	}
}

pub fn hash_cache_key(payload: &Value) -> Result<String> {
	let raw = serde_json::to_vec(payload)?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}

pub fn cache_key_prefix(key: &str) -> &str {
	let len = key.len().min(12);

	&key[..len]
}
