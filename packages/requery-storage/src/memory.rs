use std::{collections::HashMap, sync::RwLock};

use crate::{BoxFuture, ByteStore, Result};

#[derive(Debug, Default)]
pub struct MemoryStore {
	entries: RwLock<HashMap<String, Vec<u8>>>,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.entries.read().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl ByteStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>> {
		let entries = self.entries.read().unwrap_or_else(|err| err.into_inner());
		let value = entries.get(key).cloned();

		Box::pin(async move { Ok(value) })
	}

	fn put<'a>(&'a self, key: &'a str, value: &'a [u8]) -> BoxFuture<'a, Result<()>> {
		let mut entries = self.entries.write().unwrap_or_else(|err| err.into_inner());

		entries.insert(key.to_string(), value.to_vec());

		Box::pin(async { Ok(()) })
	}
}
