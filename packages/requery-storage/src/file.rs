use std::{
	io,
	path::{Path, PathBuf},
};

use tokio::fs;
use uuid::Uuid;

use crate::{BoxFuture, ByteStore, Error, Result};

/// A directory-backed store that shards keys into nested directories of `block_size`
/// characters each.
#[derive(Debug, Clone)]
pub struct FileStore {
	base: PathBuf,
	block_size: usize,
}
impl FileStore {
	pub fn new(base: impl Into<PathBuf>, block_size: usize) -> Self {
		Self { base: base.into(), block_size: block_size.max(1) }
	}

	pub fn statistics(cfg: &requery_config::Cache) -> Self {
		Self::new(&cfg.statistics_path, cfg.block_size)
	}

	pub fn documents(cfg: &requery_config::Cache) -> Self {
		Self::new(&cfg.documents_path, cfg.block_size)
	}

	pub fn base(&self) -> &Path {
		&self.base
	}

	pub fn path_for(&self, key: &str) -> Result<PathBuf> {
		if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
		{
			return Err(Error::InvalidKey { key: key.to_string() });
		}

		let chars: Vec<char> = key.chars().collect();
		let mut path = self.base.clone();
		let blocks = chars.chunks(self.block_size).collect::<Vec<_>>();

		// The final block names the file itself, so only the leading blocks become directories.
		for block in &blocks[..blocks.len() - 1] {
			path.push(block.iter().collect::<String>());
		}

		path.push(key);

		Ok(path)
	}
}
impl ByteStore for FileStore {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>> {
		Box::pin(async move {
			let path = self.path_for(key)?;

			match fs::read(&path).await {
				Ok(bytes) => Ok(Some(bytes)),
				Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
				Err(err) => Err(Error::Io { path, source: err }),
			}
		})
	}

	fn put<'a>(&'a self, key: &'a str, value: &'a [u8]) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let path = self.path_for(key)?;

			if let Some(parent) = path.parent() {
				fs::create_dir_all(parent)
					.await
					.map_err(|err| Error::Io { path: parent.to_path_buf(), source: err })?;
			}

			// Write beside the target and rename so readers never observe a partial entry.
			let staging = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

			fs::write(&staging, value)
				.await
				.map_err(|err| Error::Io { path: staging.clone(), source: err })?;

			if let Err(err) = fs::rename(&staging, &path).await {
				let _ = fs::remove_file(&staging).await;

				return Err(Error::Io { path, source: err });
			}

			tracing::trace!(key = %crate::cache_key_prefix(key), "Cache entry written.");

			Ok(())
		})
	}
}
