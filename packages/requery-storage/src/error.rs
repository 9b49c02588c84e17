#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Cache I/O failed at {path:?}.")]
	Io { path: std::path::PathBuf, source: std::io::Error },
	#[error("Failed to encode cache key payload: {0}")]
	Encode(#[from] serde_json::Error),
	#[error("Invalid cache key {key:?}.")]
	InvalidKey { key: String },
}
