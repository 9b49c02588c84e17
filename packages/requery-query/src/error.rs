pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read queries at {path:?}.")]
	Read { path: std::path::PathBuf, source: std::io::Error },
	#[error("Failed to parse queries at {path:?}.")]
	Parse { path: std::path::PathBuf, source: serde_json::Error },
	#[error("{message}")]
	Validation { message: String },
}
