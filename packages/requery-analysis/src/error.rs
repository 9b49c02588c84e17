pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Statistics backend error: {message}")]
	Backend { message: String },
	#[error(transparent)]
	Storage(#[from] requery_storage::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
}
impl Error {
	pub fn backend(message: impl Into<String>) -> Self {
		Self::Backend { message: message.into() }
	}
}
