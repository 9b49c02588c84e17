use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Analysis(#[from] requery_analysis::Error),
	#[error("Ranker process failed: {message}")]
	Process { message: String },
	#[error("Ranker {binary:?} exited with {status}.")]
	ProcessExit { binary: PathBuf, status: String },
	#[error("Ranker {binary:?} was cancelled.")]
	Cancelled { binary: PathBuf },
	#[error("Reformulation of topic {topic} was cancelled.")]
	Stopped { topic: String },
	#[error("Ranker {binary:?} exceeded its {timeout_ms} ms deadline.")]
	TimedOut { binary: PathBuf, timeout_ms: u64 },
	#[error("I/O failed at {path:?}.")]
	Io { path: PathBuf, source: std::io::Error },
	#[error("Scores file {path:?} has {scores} scores for {candidates} candidates.")]
	ScoreCountMismatch { path: PathBuf, scores: usize, candidates: usize },
	#[error("Scores file {path:?} has an invalid score {value:?} on line {line}.")]
	InvalidScore { path: PathBuf, line: usize, value: String },
	#[error("Measurement {name} is not registered in the feature space.")]
	UnregisteredMeasurement { name: String },
	#[error("Measurement {name} is registered more than once.")]
	DuplicateMeasurement { name: String },
	#[error("Invalid training record: {message}")]
	Record { message: String },
	#[error("Model training failed: {message}")]
	Training { message: String },
	#[error("{message}")]
	Validation { message: String },
}
impl Error {
	/// Misconfiguration or corrupted data rather than a transient failure; retrying cannot help.
	pub fn is_integrity(&self) -> bool {
		matches!(
			self,
			Self::ScoreCountMismatch { .. }
				| Self::InvalidScore { .. }
				| Self::UnregisteredMeasurement { .. }
				| Self::DuplicateMeasurement { .. }
				| Self::Record { .. }
		)
	}

	pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io { path: path.into(), source }
	}
}
