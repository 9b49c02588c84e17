use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Query(#[from] requery_query::Error),
	#[error(transparent)]
	Analysis(#[from] requery_analysis::Error),
	#[error(transparent)]
	Learning(#[from] requery_learning::Error),
	#[error(transparent)]
	Storage(#[from] requery_storage::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error("Model {stage} failed.")]
	Model { stage: &'static str, source: requery_learning::Error },
	#[error("Invalid qrels line {line} in {path:?}: {message}")]
	Qrels { path: PathBuf, line: usize, message: String },
	#[error("Failed to read {path:?}.")]
	Read { path: PathBuf, source: std::io::Error },
	#[error("Topics and measurement rows disagree: {topics} topics, {values} values.")]
	MeasurementShape { topics: usize, values: usize },
	#[error("Evaluation worker failed: {message}")]
	Worker { message: String },
}
