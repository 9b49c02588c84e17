use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	#[serde(default)]
	pub pipeline: Pipeline,
	#[serde(default)]
	pub cache: Cache,
	pub search: Search,
	pub selector: Selector,
	#[serde(default)]
	pub model: Model,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Pipeline {
	pub query_path: Option<PathBuf>,
	/// Optional. Defaults to the host parallelism.
	pub concurrency: Option<usize>,
	/// Streams ranked lists as TREC results. The caller owns the run file.
	#[serde(default)]
	pub emit_trec: bool,
	#[serde(default = "default_run_name")]
	pub run_name: String,
	pub qrels: Option<PathBuf>,
}
impl Default for Pipeline {
	fn default() -> Self {
		Self {
			query_path: None,
			concurrency: None,
			emit_trec: false,
			run_name: default_run_name(),
			qrels: None,
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct Cache {
	#[serde(default = "default_statistics_path")]
	pub statistics_path: PathBuf,
	#[serde(default = "default_documents_path")]
	pub documents_path: PathBuf,
	/// Characters of the cache key used per directory level.
	#[serde(default = "default_block_size")]
	pub block_size: usize,
}
impl Default for Cache {
	fn default() -> Self {
		Self {
			statistics_path: default_statistics_path(),
			documents_path: default_documents_path(),
			block_size: default_block_size(),
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct Search {
	pub max_depth: usize,
	/// Statistics backend parameter `k`, the window of the QPP gain estimators.
	pub k: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Selector {
	pub binary: PathBuf,
	#[serde(default)]
	pub binary_args: Vec<String>,
	pub work_dir: Option<PathBuf>,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	/// Rendered as `--key value` flags. `scores` names the file the ranker writes.
	pub arguments: Map<String, Value>,
}
impl Selector {
	pub fn scores_path(&self) -> Option<&str> {
		self.arguments.get("scores").and_then(Value::as_str)
	}
}

#[derive(Debug, Default, Deserialize)]
pub struct Model {
	#[serde(default)]
	pub generate: bool,
	#[serde(default)]
	pub train: bool,
	#[serde(default)]
	pub test: bool,
	pub features_path: Option<PathBuf>,
	pub model_path: Option<PathBuf>,
	pub output_path: Option<PathBuf>,
}

fn default_run_name() -> String {
	"requery".to_string()
}

fn default_statistics_path() -> PathBuf {
	PathBuf::from("statistics_cache")
}

fn default_documents_path() -> PathBuf {
	PathBuf::from("file_cache")
}

fn default_block_size() -> usize {
	8
}

fn default_timeout_ms() -> u64 {
	600_000
}
