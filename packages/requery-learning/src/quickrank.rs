//! A selector backed by an external learning-to-rank binary.
//!
//! Candidates are written as unlabelled LIBSVM^rank lines to a uniquely named file passed as
//! `--test`; the binary writes one score per line to the file named by the `scores` argument.

use std::{
	fmt, io,
	path::{Path, PathBuf},
	process::Stdio,
	sync::Arc,
	time::Duration,
};

use serde_json::{Map, Value};
use tokio::{
	io::{AsyncBufReadExt, AsyncRead, BufReader},
	process::Command,
	task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use requery_analysis::{BoxFuture, StatisticsSource};

use crate::{CandidateQuery, Error, LearntFeature, Result, Selector};

/// Depth assigned at a fixed point; larger than any configured maximum.
const FIXED_POINT_DEPTH: usize = usize::MAX;
const MODEL_OUT_ARGUMENT: &str = "model-out";
/// How long output drains may run once the ranker is gone. Descendants that inherited the pipes
/// can keep them open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct QuickRankSelector {
	binary: PathBuf,
	binary_args: Vec<String>,
	arguments: Map<String, Value>,
	scores: PathBuf,
	work_dir: PathBuf,
	timeout: Duration,
	depth: usize,
	current_depth: usize,
	source: Arc<dyn StatisticsSource>,
}
impl fmt::Debug for QuickRankSelector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("QuickRankSelector")
			.field("binary", &self.binary)
			.field("binary_args", &self.binary_args)
			.field("arguments", &self.arguments)
			.field("scores", &self.scores)
			.field("work_dir", &self.work_dir)
			.field("timeout", &self.timeout)
			.field("depth", &self.depth)
			.field("current_depth", &self.current_depth)
			.finish_non_exhaustive()
	}
}
impl QuickRankSelector {
	pub fn new(
		cfg: &requery_config::Selector,
		depth: usize,
		source: Arc<dyn StatisticsSource>,
	) -> Result<Self> {
		let scores = cfg.scores_path().map(PathBuf::from).ok_or_else(|| Error::Validation {
			message: "selector.arguments.scores must name the ranker's scores file.".to_string(),
		})?;

		tracing::info!(
			binary = ?cfg.binary,
			depth,
			"Created QuickRank query candidate selector."
		);

		Ok(Self {
			binary: cfg.binary.clone(),
			binary_args: cfg.binary_args.clone(),
			arguments: cfg.arguments.clone(),
			scores,
			work_dir: cfg.work_dir.clone().unwrap_or_else(std::env::temp_dir),
			timeout: Duration::from_millis(cfg.timeout_ms),
			depth,
			current_depth: 0,
			source,
		})
	}

	pub fn depth(&self) -> usize {
		self.depth
	}

	pub fn current_depth(&self) -> usize {
		self.current_depth
	}

	async fn rank(
		&self,
		current: &CandidateQuery,
		candidates: &[CandidateQuery],
		cancel: &CancellationToken,
	) -> Result<usize> {
		let input = ScopedFile::new(
			self.work_dir.join(format!("requery-{}.candidates", Uuid::new_v4().simple())),
		);
		// Claimed before the run so a stale file from a failed run cannot be mistaken for output.
		let scores = ScopedFile::new(self.scores.clone());
		let body = candidates
			.iter()
			.map(|candidate| {
				LearntFeature::new(
					candidate.features.clone(),
					vec![0.0],
					current.topic.as_str(),
					candidate.text(),
				)
				.map(|record| record.libsvm_rank_line() + "\n")
			})
			.collect::<Result<String>>()?;

		tokio::fs::write(input.path(), body).await.map_err(|err| Error::io(input.path(), err))?;

		let mut args = make_arguments(&self.arguments);

		args.push("--test".to_string());
		args.push(input.path().display().to_string());

		run_process(&self.binary, &self.binary_args, &args, self.timeout, cancel).await?;

		let raw = tokio::fs::read_to_string(scores.path())
			.await
			.map_err(|err| Error::io(scores.path(), err))?;
		let values = parse_scores(scores.path(), &raw)?;

		if values.len() != candidates.len() {
			return Err(Error::ScoreCountMismatch {
				path: scores.path().to_path_buf(),
				scores: values.len(),
				candidates: candidates.len(),
			});
		}

		Ok(arg_max(&values))
	}
}
impl Selector for QuickRankSelector {
	fn select<'a>(
		&'a self,
		current: &'a CandidateQuery,
		candidates: &'a [CandidateQuery],
		cancel: &'a CancellationToken,
	) -> BoxFuture<'a, Result<(CandidateQuery, Self)>> {
		Box::pin(async move {
			let mut next = self.clone();

			if candidates.is_empty() {
				tracing::info!(topic = %current.topic, "No candidates; query is a fixed point.");

				next.current_depth = FIXED_POINT_DEPTH;

				return Ok((current.clone(), next));
			}

			let chosen = candidates[self.rank(current, candidates, cancel).await?].clone();
			let retrieved = self.source.retrieval_size(&chosen.query).await?;

			if retrieved == 0.0 {
				tracing::info!(topic = %current.topic, "Chosen candidate retrieves nothing; stopping early.");

				next.current_depth = next.depth;

				return Ok((current.clone(), next));
			}

			tracing::debug!(topic = %current.topic, retrieved, "Candidate selected.");

			if chosen.same_query(current) {
				next.current_depth = FIXED_POINT_DEPTH;
			} else {
				next.current_depth = next.current_depth.saturating_add(1);
			}

			Ok((chosen, next))
		})
	}

	fn train<'a>(
		&'a self,
		examples: &'a [LearntFeature],
		cancel: &'a CancellationToken,
	) -> BoxFuture<'a, Result<Vec<u8>>> {
		Box::pin(async move {
			let input = ScopedFile::new(
				self.work_dir.join(format!("requery-{}.train", Uuid::new_v4().simple())),
			);
			let mut body = Vec::new();

			for example in examples {
				self.output(example, &mut body)?;
			}

			tokio::fs::write(input.path(), body)
				.await
				.map_err(|err| Error::io(input.path(), err))?;

			let mut args = make_arguments(&self.arguments);

			args.push("--train".to_string());
			args.push(input.path().display().to_string());

			run_process(&self.binary, &self.binary_args, &args, self.timeout, cancel)
				.await
				.map_err(|err| match err {
					Error::ProcessExit { binary, status } => Error::Training {
						message: format!("{binary:?} exited with {status}."),
					},
					other => other,
				})?;

			let Some(model) = self.arguments.get(MODEL_OUT_ARGUMENT).and_then(Value::as_str)
			else {
				return Ok(Vec::new());
			};

			tokio::fs::read(model).await.map_err(|err| Error::io(model, err))
		})
	}

	fn output(&self, example: &LearntFeature, sink: &mut dyn io::Write) -> Result<()> {
		example.write_libsvm_rank(sink).map_err(|err| Error::io("<training sink>", err))
	}

	fn stopping_criteria(&self) -> bool {
		self.current_depth >= self.depth
	}
}

/// Renders `{k: v}` as `--k v`. Strings are passed verbatim, other values as JSON text.
pub fn make_arguments(arguments: &Map<String, Value>) -> Vec<String> {
	arguments
		.iter()
		.flat_map(|(key, value)| {
			let value = match value {
				Value::String(raw) => raw.clone(),
				other => other.to_string(),
			};

			[format!("--{key}"), value]
		})
		.collect()
}

/// Index of the highest score; the earliest wins ties.
fn arg_max(scores: &[f64]) -> usize {
	let mut best = 0;

	for (i, score) in scores.iter().enumerate().skip(1) {
		if *score > scores[best] {
			best = i;
		}
	}

	best
}

fn parse_scores(path: &Path, raw: &str) -> Result<Vec<f64>> {
	raw.lines()
		.enumerate()
		.filter(|(_, line)| !line.trim().is_empty())
		.map(|(i, line)| {
			line.trim().parse::<f64>().map_err(|_| Error::InvalidScore {
				path: path.to_path_buf(),
				line: i + 1,
				value: line.to_string(),
			})
		})
		.collect()
}

async fn run_process(
	binary: &Path,
	binary_args: &[String],
	args: &[String],
	timeout: Duration,
	cancel: &CancellationToken,
) -> Result<()> {
	enum Outcome {
		Exited(io::Result<std::process::ExitStatus>),
		Cancelled,
		TimedOut,
	}

	tracing::info!(binary = ?binary, args = ?args, "Starting ranker.");

	let mut child = Command::new(binary)
		.args(binary_args)
		.args(args)
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.kill_on_drop(true)
		.spawn()
		.map_err(|err| Error::Process { message: format!("Failed to start {binary:?}: {err}.") })?;
	// Both pipes are drained while the child runs; a full pipe would block it forever.
	let drains = [
		drain(child.stdout.take(), binary.to_path_buf(), "stdout"),
		drain(child.stderr.take(), binary.to_path_buf(), "stderr"),
	];
	let outcome = tokio::select! {
		status = child.wait() => Outcome::Exited(status),
		_ = cancel.cancelled() => Outcome::Cancelled,
		_ = tokio::time::sleep(timeout) => Outcome::TimedOut,
	};

	if !matches!(outcome, Outcome::Exited(_))
		&& let Err(err) = child.kill().await
	{
		tracing::warn!(binary = ?binary, error = %err, "Failed to kill ranker.");
	}

	for mut handle in drains {
		match tokio::time::timeout(DRAIN_GRACE, &mut handle).await {
			Ok(Ok(())) => {},
			Ok(Err(err)) => {
				tracing::warn!(binary = ?binary, error = %err, "Ranker output drain failed.");
			},
			Err(_) => {
				tracing::warn!(binary = ?binary, "Ranker output stayed open after exit.");

				handle.abort();
			},
		}
	}

	match outcome {
		Outcome::Exited(Ok(status)) if status.success() => Ok(()),
		Outcome::Exited(Ok(status)) =>
			Err(Error::ProcessExit { binary: binary.to_path_buf(), status: status.to_string() }),
		Outcome::Exited(Err(err)) => Err(Error::Process {
			message: format!("Failed to wait for {binary:?}: {err}."),
		}),
		Outcome::Cancelled => Err(Error::Cancelled { binary: binary.to_path_buf() }),
		Outcome::TimedOut => Err(Error::TimedOut {
			binary: binary.to_path_buf(),
			timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
		}),
	}
}

fn drain<R>(reader: Option<R>, binary: PathBuf, stream: &'static str) -> JoinHandle<()>
where
	R: AsyncRead + Unpin + Send + 'static,
{
	tokio::spawn(async move {
		let Some(reader) = reader else {
			return;
		};
		let mut lines = BufReader::new(reader).lines();

		loop {
			match lines.next_line().await {
				Ok(Some(line)) => tracing::info!(binary = ?binary, stream, "{line}"),
				Ok(None) => break,
				Err(err) => {
					tracing::warn!(binary = ?binary, stream, error = %err, "Failed to read ranker output.");

					break;
				},
			}
		}
	})
}

/// Removes its file when dropped, on every exit path.
struct ScopedFile {
	path: PathBuf,
}
impl ScopedFile {
	fn new(path: PathBuf) -> Self {
		Self { path }
	}

	fn path(&self) -> &Path {
		&self.path
	}
}
impl Drop for ScopedFile {
	fn drop(&mut self) {
		match std::fs::remove_file(&self.path) {
			Ok(()) => {},
			Err(err) if err.kind() == io::ErrorKind::NotFound => {},
			Err(err) => {
				tracing::warn!(path = ?self.path, error = %err, "Failed to remove temporary file.");
			},
		}
	}
}
