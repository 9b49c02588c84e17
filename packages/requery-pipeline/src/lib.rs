//! Query experiment orchestration.
//!
//! A run loads the query set, finalizes every query through the preprocessing and rewrite
//! stages, then runs up to three phases in order: a sequential measurement phase, a bounded
//! concurrent evaluation phase and the learned-model stages. Results stream over a channel and
//! the stream always ends with [`PipelineResult::Done`].

pub mod eval;
pub mod format;
pub mod labeler;
pub mod tree;

mod error;
mod result;

pub use error::{Error, Result};
pub use labeler::EvaluationLabeler;
pub use result::PipelineResult;

use std::{
	collections::BTreeMap,
	num::NonZeroUsize,
	path::PathBuf,
	sync::Arc,
};

use tokio::{
	sync::{Semaphore, mpsc},
	task::JoinSet,
};
use tokio_util::sync::CancellationToken;

use requery_analysis::{ConfiguredSource, Measurement, MeasurementExecutor, StatisticsSource};
use requery_config::Config;
use requery_learning::{FeatureSpace, Model, ModelPaths, QueryChain, QuickRankSelector};
use requery_query::{PipelineQuery, QueriesSource, QueryProcessor, Rewrite, analysis};
use requery_storage::{ByteStore, FileStore, MemoryStore};

use crate::{
	eval::{Evaluator, Qrels},
	format::{EvaluationFormatter, EvaluationTable, MeasurementFormatter},
	tree::DocumentCache,
};

const RESULT_CHANNEL_CAPACITY: usize = 256;

/// Which model stages run after the evaluation phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelStages {
	pub generate: bool,
	pub train: bool,
	pub test: bool,
}
impl From<&requery_config::Model> for ModelStages {
	fn from(cfg: &requery_config::Model) -> Self {
		Self { generate: cfg.generate, train: cfg.train, test: cfg.test }
	}
}

pub struct Pipeline {
	query_path: Option<PathBuf>,
	queries: Arc<dyn QueriesSource>,
	source: Arc<dyn StatisticsSource>,
	processors: Vec<Arc<dyn QueryProcessor>>,
	rewrites: Vec<Arc<dyn Rewrite>>,
	measurements: Vec<Arc<dyn Measurement>>,
	measurement_formatters: Vec<Arc<dyn MeasurementFormatter>>,
	executor: MeasurementExecutor,
	evaluators: Vec<Arc<dyn Evaluator>>,
	evaluation_formatters: Vec<Arc<dyn EvaluationFormatter>>,
	qrels: Arc<Qrels>,
	documents: DocumentCache,
	emit_trec: bool,
	run_name: String,
	concurrency: usize,
	model: Option<Arc<dyn Model>>,
	stages: ModelStages,
}
impl Pipeline {
	/// A pipeline with in-memory caches and no optional phases configured.
	pub fn new(queries: Arc<dyn QueriesSource>, source: Arc<dyn StatisticsSource>) -> Self {
		Self {
			query_path: None,
			queries,
			source,
			processors: Vec::new(),
			rewrites: Vec::new(),
			measurements: Vec::new(),
			measurement_formatters: Vec::new(),
			executor: MeasurementExecutor::new(Arc::new(MemoryStore::new())),
			evaluators: Vec::new(),
			evaluation_formatters: Vec::new(),
			qrels: Arc::new(Qrels::default()),
			documents: DocumentCache::new(Arc::new(MemoryStore::new())),
			emit_trec: false,
			run_name: "requery".to_string(),
			concurrency: default_concurrency(),
			model: None,
			stages: ModelStages::default(),
		}
	}

	/// Wires the on-disk caches, query path, concurrency, TREC emission, qrels and the backend
	/// `k` from `cfg`.
	pub fn from_config(
		cfg: &Config,
		queries: Arc<dyn QueriesSource>,
		source: Arc<dyn StatisticsSource>,
	) -> Result<Self> {
		let statistics: Arc<dyn ByteStore> = Arc::new(FileStore::statistics(&cfg.cache));
		let documents: Arc<dyn ByteStore> = Arc::new(FileStore::documents(&cfg.cache));
		let qrels = match &cfg.pipeline.qrels {
			Some(path) => Qrels::load(path)?,
			None => Qrels::default(),
		};
		let mut pipeline = Self::new(queries, configured_source(cfg, source))
			.with_statistics_cache(statistics)
			.with_document_cache(documents)
			.with_qrels(qrels)
			.with_run_name(cfg.pipeline.run_name.clone())
			.with_trec_output(cfg.pipeline.emit_trec);

		pipeline.query_path = cfg.pipeline.query_path.clone();

		if let Some(concurrency) = cfg.pipeline.concurrency {
			pipeline = pipeline.with_concurrency(concurrency);
		}

		Ok(pipeline)
	}

	pub fn with_query_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.query_path = Some(path.into());

		self
	}

	pub fn with_processors(mut self, processors: Vec<Arc<dyn QueryProcessor>>) -> Self {
		self.processors = processors;

		self
	}

	pub fn with_rewrites(mut self, rewrites: Vec<Arc<dyn Rewrite>>) -> Self {
		self.rewrites = rewrites;

		self
	}

	pub fn with_measurements(
		mut self,
		measurements: Vec<Arc<dyn Measurement>>,
		formatters: Vec<Arc<dyn MeasurementFormatter>>,
	) -> Self {
		self.measurements = measurements;
		self.measurement_formatters = formatters;

		self
	}

	pub fn with_evaluators(
		mut self,
		evaluators: Vec<Arc<dyn Evaluator>>,
		formatters: Vec<Arc<dyn EvaluationFormatter>>,
	) -> Self {
		self.evaluators = evaluators;
		self.evaluation_formatters = formatters;

		self
	}

	pub fn with_qrels(mut self, qrels: Qrels) -> Self {
		self.qrels = Arc::new(qrels);

		self
	}

	pub fn with_statistics_cache(mut self, store: Arc<dyn ByteStore>) -> Self {
		self.executor = MeasurementExecutor::new(store);

		self
	}

	pub fn with_document_cache(mut self, store: Arc<dyn ByteStore>) -> Self {
		self.documents = DocumentCache::new(store);

		self
	}

	pub fn with_trec_output(mut self, enabled: bool) -> Self {
		self.emit_trec = enabled;

		self
	}

	pub fn with_run_name(mut self, run_name: impl Into<String>) -> Self {
		self.run_name = run_name.into();

		self
	}

	/// Caps concurrent topic evaluations. Zero is treated as one.
	pub fn with_concurrency(mut self, concurrency: usize) -> Self {
		self.concurrency = concurrency.max(1);

		self
	}

	pub fn with_model(mut self, model: Arc<dyn Model>, stages: ModelStages) -> Self {
		self.model = Some(model);
		self.stages = stages;

		self
	}

	pub fn executor(&self) -> &MeasurementExecutor {
		&self.executor
	}

	pub fn documents(&self) -> &DocumentCache {
		&self.documents
	}

	/// A labeler scoring candidates with `evaluator` against this pipeline's qrels and caches.
	pub fn labeler(&self, evaluator: Arc<dyn Evaluator>) -> EvaluationLabeler {
		EvaluationLabeler::new(
			Arc::clone(&self.source),
			self.documents.clone(),
			Arc::clone(&self.qrels),
			evaluator,
		)
	}

	/// Runs the pipeline on a background task and returns its result stream.
	pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> mpsc::Receiver<PipelineResult> {
		let (tx, rx) = mpsc::channel(RESULT_CHANNEL_CAPACITY);

		tokio::spawn(async move { self.execute(tx, cancel).await });

		rx
	}

	/// Runs every configured phase, streaming results into `tx`. A fatal error is sent as an
	/// untopiced [`PipelineResult::Error`]; [`PipelineResult::Done`] follows in every case.
	pub async fn execute(&self, tx: mpsc::Sender<PipelineResult>, cancel: CancellationToken) {
		tracing::info!(concurrency = self.concurrency, "Starting pipeline.");

		if let Err(error) = self.run(&tx, &cancel).await {
			tracing::warn!(error = %error, "Pipeline aborted.");

			send(&tx, PipelineResult::Error { topic: None, error }).await;
		}

		send(&tx, PipelineResult::Done).await;
	}

	async fn run(&self, tx: &mpsc::Sender<PipelineResult>, cancel: &CancellationToken) -> Result<()> {
		let queries = match &self.query_path {
			Some(path) => {
				tracing::info!(path = ?path, "Loading queries.");

				self.finalize(self.queries.load(path)?)
			},
			None => Vec::new(),
		};

		if !queries.is_empty() {
			self.measure(&queries, tx).await?;
			self.evaluate(&queries, tx, cancel).await?;
		}

		self.run_model(&queries, cancel).await
	}

	/// Applies the processors then the rewrites, and orders queries by Boolean clause count.
	pub fn finalize(&self, queries: Vec<PipelineQuery>) -> Vec<PipelineQuery> {
		let mut finalized: Vec<PipelineQuery> = queries
			.into_iter()
			.map(|query| {
				let processed = self
					.processors
					.iter()
					.fold(query.query.clone(), |acc, processor| processor.process(acc));
				let rewritten =
					self.rewrites.iter().fold(processed, |acc, rewrite| rewrite.rewrite(acc));

				query.with_query(rewritten)
			})
			.collect();

		// Stable, so equally complex queries keep their load order.
		finalized.sort_by_key(|query| analysis::boolean_queries(&query.query).len());

		for query in &finalized {
			tracing::debug!(topic = %query.topic, "Finalized query.");
		}

		finalized
	}

	/// Computes the measurement matrix one value at a time, so backend load stays bounded.
	async fn measure(&self, queries: &[PipelineQuery], tx: &mpsc::Sender<PipelineResult>) -> Result<()> {
		if self.measurement_formatters.is_empty() {
			return Ok(());
		}

		let topics: Vec<String> = queries.iter().map(|query| query.topic.clone()).collect();
		let headers: Vec<String> =
			self.measurements.iter().map(|measurement| measurement.name().to_string()).collect();
		let mut data = Vec::with_capacity(self.measurements.len());

		for measurement in &self.measurements {
			let mut row = Vec::with_capacity(queries.len());

			for query in queries {
				row.push(
					self.executor.execute_one(query, self.source.as_ref(), measurement.as_ref()).await?,
				);
			}

			data.push(row);
		}

		let outputs = self
			.measurement_formatters
			.iter()
			.map(|formatter| formatter.format(&topics, &headers, &data))
			.collect::<Result<Vec<_>>>()?;

		tracing::info!(measurements = headers.len(), topics = topics.len(), "Measured queries.");

		send(tx, PipelineResult::Measurement(outputs)).await;

		Ok(())
	}

	async fn evaluate(
		&self,
		queries: &[PipelineQuery],
		tx: &mpsc::Sender<PipelineResult>,
		cancel: &CancellationToken,
	) -> Result<()> {
		if self.evaluators.is_empty() && !self.emit_trec {
			return Ok(());
		}

		let worker = Arc::new(TopicWorker {
			source: Arc::clone(&self.source),
			documents: self.documents.clone(),
			evaluators: self.evaluators.clone(),
			qrels: Arc::clone(&self.qrels),
			run_name: self.run_name.clone(),
			emit_trec: self.emit_trec,
		});
		let semaphore = Arc::new(Semaphore::new(self.concurrency));
		let mut workers = JoinSet::new();

		for query in queries {
			if cancel.is_cancelled() {
				tracing::info!("Evaluation cancelled; no further topics are started.");

				break;
			}

			let permit = Arc::clone(&semaphore)
				.acquire_owned()
				.await
				.map_err(|err| Error::Worker { message: err.to_string() })?;
			let worker = Arc::clone(&worker);
			let tx = tx.clone();
			let query = query.clone();

			workers.spawn(async move {
				let scores = worker.run(query, &tx).await;

				drop(permit);

				scores
			});
		}

		let mut table = EvaluationTable::new();

		while let Some(joined) = workers.join_next().await {
			match joined {
				Ok(Some((topic, scores))) => {
					table.insert(topic, scores);
				},
				Ok(None) => {},
				Err(err) => {
					tracing::warn!(error = %err, "Evaluation worker panicked.");

					send(
						tx,
						PipelineResult::Error {
							topic: None,
							error: Error::Worker { message: err.to_string() },
						},
					)
					.await;
				},
			}
		}

		if self.evaluation_formatters.is_empty() {
			return Ok(());
		}

		let outputs = self
			.evaluation_formatters
			.iter()
			.map(|formatter| formatter.format(&table))
			.collect::<Result<Vec<_>>>()?;

		send(tx, PipelineResult::Evaluation(outputs)).await;

		Ok(())
	}

	async fn run_model(&self, queries: &[PipelineQuery], cancel: &CancellationToken) -> Result<()> {
		let Some(model) = &self.model else {
			return Ok(());
		};

		if self.stages.generate {
			tracing::info!("Generating training records.");

			model
				.generate(queries, cancel)
				.await
				.map_err(|source| Error::Model { stage: "generate", source })?;
		}
		if self.stages.train {
			tracing::info!("Training model.");

			model.train(cancel).await.map_err(|source| Error::Model { stage: "train", source })?;
		}
		if self.stages.test {
			tracing::info!("Testing model.");

			model
				.test(queries, cancel)
				.await
				.map_err(|source| Error::Model { stage: "test", source })?;
		}

		Ok(())
	}
}

/// `source` with `search.k` from `cfg` as its `k` parameter.
pub fn configured_source(
	cfg: &Config,
	source: Arc<dyn StatisticsSource>,
) -> Arc<dyn StatisticsSource> {
	Arc::new(ConfiguredSource::new(source, [("k", cfg.search.k)]))
}

/// The query-chain model over the external ranker, configured from `cfg`.
pub fn build_query_chain(
	cfg: &Config,
	source: Arc<dyn StatisticsSource>,
	executor: MeasurementExecutor,
) -> Result<QueryChain<QuickRankSelector>> {
	let source = configured_source(cfg, source);
	let selector = QuickRankSelector::new(&cfg.selector, cfg.search.max_depth, Arc::clone(&source))?;
	let space = FeatureSpace::registered()?;

	Ok(QueryChain::new(selector, Arc::new(space), source, executor, cfg.search.max_depth)
		.with_paths(ModelPaths::from(&cfg.model)))
}

struct TopicWorker {
	source: Arc<dyn StatisticsSource>,
	documents: DocumentCache,
	evaluators: Vec<Arc<dyn Evaluator>>,
	qrels: Arc<Qrels>,
	run_name: String,
	emit_trec: bool,
}
impl TopicWorker {
	async fn run(
		&self,
		query: PipelineQuery,
		tx: &mpsc::Sender<PipelineResult>,
	) -> Option<(String, BTreeMap<String, f64>)> {
		tracing::info!(topic = %query.topic, "Starting topic.");

		let documents = match tree::evaluate(&query, self.source.as_ref(), &self.documents).await {
			Ok(documents) => documents,
			Err(err) => {
				tracing::warn!(topic = %query.topic, error = %err, "Topic evaluation failed.");

				send(tx, PipelineResult::Error { topic: Some(query.topic.clone()), error: err.into() })
					.await;

				return None;
			},
		};
		let results = documents.results(&query.topic, &self.run_name);

		drop(documents);

		let scores = (!self.evaluators.is_empty())
			.then(|| eval::evaluate(&self.evaluators, &results, &self.qrels, &query.topic));

		if self.emit_trec {
			send(tx, PipelineResult::TrecResult { topic: query.topic.clone(), results }).await;
		} else {
			drop(results);
		}

		tracing::info!(topic = %query.topic, "Completed topic.");

		let topic = query.topic.clone();

		send(
			tx,
			PipelineResult::Transformation { name: query.name, topic: query.topic, query: query.query },
		)
		.await;

		scores.map(|scores| (topic, scores))
	}
}

async fn send(tx: &mpsc::Sender<PipelineResult>, result: PipelineResult) {
	if tx.send(result).await.is_err() {
		tracing::debug!("Result receiver dropped.");
	}
}

fn default_concurrency() -> usize {
	std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}
