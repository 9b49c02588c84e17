//! The iterative reformulation loop and the offline runs built on it.

use std::{fmt::Write, path::PathBuf, sync::Arc};

use tokio_util::sync::CancellationToken;

use requery_analysis::{BoxFuture, Measurement, MeasurementExecutor, StatisticsSource, measurement};
use requery_query::PipelineQuery;

use crate::{
	CandidateQuery, Error, FeatureSpace, LearntFeature, MeasurementValues, Result, Selector,
	TransformedQuery, Transformer,
};

/// A learned reformulation model driven by the pipeline after its evaluation phase.
pub trait Model
where
	Self: Send + Sync,
{
	/// Writes labelled training records for `queries`.
	fn generate<'a>(
		&'a self,
		queries: &'a [PipelineQuery],
		cancel: &'a CancellationToken,
	) -> BoxFuture<'a, Result<()>>;

	/// Fits the selector from previously generated records.
	fn train<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, Result<()>>;

	/// Reformulates `queries` and writes the final query of each topic.
	fn test<'a>(
		&'a self,
		queries: &'a [PipelineQuery],
		cancel: &'a CancellationToken,
	) -> BoxFuture<'a, Result<()>>;
}

/// Scores a candidate query for training. Higher is better.
pub trait Labeler
where
	Self: Send + Sync,
{
	fn label<'a>(&'a self, query: &'a PipelineQuery) -> BoxFuture<'a, Result<f64>>;
}

#[derive(Debug, Clone, Default)]
pub struct ModelPaths {
	pub features: Option<PathBuf>,
	pub model: Option<PathBuf>,
	pub output: Option<PathBuf>,
}
impl From<&requery_config::Model> for ModelPaths {
	fn from(cfg: &requery_config::Model) -> Self {
		Self {
			features: cfg.features_path.clone(),
			model: cfg.model_path.clone(),
			output: cfg.output_path.clone(),
		}
	}
}

/// Reformulates a query by repeatedly expanding it through the transformers and letting the
/// selector choose among the candidates, until the selector asks to stop.
pub struct QueryChain<S> {
	selector: S,
	transformers: Vec<Arc<dyn Transformer>>,
	space: Arc<FeatureSpace>,
	measurements: Vec<Arc<dyn Measurement>>,
	source: Arc<dyn StatisticsSource>,
	executor: MeasurementExecutor,
	labeler: Option<Arc<dyn Labeler>>,
	depth: usize,
	paths: ModelPaths,
}
impl<S> QueryChain<S>
where
	S: Selector + Clone,
{
	pub fn new(
		selector: S,
		space: Arc<FeatureSpace>,
		source: Arc<dyn StatisticsSource>,
		executor: MeasurementExecutor,
		depth: usize,
	) -> Self {
		Self {
			selector,
			transformers: Vec::new(),
			space,
			measurements: measurement::registered(),
			source,
			executor,
			labeler: None,
			depth,
			paths: ModelPaths::default(),
		}
	}

	pub fn with_transformers(mut self, transformers: Vec<Arc<dyn Transformer>>) -> Self {
		self.transformers = transformers;

		self
	}

	/// Replaces the measurements taken for every candidate. Each must be registered in the
	/// feature space.
	pub fn with_measurements(mut self, measurements: Vec<Arc<dyn Measurement>>) -> Self {
		self.measurements = measurements;

		self
	}

	pub fn with_labeler(mut self, labeler: Arc<dyn Labeler>) -> Self {
		self.labeler = Some(labeler);

		self
	}

	pub fn with_paths(mut self, paths: ModelPaths) -> Self {
		self.paths = paths;

		self
	}

	pub fn space(&self) -> &FeatureSpace {
		&self.space
	}

	pub async fn measure(&self, query: &PipelineQuery) -> Result<MeasurementValues> {
		self.space
			.measure(query, self.source.as_ref(), &self.executor, &self.measurements)
			.await
	}

	/// Every candidate the transformers propose for `current`, encoded and chained to it.
	pub async fn expand(
		&self,
		template: &PipelineQuery,
		current: &CandidateQuery,
		before: &MeasurementValues,
	) -> Result<Vec<CandidateQuery>> {
		let mut candidates = Vec::new();

		for transformer in &self.transformers {
			for rewritten in transformer.apply(&current.query) {
				let after = self.measure(&template.with_query(rewritten.query.clone())).await?;
				let descriptor = transformer.descriptor(&rewritten);
				let features = self.space.encode(
					&rewritten.clause,
					&rewritten.context,
					Some(&descriptor),
					before,
					&after,
				);

				candidates.push(
					CandidateQuery::new(current.topic.as_str(), rewritten.query, features)
						.with_transformation(transformer.code())
						.append(current, &self.space),
				);
			}
		}

		tracing::debug!(
			topic = %current.topic,
			candidates = candidates.len(),
			"Expanded query."
		);

		Ok(candidates)
	}

	/// Runs the selection loop for one query.
	pub async fn execute(
		&self,
		query: &PipelineQuery,
		cancel: &CancellationToken,
	) -> Result<TransformedQuery> {
		let mut selector = self.selector.clone();
		let mut transformed = TransformedQuery::new(query.clone());
		let mut current = CandidateQuery::root(query);

		while !selector.stopping_criteria() {
			if cancel.is_cancelled() {
				return Err(Error::Stopped { topic: query.topic.clone() });
			}

			let before = self.measure(&query.with_query(current.query.clone())).await?;
			let candidates = self.expand(query, &current, &before).await?;
			let (chosen, next) = selector.select(&current, &candidates, cancel).await?;

			selector = next;

			if chosen.same_query(&current) {
				break;
			}

			tracing::info!(
				topic = %query.topic,
				transformation = chosen.transformation_id,
				query = %chosen.query,
				"Reformulated query."
			);

			transformed = transformed.append(query.with_query(chosen.query.clone()));
			current = chosen;
		}

		Ok(transformed)
	}

	async fn generate_topic(
		&self,
		labeler: &dyn Labeler,
		query: &PipelineQuery,
		sink: &mut Vec<u8>,
		cancel: &CancellationToken,
	) -> Result<usize> {
		let mut current = CandidateQuery::root(query);
		let mut best = labeler.label(query).await?;
		let mut records = 0;

		for _ in 0..self.depth {
			if cancel.is_cancelled() {
				return Err(Error::Stopped { topic: query.topic.clone() });
			}

			let before = self.measure(&query.with_query(current.query.clone())).await?;
			let candidates = self.expand(query, &current, &before).await?;
			let mut next = None;

			for candidate in candidates {
				let label = labeler.label(&query.with_query(candidate.query.clone())).await?;
				let record = LearntFeature::new(
					candidate.features.clone(),
					vec![label],
					query.topic.as_str(),
					candidate.text(),
				)?;

				self.selector.output(&record, sink)?;

				records += 1;

				if label > best {
					best = label;
					next = Some(candidate);
				}
			}

			// Training follows the best-labelled candidate; stop once nothing improves.
			match next {
				Some(candidate) => current = candidate,
				None => break,
			}
		}

		Ok(records)
	}
}
impl<S> Model for QueryChain<S>
where
	S: Selector + Clone,
{
	fn generate<'a>(
		&'a self,
		queries: &'a [PipelineQuery],
		cancel: &'a CancellationToken,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let path = required(&self.paths.features, "model.features_path")?;
			let labeler = self.labeler.as_deref().ok_or_else(|| Error::Validation {
				message: "Generating training records requires a labeler.".to_string(),
			})?;
			let mut sink = Vec::new();

			for query in queries {
				let records = self.generate_topic(labeler, query, &mut sink, cancel).await?;

				tracing::info!(topic = %query.topic, records, "Generated training records.");
			}

			tokio::fs::write(path, sink).await.map_err(|err| Error::io(path, err))
		})
	}

	fn train<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let features = required(&self.paths.features, "model.features_path")?;
			let model = required(&self.paths.model, "model.model_path")?;
			let raw = tokio::fs::read_to_string(features)
				.await
				.map_err(|err| Error::io(features, err))?;
			let examples = raw
				.lines()
				.filter(|line| !line.trim().is_empty())
				.map(LearntFeature::parse_libsvm_rank)
				.collect::<Result<Vec<_>>>()?;

			if examples.is_empty() {
				return Err(Error::Training {
					message: format!("No training records in {features:?}."),
				});
			}

			let artifact = self.selector.train(&examples, cancel).await?;

			tracing::info!(examples = examples.len(), bytes = artifact.len(), "Trained selector.");

			tokio::fs::write(model, artifact).await.map_err(|err| Error::io(model, err))
		})
	}

	fn test<'a>(
		&'a self,
		queries: &'a [PipelineQuery],
		cancel: &'a CancellationToken,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let path = required(&self.paths.output, "model.output_path")?;
			let mut out = String::new();

			for query in queries {
				let transformed = self.execute(query, cancel).await?;

				tracing::info!(
					topic = %query.topic,
					steps = transformed.chain().len(),
					"Finished reformulation."
				);

				let _ = writeln!(out, "{}\t{}", query.topic, transformed.query().query);
			}

			tokio::fs::write(path, out).await.map_err(|err| Error::io(path, err))
		})
	}
}

fn required<'a>(path: &'a Option<PathBuf>, key: &str) -> Result<&'a PathBuf> {
	path.as_ref().ok_or_else(|| Error::Validation { message: format!("{key} must be set.") })
}
