use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};

use requery_query::{PipelineQuery, Query};

use crate::{BoxFuture, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
	pub size: usize,
	pub run_name: String,
}
impl Default for SearchOptions {
	fn default() -> Self {
		Self { size: 1_000, run_name: "requery".to_string() }
	}
}

/// One ranked document returned by a statistics backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
	pub topic: String,
	pub doc_id: String,
	pub rank: usize,
	pub score: f64,
	pub run_name: String,
}
impl SearchResult {
	/// Renders the result as a TREC run line: `topic Q0 doc rank score run`.
	pub fn trec_line(&self) -> String {
		format!("{} Q0 {} {} {} {}", self.topic, self.doc_id, self.rank, self.score, self.run_name)
	}
}

/// Results ordered by descending score.
pub type ResultList = Vec<SearchResult>;

/// A backend able to retrieve and score documents for a query and report collection
/// statistics. Implementations may cache internally.
pub trait StatisticsSource
where
	Self: Send + Sync,
{
	fn search_options(&self) -> SearchOptions;

	fn parameters(&self) -> &HashMap<String, f64>;

	fn execute<'a>(
		&'a self,
		query: &'a PipelineQuery,
		options: &'a SearchOptions,
	) -> BoxFuture<'a, Result<ResultList>>;

	fn retrieval_size<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<f64>>;

	fn collection_size<'a>(&'a self) -> BoxFuture<'a, Result<f64>>;

	fn parameter(&self, name: &str) -> Option<f64> {
		self.parameters().get(name).copied()
	}
}

/// A backend whose named parameters are overridden by configured values, delegating
/// everything else.
pub struct ConfiguredSource {
	inner: Arc<dyn StatisticsSource>,
	parameters: HashMap<String, f64>,
}
impl ConfiguredSource {
	pub fn new<I, S>(inner: Arc<dyn StatisticsSource>, overrides: I) -> Self
	where
		I: IntoIterator<Item = (S, f64)>,
		S: Into<String>,
	{
		let mut parameters = inner.parameters().clone();

		parameters.extend(overrides.into_iter().map(|(name, value)| (name.into(), value)));

		Self { inner, parameters }
	}
}
impl StatisticsSource for ConfiguredSource {
	fn search_options(&self) -> SearchOptions {
		self.inner.search_options()
	}

	fn parameters(&self) -> &HashMap<String, f64> {
		&self.parameters
	}

	fn execute<'a>(
		&'a self,
		query: &'a PipelineQuery,
		options: &'a SearchOptions,
	) -> BoxFuture<'a, Result<ResultList>> {
		self.inner.execute(query, options)
	}

	fn retrieval_size<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<f64>> {
		self.inner.retrieval_size(query)
	}

	fn collection_size<'a>(&'a self) -> BoxFuture<'a, Result<f64>> {
		self.inner.collection_size()
	}
}
