//! Test doubles: an in-memory statistics backend evaluated over keyword postings, and a probe
//! that records peak concurrency.

use std::{
	collections::{BTreeMap, HashMap, HashSet},
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use requery_analysis::{
	BoxFuture, Error, Result, ResultList, SearchOptions, SearchResult, StatisticsSource,
};
use requery_query::{BooleanQuery, Keyword, Operator, PipelineQuery, Query};

#[derive(Debug, Default)]
pub struct ConcurrencyProbe {
	current: AtomicUsize,
	peak: AtomicUsize,
}
impl ConcurrencyProbe {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn enter(self: &Arc<Self>) -> ProbeGuard {
		let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;

		self.peak.fetch_max(now, Ordering::SeqCst);

		ProbeGuard { probe: Arc::clone(self) }
	}

	pub fn peak(&self) -> usize {
		self.peak.load(Ordering::SeqCst)
	}
}

pub struct ProbeGuard {
	probe: Arc<ConcurrencyProbe>,
}
impl Drop for ProbeGuard {
	fn drop(&mut self) {
		self.probe.current.fetch_sub(1, Ordering::SeqCst);
	}
}

/// A backend whose documents are keyword postings with per-document scores.
///
/// Boolean nodes combine postings: `or` unions, `and` and adjacency intersect, `not` subtracts.
/// Scores of matching postings are summed. Explicit result lists registered with
/// [`FixtureSource::with_results`] take precedence for the exact query text.
pub struct FixtureSource {
	parameters: HashMap<String, f64>,
	options: SearchOptions,
	collection_size: f64,
	postings: HashMap<String, BTreeMap<String, f64>>,
	results: HashMap<String, Vec<f64>>,
	failing: HashSet<String>,
	delay: Option<Duration>,
	probe: Option<Arc<ConcurrencyProbe>>,
	calls: AtomicUsize,
	log: Mutex<Vec<String>>,
}
impl FixtureSource {
	pub fn new(k: f64) -> Self {
		Self {
			parameters: HashMap::from([("k".to_string(), k)]),
			options: SearchOptions::default(),
			collection_size: 1_000.0,
			postings: HashMap::new(),
			results: HashMap::new(),
			failing: HashSet::new(),
			delay: None,
			probe: None,
			calls: AtomicUsize::new(0),
			log: Mutex::new(Vec::new()),
		}
	}

	pub fn with_posting<I, S>(mut self, term: &str, docs: I) -> Self
	where
		I: IntoIterator<Item = (S, f64)>,
		S: Into<String>,
	{
		self.postings.insert(
			term.to_string(),
			docs.into_iter().map(|(doc, score)| (doc.into(), score)).collect(),
		);

		self
	}

	/// Scores returned verbatim, as documents `d0..dn`, for a query with this exact text.
	pub fn with_results(mut self, query: &Query, scores: &[f64]) -> Self {
		self.results.insert(query.to_string(), scores.to_vec());

		self
	}

	/// Any query whose text contains `needle` fails with a backend error.
	pub fn failing_on(mut self, needle: &str) -> Self {
		self.failing.insert(needle.to_string());

		self
	}

	pub fn with_collection_size(mut self, size: f64) -> Self {
		self.collection_size = size;

		self
	}

	pub fn with_delay(mut self, delay: Duration, probe: Arc<ConcurrencyProbe>) -> Self {
		self.delay = Some(delay);
		self.probe = Some(probe);

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// Query texts passed to `execute`, in call order.
	pub fn executed(&self) -> Vec<String> {
		self.log.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	fn matches(&self, query: &Query) -> BTreeMap<String, f64> {
		match query {
			Query::Keyword(keyword) => self.keyword_postings(keyword),
			Query::Boolean(boolean) => self.boolean_postings(boolean),
		}
	}

	fn keyword_postings(&self, keyword: &Keyword) -> BTreeMap<String, f64> {
		self.postings.get(&keyword.query_string).cloned().unwrap_or_default()
	}

	fn boolean_postings(&self, boolean: &BooleanQuery) -> BTreeMap<String, f64> {
		let mut children = boolean.children.iter().map(|child| self.matches(child));
		let Some(mut acc) = children.next() else {
			return BTreeMap::new();
		};

		for child in children {
			match boolean.operator {
				Operator::Or =>
					for (doc, score) in child {
						*acc.entry(doc).or_insert(0.0) += score;
					},
				Operator::And | Operator::Adj(_) | Operator::Other(_) => {
					acc.retain(|doc, _| child.contains_key(doc));

					for (doc, score) in acc.iter_mut() {
						*score += child[doc];
					}
				},
				Operator::Not => acc.retain(|doc, _| !child.contains_key(doc)),
			}
		}

		acc
	}

	fn check(&self, query: &Query) -> Result<()> {
		let text = query.to_string();

		if self.failing.iter().any(|needle| text.contains(needle)) {
			return Err(Error::backend(format!("Fixture refuses {text}.")));
		}

		Ok(())
	}
}
impl StatisticsSource for FixtureSource {
	fn search_options(&self) -> SearchOptions {
		self.options.clone()
	}

	fn parameters(&self) -> &HashMap<String, f64> {
		&self.parameters
	}

	fn execute<'a>(
		&'a self,
		query: &'a PipelineQuery,
		options: &'a SearchOptions,
	) -> BoxFuture<'a, Result<ResultList>> {
		Box::pin(async move {
			let _guard = self.probe.as_ref().map(|probe| probe.enter());

			self.calls.fetch_add(1, Ordering::SeqCst);
			self.log.lock().unwrap_or_else(|err| err.into_inner()).push(query.query.to_string());

			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}

			self.check(&query.query)?;

			let scored: Vec<(String, f64)> = match self.results.get(&query.query.to_string()) {
				Some(scores) => scores
					.iter()
					.enumerate()
					.map(|(i, score)| (format!("d{i}"), *score))
					.collect(),
				None => {
					let mut scored: Vec<_> = self.matches(&query.query).into_iter().collect();

					scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

					scored
				},
			};

			Ok(scored
				.into_iter()
				.take(options.size)
				.enumerate()
				.map(|(i, (doc_id, score))| SearchResult {
					topic: query.topic.clone(),
					doc_id,
					rank: i + 1,
					score,
					run_name: options.run_name.clone(),
				})
				.collect())
		})
	}

	fn retrieval_size<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<f64>> {
		Box::pin(async move {
			self.check(query)?;

			let size = match self.results.get(&query.to_string()) {
				Some(scores) => scores.len(),
				None => self.matches(query).len(),
			};

			Ok(size as f64)
		})
	}

	fn collection_size<'a>(&'a self) -> BoxFuture<'a, Result<f64>> {
		Box::pin(async move { Ok(self.collection_size) })
	}
}
