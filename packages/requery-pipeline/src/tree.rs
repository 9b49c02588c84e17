//! Boolean evaluation over cached document sets.
//!
//! Keyword leaves and adjacency subtrees cannot be decomposed into set algebra, so each is one
//! backend call whose document set is cached. The remaining operators combine child sets:
//! `or` is union, `and` intersection and `not` the first child minus the rest.

use std::{collections::BTreeSet, sync::Arc};

use serde_json::json;

use requery_analysis::{BoxFuture, Result, ResultList, SearchResult, StatisticsSource};
use requery_query::{Operator, PipelineQuery, Query};
use requery_storage::{ByteStore, hash_cache_key};

const DOCUMENT_CACHE_SCHEMA_VERSION: i32 = 1;

/// The document sets of atomic queries, keyed by query text.
#[derive(Clone)]
pub struct DocumentCache {
	store: Arc<dyn ByteStore>,
}
impl DocumentCache {
	pub fn new(store: Arc<dyn ByteStore>) -> Self {
		Self { store }
	}

	pub async fn get(&self, query: &Query) -> Result<Option<BTreeSet<String>>> {
		let key = build_document_cache_key(query)?;
		let Some(raw) = self.store.get(&key).await? else {
			return Ok(None);
		};

		match serde_json::from_slice(&raw) {
			Ok(documents) => Ok(Some(documents)),
			Err(err) => {
				tracing::warn!(
					key = %requery_storage::cache_key_prefix(&key),
					error = %err,
					"Ignoring malformed document cache entry."
				);

				Ok(None)
			},
		}
	}

	pub async fn put(&self, query: &Query, documents: &BTreeSet<String>) -> Result<()> {
		let key = build_document_cache_key(query)?;
		let raw = serde_json::to_vec(documents)?;

		self.store.put(&key, &raw).await?;

		Ok(())
	}
}

/// Documents matched by a query, in ascending document-id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankedDocuments(Vec<String>);
impl RankedDocuments {
	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn ids(&self) -> &[String] {
		&self.0
	}

	/// Rank `i + 1` with score `n - i`, so the list is reproducible bit for bit.
	pub fn results(&self, topic: &str, run_name: &str) -> ResultList {
		let n = self.0.len();

		self.0
			.iter()
			.enumerate()
			.map(|(i, doc_id)| SearchResult {
				topic: topic.to_string(),
				doc_id: doc_id.clone(),
				rank: i + 1,
				score: (n - i) as f64,
				run_name: run_name.to_string(),
			})
			.collect()
	}
}
impl From<BTreeSet<String>> for RankedDocuments {
	fn from(documents: BTreeSet<String>) -> Self {
		Self(documents.into_iter().collect())
	}
}

/// Evaluates `query` against `source`, reusing and filling `cache`.
pub async fn evaluate(
	query: &PipelineQuery,
	source: &dyn StatisticsSource,
	cache: &DocumentCache,
) -> Result<RankedDocuments> {
	Ok(documents(query, &query.query, source, cache).await?.into())
}

fn documents<'a>(
	template: &'a PipelineQuery,
	node: &'a Query,
	source: &'a dyn StatisticsSource,
	cache: &'a DocumentCache,
) -> BoxFuture<'a, Result<BTreeSet<String>>> {
	Box::pin(async move {
		let (boolean, combine) = match node {
			Query::Boolean(boolean) => match boolean.operator {
				Operator::Or => (boolean, Combine::Union),
				Operator::And => (boolean, Combine::Intersection),
				Operator::Not => (boolean, Combine::Difference),
				Operator::Adj(_) | Operator::Other(_) =>
					return atomic(template, node, source, cache).await,
			},
			Query::Keyword(_) => return atomic(template, node, source, cache).await,
		};
		let mut children = boolean.children.iter();
		let Some(first) = children.next() else {
			return Ok(BTreeSet::new());
		};
		let mut acc = documents(template, first, source, cache).await?;

		for child in children {
			let docs = documents(template, child, source, cache).await?;

			match combine {
				Combine::Union => acc.extend(docs),
				Combine::Intersection => acc.retain(|doc| docs.contains(doc)),
				Combine::Difference => acc.retain(|doc| !docs.contains(doc)),
			}
		}

		Ok(acc)
	})
}

#[derive(Clone, Copy)]
enum Combine {
	Union,
	Intersection,
	Difference,
}

async fn atomic(
	template: &PipelineQuery,
	node: &Query,
	source: &dyn StatisticsSource,
	cache: &DocumentCache,
) -> Result<BTreeSet<String>> {
	if let Some(documents) = cache.get(node).await? {
		return Ok(documents);
	}

	let size = source.retrieval_size(node).await?;
	let mut options = source.search_options();

	// The whole posting set is needed for set algebra, not the backend's default cut-off.
	options.size = (size.max(0.0) as usize).max(options.size);

	let results = source.execute(&template.with_query(node.clone()), &options).await?;
	let documents: BTreeSet<String> = results.into_iter().map(|result| result.doc_id).collect();

	cache.put(node, &documents).await?;

	tracing::debug!(query = %node, documents = documents.len(), "Cached document set.");

	Ok(documents)
}

fn build_document_cache_key(query: &Query) -> Result<String> {
	let payload = json!({
		"kind": "documents",
		"schema_version": DOCUMENT_CACHE_SCHEMA_VERSION,
		"query": query.to_string(),
	});

	Ok(hash_cache_key(&payload)?)
}
