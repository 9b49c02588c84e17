//! Reformulation history. Appending never mutates an existing value, so several branches can
//! grow from one point without aliasing.

use std::{fmt, sync::Arc};

use requery_query::{PipelineQuery, Query};

use crate::{Feature, FeatureSpace, Features, transform::codes};

/// A persistent, append-only sequence. Clones share their common prefix.
pub struct Lineage<T> {
	head: Option<Arc<Node<T>>>,
	len: usize,
}

struct Node<T> {
	value: T,
	parent: Option<Arc<Node<T>>>,
}

impl<T> Lineage<T> {
	pub fn new() -> Self {
		Self { head: None, len: 0 }
	}

	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// A new lineage with `value` appended; `self` is unchanged.
	pub fn push(&self, value: T) -> Self {
		Self { head: Some(Arc::new(Node { value, parent: self.head.clone() })), len: self.len + 1 }
	}

	pub fn last(&self) -> Option<&T> {
		self.head.as_deref().map(|node| &node.value)
	}

	/// Elements from the oldest to the most recent.
	pub fn iter(&self) -> impl Iterator<Item = &T> {
		let mut out = Vec::with_capacity(self.len);
		let mut cursor = self.head.as_deref();

		while let Some(node) = cursor {
			out.push(&node.value);
			cursor = node.parent.as_deref();
		}

		out.into_iter().rev()
	}
}
impl<T> Clone for Lineage<T> {
	fn clone(&self) -> Self {
		Self { head: self.head.clone(), len: self.len }
	}
}
impl<T> Default for Lineage<T> {
	fn default() -> Self {
		Self::new()
	}
}
impl<T> FromIterator<T> for Lineage<T> {
	fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
		iter.into_iter().fold(Self::new(), |lineage, value| lineage.push(value))
	}
}
impl<T> fmt::Debug for Lineage<T>
where
	T: fmt::Debug,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.iter()).finish()
	}
}
impl<T> Drop for Lineage<T> {
	// Unlink iteratively so long chains cannot overflow the stack.
	fn drop(&mut self) {
		let mut cursor = self.head.take();

		while let Some(node) = cursor {
			match Arc::try_unwrap(node) {
				Ok(mut node) => cursor = node.parent.take(),
				Err(_) => break,
			}
		}
	}
}

/// The current query of one search thread and the queries it replaced.
#[derive(Debug, Clone)]
pub struct TransformedQuery {
	query: PipelineQuery,
	chain: Lineage<Query>,
}
impl TransformedQuery {
	pub fn new(query: PipelineQuery) -> Self {
		Self { query, chain: Lineage::new() }
	}

	pub fn with_chain(query: PipelineQuery, chain: impl IntoIterator<Item = Query>) -> Self {
		Self { query, chain: chain.into_iter().collect() }
	}

	pub fn query(&self) -> &PipelineQuery {
		&self.query
	}

	pub fn chain(&self) -> &Lineage<Query> {
		&self.chain
	}

	/// Moves the current query into the chain and installs `query` as current.
	pub fn append(&self, query: PipelineQuery) -> Self {
		Self { chain: self.chain.push(self.query.query.clone()), query }
	}
}

/// A possible next state: a query, its features, the transformation that produced it and the
/// candidates it descends from.
#[derive(Debug, Clone)]
pub struct CandidateQuery {
	pub topic: String,
	pub query: Query,
	pub features: Features,
	pub transformation_id: i32,
	chain: Lineage<CandidateQuery>,
}
impl CandidateQuery {
	pub fn new(topic: impl Into<String>, query: Query, features: Features) -> Self {
		Self {
			topic: topic.into(),
			query,
			features,
			transformation_id: codes::ROOT,
			chain: Lineage::new(),
		}
	}

	pub fn root(query: &PipelineQuery) -> Self {
		Self::new(query.topic.clone(), query.query.clone(), Features::new())
	}

	pub fn with_transformation(self, transformation_id: i32) -> Self {
		Self { transformation_id, ..self }
	}

	pub fn chain(&self) -> &Lineage<CandidateQuery> {
		&self.chain
	}

	/// Records `parent` as this candidate's predecessor.
	///
	/// Every ancestor already in the parent's chain contributes a chain-position feature valued
	/// by its transformation code, then the parent itself joins the chain.
	pub fn append(mut self, parent: &CandidateQuery, space: &FeatureSpace) -> Self {
		self.features.extend(parent.chain.iter().enumerate().map(|(position, ancestor)| {
			Feature::new(space.chain_id(position), f64::from(ancestor.transformation_id))
		}));
		self.chain = parent.chain.push(parent.clone());

		self
	}

	/// Textual identity of the query tree, the basis of fixed-point detection.
	pub fn text(&self) -> String {
		self.query.to_string()
	}

	pub fn same_query(&self, other: &CandidateQuery) -> bool {
		self.text() == other.text()
	}
}
