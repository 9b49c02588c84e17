pub mod analysis;
pub mod cqr;
pub mod preprocess;
pub mod source;

mod error;

pub use cqr::{BooleanQuery, Keyword, Operator, Query};
pub use error::{Error, Result};
pub use preprocess::{Lowercase, QueryProcessor, Rewrite};
pub use source::{JsonQueriesSource, QueriesSource};

use serde::{Deserialize, Serialize};

/// A query as it moves through the pipeline, tagged with the topic it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineQuery {
	pub name: String,
	pub topic: String,
	pub query: Query,
}
impl PipelineQuery {
	pub fn new(name: impl Into<String>, topic: impl Into<String>, query: Query) -> Self {
		Self { name: name.into(), topic: topic.into(), query }
	}

	/// The same name and topic carrying a different query tree.
	pub fn with_query(&self, query: Query) -> Self {
		Self { name: self.name.clone(), topic: self.topic.clone(), query }
	}
}
