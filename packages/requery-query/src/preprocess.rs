use crate::{Keyword, Query};

/// A preprocessing stage applied to every keyword-bearing query before rewriting.
pub trait QueryProcessor
where
	Self: Send + Sync,
{
	fn name(&self) -> &'static str;

	fn process(&self, query: Query) -> Query;
}

/// A whole-query rewrite stage, applied after preprocessing to finalize a query.
pub trait Rewrite
where
	Self: Send + Sync,
{
	fn name(&self) -> &'static str;

	fn rewrite(&self, query: Query) -> Query;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Lowercase;
impl QueryProcessor for Lowercase {
	fn name(&self) -> &'static str {
		"lowercase"
	}

	fn process(&self, query: Query) -> Query {
		query.map_keywords(&|keyword: Keyword| Keyword {
			query_string: keyword.query_string.to_lowercase(),
			..keyword
		})
	}
}
