use std::sync::Arc;

use requery_pipeline::tree::{self, DocumentCache};
use requery_query::{BooleanQuery, Keyword, Operator, PipelineQuery, Query};
use requery_storage::MemoryStore;
use requery_testkit::FixtureSource;

fn keyword(text: &str) -> Query {
	Keyword::new(text).into()
}

fn boolean(operator: Operator, children: Vec<Query>) -> Query {
	BooleanQuery::new(operator, children).into()
}

fn source() -> FixtureSource {
	FixtureSource::new(10.0)
		.with_posting("a", [("d1", 1.0), ("d2", 1.0), ("d3", 1.0)])
		.with_posting("b", [("d2", 1.0), ("d4", 1.0)])
		.with_posting("c", [("d3", 1.0)])
}

fn cache() -> DocumentCache {
	DocumentCache::new(Arc::new(MemoryStore::new()))
}

#[tokio::test]
async fn set_operators_combine_child_documents() {
	let source = source();
	let cache = cache();
	let cases = [
		(boolean(Operator::Or, vec![keyword("a"), keyword("b")]), vec!["d1", "d2", "d3", "d4"]),
		(boolean(Operator::And, vec![keyword("a"), keyword("b")]), vec!["d2"]),
		(boolean(Operator::Not, vec![keyword("a"), keyword("b"), keyword("c")]), vec!["d1"]),
		(boolean(Operator::And, Vec::new()), Vec::new()),
	];

	for (query, expected) in cases {
		let text = query.to_string();
		let documents = tree::evaluate(&PipelineQuery::new("q", "1", query), &source, &cache)
			.await
			.expect("Evaluation failed.");

		assert_eq!(documents.ids(), expected.as_slice(), "Unexpected documents for {text}.");
	}
}

#[tokio::test]
async fn adjacency_subtrees_are_single_backend_calls() {
	let source = source();
	let adjacency = boolean(Operator::Adj(Some(2)), vec![keyword("a"), keyword("b")]);
	let query = PipelineQuery::new("q", "1", boolean(Operator::Or, vec![adjacency.clone(), keyword("c")]));
	let documents = tree::evaluate(&query, &source, &cache()).await.expect("Evaluation failed.");

	assert_eq!(documents.ids(), ["d2", "d3"]);
	assert_eq!(source.executed(), vec![adjacency.to_string(), keyword("c").to_string()]);
}

#[tokio::test]
async fn repeated_evaluation_is_bit_identical_and_cached() {
	let source = source();
	let cache = cache();
	let query = PipelineQuery::new(
		"q",
		"7",
		boolean(Operator::And, vec![boolean(Operator::Or, vec![keyword("a"), keyword("b")]), keyword("a")]),
	);
	let first = tree::evaluate(&query, &source, &cache).await.expect("Evaluation failed.");
	let calls = source.calls();
	let second = tree::evaluate(&query, &source, &cache).await.expect("Evaluation failed.");

	assert_eq!(first, second);
	assert_eq!(source.calls(), calls);
	assert_eq!(first.results("7", "run"), second.results("7", "run"));

	let results = first.results("7", "run");

	assert_eq!(results.len(), 3);
	assert_eq!(results[0].rank, 1);
	assert_eq!(results[0].score, 3.0);
	assert_eq!(results[2].score, 1.0);
}
