use std::sync::Arc;

use requery_analysis::{
	ConfiguredSource, Error, Measurement, MeasurementExecutor, StatisticsSource,
	measurement::{self, BooleanClauses, MeshExplodedCount, QueryScope, RetrievalSize},
	qpp::{WeightedExpansionGain, WeightedInformationGain},
};
use requery_query::{BooleanQuery, Keyword, Operator, PipelineQuery, Query};
use requery_storage::MemoryStore;
use requery_testkit::FixtureSource;

fn two_term_query() -> Query {
	BooleanQuery::new(
		Operator::Or,
		vec![Keyword::new("asthma").into(), Keyword::new("wheeze").into()],
	)
	.into()
}

#[tokio::test]
async fn gain_estimators_match_reference_scenario() {
	let query = PipelineQuery::new("q", "1", two_term_query());
	let source = FixtureSource::new(2.0).with_results(&query.query, &[5.0, 4.0, 1.0]);
	let wig = WeightedInformationGain.execute(&query, &source).await.expect("WIG failed");
	let weg = WeightedExpansionGain.execute(&query, &source).await.expect("WEG failed");

	assert!((wig - 2.4749).abs() < 1e-3, "Unexpected WIG: {wig}");
	assert!((weg - 0.8839).abs() < 1e-3, "Unexpected WEG: {weg}");
}

#[tokio::test]
async fn gain_estimators_are_zero_without_results() {
	let query = PipelineQuery::new("q", "1", Keyword::new("unmatched").into());
	let source = FixtureSource::new(10.0);

	assert_eq!(WeightedInformationGain.execute(&query, &source).await.expect("WIG failed"), 0.0);
	assert_eq!(WeightedExpansionGain.execute(&query, &source).await.expect("WEG failed"), 0.0);
}

#[tokio::test]
async fn gain_estimators_propagate_backend_errors() {
	let query = PipelineQuery::new("q", "1", Keyword::new("broken").into());
	let source = FixtureSource::new(10.0).failing_on("broken");
	let err = WeightedInformationGain.execute(&query, &source).await.expect_err("Must fail.");

	assert!(matches!(err, Error::Backend { .. }));
}

#[tokio::test]
async fn structural_and_backend_measurements() {
	let query = PipelineQuery::new(
		"q",
		"1",
		BooleanQuery::new(
			Operator::And,
			vec![
				Keyword::new("asthma").with_fields(["mesh_headings"]).exploded(true).into(),
				Keyword::new("inhaler").into(),
			],
		)
		.into(),
	);
	let source = FixtureSource::new(10.0)
		.with_collection_size(100.0)
		.with_posting("asthma", [("d1", 1.0), ("d2", 2.0), ("d3", 1.0)])
		.with_posting("inhaler", [("d2", 1.0), ("d3", 0.5)]);

	assert_eq!(BooleanClauses.execute(&query, &source).await.expect("clauses failed"), 1.0);
	assert_eq!(MeshExplodedCount.execute(&query, &source).await.expect("mesh failed"), 1.0);
	assert_eq!(RetrievalSize.execute(&query, &source).await.expect("size failed"), 2.0);

	let scope = QueryScope.execute(&query, &source).await.expect("scope failed");

	assert!((scope - (-(2.0_f64 / 100.0).ln())).abs() < 1e-12, "Unexpected scope: {scope}");
}

#[tokio::test]
async fn executor_memoizes_backend_measurements() {
	let query = PipelineQuery::new("q", "1", two_term_query());
	let source = FixtureSource::new(2.0).with_results(&query.query, &[5.0, 4.0, 1.0]);
	let executor = MeasurementExecutor::new(Arc::new(MemoryStore::new()));
	let measurements: Vec<Arc<dyn Measurement>> =
		vec![Arc::new(WeightedInformationGain), Arc::new(BooleanClauses)];
	let first = executor.execute(&query, &source, &measurements).await.expect("execute failed");
	let calls = source.calls();
	let second = executor.execute(&query, &source, &measurements).await.expect("execute failed");

	assert_eq!(first, second);
	assert_eq!(first[1], 1.0);
	assert_eq!(source.calls(), calls, "Cached values must not reach the backend.");
}

#[tokio::test]
async fn configured_k_changes_gains_and_their_cache_entries() {
	let query = PipelineQuery::new("q", "1", two_term_query());
	let base: Arc<dyn StatisticsSource> =
		Arc::new(FixtureSource::new(2.0).with_results(&query.query, &[5.0, 4.0, 1.0]));
	let configured = ConfiguredSource::new(Arc::clone(&base), [("k", 1.0)]);
	let executor = MeasurementExecutor::new(Arc::new(MemoryStore::new()));

	assert_eq!(configured.parameter("k"), Some(1.0));
	assert_eq!(base.parameter("k"), Some(2.0));

	let default_wig = executor
		.execute_one(&query, base.as_ref(), &WeightedInformationGain)
		.await
		.expect("WIG failed");
	let configured_wig = executor
		.execute_one(&query, &configured, &WeightedInformationGain)
		.await
		.expect("WIG failed");

	assert!((default_wig - 2.4749).abs() < 1e-3, "Unexpected WIG: {default_wig}");
	assert!(
		(configured_wig - default_wig).abs() > 1e-6,
		"A cached gain for k = 2 was reused for k = 1."
	);
}

#[test]
fn registered_measurement_names_are_unique() {
	let names: Vec<_> = measurement::registered().iter().map(|m| m.name()).collect();
	let mut deduped = names.clone();

	deduped.sort_unstable();
	deduped.dedup();

	assert_eq!(names.len(), 11);
	assert_eq!(deduped.len(), names.len());
	assert_eq!(names.last(), Some(&"weg"));
}
