//! Query measurements. Structural measurements read the query tree only; the rest consult
//! the statistics backend.

use std::sync::Arc;

use requery_query::{PipelineQuery, analysis};

use crate::{BoxFuture, Result, StatisticsSource, qpp};

pub trait Measurement
where
	Self: Send + Sync,
{
	fn name(&self) -> &'static str;

	fn execute<'a>(
		&'a self,
		query: &'a PipelineQuery,
		source: &'a dyn StatisticsSource,
	) -> BoxFuture<'a, Result<f64>>;
}

/// Distinct fields referenced by keywords.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanFields;
/// Boolean sub-clauses, the root included.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanClauses;
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanKeywords;
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanTruncated;
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshKeywordCount;
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshExplodedCount;
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshNonExplodedCount;
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrievalSize;
/// `-ln(n_q / N)`, where `n_q` is the retrieval size and `N` the collection size.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryScope;

macro_rules! structural_measurement {
	($ty:ty, $name:literal, |$query:ident| $body:expr) => {
		impl Measurement for $ty {
			fn name(&self) -> &'static str {
				$name
			}

			fn execute<'a>(
				&'a self,
				query: &'a PipelineQuery,
				_source: &'a dyn StatisticsSource,
			) -> BoxFuture<'a, Result<f64>> {
				let $query = &query.query;
				let value = $body as f64;

				Box::pin(async move { Ok(value) })
			}
		}
	};
}

structural_measurement!(BooleanFields, "boolean_fields", |query| analysis::fields(query).len());
structural_measurement!(BooleanClauses, "boolean_clauses", |query| {
	analysis::boolean_queries(query).len()
});
structural_measurement!(BooleanKeywords, "boolean_keywords", |query| {
	analysis::keywords(query).len()
});
structural_measurement!(BooleanTruncated, "boolean_truncated", |query| {
	analysis::keywords(query).iter().filter(|keyword| keyword.truncated == Some(true)).count()
});
structural_measurement!(MeshKeywordCount, "mesh_keyword_count", |query| {
	analysis::keywords(query).iter().filter(|keyword| keyword.is_mesh()).count()
});
structural_measurement!(MeshExplodedCount, "mesh_exploded_count", |query| {
	analysis::keywords(query)
		.iter()
		.filter(|keyword| keyword.is_mesh() && keyword.exploded == Some(true))
		.count()
});
structural_measurement!(MeshNonExplodedCount, "mesh_non_exploded_count", |query| {
	analysis::keywords(query)
		.iter()
		.filter(|keyword| keyword.is_mesh() && keyword.exploded != Some(true))
		.count()
});

impl Measurement for RetrievalSize {
	fn name(&self) -> &'static str {
		"retrieval_size"
	}

	fn execute<'a>(
		&'a self,
		query: &'a PipelineQuery,
		source: &'a dyn StatisticsSource,
	) -> BoxFuture<'a, Result<f64>> {
		Box::pin(async move { source.retrieval_size(&query.query).await })
	}
}

impl Measurement for QueryScope {
	fn name(&self) -> &'static str {
		"query_scope"
	}

	fn execute<'a>(
		&'a self,
		query: &'a PipelineQuery,
		source: &'a dyn StatisticsSource,
	) -> BoxFuture<'a, Result<f64>> {
		Box::pin(async move {
			let retrieved = source.retrieval_size(&query.query).await?;
			let collection = source.collection_size().await?;

			if retrieved <= 0.0 || collection <= 0.0 {
				return Ok(0.0);
			}

			Ok(-(retrieved / collection).ln())
		})
	}
}

/// The measurements registered in the default feature space, in feature order.
pub fn registered() -> Vec<Arc<dyn Measurement>> {
	vec![
		Arc::new(BooleanFields),
		Arc::new(BooleanClauses),
		Arc::new(BooleanKeywords),
		Arc::new(BooleanTruncated),
		Arc::new(RetrievalSize),
		Arc::new(QueryScope),
		Arc::new(MeshKeywordCount),
		Arc::new(MeshExplodedCount),
		Arc::new(MeshNonExplodedCount),
		Arc::new(qpp::WeightedInformationGain),
		Arc::new(qpp::WeightedExpansionGain),
	]
}
