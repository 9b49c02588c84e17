//! Post-retrieval query performance predictors based on score gain.
//!
//! Both estimators sum over every returned result and use `k` only to scale the total. The
//! published formulations restrict the sum to the top-k window; this behavior is kept as the
//! default until it has been verified against the reference runs.

use requery_query::{PipelineQuery, analysis};

use crate::{BoxFuture, Measurement, Result, SearchResult, StatisticsSource};

/// Weighted information gain: gain of each result over the lowest-ranked one.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedInformationGain;

/// Weighted expansion gain: gain of each result over the mean of the bottom `k` results, a
/// proxy for the topic drift naive expansion would introduce.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedExpansionGain;

impl Measurement for WeightedInformationGain {
	fn name(&self) -> &'static str {
		"wig"
	}

	fn execute<'a>(
		&'a self,
		query: &'a PipelineQuery,
		source: &'a dyn StatisticsSource,
	) -> BoxFuture<'a, Result<f64>> {
		Box::pin(async move {
			let results = source.execute(query, &source.search_options()).await?;
			let k = source.parameter("k").unwrap_or(0.0);

			Ok(wig(&results, analysis::query_terms(&query.query).len(), k))
		})
	}
}

impl Measurement for WeightedExpansionGain {
	fn name(&self) -> &'static str {
		"weg"
	}

	fn execute<'a>(
		&'a self,
		query: &'a PipelineQuery,
		source: &'a dyn StatisticsSource,
	) -> BoxFuture<'a, Result<f64>> {
		Box::pin(async move {
			let results = source.execute(query, &source.search_options()).await?;
			let k = source.parameter("k").unwrap_or(0.0);

			Ok(weg(&results, analysis::query_terms(&query.query).len(), k))
		})
	}
}

/// WIG over an already retrieved list ordered by descending score.
pub fn wig(results: &[SearchResult], query_length: usize, k: f64) -> f64 {
	let Some(last) = results.last() else {
		return 0.0;
	};

	gain(results, query_length, last.score) / window(k, results.len())
}

/// WEG over an already retrieved list ordered by descending score.
pub fn weg(results: &[SearchResult], query_length: usize, k: f64) -> f64 {
	if results.is_empty() {
		return 0.0;
	}

	let k = window(k, results.len());
	let tail = &results[results.len() - k as usize..];
	let baseline = tail.iter().map(|result| result.score).sum::<f64>() / tail.len() as f64;

	gain(results, query_length, baseline) / k
}

/// `k` clamped to `[1, results]`.
fn window(k: f64, results: usize) -> f64 {
	let k = if k.is_finite() { k } else { 0.0 };

	k.min(results as f64).max(1.0)
}

fn gain(results: &[SearchResult], query_length: usize, baseline: f64) -> f64 {
	// A backend may match documents for a query without keyword leaves.
	let norm = (query_length.max(1) as f64).sqrt();

	results.iter().map(|result| (result.score - baseline) / norm).sum()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn results(scores: &[f64]) -> Vec<SearchResult> {
		scores
			.iter()
			.enumerate()
			.map(|(i, score)| SearchResult {
				topic: "1".to_string(),
				doc_id: format!("d{i}"),
				rank: i + 1,
				score: *score,
				run_name: "test".to_string(),
			})
			.collect()
	}

	#[test]
	fn wig_scales_full_sum_by_window() {
		let value = wig(&results(&[5.0, 4.0, 1.0]), 2, 2.0);

		assert!((value - 2.4749).abs() < 1e-3, "Unexpected WIG: {value}");
	}

	#[test]
	fn weg_uses_tail_mean_baseline() {
		let value = weg(&results(&[5.0, 4.0, 1.0]), 2, 2.0);

		assert!((value - 0.8839).abs() < 1e-3, "Unexpected WEG: {value}");
	}

	#[test]
	fn window_clamps_to_result_count() {
		assert_eq!(window(0.0, 3), 1.0);
		assert_eq!(window(10.0, 3), 3.0);
		assert_eq!(window(f64::NAN, 3), 1.0);
		assert_eq!(window(2.5, 3), 2.5);
	}

	#[test]
	fn empty_results_are_zero() {
		assert_eq!(wig(&[], 2, 2.0), 0.0);
		assert_eq!(weg(&[], 2, 2.0), 0.0);
	}
}
