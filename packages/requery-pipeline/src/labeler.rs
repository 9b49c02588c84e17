use std::sync::Arc;

use requery_analysis::{BoxFuture, StatisticsSource};
use requery_learning::{Labeler, Result};
use requery_query::PipelineQuery;

use crate::{
	eval::{Evaluator, Qrels},
	tree::{self, DocumentCache},
};

/// Labels a candidate by evaluating it through the logical tree and scoring the ranked list.
pub struct EvaluationLabeler {
	source: Arc<dyn StatisticsSource>,
	cache: DocumentCache,
	qrels: Arc<Qrels>,
	evaluator: Arc<dyn Evaluator>,
	run_name: String,
}
impl EvaluationLabeler {
	pub fn new(
		source: Arc<dyn StatisticsSource>,
		cache: DocumentCache,
		qrels: Arc<Qrels>,
		evaluator: Arc<dyn Evaluator>,
	) -> Self {
		Self { source, cache, qrels, evaluator, run_name: "label".to_string() }
	}
}
impl Labeler for EvaluationLabeler {
	fn label<'a>(&'a self, query: &'a PipelineQuery) -> BoxFuture<'a, Result<f64>> {
		Box::pin(async move {
			let documents = tree::evaluate(query, self.source.as_ref(), &self.cache).await?;
			let results = documents.results(&query.topic, &self.run_name);

			Ok(self.evaluator.score(&results, &self.qrels, &query.topic))
		})
	}
}
