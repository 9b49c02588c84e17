use requery_analysis::ResultList;
use requery_query::Query;

use crate::Error;

/// One unit of pipeline output. `Done` is sent exactly once, after every producer finished.
#[derive(Debug)]
pub enum PipelineResult {
	Error { topic: Option<String>, error: Error },
	/// One formatted document per measurement formatter.
	Measurement(Vec<String>),
	TrecResult { topic: String, results: ResultList },
	/// The finalized query of a topic.
	Transformation { name: String, topic: String, query: Query },
	/// One formatted document per evaluation formatter.
	Evaluation(Vec<String>),
	Done,
}
impl PipelineResult {
	pub fn is_done(&self) -> bool {
		matches!(self, Self::Done)
	}
}
