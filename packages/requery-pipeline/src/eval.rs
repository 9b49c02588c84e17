//! Relevance judgments and effectiveness measures over ranked lists.

use std::{
	collections::{BTreeMap, HashMap},
	path::Path,
};

use requery_analysis::ResultList;

use crate::{Error, Result};

/// TREC relevance judgments: `topic iteration document relevance` per line.
#[derive(Debug, Clone, Default)]
pub struct Qrels {
	topics: HashMap<String, HashMap<String, i32>>,
}
impl Qrels {
	pub fn load(path: &Path) -> Result<Self> {
		let raw = std::fs::read_to_string(path)
			.map_err(|err| Error::Read { path: path.to_path_buf(), source: err })?;

		Self::parse(path, &raw)
	}

	pub fn parse(path: &Path, raw: &str) -> Result<Self> {
		let mut qrels = Self::default();

		for (i, line) in raw.lines().enumerate() {
			let fields: Vec<&str> = line.split_whitespace().collect();

			if fields.is_empty() {
				continue;
			}

			let [topic, _iteration, document, relevance] = fields[..] else {
				return Err(Error::Qrels {
					path: path.to_path_buf(),
					line: i + 1,
					message: format!("Expected 4 fields, found {}.", fields.len()),
				});
			};
			let relevance = relevance.parse::<i32>().map_err(|_| Error::Qrels {
				path: path.to_path_buf(),
				line: i + 1,
				message: format!("Invalid relevance {relevance:?}."),
			})?;

			qrels.insert(topic, document, relevance);
		}

		Ok(qrels)
	}

	pub fn insert(&mut self, topic: &str, document: &str, relevance: i32) {
		self.topics
			.entry(topic.to_string())
			.or_default()
			.insert(document.to_string(), relevance);
	}

	pub fn is_relevant(&self, topic: &str, document: &str) -> bool {
		self.topics
			.get(topic)
			.and_then(|judged| judged.get(document))
			.is_some_and(|relevance| *relevance > 0)
	}

	pub fn relevant_count(&self, topic: &str) -> usize {
		self.topics
			.get(topic)
			.map(|judged| judged.values().filter(|relevance| **relevance > 0).count())
			.unwrap_or(0)
	}
}

pub trait Evaluator
where
	Self: Send + Sync,
{
	fn name(&self) -> &'static str;

	fn score(&self, results: &ResultList, qrels: &Qrels, topic: &str) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NumRetrieved;
impl Evaluator for NumRetrieved {
	fn name(&self) -> &'static str {
		"num_retrieved"
	}

	fn score(&self, results: &ResultList, _qrels: &Qrels, _topic: &str) -> f64 {
		results.len() as f64
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NumRelevantRetrieved;
impl Evaluator for NumRelevantRetrieved {
	fn name(&self) -> &'static str {
		"num_rel_ret"
	}

	fn score(&self, results: &ResultList, qrels: &Qrels, topic: &str) -> f64 {
		relevant_retrieved(results, qrels, topic) as f64
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Precision;
impl Evaluator for Precision {
	fn name(&self) -> &'static str {
		"precision"
	}

	fn score(&self, results: &ResultList, qrels: &Qrels, topic: &str) -> f64 {
		if results.is_empty() {
			return 0.0;
		}

		relevant_retrieved(results, qrels, topic) as f64 / results.len() as f64
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Recall;
impl Evaluator for Recall {
	fn name(&self) -> &'static str {
		"recall"
	}

	fn score(&self, results: &ResultList, qrels: &Qrels, topic: &str) -> f64 {
		let relevant = qrels.relevant_count(topic);

		if relevant == 0 {
			return 0.0;
		}

		relevant_retrieved(results, qrels, topic) as f64 / relevant as f64
	}
}

/// Scores `results` with every evaluator, keyed by evaluator name.
pub fn evaluate(
	evaluators: &[std::sync::Arc<dyn Evaluator>],
	results: &ResultList,
	qrels: &Qrels,
	topic: &str,
) -> BTreeMap<String, f64> {
	evaluators
		.iter()
		.map(|evaluator| (evaluator.name().to_string(), evaluator.score(results, qrels, topic)))
		.collect()
}

fn relevant_retrieved(results: &ResultList, qrels: &Qrels, topic: &str) -> usize {
	results.iter().filter(|result| qrels.is_relevant(topic, &result.doc_id)).count()
}
