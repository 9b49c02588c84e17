//! Renderers for the measurement matrix and per-topic evaluation scores.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::{Error, Result};

/// Per-topic evaluation scores, keyed by topic then evaluator name.
pub type EvaluationTable = BTreeMap<String, BTreeMap<String, f64>>;

pub trait MeasurementFormatter
where
	Self: Send + Sync,
{
	/// `data[m][q]` is measurement `headers[m]` of query `topics[q]`.
	fn format(&self, topics: &[String], headers: &[String], data: &[Vec<f64>]) -> Result<String>;
}

pub trait EvaluationFormatter
where
	Self: Send + Sync,
{
	fn format(&self, evaluations: &EvaluationTable) -> Result<String>;
}

/// `{"<topic>": {"<measurement>": value}}`, pretty printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMeasurementFormatter;
impl MeasurementFormatter for JsonMeasurementFormatter {
	fn format(&self, topics: &[String], headers: &[String], data: &[Vec<f64>]) -> Result<String> {
		let mut out = Map::new();

		for row in data {
			if row.len() != topics.len() {
				return Err(Error::MeasurementShape { topics: topics.len(), values: row.len() });
			}
		}

		for (q, topic) in topics.iter().enumerate() {
			let values: Map<String, Value> = headers
				.iter()
				.zip(data)
				.map(|(header, row)| (header.clone(), json!(row[q])))
				.collect();

			out.insert(topic.clone(), Value::Object(values));
		}

		Ok(serde_json::to_string_pretty(&Value::Object(out))?)
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEvaluationFormatter;
impl EvaluationFormatter for JsonEvaluationFormatter {
	fn format(&self, evaluations: &EvaluationTable) -> Result<String> {
		Ok(serde_json::to_string_pretty(evaluations)?)
	}
}
