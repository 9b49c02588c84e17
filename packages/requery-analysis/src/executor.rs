use std::{collections::BTreeMap, sync::Arc};

use serde_json::json;

use requery_query::PipelineQuery;
use requery_storage::{ByteStore, hash_cache_key};

use crate::{Measurement, Result, StatisticsSource};

const MEASUREMENT_CACHE_SCHEMA_VERSION: i32 = 2;

/// Runs measurements against a backend, memoizing each value in the statistics cache.
#[derive(Clone)]
pub struct MeasurementExecutor {
	cache: Arc<dyn ByteStore>,
}
impl MeasurementExecutor {
	pub fn new(cache: Arc<dyn ByteStore>) -> Self {
		Self { cache }
	}

	/// Values in the order of `measurements`.
	pub async fn execute(
		&self,
		query: &PipelineQuery,
		source: &dyn StatisticsSource,
		measurements: &[Arc<dyn Measurement>],
	) -> Result<Vec<f64>> {
		let mut values = Vec::with_capacity(measurements.len());

		for measurement in measurements {
			values.push(self.execute_one(query, source, measurement.as_ref()).await?);
		}

		Ok(values)
	}

	pub async fn execute_one(
		&self,
		query: &PipelineQuery,
		source: &dyn StatisticsSource,
		measurement: &dyn Measurement,
	) -> Result<f64> {
		let key = build_measurement_cache_key(
			measurement.name(),
			&query.query.to_string(),
			source.parameters().iter().map(|(name, value)| (name.as_str(), *value)),
		)?;

		if let Some(raw) = self.cache.get(&key).await? {
			match decode_value(&raw) {
				Some(value) => return Ok(value),
				None => tracing::warn!(
					measurement = measurement.name(),
					key = %requery_storage::cache_key_prefix(&key),
					"Ignoring malformed measurement cache entry."
				),
			}
		}

		let value = measurement.execute(query, source).await?;

		self.cache.put(&key, &value.to_le_bytes()).await?;

		Ok(value)
	}
}

/// Backend parameters are part of the key, so a run with another `k` never reuses stale gains.
pub fn build_measurement_cache_key<'a>(
	measurement: &str,
	query: &str,
	parameters: impl IntoIterator<Item = (&'a str, f64)>,
) -> Result<String> {
	let parameters: BTreeMap<&str, f64> = parameters.into_iter().collect();
	let payload = json!({
		"kind": "measurement",
		"schema_version": MEASUREMENT_CACHE_SCHEMA_VERSION,
		"measurement": measurement,
		"query": query,
		"parameters": parameters,
	});

	Ok(hash_cache_key(&payload)?)
}

fn decode_value(raw: &[u8]) -> Option<f64> {
	let bytes: [u8; 8] = raw.try_into().ok()?;

	Some(f64::from_le_bytes(bytes))
}
