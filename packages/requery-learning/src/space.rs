//! The feature layout shared by every encoded candidate.
//!
//! Ids `[1, K)` are structural, `[K, K+M)` hold the registered measurements, `[K+M, K+2M)`
//! their deltas across a transformation, and `[K+2M, ..)` one column per ancestor in the
//! candidate's chain. The layout is fixed once the space is built.

use std::{collections::HashMap, sync::Arc};

use requery_analysis::{Measurement, MeasurementExecutor, StatisticsSource, measurement};
use requery_query::{BooleanQuery, Keyword, Operator, PipelineQuery, Query};

use crate::{
	Error, Feature, Features, Result,
	transform::{TransformationContext, TransformationDescriptor},
};

/// Structural feature ids. Id 0 is never assigned.
pub mod ids {
	pub const DEPTH: u32 = 1;
	/// Keyword or Boolean clause, not the operator.
	pub const CLAUSE_TYPE: u32 = 2;
	pub const CHILDREN_COUNT: u32 = 3;
	pub const TRANSFORMATION_TYPE: u32 = 4;
	pub const LOGICAL_REPLACEMENT_TYPE: u32 = 5;
	pub const ADJACENCY_REPLACEMENT: u32 = 6;
	pub const ADJACENCY_DISTANCE: u32 = 7;
	pub const MESH_DEPTH: u32 = 8;
	pub const MESH_PARENT: u32 = 9;
	pub const RESTRICTION_TYPE: u32 = 10;
	pub const CLAUSE_REMOVAL: u32 = 11;
	pub const CUI2VEC_EXPANSION: u32 = 12;
	pub const CUI2VEC_NUM_EXPANSIONS: u32 = 13;
	pub const IS_EXPLODED: u32 = 14;
	pub const IS_TRUNCATED: u32 = 15;
	pub const NUM_FIELDS: u32 = 16;
	pub const OPERATOR_TYPE: u32 = 17;
}

/// K: the first id after the structural block.
pub const STRUCTURAL_FEATURES: u32 = 18;

/// Measurement values keyed by their raw feature id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementValues(HashMap<u32, f64>);
impl MeasurementValues {
	pub fn get(&self, id: u32) -> Option<f64> {
		self.0.get(&id).copied()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	fn sorted(&self) -> Vec<(u32, f64)> {
		let mut values: Vec<_> = self.0.iter().map(|(id, value)| (*id, *value)).collect();

		values.sort_by_key(|(id, _)| *id);

		values
	}
}
impl FromIterator<(u32, f64)> for MeasurementValues {
	fn from_iter<T: IntoIterator<Item = (u32, f64)>>(iter: T) -> Self {
		Self(iter.into_iter().collect())
	}
}

#[derive(Debug, Clone)]
pub struct FeatureSpace {
	names: Vec<String>,
	index: HashMap<String, u32>,
}
impl FeatureSpace {
	pub fn new<I, S>(names: I) -> Result<Self>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut space = Self { names: Vec::new(), index: HashMap::new() };

		for name in names {
			let name = name.into();
			let id = STRUCTURAL_FEATURES + space.names.len() as u32;

			if space.index.insert(name.clone(), id).is_some() {
				return Err(Error::DuplicateMeasurement { name });
			}

			space.names.push(name);
		}

		Ok(space)
	}

	/// The space over the built-in measurements, in their registration order.
	pub fn registered() -> Result<Self> {
		Self::new(measurement::registered().iter().map(|measurement| measurement.name()))
	}

	/// M: the number of registered measurements.
	pub fn measurement_count(&self) -> u32 {
		self.names.len() as u32
	}

	pub fn names(&self) -> &[String] {
		&self.names
	}

	pub fn measurement_id(&self, name: &str) -> Result<u32> {
		self.index
			.get(name)
			.copied()
			.ok_or_else(|| Error::UnregisteredMeasurement { name: name.to_string() })
	}

	pub fn delta_id(&self, measurement_id: u32) -> u32 {
		measurement_id + self.measurement_count()
	}

	pub fn chain_base(&self) -> u32 {
		STRUCTURAL_FEATURES + 2 * self.measurement_count()
	}

	/// The column of the ancestor at `position`, counted from the root.
	pub fn chain_id(&self, position: usize) -> u32 {
		self.chain_base() + position as u32
	}

	/// Runs `measurements` in order and keys each value by its raw feature id.
	pub async fn measure(
		&self,
		query: &PipelineQuery,
		source: &dyn StatisticsSource,
		executor: &MeasurementExecutor,
		measurements: &[Arc<dyn Measurement>],
	) -> Result<MeasurementValues> {
		// Resolve ids first so a misconfigured name fails before any backend call.
		let ids = measurements
			.iter()
			.map(|measurement| self.measurement_id(measurement.name()))
			.collect::<Result<Vec<_>>>()?;
		let values = executor.execute(query, source, measurements).await?;

		Ok(ids.into_iter().zip(values).collect())
	}

	/// Encodes one candidate.
	///
	/// `clause` is the sub-clause the transformation rewrote; `before` and `after` are the
	/// measurements of the whole query ahead of and after the transformation.
	pub fn encode(
		&self,
		clause: &Query,
		context: &TransformationContext,
		transformation: Option<&TransformationDescriptor>,
		before: &MeasurementValues,
		after: &MeasurementValues,
	) -> Features {
		let mut features = context_features(context);

		if let Some(transformation) = transformation {
			features.push(Feature::new(ids::TRANSFORMATION_TYPE, f64::from(transformation.code)));
			features.extend(transformation.features.iter().copied());
		}

		match clause {
			Query::Keyword(keyword) => features.extend(keyword_features(keyword).iter().copied()),
			Query::Boolean(boolean) => features.extend(boolean_features(boolean).iter().copied()),
		}

		features.extend(self.measurement_features(after).iter().copied());
		features.extend(self.delta_features(before, after).iter().copied());

		features
	}

	pub fn measurement_features(&self, values: &MeasurementValues) -> Features {
		values.sorted().into_iter().map(|(id, value)| Feature::new(id, value)).collect()
	}

	/// After minus before for every measurement taken after the transformation; zero when the
	/// measurement is missing from `before`.
	pub fn delta_features(&self, before: &MeasurementValues, after: &MeasurementValues) -> Features {
		after
			.sorted()
			.into_iter()
			.map(|(id, value)| {
				let delta = before.get(id).map(|prior| value - prior).unwrap_or(0.0);

				Feature::new(self.delta_id(id), delta)
			})
			.collect()
	}
}

pub fn context_features(context: &TransformationContext) -> Features {
	Features::from(vec![
		Feature::new(ids::DEPTH, context.depth as f64),
		Feature::new(ids::CLAUSE_TYPE, context.clause_type.code()),
		Feature::new(ids::CHILDREN_COUNT, context.children_count as f64),
	])
}

/// Explosion and truncation encode as 0 (n/a), 1 (false), 2 (true).
pub fn keyword_features(keyword: &Keyword) -> Features {
	Features::from(vec![
		Feature::new(ids::IS_EXPLODED, tri_state(keyword.exploded)),
		Feature::new(ids::IS_TRUNCATED, tri_state(keyword.truncated)),
		Feature::new(ids::NUM_FIELDS, keyword.fields.len() as f64),
	])
}

/// Operators encode as 0 (n/a), 1 (or), 2 (and), 3 (not), 4 (adjacency family).
pub fn boolean_features(boolean: &BooleanQuery) -> Features {
	let operator = match boolean.operator {
		Operator::Or => 1.0,
		Operator::And => 2.0,
		Operator::Not => 3.0,
		Operator::Adj(_) => 4.0,
		Operator::Other(_) => 0.0,
	};

	Features::from(vec![Feature::new(ids::OPERATOR_TYPE, operator)])
}

fn tri_state(flag: Option<bool>) -> f64 {
	match flag {
		None => 0.0,
		Some(false) => 1.0,
		Some(true) => 2.0,
	}
}
