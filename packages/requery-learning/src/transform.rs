use requery_query::Query;

use crate::Features;

/// Transformation codes of the well-known rule families. Each [`Transformer`] reports its own
/// code, so new rules need no central registration.
pub mod codes {
	/// The untransformed query at the head of a chain.
	pub const ROOT: i32 = -1;
	pub const LOGICAL_OPERATOR_REPLACEMENT: i32 = 1;
	pub const ADJACENCY_RANGE: i32 = 2;
	pub const MESH_EXPLOSION: i32 = 3;
	pub const FIELD_RESTRICTIONS: i32 = 4;
	pub const ADJACENCY_REPLACEMENT: i32 = 5;
	pub const CLAUSE_REMOVAL: i32 = 6;
	pub const CUI2VEC_EXPANSION: i32 = 7;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseType {
	Keyword,
	Boolean,
}
impl ClauseType {
	pub fn of(query: &Query) -> Self {
		match query {
			Query::Keyword(_) => Self::Keyword,
			Query::Boolean(_) => Self::Boolean,
		}
	}

	pub fn code(self) -> f64 {
		match self {
			Self::Keyword => 0.0,
			Self::Boolean => 1.0,
		}
	}
}

/// Where in the tree a transformation was applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformationContext {
	pub depth: usize,
	pub clause_type: ClauseType,
	pub children_count: usize,
}
impl TransformationContext {
	pub fn new(depth: usize, clause: &Query) -> Self {
		let children_count = match clause {
			Query::Keyword(_) => 0,
			Query::Boolean(boolean) => boolean.children.len(),
		};

		Self { depth, clause_type: ClauseType::of(clause), children_count }
	}
}

/// The transformation that produced a candidate: its code and rule-specific descriptor
/// features (adjacency distance, restriction type, and so on).
#[derive(Debug, Clone, PartialEq)]
pub struct TransformationDescriptor {
	pub code: i32,
	pub features: Features,
}

/// One alternative proposed by a transformer.
#[derive(Debug, Clone)]
pub struct Rewritten {
	/// The whole query after the rewrite.
	pub query: Query,
	/// The sub-clause that was rewritten.
	pub clause: Query,
	pub context: TransformationContext,
	pub descriptors: Features,
}

pub trait Transformer
where
	Self: Send + Sync,
{
	fn name(&self) -> &'static str;

	/// Stable numeric code written into the transformation-type and chain features.
	fn code(&self) -> i32;

	fn apply(&self, query: &Query) -> Vec<Rewritten>;

	fn descriptor(&self, rewritten: &Rewritten) -> TransformationDescriptor {
		TransformationDescriptor { code: self.code(), features: rewritten.descriptors.clone() }
	}
}
