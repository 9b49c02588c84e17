pub mod chain;
pub mod feature;
pub mod model;
pub mod quickrank;
pub mod selector;
pub mod space;
pub mod transform;

mod error;

pub use chain::{CandidateQuery, Lineage, TransformedQuery};
pub use error::{Error, Result};
pub use feature::{Feature, Features, LearntFeature};
pub use model::{Labeler, Model, ModelPaths, QueryChain};
pub use quickrank::QuickRankSelector;
pub use selector::Selector;
pub use space::{FeatureSpace, MeasurementValues, STRUCTURAL_FEATURES};
pub use transform::{
	ClauseType, Rewritten, TransformationContext, TransformationDescriptor, Transformer,
};
