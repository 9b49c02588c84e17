use std::io::Write;

use tokio_util::sync::CancellationToken;

use requery_analysis::BoxFuture;

use crate::{CandidateQuery, LearntFeature, Result};

/// Chooses the next query of a search thread.
///
/// Selectors are values: progress is carried by the selector returned from
/// [`Selector::select`], never by mutating the receiver, so a failed step leaves the caller's
/// selector as it was.
pub trait Selector
where
	Self: Sized + Send + Sync,
{
	/// Picks one of `candidates`, or returns `current` when nothing improves on it.
	fn select<'a>(
		&'a self,
		current: &'a CandidateQuery,
		candidates: &'a [CandidateQuery],
		cancel: &'a CancellationToken,
	) -> BoxFuture<'a, Result<(CandidateQuery, Self)>>;

	/// Fits the selector offline and returns the serialized model, if the implementation
	/// produces one.
	fn train<'a>(
		&'a self,
		examples: &'a [LearntFeature],
		cancel: &'a CancellationToken,
	) -> BoxFuture<'a, Result<Vec<u8>>>;

	/// Writes one training example in this selector's record format.
	fn output(&self, example: &LearntFeature, sink: &mut dyn Write) -> Result<()>;

	fn stopping_criteria(&self) -> bool;
}
