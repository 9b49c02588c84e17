//! Sparse feature vectors and the LIBSVM family of training-record formats.

use std::{fmt::Write as _, io::Write};

use crate::{Error, Result};

/// A single feature column. Identity is the id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feature {
	pub id: u32,
	pub score: f64,
}
impl Feature {
	pub fn new(id: u32, score: f64) -> Self {
		Self { id, score }
	}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Features(Vec<Feature>);
impl Features {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, feature: Feature) {
		self.0.push(feature);
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Feature> {
		self.0.iter()
	}

	/// Sorted ascending by id with duplicates removed. The first occurrence of an id in
	/// insertion order wins.
	pub fn normalized(&self) -> Vec<Feature> {
		let mut features = self.0.clone();

		// Stable, so equal ids keep insertion order and dedup retains the earliest.
		features.sort_by_key(|feature| feature.id);
		features.dedup_by_key(|feature| feature.id);

		features
	}

	/// `id:score` pairs of the normalized vector, ids shifted by `offset`.
	pub fn pairs(&self, offset: u32) -> String {
		let mut out = String::new();

		for (i, feature) in self.normalized().iter().enumerate() {
			if i > 0 {
				out.push(' ');
			}

			let _ = write!(out, "{}:{}", feature.id + offset, feature.score);
		}

		out
	}

	pub fn average_score(&self) -> f64 {
		if self.0.is_empty() {
			return 0.0;
		}

		let total: f64 = self.0.iter().map(|feature| feature.score).sum();

		if total == 0.0 {
			return 0.0;
		}

		total / self.0.len() as f64
	}
}
impl Extend<Feature> for Features {
	fn extend<T: IntoIterator<Item = Feature>>(&mut self, iter: T) {
		self.0.extend(iter);
	}
}
impl FromIterator<Feature> for Features {
	fn from_iter<T: IntoIterator<Item = Feature>>(iter: T) -> Self {
		Self(iter.into_iter().collect())
	}
}
impl From<Vec<Feature>> for Features {
	fn from(features: Vec<Feature>) -> Self {
		Self(features)
	}
}

/// A feature vector labelled with target scores, used for training records only.
#[derive(Debug, Clone, PartialEq)]
pub struct LearntFeature {
	features: Features,
	scores: Vec<f64>,
	topic: String,
	comment: String,
}
impl LearntFeature {
	/// LIBSVM^rank ids are one-based, so they are written shifted by one.
	pub const RANK_ID_OFFSET: u32 = 1;

	pub fn new(
		features: Features,
		scores: Vec<f64>,
		topic: impl Into<String>,
		comment: impl Into<String>,
	) -> Result<Self> {
		if scores.is_empty() {
			return Err(Error::Record { message: "At least one target score is required.".to_string() });
		}

		let topic = topic.into();

		// The qid token ends at whitespace and the comment starts at the first `#`.
		if topic.chars().any(|c| c == '#' || c.is_whitespace()) {
			return Err(Error::Record {
				message: format!("Topic {topic:?} cannot be written as a qid."),
			});
		}

		Ok(Self { features, scores, topic, comment: comment.into() })
	}

	pub fn features(&self) -> &Features {
		&self.features
	}

	pub fn scores(&self) -> &[f64] {
		&self.scores
	}

	pub fn label(&self) -> f64 {
		self.scores[0]
	}

	pub fn topic(&self) -> &str {
		&self.topic
	}

	pub fn comment(&self) -> &str {
		&self.comment
	}

	/// `<label> id:score ... [# comment]`
	pub fn libsvm_line(&self) -> String {
		let mut line = join_fields(&self.label().to_string(), &self.features.pairs(0));

		if !self.comment.is_empty() {
			let _ = write!(line, " # {}", self.comment);
		}

		line
	}

	/// `<label> qid:<topic> id:score ... # <comment>`
	pub fn libsvm_rank_line(&self) -> String {
		let head = format!("{} qid:{}", self.label(), self.topic);
		let mut line = join_fields(&head, &self.features.pairs(Self::RANK_ID_OFFSET));

		let _ = write!(line, " # {}", self.comment);

		line
	}

	pub fn write_libsvm(&self, writer: &mut dyn Write) -> std::io::Result<()> {
		writeln!(writer, "{}", self.libsvm_line())
	}

	pub fn write_libsvm_rank(&self, writer: &mut dyn Write) -> std::io::Result<()> {
		writeln!(writer, "{}", self.libsvm_rank_line())
	}

	/// Parses a LIBSVM^rank line, undoing the id offset applied when writing.
	pub fn parse_libsvm_rank(line: &str) -> Result<Self> {
		let (body, comment) = match line.split_once('#') {
			Some((body, comment)) => (body, comment.trim()),
			None => (line, ""),
		};
		let mut tokens = body.split_whitespace();
		let label = tokens
			.next()
			.ok_or_else(|| Error::Record { message: "Missing label.".to_string() })?;
		let label = label
			.parse::<f64>()
			.map_err(|_| Error::Record { message: format!("Invalid label {label:?}.") })?;
		let topic = tokens
			.next()
			.and_then(|token| token.strip_prefix("qid:"))
			.ok_or_else(|| Error::Record { message: "Missing qid.".to_string() })?;
		let mut features = Features::new();

		for token in tokens {
			let parsed = token.split_once(':').and_then(|(id, score)| {
				Some((id.parse::<u32>().ok()?, score.parse::<f64>().ok()?))
			});
			let Some((id, score)) = parsed else {
				return Err(Error::Record { message: format!("Invalid feature {token:?}.") });
			};
			let Some(id) = id.checked_sub(Self::RANK_ID_OFFSET) else {
				return Err(Error::Record { message: format!("Feature id {id} is below the offset.") });
			};

			features.push(Feature::new(id, score));
		}

		Self::new(features, vec![label], topic, comment)
	}
}

fn join_fields(head: &str, pairs: &str) -> String {
	if pairs.is_empty() { head.to_string() } else { format!("{head} {pairs}") }
}
