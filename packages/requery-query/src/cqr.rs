//! Common query representation: Boolean operator nodes over keyword leaves.
//!
//! The `Display` form is canonical. Two trees that render identically are the same query for
//! fixed-point detection and for cache keys.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
	Keyword(Keyword),
	Boolean(BooleanQuery),
}
impl Query {
	pub fn as_keyword(&self) -> Option<&Keyword> {
		match self {
			Self::Keyword(keyword) => Some(keyword),
			Self::Boolean(_) => None,
		}
	}

	pub fn as_boolean(&self) -> Option<&BooleanQuery> {
		match self {
			Self::Boolean(boolean) => Some(boolean),
			Self::Keyword(_) => None,
		}
	}

	pub fn map_keywords(self, f: &impl Fn(Keyword) -> Keyword) -> Self {
		match self {
			Self::Keyword(keyword) => Self::Keyword(f(keyword)),
			Self::Boolean(boolean) => Self::Boolean(BooleanQuery {
				operator: boolean.operator,
				children: boolean.children.into_iter().map(|child| child.map_keywords(f)).collect(),
			}),
		}
	}
}
impl fmt::Display for Query {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Keyword(keyword) => fmt::Display::fmt(keyword, f),
			Self::Boolean(boolean) => fmt::Display::fmt(boolean, f),
		}
	}
}
impl From<Keyword> for Query {
	fn from(keyword: Keyword) -> Self {
		Self::Keyword(keyword)
	}
}
impl From<BooleanQuery> for Query {
	fn from(boolean: BooleanQuery) -> Self {
		Self::Boolean(boolean)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
	pub query_string: String,
	#[serde(default)]
	pub fields: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exploded: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub truncated: Option<bool>,
}
impl Keyword {
	pub const MESH_FIELD: &'static str = "mesh_headings";

	pub fn new(query_string: impl Into<String>) -> Self {
		Self { query_string: query_string.into(), fields: Vec::new(), exploded: None, truncated: None }
	}

	pub fn with_fields<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.fields = fields.into_iter().map(Into::into).collect();

		self
	}

	pub fn exploded(mut self, exploded: bool) -> Self {
		self.exploded = Some(exploded);

		self
	}

	pub fn truncated(mut self, truncated: bool) -> Self {
		self.truncated = Some(truncated);

		self
	}

	pub fn is_mesh(&self) -> bool {
		self.fields.iter().any(|field| field == Self::MESH_FIELD)
	}
}
impl fmt::Display for Keyword {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:?}[{}]", self.query_string, self.fields.join(","))?;

		let flags = [("exploded", self.exploded), ("truncated", self.truncated)]
			.into_iter()
			.filter_map(|(name, value)| value.map(|value| format!("{name}={value}")))
			.collect::<Vec<_>>();

		if !flags.is_empty() {
			write!(f, "{{{}}}", flags.join(";"))?;
		}

		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanQuery {
	pub operator: Operator,
	#[serde(default)]
	pub children: Vec<Query>,
}
impl BooleanQuery {
	pub fn new(operator: Operator, children: Vec<Query>) -> Self {
		Self { operator, children }
	}
}
impl fmt::Display for BooleanQuery {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}(", self.operator)?;

		for (i, child) in self.children.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}

			fmt::Display::fmt(child, f)?;
		}

		f.write_str(")")
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operator {
	Or,
	And,
	Not,
	/// Proximity operators such as `adj`, `adj3`.
	Adj(Option<u32>),
	Other(String),
}
impl Operator {
	pub fn is_adjacency(&self) -> bool {
		matches!(self, Self::Adj(_))
	}
}
impl fmt::Display for Operator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Or => f.write_str("or"),
			Self::And => f.write_str("and"),
			Self::Not => f.write_str("not"),
			Self::Adj(None) => f.write_str("adj"),
			Self::Adj(Some(distance)) => write!(f, "adj{distance}"),
			Self::Other(name) => f.write_str(name),
		}
	}
}
impl FromStr for Operator {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		let trimmed = raw.trim();

		if trimmed.is_empty() {
			return Err(Error::Validation { message: "Operator must be non-empty.".to_string() });
		}

		let lower = trimmed.to_ascii_lowercase();
		let operator = match lower.as_str() {
			"or" => Self::Or,
			"and" => Self::And,
			"not" => Self::Not,
			"adj" => Self::Adj(None),
			_ => match lower.strip_prefix("adj").map(str::parse::<u32>) {
				Some(Ok(distance)) => Self::Adj(Some(distance)),
				_ => Self::Other(trimmed.to_string()),
			},
		};

		Ok(operator)
	}
}
impl TryFrom<String> for Operator {
	type Error = Error;

	fn try_from(raw: String) -> Result<Self, Self::Error> {
		raw.parse()
	}
}
impl From<Operator> for String {
	fn from(operator: Operator) -> Self {
		operator.to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_operator_family() {
		assert_eq!("OR".parse::<Operator>().expect("Failed to parse."), Operator::Or);
		assert_eq!("adj".parse::<Operator>().expect("Failed to parse."), Operator::Adj(None));
		assert_eq!("ADJ3".parse::<Operator>().expect("Failed to parse."), Operator::Adj(Some(3)));
		assert_eq!(
			"near".parse::<Operator>().expect("Failed to parse."),
			Operator::Other("near".to_string())
		);
		assert!("  ".parse::<Operator>().is_err());
	}

	#[test]
	fn display_distinguishes_keyword_flags() {
		let plain = Query::from(Keyword::new("asthma").with_fields(["title"]));
		let exploded = Query::from(Keyword::new("asthma").with_fields(["title"]).exploded(true));

		assert_eq!(plain.to_string(), "\"asthma\"[title]");
		assert_eq!(exploded.to_string(), "\"asthma\"[title]{exploded=true}");
	}

	#[test]
	fn display_renders_nested_boolean() {
		let query = Query::from(BooleanQuery::new(
			Operator::And,
			vec![
				Keyword::new("heart").into(),
				BooleanQuery::new(
					Operator::Adj(Some(2)),
					vec![Keyword::new("attack").into(), Keyword::new("failure").into()],
				)
				.into(),
			],
		));

		assert_eq!(query.to_string(), "and(\"heart\"[], adj2(\"attack\"[], \"failure\"[]))");
	}
}
