use std::collections::BTreeSet;

use crate::{BooleanQuery, Keyword, Query};

/// Distinct keyword surface forms, in order of first appearance.
pub fn query_terms(query: &Query) -> Vec<String> {
	let mut seen = BTreeSet::new();

	keywords(query)
		.into_iter()
		.filter(|keyword| seen.insert(keyword.query_string.as_str()))
		.map(|keyword| keyword.query_string.clone())
		.collect()
}

pub fn keywords(query: &Query) -> Vec<&Keyword> {
	let mut out = Vec::new();

	collect_keywords(query, &mut out);

	out
}

/// Every Boolean sub-clause, the root included, in pre-order.
pub fn boolean_queries(query: &Query) -> Vec<&BooleanQuery> {
	let mut out = Vec::new();

	collect_booleans(query, &mut out);

	out
}

pub fn fields(query: &Query) -> BTreeSet<&str> {
	keywords(query)
		.into_iter()
		.flat_map(|keyword| keyword.fields.iter().map(String::as_str))
		.collect()
}

pub fn depth(query: &Query) -> usize {
	match query {
		Query::Keyword(_) => 1,
		Query::Boolean(boolean) => 1 + boolean.children.iter().map(depth).max().unwrap_or(0),
	}
}

fn collect_keywords<'a>(query: &'a Query, out: &mut Vec<&'a Keyword>) {
	match query {
		Query::Keyword(keyword) => out.push(keyword),
		Query::Boolean(boolean) =>
			for child in &boolean.children {
				collect_keywords(child, out);
			},
	}
}

fn collect_booleans<'a>(query: &'a Query, out: &mut Vec<&'a BooleanQuery>) {
	if let Query::Boolean(boolean) = query {
		out.push(boolean);

		for child in &boolean.children {
			collect_booleans(child, out);
		}
	}
}
