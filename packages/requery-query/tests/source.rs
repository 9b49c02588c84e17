use std::fs;

use requery_query::{Error, JsonQueriesSource, Operator, QueriesSource, Query};

const SINGLE: &str = r#"{
	"topic": "CD008122",
	"query": {
		"type": "boolean",
		"operator": "OR",
		"children": [
			{ "type": "keyword", "query_string": "asthma", "fields": ["title"] },
			{ "type": "keyword", "query_string": "Asthma", "fields": ["mesh_headings"], "exploded": true }
		]
	}
}"#;

const MANY: &str = r#"[
	{ "topic": "CD007394", "name": "clef", "query": { "type": "keyword", "query_string": "stroke" } },
	{ "topic": "CD007427", "query": { "type": "keyword", "query_string": "sepsis" } }
]"#;

#[test]
fn loads_directory_in_path_order() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");

	fs::write(dir.path().join("b.json"), SINGLE).expect("Failed to write query.");
	fs::write(dir.path().join("a.json"), MANY).expect("Failed to write query.");
	fs::write(dir.path().join("notes.txt"), "ignored").expect("Failed to write note.");

	let queries = JsonQueriesSource.load(dir.path()).expect("Failed to load queries.");
	let topics: Vec<_> = queries.iter().map(|query| query.topic.as_str()).collect();

	assert_eq!(topics, vec!["CD007394", "CD007427", "CD008122"]);
	assert_eq!(queries[0].name, "clef");
	assert_eq!(queries[1].name, "CD007427");

	let Query::Boolean(boolean) = &queries[2].query else {
		panic!("Expected a Boolean query.");
	};

	assert_eq!(boolean.operator, Operator::Or);
	assert_eq!(boolean.children.len(), 2);
	assert_eq!(
		boolean.children[1].as_keyword().and_then(|keyword| keyword.exploded),
		Some(true)
	);
}

#[test]
fn rejects_blank_topic() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let path = dir.path().join("q.json");

	fs::write(&path, r#"{ "topic": " ", "query": { "type": "keyword", "query_string": "x" } }"#)
		.expect("Failed to write query.");

	assert!(matches!(JsonQueriesSource.load(&path), Err(Error::Validation { .. })));
}

#[test]
fn reports_parse_failures_with_path() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let path = dir.path().join("broken.json");

	fs::write(&path, "{ not json").expect("Failed to write query.");

	match JsonQueriesSource.load(&path) {
		Err(Error::Parse { path: reported, .. }) => assert_eq!(reported, path),
		other => panic!("Expected a parse error, got {other:?}."),
	}
}
