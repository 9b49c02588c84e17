use requery_learning::{CandidateQuery, FeatureSpace, Features, TransformedQuery, transform::codes};
use requery_query::{Keyword, PipelineQuery, Query};

fn score(features: &Features, id: u32) -> Option<f64> {
	features.iter().find(|feature| feature.id == id).map(|feature| feature.score)
}

fn keyword(text: &str) -> Query {
	Keyword::new(text).into()
}

#[test]
fn appending_grows_the_chain_by_one() {
	let space = FeatureSpace::registered().expect("Space must build.");
	let root = CandidateQuery::root(&PipelineQuery::new("q", "7", keyword("a")));
	let first = CandidateQuery::new("7", keyword("b"), Features::new())
		.with_transformation(codes::CLAUSE_REMOVAL)
		.append(&root, &space);
	let second = CandidateQuery::new("7", keyword("c"), Features::new())
		.with_transformation(codes::MESH_EXPLOSION)
		.append(&first, &space);
	let third = CandidateQuery::new("7", keyword("d"), Features::new())
		.with_transformation(codes::ADJACENCY_RANGE)
		.append(&second, &space);

	assert_eq!(root.chain().len(), 0);
	assert_eq!(first.chain().len(), root.chain().len() + 1);
	assert_eq!(second.chain().len(), first.chain().len() + 1);
	assert_eq!(third.chain().len(), second.chain().len() + 1);
	assert_eq!(
		third.chain().iter().map(CandidateQuery::text).collect::<Vec<_>>(),
		vec!["\"a\"[]", "\"b\"[]", "\"c\"[]"]
	);
}

#[test]
fn chain_features_carry_ancestor_transformations() {
	let space = FeatureSpace::registered().expect("Space must build.");
	let base = space.chain_base();
	let root = CandidateQuery::root(&PipelineQuery::new("q", "7", keyword("a")));
	let first = CandidateQuery::new("7", keyword("b"), Features::new())
		.with_transformation(codes::CLAUSE_REMOVAL)
		.append(&root, &space);
	let second = CandidateQuery::new("7", keyword("c"), Features::new())
		.with_transformation(codes::MESH_EXPLOSION)
		.append(&first, &space);

	assert!(first.features.is_empty());
	assert_eq!(score(&second.features, base), Some(f64::from(codes::ROOT)));
	assert_eq!(score(&second.features, base + 1), Some(f64::from(codes::CLAUSE_REMOVAL)));
	assert_eq!(score(&second.features, base + 2), None);
}

#[test]
fn branches_from_one_parent_do_not_alias() {
	let space = FeatureSpace::registered().expect("Space must build.");
	let root = CandidateQuery::root(&PipelineQuery::new("q", "7", keyword("a")));
	let left = CandidateQuery::new("7", keyword("l"), Features::new()).append(&root, &space);
	let right = CandidateQuery::new("7", keyword("r"), Features::new()).append(&left, &space);
	let other = CandidateQuery::new("7", keyword("o"), Features::new()).append(&left, &space);

	assert_eq!(left.chain().len(), 1);
	assert_eq!(right.chain().last().map(CandidateQuery::text), Some("\"l\"[]".to_string()));
	assert_eq!(other.chain().last().map(CandidateQuery::text), Some("\"l\"[]".to_string()));
	assert!(!right.same_query(&other));
}

#[test]
fn transformed_query_append_is_pure() {
	let original = PipelineQuery::new("q", "7", keyword("a"));
	let start = TransformedQuery::new(original.clone());
	let next = start.append(original.with_query(keyword("b")));
	let fork = start.append(original.with_query(keyword("c")));

	assert_eq!(start.chain().len(), 0);
	assert_eq!(start.query().query.to_string(), "\"a\"[]");
	assert_eq!(next.chain().len(), 1);
	assert_eq!(next.chain().last().map(ToString::to_string), Some("\"a\"[]".to_string()));
	assert_eq!(next.query().query.to_string(), "\"b\"[]");
	assert_eq!(fork.query().query.to_string(), "\"c\"[]");
}
