#![cfg(unix)]

use std::{
	fs,
	path::PathBuf,
	sync::Arc,
	time::{Duration, Instant},
};

use serde_json::{Map, Value};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use requery_learning::{
	CandidateQuery, Error, Feature, Features, LearntFeature, QuickRankSelector, Selector,
};
use requery_query::Keyword;
use requery_testkit::FixtureSource;

// Scores 1 for candidate lines containing --prefer, 0 otherwise.
const RANKER: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
	case "$1" in
		--test) test="$2" ;;
		--train) train="$2" ;;
		--scores) scores="$2" ;;
		--prefer) prefer="$2" ;;
		--extra) extra="$2" ;;
		--fail) fail="$2" ;;
		--sleep) nap="$2" ;;
		--nap) child_nap="$2" ;;
		--model-out) model="$2" ;;
	esac
	shift 2
done
echo "ranking ${test:-$train}"
echo "diagnostic line" >&2
if [ -n "$fail" ]; then exit "$fail"; fi
if [ -n "$nap" ]; then exec sleep "$nap"; fi
if [ -n "$child_nap" ]; then sleep "$child_nap"; echo done; fi
if [ -n "$train" ]; then cp "$train" "$model"; exit 0; fi
: > "$scores"
while IFS= read -r line; do
	case "$line" in
		*"$prefer"*) echo 1 >> "$scores" ;;
		*) echo 0 >> "$scores" ;;
	esac
done < "$test"
if [ -n "$extra" ]; then echo 0 >> "$scores"; fi
"#;

struct Harness {
	dir: TempDir,
	script: PathBuf,
}
impl Harness {
	fn new() -> Self {
		let dir = TempDir::new().expect("Failed to create temp dir.");
		let script = dir.path().join("ranker.sh");

		fs::write(&script, RANKER).expect("Failed to write ranker script.");

		Self { dir, script }
	}

	fn work_dir(&self) -> PathBuf {
		self.dir.path().join("work")
	}

	fn scores(&self) -> PathBuf {
		self.dir.path().join("scores.txt")
	}

	fn selector(&self, depth: usize, extra: &[(&str, Value)], timeout_ms: u64) -> QuickRankSelector {
		let mut arguments = Map::new();

		arguments.insert("scores".to_string(), Value::String(self.scores().display().to_string()));

		for (key, value) in extra {
			arguments.insert((*key).to_string(), value.clone());
		}

		fs::create_dir_all(self.work_dir()).expect("Failed to create work dir.");

		let cfg = requery_config::Selector {
			binary: PathBuf::from("/bin/sh"),
			binary_args: vec![self.script.display().to_string()],
			work_dir: Some(self.work_dir()),
			timeout_ms,
			arguments,
		};

		QuickRankSelector::new(&cfg, depth, Arc::new(source())).expect("Selector must build.")
	}

	fn leftovers(&self) -> Vec<PathBuf> {
		let mut paths: Vec<_> = fs::read_dir(self.work_dir())
			.expect("Failed to list work dir.")
			.map(|entry| entry.expect("Failed to read entry.").path())
			.collect();

		if self.scores().exists() {
			paths.push(self.scores());
		}

		paths
	}
}

fn source() -> FixtureSource {
	FixtureSource::new(10.0)
		.with_posting("start", [("d1", 1.0)])
		.with_posting("alpha", [("d1", 1.0)])
		.with_posting("beta", [("d2", 2.0)])
		.with_posting("gamma", [("d3", 3.0)])
}

fn candidate(text: &str, score: f64) -> CandidateQuery {
	CandidateQuery::new("CD01", Keyword::new(text).into(), Features::from(vec![Feature::new(1, score)]))
}

fn prefer(text: &str) -> (&'static str, Value) {
	("prefer", Value::String(format!("\"{text}\"")))
}

fn prefer_feature(score: u32) -> (&'static str, Value) {
	("prefer", Value::String(format!(" 2:{score} ")))
}

fn assert_clean(harness: &Harness) {
	assert_eq!(harness.leftovers(), Vec::<PathBuf>::new(), "Temporary files were left behind.");
}

#[tokio::test]
async fn selects_the_highest_scored_candidate() {
	let harness = Harness::new();
	let selector = harness.selector(3, &[prefer("beta")], 10_000);
	let current = candidate("start", 0.0);
	let candidates = [candidate("alpha", 1.0), candidate("beta", 2.0), candidate("gamma", 3.0)];
	let (chosen, next) = selector
		.select(&current, &candidates, &CancellationToken::new())
		.await
		.expect("Selection failed.");

	assert_eq!(chosen.text(), "\"beta\"[]");
	assert_eq!(next.current_depth(), 1);
	assert_eq!(selector.current_depth(), 0);
	assert!(!next.stopping_criteria());
	assert_clean(&harness);
}

#[tokio::test]
async fn depth_bound_stops_after_accepted_steps() {
	let harness = Harness::new();
	let mut selector = harness.selector(2, &[prefer_feature(9)], 10_000);
	let mut current = candidate("start", 0.0);
	let steps = [
		[candidate("alpha", 1.0), candidate("beta", 9.0)],
		[candidate("gamma", 9.0), candidate("alpha", 1.0)],
	];

	for (step, candidates) in steps.iter().enumerate() {
		assert!(!selector.stopping_criteria(), "Stopped early at step {step}.");

		let (chosen, next) = selector
			.select(&current, candidates, &CancellationToken::new())
			.await
			.expect("Selection failed.");

		current = chosen;
		selector = next;
	}

	assert_eq!(current.text(), "\"gamma\"[]");
	assert_eq!(selector.current_depth(), 2);
	assert!(selector.stopping_criteria());
	assert_clean(&harness);
}

#[tokio::test]
async fn fixed_point_stops_regardless_of_depth() {
	let harness = Harness::new();
	let selector = harness.selector(100, &[prefer("start")], 10_000);
	let current = candidate("start", 0.0);
	let candidates = [candidate("alpha", 1.0), candidate("start", 2.0)];
	let (chosen, next) = selector
		.select(&current, &candidates, &CancellationToken::new())
		.await
		.expect("Selection failed.");

	assert!(chosen.same_query(&current));
	assert!(next.stopping_criteria());
}

#[tokio::test]
async fn empty_candidate_sets_are_fixed_points() {
	let harness = Harness::new();
	let selector = harness.selector(100, &[], 10_000);
	let current = candidate("start", 0.0);
	let (chosen, next) =
		selector.select(&current, &[], &CancellationToken::new()).await.expect("Selection failed.");

	assert!(chosen.same_query(&current));
	assert!(next.stopping_criteria());
}

#[tokio::test]
async fn zero_results_keep_the_current_query_and_stop() {
	let harness = Harness::new();
	let selector = harness.selector(5, &[prefer("nothing")], 10_000);
	let current = candidate("start", 0.0);
	let candidates = [candidate("nothing", 1.0), candidate("alpha", 0.5)];
	let (chosen, next) = selector
		.select(&current, &candidates, &CancellationToken::new())
		.await
		.expect("Zero results are not an error.");

	assert!(chosen.same_query(&current));
	assert_eq!(next.current_depth(), 5);
	assert!(next.stopping_criteria());
	assert_clean(&harness);
}

#[tokio::test]
async fn score_count_mismatch_is_an_integrity_error() {
	let harness = Harness::new();
	let selector = harness.selector(5, &[prefer("alpha"), ("extra", Value::from(1))], 10_000);
	let err = selector
		.select(&candidate("start", 0.0), &[candidate("alpha", 1.0)], &CancellationToken::new())
		.await
		.expect_err("Mismatch must fail.");

	assert!(matches!(err, Error::ScoreCountMismatch { scores: 2, candidates: 1, .. }));
	assert!(err.is_integrity());
	assert_clean(&harness);
}

#[tokio::test]
async fn non_zero_exit_aborts_the_step() {
	let harness = Harness::new();
	let selector = harness.selector(5, &[("fail", Value::from(3))], 10_000);
	let err = selector
		.select(&candidate("start", 0.0), &[candidate("alpha", 1.0)], &CancellationToken::new())
		.await
		.expect_err("Exit status must fail.");

	assert!(matches!(err, Error::ProcessExit { .. }));
	assert!(!err.is_integrity());
	assert_clean(&harness);
}

#[tokio::test]
async fn slow_rankers_hit_the_deadline() {
	let harness = Harness::new();
	let selector = harness.selector(5, &[("sleep", Value::from(30))], 200);
	let err = selector
		.select(&candidate("start", 0.0), &[candidate("alpha", 1.0)], &CancellationToken::new())
		.await
		.expect_err("Deadline must fail.");

	assert!(matches!(err, Error::TimedOut { timeout_ms: 200, .. }));
	assert_clean(&harness);
}

#[tokio::test]
async fn deadline_holds_when_the_ranker_has_a_child_process() {
	let harness = Harness::new();
	let selector = harness.selector(5, &[("nap", Value::from(5))], 200);
	let started = Instant::now();
	let err = selector
		.select(&candidate("start", 0.0), &[candidate("alpha", 1.0)], &CancellationToken::new())
		.await
		.expect_err("Deadline must fail.");

	assert!(matches!(err, Error::TimedOut { timeout_ms: 200, .. }));
	assert!(started.elapsed() < Duration::from_secs(2), "Took {:?}.", started.elapsed());
	assert_clean(&harness);
}

#[tokio::test]
async fn cancellation_kills_the_ranker() {
	let harness = Harness::new();
	let selector = harness.selector(5, &[("sleep", Value::from(30))], 60_000);
	let cancel = CancellationToken::new();

	cancel.cancel();

	let err = selector
		.select(&candidate("start", 0.0), &[candidate("alpha", 1.0)], &cancel)
		.await
		.expect_err("Cancellation must fail.");

	assert!(matches!(err, Error::Cancelled { .. }));
	assert_clean(&harness);
}

#[tokio::test]
async fn training_returns_the_model_artifact() {
	let harness = Harness::new();
	let model = harness.dir.path().join("model.bin");
	let selector = harness.selector(
		5,
		&[("model-out", Value::String(model.display().to_string()))],
		10_000,
	);
	let examples = vec![
		LearntFeature::new(Features::from(vec![Feature::new(2, 0.5)]), vec![1.0], "CD01", "a")
			.expect("Record must build."),
		LearntFeature::new(Features::from(vec![Feature::new(2, 0.1)]), vec![0.0], "CD01", "b")
			.expect("Record must build."),
	];
	let artifact = selector
		.train(&examples, &CancellationToken::new())
		.await
		.expect("Training failed.");
	let text = String::from_utf8(artifact).expect("Artifact must be text.");

	assert_eq!(text, "1 qid:CD01 3:0.5 # a\n0 qid:CD01 3:0.1 # b\n");
	assert_clean(&harness);
}

#[test]
fn missing_scores_argument_is_rejected() {
	let cfg = requery_config::Selector {
		binary: PathBuf::from("/bin/sh"),
		binary_args: Vec::new(),
		work_dir: None,
		timeout_ms: 1_000,
		arguments: Map::new(),
	};
	let err = QuickRankSelector::new(&cfg, 3, Arc::new(source()))
		.err()
		.expect("Selector without scores path must fail.");

	assert!(matches!(err, Error::Validation { .. }));
}
