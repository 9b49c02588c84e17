use std::{
	fs,
	path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{Error, PipelineQuery, Query, Result};

pub trait QueriesSource
where
	Self: Send + Sync,
{
	fn load(&self, path: &Path) -> Result<Vec<PipelineQuery>>;
}

/// Loads queries from one JSON file holding an array, or from a directory of `*.json` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonQueriesSource;
impl QueriesSource for JsonQueriesSource {
	fn load(&self, path: &Path) -> Result<Vec<PipelineQuery>> {
		let mut files = Vec::new();

		if path.is_dir() {
			let entries = fs::read_dir(path)
				.map_err(|err| Error::Read { path: path.to_path_buf(), source: err })?;

			for entry in entries {
				let entry =
					entry.map_err(|err| Error::Read { path: path.to_path_buf(), source: err })?;
				let file = entry.path();

				if file.extension().is_some_and(|ext| ext == "json") {
					files.push(file);
				}
			}

			files.sort();
		} else {
			files.push(path.to_path_buf());
		}

		let mut queries = Vec::new();

		for file in files {
			queries.extend(load_file(&file)?);
		}

		tracing::debug!(path = ?path, count = queries.len(), "Loaded queries.");

		Ok(queries)
	}
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QueryFile {
	Many(Vec<QueryRecord>),
	One(QueryRecord),
}

#[derive(Debug, Deserialize)]
struct QueryRecord {
	topic: String,
	name: Option<String>,
	query: Query,
}

fn load_file(path: &PathBuf) -> Result<Vec<PipelineQuery>> {
	let raw =
		fs::read_to_string(path).map_err(|err| Error::Read { path: path.clone(), source: err })?;
	let parsed: QueryFile =
		serde_json::from_str(&raw).map_err(|err| Error::Parse { path: path.clone(), source: err })?;
	let records = match parsed {
		QueryFile::Many(records) => records,
		QueryFile::One(record) => vec![record],
	};

	records
		.into_iter()
		.map(|record| {
			if record.topic.trim().is_empty() {
				return Err(Error::Validation {
					message: format!("Query in {path:?} is missing a topic."),
				});
			}

			let name = record.name.unwrap_or_else(|| record.topic.clone());

			Ok(PipelineQuery::new(name, record.topic, record.query))
		})
		.collect()
}
