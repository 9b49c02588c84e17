mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Cache, Config, Model, Pipeline, Search, Selector, Service};

use std::{fs, path::Path};

use serde_json::Value;

const RESERVED_ARGUMENTS: [&str; 2] = ["test", "train"];

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	parse(path, &raw)
}

pub fn parse(path: &Path, raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.search.max_depth == 0 {
		return Err(Error::Validation {
			message: "search.max_depth must be greater than zero.".to_string(),
		});
	}
	if !cfg.search.k.is_finite() {
		return Err(Error::Validation { message: "search.k must be a finite number.".to_string() });
	}
	if cfg.search.k <= 0.0 {
		return Err(Error::Validation {
			message: "search.k must be greater than zero.".to_string(),
		});
	}
	if let Some(concurrency) = cfg.pipeline.concurrency
		&& concurrency == 0
	{
		return Err(Error::Validation {
			message: "pipeline.concurrency must be greater than zero.".to_string(),
		});
	}
	if cfg.pipeline.run_name.trim().is_empty() {
		return Err(Error::Validation {
			message: "pipeline.run_name must be non-empty.".to_string(),
		});
	}
	if cfg.cache.block_size == 0 {
		return Err(Error::Validation {
			message: "cache.block_size must be greater than zero.".to_string(),
		});
	}
	if cfg.selector.binary.as_os_str().is_empty() {
		return Err(Error::Validation {
			message: "selector.binary must be non-empty.".to_string(),
		});
	}
	if cfg.selector.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "selector.timeout_ms must be greater than zero.".to_string(),
		});
	}

	match cfg.selector.arguments.get("scores") {
		Some(Value::String(path)) if !path.trim().is_empty() => {},
		Some(_) => {
			return Err(Error::Validation {
				message: "selector.arguments.scores must be a non-empty string.".to_string(),
			});
		},
		None => {
			return Err(Error::Validation {
				message: "selector.arguments.scores is required.".to_string(),
			});
		},
	}

	for key in RESERVED_ARGUMENTS {
		if cfg.selector.arguments.contains_key(key) {
			return Err(Error::Validation {
				message: format!("selector.arguments.{key} is reserved for the selector."),
			});
		}
	}

	for (label, enabled, path) in [
		("model.features_path", cfg.model.generate || cfg.model.train, &cfg.model.features_path),
		("model.output_path", cfg.model.test, &cfg.model.output_path),
	] {
		if enabled && path.is_none() {
			return Err(Error::Validation {
				message: format!("{label} is required by the enabled model stages."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for path in [
		&mut cfg.pipeline.query_path,
		&mut cfg.pipeline.qrels,
		&mut cfg.selector.work_dir,
		&mut cfg.model.features_path,
		&mut cfg.model.model_path,
		&mut cfg.model.output_path,
	] {
		if path.as_ref().map(|path| path.as_os_str().is_empty()).unwrap_or(false) {
			*path = None;
		}
	}
}
