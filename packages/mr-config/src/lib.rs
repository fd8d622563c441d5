mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, LoadBy, Locks, Review, Search, Server, Service};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	from_toml_str(&raw).map_err(|err| match err {
		Error::ParseConfig { source, .. } =>
			Error::ParseConfig { path: path.to_path_buf(), source },
		other => other,
	})
}

pub fn from_toml_str(raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw)
		.map_err(|err| Error::ParseConfig { path: Default::default(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::invalid("service.log_level", "must be non-empty."));
	}

	let api_base = cfg.server.api_base.trim();

	if api_base.is_empty() {
		return Err(Error::invalid("server.api_base", "must be non-empty."));
	}
	if !(api_base.starts_with("http://") || api_base.starts_with("https://")) {
		return Err(Error::invalid("server.api_base", "must be an http or https URL."));
	}

	let span = cfg.search.max_task_bounds_span;

	if !span.is_finite() {
		return Err(Error::invalid("search.max_task_bounds_span", "must be a finite number."));
	}
	if span <= 0.0 {
		return Err(Error::invalid("search.max_task_bounds_span", "must be greater than zero."));
	}
	if span > 360.0 {
		return Err(Error::invalid("search.max_task_bounds_span", "must be 360 degrees or less."));
	}
	if cfg.search.default_page_size == 0 {
		return Err(Error::invalid("search.default_page_size", "must be greater than zero."));
	}
	if cfg.search.cluster_threshold == 0 {
		return Err(Error::invalid("search.cluster_threshold", "must be greater than zero."));
	}
	if cfg.review.page_size == 0 {
		return Err(Error::invalid("review.page_size", "must be greater than zero."));
	}

	for (name, value) in &cfg.server.default_headers {
		if name.trim().is_empty() {
			return Err(Error::invalid("server.default_headers", "header names must be non-empty."));
		}
		if value.contains(['\r', '\n']) {
			return Err(Error::invalid(
				"server.default_headers",
				format!("value for {name} must not contain line breaks."),
			));
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.server.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.server.api_key = None;
	}

	let trimmed = cfg.server.api_base.trim().trim_end_matches('/').to_string();

	cfg.server.api_base = trimmed;
}
