use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub service: Service,
	pub server: Server,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub locks: Locks,
	#[serde(default)]
	pub review: Review,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Service {
	pub log_level: String,
}
impl Default for Service {
	fn default() -> Self {
		Self { log_level: "info".to_string() }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
	/// Base URL including the API prefix, e.g. "https://maproulette.example/api/v2".
	pub api_base: String,
	pub api_key: Option<String>,
	#[serde(default)]
	pub default_headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	/// Widest longitude or latitude span, in degrees, for which individual tasks are enumerated.
	pub max_task_bounds_span: f64,
	pub debounce_ms: u64,
	pub default_page_size: u32,
	/// Above this many tasks in view, clusters are requested instead of tasks.
	pub cluster_threshold: u32,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			max_task_bounds_span: 2.5,
			debounce_ms: 800,
			default_page_size: 50,
			cluster_threshold: 1_000,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Locks {
	pub unlock_grace_ms: u64,
}
impl Default for Locks {
	fn default() -> Self {
		Self { unlock_grace_ms: 1_500 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Review {
	pub page_size: u32,
	pub load_by: LoadBy,
}
impl Default for Review {
	fn default() -> Self {
		Self { page_size: 20, load_by: LoadBy::Next }
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBy {
	#[default]
	Next,
	Nearby,
	Inbox,
}
