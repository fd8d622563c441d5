use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bounds::BoundingBox;

/// Filter key whose value selects how the map bounds are interpreted.
pub const LOCATION_FILTER: &str = "location";
/// `location` value meaning "the parent challenge lies within the current map view".
pub const WITHIN_MAP_BOUNDS: &str = "withinMapBounds";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
	#[default]
	Asc,
	Desc,
}
impl Direction {
	pub fn as_wire(self) -> &'static str {
		match self {
			Self::Asc => "ASC",
			Self::Desc => "DESC",
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sort {
	pub sort_by: Option<String>,
	#[serde(default)]
	pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
	pub current_page: u32,
	pub results_per_page: u32,
}
impl Default for Page {
	fn default() -> Self {
		Self { current_page: 0, results_per_page: 50 }
	}
}

/// An immutable description of one search. Every edit produces a new value, so a copy captured
/// before a fetch can still be compared against the current criteria when its response lands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
	#[serde(default)]
	filters: BTreeMap<String, Value>,
	#[serde(default)]
	sort: Sort,
	#[serde(default)]
	page: Page,
	#[serde(default)]
	map_bounds: Option<BoundingBox>,
	#[serde(default)]
	invert_fields: BTreeSet<String>,
	#[serde(default)]
	saved_challenges_only: Option<bool>,
	#[serde(default)]
	exclude_other_reviewers: Option<bool>,
	#[serde(default)]
	query: Option<String>,
}
impl SearchCriteria {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn filters(&self) -> &BTreeMap<String, Value> {
		&self.filters
	}

	pub fn filter(&self, key: &str) -> Option<&Value> {
		self.filters.get(key)
	}

	pub fn sort(&self) -> &Sort {
		&self.sort
	}

	pub fn page(&self) -> Page {
		self.page
	}

	pub fn map_bounds(&self) -> Option<&BoundingBox> {
		self.map_bounds.as_ref()
	}

	pub fn invert_fields(&self) -> &BTreeSet<String> {
		&self.invert_fields
	}

	pub fn saved_challenges_only(&self) -> bool {
		self.saved_challenges_only.unwrap_or(false)
	}

	pub fn exclude_other_reviewers(&self) -> bool {
		self.exclude_other_reviewers.unwrap_or(false)
	}

	pub fn query(&self) -> Option<&str> {
		self.query.as_deref()
	}

	/// True when the map bounds constrain the parent challenge rather than the task itself.
	pub fn bounds_constrain_challenge(&self) -> bool {
		self.filters.get(LOCATION_FILTER).and_then(Value::as_str) == Some(WITHIN_MAP_BOUNDS)
	}

	/// Setting a filter resets paging, since the old page index no longer means anything.
	pub fn with_filter(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		let mut next = self.clone();

		next.filters.insert(key.into(), value.into());
		next.page.current_page = 0;

		next
	}

	pub fn without_filter(&self, key: &str) -> Self {
		let mut next = self.clone();

		if next.filters.remove(key).is_some() {
			next.page.current_page = 0;
			next.invert_fields.remove(key);
		}

		next
	}

	pub fn with_inverted(&self, key: impl Into<String>, inverted: bool) -> Self {
		let mut next = self.clone();
		let key = key.into();

		if inverted {
			next.invert_fields.insert(key);
		} else {
			next.invert_fields.remove(&key);
		}

		next
	}

	pub fn with_sort(&self, sort_by: impl Into<String>, direction: Direction) -> Self {
		let mut next = self.clone();

		next.sort = Sort { sort_by: Some(sort_by.into()), direction };

		next
	}

	pub fn with_page(&self, current_page: u32) -> Self {
		let mut next = self.clone();

		next.page.current_page = current_page;

		next
	}

	pub fn with_page_size(&self, results_per_page: u32) -> Self {
		let mut next = self.clone();

		next.page = Page { current_page: 0, results_per_page };

		next
	}

	pub fn with_map_bounds(&self, bounds: Option<BoundingBox>) -> Self {
		let mut next = self.clone();

		next.map_bounds = bounds;

		next
	}

	pub fn with_query(&self, query: Option<String>) -> Self {
		let mut next = self.clone();

		next.query = query.filter(|value| !value.trim().is_empty());
		next.page.current_page = 0;

		next
	}

	pub fn with_saved_challenges_only(&self, enabled: bool) -> Self {
		let mut next = self.clone();

		next.saved_challenges_only = Some(enabled);

		next
	}

	pub fn with_exclude_other_reviewers(&self, enabled: bool) -> Self {
		let mut next = self.clone();

		next.exclude_other_reviewers = Some(enabled);

		next
	}
}
