//! Turns search criteria into the flat parameter map the server understands.
//!
//! Nothing here talks to the network. Bad upstream values (a non-numeric id, an empty list, an
//! object where a scalar was expected) compile to "no constraint" instead of failing the search.

use std::{
	collections::{BTreeMap, BTreeSet},
	sync::LazyLock,
};

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::{
	bounds::BoundingBox,
	criteria::{LOCATION_FILTER, SearchCriteria, WITHIN_MAP_BOUNDS},
	task::{REVIEW_STATUS_NOT_SET, TaskId},
};

pub const PARAM_INVERTED: &str = "invf";
pub const PARAM_KEYWORDS: &str = "ct";
pub const PARAM_TEXT: &str = "q";
pub const PARAM_TASK_BOUNDS: &str = "tbb";
pub const PARAM_CHALLENGE_BOUNDS: &str = "bb";
pub const PARAM_SAVED_ONLY: &str = "onlySaved";
pub const PARAM_EXCLUDE_OTHER_REVIEWERS: &str = "excludeOtherReviewers";
pub const PARAM_EXCLUDE_TASKS: &str = "excludeTasks";
pub const PARAM_SORT: &str = "sort";
pub const PARAM_ORDER: &str = "order";
pub const PARAM_PAGE: &str = "page";
pub const PARAM_LIMIT: &str = "limit";

const KEYWORDS_FILTER: &str = "keywords";
const REVIEW_STATUS_FILTER: &str = "reviewStatus";
const META_REVIEW_STATUS_FILTER: &str = "metaReviewStatus";
const META_REVIEW_STATUS_PARAM: &str = "mrStatus";
const NO_CONSTRAINT: &str = "all";

static HASHTAG: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^#([^\s#,]+)$").expect("Hashtag pattern must compile."));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
	/// Free-form value: usernames, dates, names.
	Text,
	/// Must be an integer; anything else is dropped.
	Id,
	/// Integer code, or a list of codes; the literal "all" means no constraint.
	Codes,
}

struct FieldRule {
	filter: &'static str,
	wire: &'static str,
	kind: FieldKind,
}

const FIELD_RULES: &[FieldRule] = &[
	FieldRule { filter: "reviewRequestedBy", wire: "o", kind: FieldKind::Text },
	FieldRule { filter: "reviewedBy", wire: "r", kind: FieldKind::Text },
	FieldRule { filter: "metaReviewedBy", wire: "mr", kind: FieldKind::Text },
	FieldRule { filter: "completedBy", wire: "m", kind: FieldKind::Text },
	FieldRule { filter: "mappedOn", wire: "mo", kind: FieldKind::Text },
	FieldRule { filter: "reviewedAt", wire: "ra", kind: FieldKind::Text },
	FieldRule { filter: "metaReviewedAt", wire: "mra", kind: FieldKind::Text },
	FieldRule { filter: "challengeId", wire: "cid", kind: FieldKind::Id },
	FieldRule { filter: "challenge", wire: "cs", kind: FieldKind::Text },
	FieldRule { filter: "projectId", wire: "pid", kind: FieldKind::Id },
	FieldRule { filter: "project", wire: "ps", kind: FieldKind::Text },
	FieldRule { filter: "taskId", wire: "tid", kind: FieldKind::Id },
	FieldRule { filter: "difficulty", wire: "cd", kind: FieldKind::Id },
	FieldRule { filter: "status", wire: "tStatus", kind: FieldKind::Codes },
	FieldRule { filter: "priority", wire: "tp", kind: FieldKind::Codes },
	FieldRule { filter: REVIEW_STATUS_FILTER, wire: "trStatus", kind: FieldKind::Codes },
	FieldRule {
		filter: META_REVIEW_STATUS_FILTER,
		wire: META_REVIEW_STATUS_PARAM,
		kind: FieldKind::Codes,
	},
];

/// Flat, URL-encodable query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WireParams(BTreeMap<String, String>);
impl WireParams {
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str)
	}

	pub fn contains(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
	}

	/// Comma separated values of a list parameter.
	pub fn list(&self, key: &str) -> Vec<&str> {
		self.get(key).map(|raw| raw.split(',').collect()).unwrap_or_default()
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.0.insert(key.into(), value.into());
	}

	pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.insert(key, value);

		self
	}
}

pub struct CompileArgs<'a> {
	pub filters: &'a BTreeMap<String, Value>,
	pub bounding_box: Option<&'a BoundingBox>,
	pub saved_challenges_only: bool,
	pub exclude_other_reviewers: bool,
	pub query: Option<&'a str>,
	pub invert_fields: &'a BTreeSet<String>,
	pub exclude_ids: &'a [TaskId],
}

pub fn compile(args: CompileArgs<'_>) -> WireParams {
	let CompileArgs {
		filters,
		bounding_box,
		saved_challenges_only,
		exclude_other_reviewers,
		query,
		invert_fields,
		exclude_ids,
	} = args;
	let mut params = WireParams::default();
	let mut inverted = Vec::new();

	for rule in FIELD_RULES {
		let Some(raw) = filters.get(rule.filter) else {
			continue;
		};
		let rendered = match rule.kind {
			FieldKind::Text => render_text(raw),
			FieldKind::Id => render_id(raw),
			FieldKind::Codes => render_codes(raw).map(|codes| join(&codes)),
		};
		let Some(value) = rendered else {
			tracing::debug!(filter = rule.filter, value = %raw, "Filter carries no constraint.");

			continue;
		};

		params.insert(rule.wire, value);

		if invert_fields.contains(rule.filter) {
			inverted.push(rule.wire);
		}
	}

	include_unrequested_meta_reviews(filters, &mut params);

	let (hashtags, text) = split_query(query.unwrap_or_default());
	let keywords = merge_keywords(filters.get(KEYWORDS_FILTER), hashtags);

	if !keywords.is_empty() {
		params.insert(PARAM_KEYWORDS, keywords.join(","));

		if invert_fields.contains(KEYWORDS_FILTER) {
			inverted.push(PARAM_KEYWORDS);
		}
	}
	if !text.is_empty() {
		params.insert(PARAM_TEXT, text);
	}

	if let Some(bbox) = bounding_box {
		let within_challenge =
			filters.get(LOCATION_FILTER).and_then(Value::as_str) == Some(WITHIN_MAP_BOUNDS);
		let key = if within_challenge { PARAM_CHALLENGE_BOUNDS } else { PARAM_TASK_BOUNDS };

		params.insert(key, bbox.to_wire());
	}

	if saved_challenges_only {
		params.insert(PARAM_SAVED_ONLY, "true");
	}
	if exclude_other_reviewers {
		params.insert(PARAM_EXCLUDE_OTHER_REVIEWERS, "true");
	}
	if !exclude_ids.is_empty() {
		let ids: Vec<String> = exclude_ids.iter().map(ToString::to_string).collect();

		params.insert(PARAM_EXCLUDE_TASKS, ids.join(","));
	}
	if !inverted.is_empty() {
		params.insert(PARAM_INVERTED, inverted.join(","));
	}

	params
}

/// Compiles the filter portion of `criteria` and appends sort and paging.
pub fn compile_criteria(criteria: &SearchCriteria, exclude_ids: &[TaskId]) -> WireParams {
	let mut params = compile(CompileArgs {
		filters: criteria.filters(),
		bounding_box: criteria.map_bounds(),
		saved_challenges_only: criteria.saved_challenges_only(),
		exclude_other_reviewers: criteria.exclude_other_reviewers(),
		query: criteria.query(),
		invert_fields: criteria.invert_fields(),
		exclude_ids,
	});
	let sort = criteria.sort();

	if let Some(sort_by) = sort.sort_by.as_deref().filter(|value| !value.trim().is_empty()) {
		params.insert(PARAM_SORT, sort_by);
		params.insert(PARAM_ORDER, sort.direction.as_wire());
	}

	let page = criteria.page();

	params.insert(PARAM_PAGE, page.current_page.to_string());
	params.insert(PARAM_LIMIT, page.results_per_page.to_string());

	params
}

/// Tasks that never had a review requested carry the same "not set" sentinel for their meta-review
/// status. Filtering meta-review status without it would silently drop them whenever the review
/// status filter asks for them.
fn include_unrequested_meta_reviews(filters: &BTreeMap<String, Value>, params: &mut WireParams) {
	let Some(mut meta) = filters.get(META_REVIEW_STATUS_FILTER).and_then(render_codes) else {
		return;
	};
	let wants_unrequested = filters
		.get(REVIEW_STATUS_FILTER)
		.and_then(render_codes)
		.map(|codes| codes.contains(&REVIEW_STATUS_NOT_SET))
		.unwrap_or(false);

	if wants_unrequested && !meta.contains(&REVIEW_STATUS_NOT_SET) {
		meta.push(REVIEW_STATUS_NOT_SET);

		params.insert(META_REVIEW_STATUS_PARAM, join(&meta));
	}
}

fn render_text(raw: &Value) -> Option<String> {
	match raw {
		Value::String(text) => {
			let trimmed = text.trim();

			(!trimmed.is_empty()).then(|| trimmed.to_string())
		},
		Value::Number(number) => Some(number.to_string()),
		_ => None,
	}
}

fn render_id(raw: &Value) -> Option<String> {
	parse_int(raw).map(|id| id.to_string())
}

fn render_codes(raw: &Value) -> Option<Vec<i64>> {
	let codes = match raw {
		Value::String(text) if text.trim() == NO_CONSTRAINT => return None,
		Value::String(text) => text
			.split(',')
			.map(|part| part.trim().parse::<i64>().ok())
			.collect::<Option<Vec<_>>>()?,
		Value::Number(_) => vec![parse_int(raw)?],
		Value::Array(items) => {
			if items.iter().any(|item| item.as_str().map(str::trim) == Some(NO_CONSTRAINT)) {
				return None;
			}

			items.iter().map(parse_int).collect::<Option<Vec<_>>>()?
		},
		_ => return None,
	};
	let mut deduped = Vec::with_capacity(codes.len());

	for code in codes {
		if !deduped.contains(&code) {
			deduped.push(code);
		}
	}

	(!deduped.is_empty()).then_some(deduped)
}

fn parse_int(raw: &Value) -> Option<i64> {
	match raw {
		Value::Number(number) => number.as_i64(),
		Value::String(text) => text.trim().parse().ok(),
		_ => None,
	}
}

fn join(codes: &[i64]) -> String {
	codes.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

/// Splits free text into `#hashtag` keywords and the remaining plain text. A token starting
/// with `#` may list several comma-separated tags, e.g. `#lakes,#rivers`.
fn split_query(query: &str) -> (Vec<String>, String) {
	let mut hashtags = Vec::new();
	let mut words = Vec::new();
	let pieces = query.split_whitespace().flat_map(|token| {
		let split_on_commas = token.starts_with('#');

		token.split(move |c| split_on_commas && c == ',').filter(|piece| !piece.is_empty())
	});

	for piece in pieces {
		match HASHTAG.captures(piece).and_then(|caps| caps.get(1)) {
			Some(tag) => hashtags.push(tag.as_str().to_string()),
			None if piece == "#" => {},
			None => words.push(piece),
		}
	}

	(hashtags, words.join(" "))
}

fn merge_keywords(explicit: Option<&Value>, hashtags: Vec<String>) -> Vec<String> {
	let explicit: Vec<String> = match explicit {
		Some(Value::String(raw)) => raw.split(',').map(|word| word.trim().to_string()).collect(),
		Some(Value::Array(items)) =>
			items.iter().filter_map(Value::as_str).map(|word| word.trim().to_string()).collect(),
		_ => Vec::new(),
	};
	let mut merged: Vec<String> = Vec::new();

	for keyword in explicit.into_iter().chain(hashtags) {
		if !keyword.is_empty() && !merged.contains(&keyword) {
			merged.push(keyword);
		}
	}

	merged
}
