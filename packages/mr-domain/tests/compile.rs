use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Value, json};

use mr_domain::{
	BoundingBox, CompileArgs, Direction, SearchCriteria, WireParams, compile, compile_criteria,
};

fn filters(value: Value) -> BTreeMap<String, Value> {
	serde_json::from_value(value).expect("Filters must be an object.")
}

fn run(
	filters: &BTreeMap<String, Value>,
	query: Option<&str>,
	invert: &[&str],
	bbox: Option<&BoundingBox>,
) -> WireParams {
	let invert_fields: BTreeSet<String> = invert.iter().map(|field| field.to_string()).collect();

	compile(CompileArgs {
		filters,
		bounding_box: bbox,
		saved_challenges_only: false,
		exclude_other_reviewers: false,
		query,
		invert_fields: &invert_fields,
		exclude_ids: &[],
	})
}

#[test]
fn all_status_suppresses_parameter_and_inversion() {
	let params = run(&filters(json!({ "status": "all" })), None, &["status"], None);

	assert!(!params.contains("tStatus"));
	assert!(!params.contains("invf"));
	assert!(params.is_empty());
}

#[test]
fn inversion_lists_only_emitted_fields() {
	let params = run(
		&filters(json!({ "status": [1, 2], "priority": "all", "reviewedBy": "mapper" })),
		None,
		&["status", "priority", "reviewedBy"],
		None,
	);

	assert_eq!(params.get("tStatus"), Some("1,2"));
	assert_eq!(params.get("r"), Some("mapper"));
	assert_eq!(params.list("invf"), vec!["r", "tStatus"]);
}

#[test]
fn hashtags_merge_with_keyword_filter() {
	let explicit = filters(json!({ "keywords": ["lakes"] }));
	let params = run(&explicit, Some("#rivers bridges"), &[], None);
	let keywords: BTreeSet<&str> = params.list("ct").into_iter().collect();

	assert_eq!(keywords, BTreeSet::from(["rivers", "lakes"]));
	assert_eq!(params.get("q"), Some("bridges"));
}

#[test]
fn comma_joined_hashtags_split_into_keywords() {
	let params = run(&BTreeMap::new(), Some("#lakes,#rivers,x bridges, roads"), &[], None);

	assert_eq!(params.list("ct"), vec!["lakes", "rivers"]);
	assert_eq!(params.get("q"), Some("x bridges, roads"));
}

#[test]
fn duplicate_keywords_collapse() {
	let params =
		run(&filters(json!({ "keywords": "water, lakes" })), Some("#lakes #water"), &[], None);

	assert_eq!(params.list("ct"), vec!["water", "lakes"]);
	assert!(!params.contains("q"));
}

#[test]
fn unknown_and_malformed_filters_are_omitted() {
	let params = run(
		&filters(json!({
			"challengeId": "abc",
			"projectId": null,
			"mystery": 4,
			"challenge": "   ",
			"taskId": " 42 "
		})),
		None,
		&["challengeId"],
		None,
	);

	assert_eq!(params.get("tid"), Some("42"));
	assert_eq!(params.len(), 1);
}

#[test]
fn meta_review_filter_keeps_unrequested_tasks() {
	let params = run(
		&filters(json!({ "reviewStatus": [-1, 0], "metaReviewStatus": [1] })),
		None,
		&[],
		None,
	);

	assert_eq!(params.get("mrStatus"), Some("1,-1"));
}

#[test]
fn meta_review_filter_untouched_without_sentinel() {
	let params = run(
		&filters(json!({ "reviewStatus": [0], "metaReviewStatus": "all" })),
		None,
		&[],
		None,
	);

	assert_eq!(params.get("trStatus"), Some("0"));
	assert!(!params.contains("mrStatus"));
}

#[test]
fn bounds_target_task_or_challenge_location() {
	let bbox = BoundingBox::new(-1.0, 50.0, 1.0, 51.0).expect("Box must be valid.");
	let by_task = run(&BTreeMap::new(), None, &[], Some(&bbox));
	let by_challenge =
		run(&filters(json!({ "location": "withinMapBounds" })), None, &[], Some(&bbox));

	assert_eq!(by_task.get("tbb"), Some("-1,50,1,51"));
	assert!(!by_task.contains("bb"));
	assert_eq!(by_challenge.get("bb"), Some("-1,50,1,51"));
	assert!(!by_challenge.contains("tbb"));
}

#[test]
fn criteria_add_flags_sort_and_paging() {
	let criteria = SearchCriteria::new()
		.with_filter("challengeId", 12)
		.with_sort("mappedOn", Direction::Desc)
		.with_page_size(25)
		.with_page(2)
		.with_saved_challenges_only(true)
		.with_exclude_other_reviewers(true);
	let params = compile_criteria(&criteria, &[7, 9]);

	assert_eq!(params.get("cid"), Some("12"));
	assert_eq!(params.get("sort"), Some("mappedOn"));
	assert_eq!(params.get("order"), Some("DESC"));
	assert_eq!(params.get("page"), Some("2"));
	assert_eq!(params.get("limit"), Some("25"));
	assert_eq!(params.get("onlySaved"), Some("true"));
	assert_eq!(params.get("excludeOtherReviewers"), Some("true"));
	assert_eq!(params.get("excludeTasks"), Some("7,9"));
}

#[test]
fn wire_params_serialize_flat() {
	let params = run(&filters(json!({ "completedBy": "ada" })), None, &[], None);

	assert_eq!(
		serde_json::to_value(&params).expect("Params must serialize."),
		json!({ "m": "ada" })
	);
}
