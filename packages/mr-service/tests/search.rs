use std::time::Duration;

use serde_json::json;

use mr_domain::{BoundingBox, Error as DomainError, GroupKey, SearchCriteria};
use mr_service::{
	Error, FetchOutcome, SEARCH_FETCH_FAILURE, SearchTarget, ServerError, StoreUpdate,
	USER_UNAUTHORIZED, routes,
};
use mr_testkit::{FakeServer, Harness};

fn text_search(text: &str) -> SearchCriteria {
	SearchCriteria::new().with_query(Some(text.to_string()))
}

#[tokio::test]
async fn late_response_from_an_older_search_is_discarded() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let search = harness.session().search;
	let first_gate = server.gate_next(routes::CHALLENGE_SEARCH);
	let second_gate = server.gate_next(routes::CHALLENGE_SEARCH);
	let first = {
		let search = search.clone();

		tokio::spawn(async move { search.fetch_challenges(&text_search("old")).await })
	};

	assert!(server.arrived(routes::CHALLENGE_SEARCH, 1).await);

	let second = {
		let search = search.clone();

		tokio::spawn(async move { search.fetch_challenges(&text_search("new")).await })
	};

	assert!(server.arrived(routes::CHALLENGE_SEARCH, 2).await);

	second_gate.open();

	let second = second.await.expect("Task must join.").expect("Search must be sent.");

	first_gate.open();

	let first = first.await.expect("Task must join.").expect("Search must be sent.");

	assert!(matches!(second, FetchOutcome::Applied { .. }));
	assert!(matches!(first, FetchOutcome::Superseded { .. }));

	let results = search.results(SearchTarget::Challenges).expect("Group must have results.");

	assert_eq!(results.payload.expect("Payload must be set.")["query"]["q"], json!("new"));
	assert_eq!(results.fetch_id, Some(second.id()));
	assert!(!results.loading);
}

#[tokio::test]
async fn refresh_keeps_previous_results_while_loading() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let search = harness.session().search;

	search.fetch_challenges(&text_search("first")).await.expect("Search must be sent.");

	let gate = server.gate_next(routes::CHALLENGE_SEARCH);
	let refresh = {
		let search = search.clone();

		tokio::spawn(async move { search.fetch_challenges(&text_search("second")).await })
	};

	assert!(server.arrived(routes::CHALLENGE_SEARCH, 2).await);

	let during = search.results(SearchTarget::Challenges).expect("Group must have results.");

	assert!(during.loading);
	assert_eq!(during.payload.expect("Payload must be kept.")["query"]["q"], json!("first"));

	gate.open();
	refresh.await.expect("Task must join.").expect("Search must be sent.");

	assert!(!search.is_loading(SearchTarget::Challenges));
}

#[tokio::test]
async fn failure_keeps_payload_and_is_reported() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let search = harness.session().search;

	search.fetch_challenges(&text_search("ok")).await.expect("Search must be sent.");
	server.fail_next(routes::CHALLENGE_SEARCH, ServerError::new(500, "boom"));

	let outcome = search.fetch_challenges(&text_search("broken")).await.expect("Must be sent.");

	assert!(matches!(
		outcome,
		FetchOutcome::Failed { error: Error::Server { status: 500, .. }, .. }
	));

	let results = search.results(SearchTarget::Challenges).expect("Group must have results.");

	assert_eq!(results.payload.expect("Payload must be kept.")["query"]["q"], json!("ok"));
	assert_eq!(results.last_error.as_deref(), Some("Server responded with status 500: boom"));
	assert_eq!(harness.errors.ids(), vec![SEARCH_FETCH_FAILURE]);
	assert!(!harness.store.logged_out());
}

#[tokio::test]
async fn unauthorized_response_logs_the_user_out() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let search = harness.session().search;

	server.fail_next(routes::CHALLENGE_SEARCH, ServerError::new(401, "expired"));
	search.fetch_challenges(&SearchCriteria::new()).await.expect("Search must be sent.");

	assert!(harness.store.logged_out());
	assert_eq!(harness.errors.ids(), vec![USER_UNAUTHORIZED]);
}

#[tokio::test]
async fn oversized_bounds_are_rejected_before_any_request() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let search = harness.session().search;
	let wide = BoundingBox::new(-20.0, 40.0, 20.0, 60.0).expect("Box must be valid.");
	let err = search
		.fetch_bounded_tasks(&SearchCriteria::new().with_map_bounds(Some(wide)))
		.await
		.expect_err("Wide box must be rejected.");

	assert!(matches!(err, Error::Domain(DomainError::BoundsTooLarge { .. })));
	assert!(server.requests().is_empty());
	assert!(search.results(SearchTarget::BoundedTasks).is_none());
	assert!(harness.store.updates().is_empty());
}

#[tokio::test]
async fn bounded_tasks_fill_the_box_path() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let search = harness.session().search;
	let bounds = BoundingBox::new(-1.5, 50.0, 0.5, 51.0).expect("Box must be valid.");

	search
		.fetch_bounded_tasks(&SearchCriteria::new().with_map_bounds(Some(bounds)))
		.await
		.expect("Search must be sent.");

	let requests = server.requests_to(routes::BOUNDED_TASKS);

	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0].path, "/tasks/box/-1.5/50/0.5/51");

	let recorded = harness.store.updates().into_iter().any(|update| {
		matches!(update, StoreUpdate::Results { group, .. } if group == GroupKey::bounded_tasks())
	});

	assert!(recorded);
}

#[tokio::test]
async fn cluster_search_targets_the_challenge() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let search = harness.session().search;

	search.fetch_clusters(Some(42), &SearchCriteria::new()).await.expect("Search must be sent.");

	let requests = server.requests_to(routes::TASK_CLUSTERS);

	assert_eq!(requests[0].params.get("cid"), Some("42"));
	assert!(search.results(SearchTarget::TaskClusters { challenge_id: Some(42) }).is_some());
	assert!(search.results(SearchTarget::TaskClusters { challenge_id: None }).is_none());
}

#[tokio::test]
async fn few_tasks_in_a_small_box_are_enumerated() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let search = harness.session().search;
	let bounds = BoundingBox::new(10.0, 45.0, 11.0, 46.0).expect("Box must be valid.");
	let criteria = SearchCriteria::new().with_map_bounds(Some(bounds));
	let (target, outcome) =
		search.fetch_map_tasks(Some(42), &criteria, 120).await.expect("Search must be sent.");

	assert_eq!(target, SearchTarget::BoundedTasks);
	assert!(matches!(outcome, FetchOutcome::Applied { .. }));
	assert_eq!(server.requests_to(routes::BOUNDED_TASKS).len(), 1);
	assert!(server.requests_to(routes::TASK_CLUSTERS).is_empty());
}

#[tokio::test]
async fn crowded_view_falls_back_to_clusters() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let search = harness.session().search;
	let bounds = BoundingBox::new(10.0, 45.0, 11.0, 46.0).expect("Box must be valid.");
	let criteria = SearchCriteria::new().with_map_bounds(Some(bounds));
	let (target, _) =
		search.fetch_map_tasks(Some(42), &criteria, 5_000).await.expect("Search must be sent.");

	assert_eq!(target, SearchTarget::TaskClusters { challenge_id: Some(42) });
	assert!(server.requests_to(routes::BOUNDED_TASKS).is_empty());
	assert_eq!(server.requests_to(routes::TASK_CLUSTERS)[0].params.get("cid"), Some("42"));
}

#[tokio::test]
async fn wide_or_missing_box_asks_for_clusters() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let search = harness.session().search;
	let wide = BoundingBox::new(-20.0, 40.0, 20.0, 60.0).expect("Box must be valid.");

	assert_eq!(
		search.map_target(None, &SearchCriteria::new().with_map_bounds(Some(wide)), 10),
		SearchTarget::TaskClusters { challenge_id: None }
	);
	assert_eq!(
		search.map_target(None, &SearchCriteria::new(), 10),
		SearchTarget::TaskClusters { challenge_id: None }
	);
	assert!(server.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn debounced_searches_collapse_to_the_last_one() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let search = harness.session().search;
	let mut handles = Vec::new();

	for text in ["r", "ri", "riv"] {
		handles.push(search.search_debounced(SearchTarget::Challenges, text_search(text)));

		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	for handle in handles {
		handle.await.expect("Debounced job must join.");
	}

	let requests = server.requests_to(routes::CHALLENGE_SEARCH);

	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0].params.get("q"), Some("riv"));
}

#[tokio::test(start_paused = true)]
async fn cancelled_debounce_sends_nothing() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let search = harness.session().search;
	let handle = search.search_debounced(SearchTarget::Challenges, text_search("lakes"));

	search.cancel_debounced();
	handle.await.expect("Debounced job must join.");

	assert!(server.requests().is_empty());
}
