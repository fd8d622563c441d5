use serde_json::json;

use mr_domain::{
	Error as DomainError, NextTaskStrategy, ReviewPhase, ReviewTasksType, ReviewVerdict,
	SearchCriteria,
};
use mr_service::{
	Error, FetchOutcome, NavTarget, REVIEW_NEXT_FAILURE, SequenceOutcome, ServerError,
	TASKS_SAVE_FAILURE, routes,
};
use mr_testkit::{FakeServer, Harness};

const NEEDS_REVIEW: ReviewTasksType = ReviewTasksType::NeedsReview;

#[tokio::test]
async fn next_in_sort_order_is_found_before_the_verdict_is_sent() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let review = harness.session().review;

	server.respond_next(routes::REVIEW_NEXT, json!({ "id": 11, "parent": 1 }));
	review.claim(10, false).await.expect("Claim must succeed.");

	let outcome = review
		.submit(
			ReviewVerdict::Approved,
			Some("looks good"),
			NEEDS_REVIEW,
			NextTaskStrategy::NextInSortOrder,
		)
		.await
		.expect("Submit must succeed.");

	assert!(matches!(outcome, SequenceOutcome::Advanced(ref task) if task.id == 11));

	let next_at = server.position_of(routes::REVIEW_NEXT).expect("Next must be requested.");
	let submit_at = server.position_of(routes::REVIEW_SUBMIT).expect("Verdict must be sent.");

	assert!(next_at < submit_at);

	let next = server.requests_to(routes::REVIEW_NEXT);
	let verdict = server.requests_to(routes::REVIEW_SUBMIT);

	assert_eq!(next[0].params.get("lastTaskId"), Some("10"));
	assert_eq!(verdict[0].params.get("comment"), Some("looks good"));
	assert_eq!(server.reviews()[0].status, ReviewVerdict::Approved.code());
	assert_eq!(review.phase(), ReviewPhase::Claimed { task_id: 11, meta: false });
	assert_eq!(server.lock_holder(10), None);
	assert_eq!(server.lock_holder(11).as_deref(), Some("alice"));
	assert_eq!(
		harness.navigator.last(),
		Some(NavTarget::ReviewTask { task_id: 11, meta: false })
	);
}

#[tokio::test]
async fn inbox_strategy_sends_the_verdict_first() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let review = harness.session().review;

	review.claim(10, false).await.expect("Claim must succeed.");

	let outcome = review
		.submit(
			ReviewVerdict::Rejected,
			None,
			NEEDS_REVIEW,
			NextTaskStrategy::Inbox { task_id: 30 },
		)
		.await
		.expect("Submit must succeed.");

	assert!(matches!(outcome, SequenceOutcome::Advanced(ref task) if task.id == 30));
	assert!(server.requests_to(routes::REVIEW_NEXT).is_empty());

	let submit_at = server.position_of(routes::REVIEW_SUBMIT).expect("Verdict must be sent.");
	let lock_at = server
		.requests()
		.iter()
		.position(|req| req.path == "/task/30/review/start")
		.expect("Inbox task must be claimed.");

	assert!(submit_at < lock_at);
}

#[tokio::test]
async fn failed_lookup_keeps_the_submission_and_returns_to_the_queue() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let review = harness.session().review;

	review.claim(10, false).await.expect("Claim must succeed.");
	server.fail_next(routes::REVIEW_NEXT, ServerError::new(500, "timeout"));

	let outcome = review
		.submit(ReviewVerdict::Approved, None, NEEDS_REVIEW, NextTaskStrategy::NextInSortOrder)
		.await
		.expect("Submission must still count.");

	assert!(matches!(outcome, SequenceOutcome::FellBack { .. }));
	assert_eq!(server.reviews().len(), 1);
	assert_eq!(review.phase(), ReviewPhase::Idle);
	assert_eq!(harness.navigator.last(), Some(NavTarget::ReviewQueue { meta: false }));
	assert_eq!(harness.errors.ids(), vec![REVIEW_NEXT_FAILURE]);
}

#[tokio::test]
async fn empty_queue_ends_the_session() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let review = harness.session().review;

	review.claim(10, false).await.expect("Claim must succeed.");

	let outcome = review
		.submit(ReviewVerdict::Approved, None, NEEDS_REVIEW, NextTaskStrategy::NextInSortOrder)
		.await
		.expect("Submit must succeed.");

	assert!(matches!(outcome, SequenceOutcome::Exhausted));
	assert_eq!(review.phase(), ReviewPhase::Idle);
	assert_eq!(harness.navigator.last(), Some(NavTarget::ReviewQueue { meta: false }));
	assert!(harness.errors.ids().is_empty());
}

#[tokio::test]
async fn meta_review_flag_reaches_every_call() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let review = harness.session().review;

	server.respond_next(routes::REVIEW_NEXT, json!([{ "id": 11, "parent": 1 }]));
	review.claim(10, true).await.expect("Claim must succeed.");
	review
		.submit(
			ReviewVerdict::ApprovedWithFixes,
			None,
			ReviewTasksType::MetaReview,
			NextTaskStrategy::NextInSortOrder,
		)
		.await
		.expect("Submit must succeed.");

	for template in [routes::REVIEW_LOCK, routes::REVIEW_SUBMIT, routes::REVIEW_NEXT] {
		for req in server.requests_to(template) {
			assert_eq!(req.params.get(routes::PARAM_META_REVIEW), Some("true"), "{template}");
		}
	}

	assert!(server.reviews()[0].meta);
	assert_eq!(review.phase(), ReviewPhase::Claimed { task_id: 11, meta: true });
}

#[tokio::test]
async fn failed_verdict_keeps_the_claim() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let review = harness.session().review;

	review.claim(10, false).await.expect("Claim must succeed.");
	server.fail_next(routes::REVIEW_SUBMIT, ServerError::new(500, "db down"));

	let err = review
		.submit(
			ReviewVerdict::Approved,
			None,
			NEEDS_REVIEW,
			NextTaskStrategy::Inbox { task_id: 30 },
		)
		.await
		.expect_err("Submit must fail.");

	assert!(matches!(err, Error::Server { status: 500, .. }));
	assert_eq!(review.phase(), ReviewPhase::Claimed { task_id: 10, meta: false });
	assert_eq!(harness.errors.ids(), vec![TASKS_SAVE_FAILURE]);
	assert_eq!(server.lock_holder(10).as_deref(), Some("alice"));
	assert!(server.lock_holder(30).is_none());
}

#[tokio::test]
async fn skip_releases_and_moves_to_the_chosen_task() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let session = harness.session();
	let review = session.review;

	review.claim(10, false).await.expect("Claim must succeed.");

	let outcome = review
		.skip(NEEDS_REVIEW, NextTaskStrategy::Nearby { chosen: Some(12) })
		.await
		.expect("Skip must succeed.");

	session.locks.wait_for_release(10).await;

	assert!(matches!(outcome, SequenceOutcome::Advanced(ref task) if task.id == 12));
	assert!(server.reviews().is_empty());
	assert_eq!(server.lock_holder(10), None);
	assert_eq!(server.lock_holder(12).as_deref(), Some("alice"));
}

#[tokio::test]
async fn nearby_without_a_choice_asks_the_server() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let review = harness.session().review;

	server.respond_next(routes::REVIEW_NEARBY, json!([{ "id": 15, "parent": 1 }]));
	review.claim(10, false).await.expect("Claim must succeed.");
	review
		.submit(
			ReviewVerdict::Disputed,
			None,
			NEEDS_REVIEW,
			NextTaskStrategy::Nearby { chosen: None },
		)
		.await
		.expect("Submit must succeed.");

	let nearby = server.requests_to(routes::REVIEW_NEARBY);

	assert_eq!(nearby[0].path, "/tasks/review/nearby/10");
	assert_eq!(nearby[0].params.get("excludeTasks"), Some("10"));
	assert!(
		server.position_of(routes::REVIEW_SUBMIT) < server.position_of(routes::REVIEW_NEARBY)
	);
	assert_eq!(review.phase(), ReviewPhase::Claimed { task_id: 15, meta: false });
}

#[tokio::test]
async fn next_task_held_by_someone_else_falls_back() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let review = harness.session().review;

	server.force_lock(11, "bob");
	server.respond_next(routes::REVIEW_NEXT, json!({ "id": 11, "parent": 1 }));
	review.claim(10, false).await.expect("Claim must succeed.");

	let outcome = review
		.submit(ReviewVerdict::Approved, None, NEEDS_REVIEW, NextTaskStrategy::NextInSortOrder)
		.await
		.expect("Submission must still count.");

	assert!(matches!(
		outcome,
		SequenceOutcome::FellBack { error: Error::LockDenied { task_id: 11 } }
	));
	assert_eq!(review.phase(), ReviewPhase::Idle);
	assert_eq!(harness.navigator.last(), Some(NavTarget::ReviewQueue { meta: false }));
}

#[tokio::test]
async fn submitting_without_a_claim_is_rejected() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let review = harness.session().review;
	let err = review
		.submit(ReviewVerdict::Approved, None, NEEDS_REVIEW, NextTaskStrategy::NextInSortOrder)
		.await
		.expect_err("Submit must be rejected.");

	assert!(matches!(err, Error::Domain(DomainError::InvalidTransition { .. })));
	assert!(server.requests().is_empty());
}

#[tokio::test]
async fn claiming_another_task_releases_the_current_one() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let session = harness.session();

	session.review.claim(10, false).await.expect("Claim must succeed.");
	session.review.claim(20, false).await.expect("Second claim must succeed.");
	session.locks.wait_for_release(10).await;

	let released = server.requests_to(routes::REVIEW_RELEASE);

	assert_eq!(server.lock_holder(10), None);
	assert_eq!(server.lock_holder(20).as_deref(), Some("alice"));
	assert_eq!(released[0].path, "/task/10/review/cancel");
}

#[tokio::test]
async fn queues_fetch_with_their_own_criteria() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let review = harness.session().review;

	review.set_criteria(
		ReviewTasksType::MetaReview,
		SearchCriteria::new().with_filter("challengeId", 12),
	);
	review.fetch_queue(ReviewTasksType::MetaReview).await.expect("Fetch must be sent.");
	review.fetch_queue(NEEDS_REVIEW).await.expect("Fetch must be sent.");

	let requests = server.requests_to(routes::REVIEW_QUEUE);

	assert_eq!(requests[0].params.get(routes::PARAM_META_REVIEW), Some("true"));
	assert_eq!(requests[0].params.get("cid"), Some("12"));
	assert_eq!(requests[1].params.get("cid"), None);
	assert_eq!(requests[0].params.get("limit"), Some("20"));
	assert!(!review.queue(ReviewTasksType::MetaReview).loading);
}

#[tokio::test]
async fn cancel_during_submission_keeps_the_verdict_and_claims_nothing() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let review = harness.session().review;

	review.claim(10, false).await.expect("Claim must succeed.");

	let gate = server.gate_next(routes::REVIEW_SUBMIT);
	let submit = {
		let review = review.clone();

		tokio::spawn(async move {
			review
				.submit(
					ReviewVerdict::Approved,
					None,
					NEEDS_REVIEW,
					NextTaskStrategy::Inbox { task_id: 11 },
				)
				.await
		})
	};

	assert!(server.arrived(routes::REVIEW_SUBMIT, 1).await);

	review.cancel();
	gate.open();

	let outcome = submit.await.expect("Task must join.").expect("Verdict must still count.");

	assert!(matches!(outcome, SequenceOutcome::Cancelled));
	assert_eq!(server.reviews().len(), 1);
	assert_eq!(review.phase(), ReviewPhase::Idle);
	assert!(server.lock_holder(11).is_none());
	assert!(server.requests_to(routes::REVIEW_LOCK).iter().all(|request| {
		request.path == "/task/10/review/start"
	}));
	assert_eq!(
		harness.navigator.targets(),
		vec![NavTarget::ReviewTask { task_id: 10, meta: false }]
	);
}

#[tokio::test]
async fn cancel_during_a_failed_submission_releases_the_claim() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let session = harness.session();
	let review = session.review.clone();

	review.claim(10, false).await.expect("Claim must succeed.");
	server.fail_next(routes::REVIEW_SUBMIT, ServerError::new(500, "db down"));

	let gate = server.gate_next(routes::REVIEW_SUBMIT);
	let submit = {
		let review = review.clone();

		tokio::spawn(async move {
			review
				.submit(
					ReviewVerdict::Approved,
					None,
					NEEDS_REVIEW,
					NextTaskStrategy::Inbox { task_id: 11 },
				)
				.await
		})
	};

	assert!(server.arrived(routes::REVIEW_SUBMIT, 1).await);

	review.cancel();
	gate.open();

	let err = submit.await.expect("Task must join.").expect_err("Submit must fail.");

	session.locks.wait_for_release(10).await;

	assert!(matches!(err, Error::Server { status: 500, .. }));
	assert_eq!(harness.errors.ids(), vec![TASKS_SAVE_FAILURE]);
	assert_eq!(review.phase(), ReviewPhase::Idle);
	assert!(server.reviews().is_empty());
	assert_eq!(server.lock_holder(10), None);
	assert!(server.lock_holder(11).is_none());
}

#[tokio::test]
async fn superseded_queue_fetch_keeps_the_newer_one_loading() {
	let server = FakeServer::new();
	let harness = Harness::new(&server, "alice");
	let review = harness.session().review;
	let first_gate = server.gate_next(routes::REVIEW_QUEUE);
	let second_gate = server.gate_next(routes::REVIEW_QUEUE);
	let first = {
		let review = review.clone();

		tokio::spawn(async move { review.fetch_queue(NEEDS_REVIEW).await })
	};

	assert!(server.arrived(routes::REVIEW_QUEUE, 1).await);

	let second = {
		let review = review.clone();

		tokio::spawn(async move { review.fetch_queue(NEEDS_REVIEW).await })
	};

	assert!(server.arrived(routes::REVIEW_QUEUE, 2).await);

	first_gate.open();

	let first = first.await.expect("Task must join.").expect("Fetch must be sent.");

	assert!(matches!(first, FetchOutcome::Superseded { .. }));
	assert!(review.queue(NEEDS_REVIEW).loading);

	second_gate.open();

	let second = second.await.expect("Task must join.").expect("Fetch must be sent.");

	assert!(matches!(second, FetchOutcome::Applied { .. }));
	assert!(!review.queue(NEEDS_REVIEW).loading);
}
