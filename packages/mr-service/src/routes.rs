//! Server path templates. Placeholders are filled from [`mr_remote::ApiRequest::var`].

pub const TASK_LOCK: &str = "/task/{id}/start";
pub const TASK_RELEASE: &str = "/task/{id}/release";
pub const TASK_REFRESH_LOCK: &str = "/task/{id}/refreshLock";
pub const REVIEW_LOCK: &str = "/task/{id}/review/start";
pub const REVIEW_RELEASE: &str = "/task/{id}/review/cancel";
pub const REVIEW_SUBMIT: &str = "/task/{id}/review/{status}";
pub const REVIEW_NEXT: &str = "/tasks/review/next";
pub const REVIEW_NEARBY: &str = "/tasks/review/nearby/{id}";
pub const REVIEW_QUEUE: &str = "/tasks/review";
pub const REVIEWED_QUEUE: &str = "/tasks/reviewed";
pub const BUNDLE_CREATE: &str = "/taskBundle";
pub const BUNDLE: &str = "/taskBundle/{id}";
pub const BUNDLE_UPDATE: &str = "/taskBundle/{id}/update";
pub const CHALLENGE_SEARCH: &str = "/challenges/extendedFind";
pub const TASK_CLUSTERS: &str = "/taskCluster";
pub const BOUNDED_TASKS: &str = "/tasks/box/{left}/{bottom}/{right}/{top}";

pub const PARAM_META_REVIEW: &str = "asMetaReview";
pub const PARAM_AS_REVIEWER: &str = "asReviewer";
pub const PARAM_ALLOW_REVIEW_NEEDED: &str = "allowReviewNeeded";
pub const PARAM_LAST_TASK: &str = "lastTaskId";
pub const PARAM_CHALLENGE_ID: &str = "cid";
pub const PARAM_TASK_IDS: &str = "taskIds";
pub const PARAM_COMMENT: &str = "comment";

pub(crate) fn with_meta(request: mr_remote::ApiRequest, meta: bool) -> mr_remote::ApiRequest {
	if meta { request.param(PARAM_META_REVIEW, "true") } else { request }
}
