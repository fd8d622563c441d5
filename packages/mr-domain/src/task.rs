use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

pub type TaskId = u64;
pub type ChallengeId = u64;

/// Review status meaning "no review has been requested for this task yet".
pub const REVIEW_STATUS_NOT_SET: i64 = -1;

/// A task as returned by the server. Only the fields the coordination layer reads are typed; the
/// rest of the payload is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
	pub id: TaskId,
	pub parent: ChallengeId,
	#[serde(default)]
	pub status: Option<i64>,
	#[serde(default)]
	pub review_status: Option<i64>,
	#[serde(default)]
	pub meta_review_status: Option<i64>,
	#[serde(default)]
	pub bundle_id: Option<u64>,
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub mapped_on: Option<OffsetDateTime>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl Task {
	pub fn new(id: TaskId, parent: ChallengeId) -> Self {
		Self {
			id,
			parent,
			status: None,
			review_status: None,
			meta_review_status: None,
			bundle_id: None,
			mapped_on: None,
			extra: Map::new(),
		}
	}

	pub fn is_bundled(&self) -> bool {
		self.bundle_id.is_some()
	}
}
