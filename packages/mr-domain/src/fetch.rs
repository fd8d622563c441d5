use std::{
	collections::HashMap,
	fmt::{Display, Formatter},
	sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};

use crate::{
	ordered_id::{IdGenerator, MonotonicIds, OrderedId},
	review::ReviewTasksType,
	task::ChallengeId,
};

/// Names one independent search context. Responses in different groups never affect each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(String);
impl GroupKey {
	pub fn new(key: impl Into<String>) -> Self {
		Self(key.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn challenge_search() -> Self {
		Self::new("challenges")
	}

	pub fn task_clusters(challenge_id: Option<ChallengeId>) -> Self {
		match challenge_id {
			Some(id) => Self(format!("clusters:{id}")),
			None => Self::new("clusters"),
		}
	}

	pub fn bounded_tasks() -> Self {
		Self::new("bounded_tasks")
	}

	pub fn review_queue(kind: ReviewTasksType) -> Self {
		Self(format!("review:{}", kind.as_str()))
	}
}
impl Display for GroupKey {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchStatus {
	Pending,
	Success,
	Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchEnvelope<T> {
	pub id: OrderedId,
	pub group_key: GroupKey,
	pub status: FetchStatus,
	pub payload: Option<T>,
	pub total_count: Option<u64>,
	pub error: Option<String>,
}
impl<T> FetchEnvelope<T> {
	pub fn pending(group_key: GroupKey, id: OrderedId) -> Self {
		Self {
			id,
			group_key,
			status: FetchStatus::Pending,
			payload: None,
			total_count: None,
			error: None,
		}
	}

	pub fn success(
		group_key: GroupKey,
		id: OrderedId,
		payload: T,
		total_count: Option<u64>,
	) -> Self {
		Self {
			id,
			group_key,
			status: FetchStatus::Success,
			payload: Some(payload),
			total_count,
			error: None,
		}
	}

	pub fn error(group_key: GroupKey, id: OrderedId, message: impl Into<String>) -> Self {
		Self {
			id,
			group_key,
			status: FetchStatus::Error,
			payload: None,
			total_count: None,
			error: Some(message.into()),
		}
	}
}

#[derive(Debug, Default)]
struct SequencerState {
	last_accepted: HashMap<GroupKey, OrderedId>,
	last_issued: HashMap<GroupKey, OrderedId>,
}

/// Decides which of several overlapping responses for the same group may touch visible state.
///
/// There is no cancellation: superseded requests still complete, and `accept` turns their
/// envelopes away when they arrive.
pub struct FetchSequencer {
	ids: Arc<dyn IdGenerator>,
	state: Mutex<SequencerState>,
}
impl FetchSequencer {
	pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
		Self { ids, state: Mutex::new(SequencerState::default()) }
	}

	pub fn issue(&self, group: &GroupKey) -> OrderedId {
		let id = self.ids.next_id();
		let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());
		let entry = state.last_issued.entry(group.clone()).or_insert(id);

		if id > *entry {
			*entry = id;
		}

		id
	}

	/// Accepts the envelope when its id is at least the last accepted id for the group. Ties go
	/// to the envelope processed last, so `Pending` then `Success` for one request both land.
	pub fn accept(&self, group: &GroupKey, id: OrderedId, status: FetchStatus) -> bool {
		let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());

		if let Some(last) = state.last_accepted.get(group)
			&& id < *last
		{
			tracing::debug!(
				group = %group,
				%id,
				last = %last,
				?status,
				"Discarding stale fetch envelope."
			);

			return false;
		}

		state.last_accepted.insert(group.clone(), id);

		true
	}

	pub fn last_accepted(&self, group: &GroupKey) -> Option<OrderedId> {
		self.state.lock().unwrap_or_else(|err| err.into_inner()).last_accepted.get(group).copied()
	}

	/// True once a newer request than `id` has been issued for the group.
	pub fn is_superseded(&self, group: &GroupKey, id: OrderedId) -> bool {
		self.state
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.last_issued
			.get(group)
			.map(|latest| *latest > id)
			.unwrap_or(false)
	}
}
impl Default for FetchSequencer {
	fn default() -> Self {
		Self::new(Arc::new(MonotonicIds::new()))
	}
}
