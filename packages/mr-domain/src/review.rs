use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, criteria::SearchCriteria, task::TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewTasksType {
	NeedsReview,
	ReviewedByMe,
	AllReviewed,
	MetaReview,
}
impl ReviewTasksType {
	pub const ALL: [Self; 4] =
		[Self::NeedsReview, Self::ReviewedByMe, Self::AllReviewed, Self::MetaReview];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::NeedsReview => "needs_review",
			Self::ReviewedByMe => "reviewed_by_me",
			Self::AllReviewed => "all_reviewed",
			Self::MetaReview => "meta_review",
		}
	}
}

/// A review verdict. The numeric codes match the server's review status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
	Approved,
	Rejected,
	ApprovedWithFixes,
	Disputed,
}
impl ReviewVerdict {
	pub fn code(self) -> i64 {
		match self {
			Self::Approved => 1,
			Self::Rejected => 2,
			Self::ApprovedWithFixes => 3,
			Self::Disputed => 4,
		}
	}
}

/// How the task after the current one is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "load_by")]
pub enum NextTaskStrategy {
	/// The server picks the next task in the queue's sort order, relative to the current one.
	NextInSortOrder,
	/// The geographically closest task; `chosen` is the user's pick from the candidate set.
	Nearby { chosen: Option<TaskId> },
	/// A specific task picked ahead of time; search criteria are ignored.
	Inbox { task_id: TaskId },
}
impl NextTaskStrategy {
	/// True when the current task is the server's position reference for finding the next one.
	pub fn needs_position_reference(&self) -> bool {
		matches!(self, Self::NextInSortOrder)
	}
}

/// Per-type review queue state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewSequenceState {
	pub review_tasks_type: ReviewTasksType,
	pub criteria: SearchCriteria,
	pub page_size: u32,
	pub loading: bool,
}
impl ReviewSequenceState {
	pub fn new(review_tasks_type: ReviewTasksType, page_size: u32) -> Self {
		Self {
			review_tasks_type,
			criteria: SearchCriteria::new().with_page_size(page_size),
			page_size,
			loading: false,
		}
	}
}

/// One independent [`ReviewSequenceState`] per review type, so switching types keeps each type's
/// criteria intact.
#[derive(Debug, Clone)]
pub struct ReviewQueues {
	default_page_size: u32,
	states: HashMap<ReviewTasksType, ReviewSequenceState>,
}
impl ReviewQueues {
	pub fn new(default_page_size: u32) -> Self {
		Self { default_page_size, states: HashMap::new() }
	}

	pub fn state(&self, kind: ReviewTasksType) -> ReviewSequenceState {
		self.states
			.get(&kind)
			.cloned()
			.unwrap_or_else(|| ReviewSequenceState::new(kind, self.default_page_size))
	}

	pub fn set_criteria(&mut self, kind: ReviewTasksType, criteria: SearchCriteria) {
		self.entry(kind).criteria = criteria;
	}

	pub fn set_page_size(&mut self, kind: ReviewTasksType, page_size: u32) {
		let state = self.entry(kind);

		state.page_size = page_size;
		state.criteria = state.criteria.with_page_size(page_size);
	}

	pub fn set_loading(&mut self, kind: ReviewTasksType, loading: bool) {
		self.entry(kind).loading = loading;
	}

	fn entry(&mut self, kind: ReviewTasksType) -> &mut ReviewSequenceState {
		let page_size = self.default_page_size;

		self.states.entry(kind).or_insert_with(|| ReviewSequenceState::new(kind, page_size))
	}
}

/// Where a review session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum ReviewPhase {
	Idle,
	Claimed { task_id: TaskId, meta: bool },
	Submitting { task_id: TaskId, meta: bool },
	Sequencing { from_task_id: TaskId, meta: bool },
}
impl ReviewPhase {
	pub fn name(&self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Claimed { .. } => "claimed",
			Self::Submitting { .. } => "submitting",
			Self::Sequencing { .. } => "sequencing",
		}
	}

	pub fn task_id(&self) -> Option<TaskId> {
		match self {
			Self::Idle => None,
			Self::Claimed { task_id, .. } | Self::Submitting { task_id, .. } => Some(*task_id),
			Self::Sequencing { from_task_id, .. } => Some(*from_task_id),
		}
	}

	pub fn transition(self, event: ReviewEvent) -> Result<Self> {
		let next = match (self, event) {
			(Self::Idle, ReviewEvent::Claimed { task_id, meta }) => Self::Claimed { task_id, meta },
			(Self::Claimed { task_id, meta }, ReviewEvent::Submit) =>
				Self::Submitting { task_id, meta },
			(Self::Claimed { task_id, meta }, ReviewEvent::Skip) =>
				Self::Sequencing { from_task_id: task_id, meta },
			(Self::Submitting { task_id, meta }, ReviewEvent::Submitted) =>
				Self::Sequencing { from_task_id: task_id, meta },
			(Self::Submitting { task_id, meta }, ReviewEvent::SubmitFailed) =>
				Self::Claimed { task_id, meta },
			(Self::Sequencing { .. }, ReviewEvent::Claimed { task_id, meta }) =>
				Self::Claimed { task_id, meta },
			(Self::Sequencing { .. }, ReviewEvent::Exhausted) => Self::Idle,
			(_, ReviewEvent::Cancel) => Self::Idle,
			(phase, event) =>
				return Err(Error::InvalidTransition { phase: phase.name(), event: event.name() }),
		};

		Ok(next)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewEvent {
	Claimed { task_id: TaskId, meta: bool },
	Submit,
	Submitted,
	SubmitFailed,
	Skip,
	Exhausted,
	Cancel,
}
impl ReviewEvent {
	pub fn name(&self) -> &'static str {
		match self {
			Self::Claimed { .. } => "claim a task",
			Self::Submit => "submit a review",
			Self::Submitted => "finish a submission",
			Self::SubmitFailed => "fail a submission",
			Self::Skip => "skip a task",
			Self::Exhausted => "end the queue",
			Self::Cancel => "cancel",
		}
	}
}
