use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use mr_domain::{
	Error as DomainError, NextTaskStrategy, ReviewEvent, ReviewPhase, ReviewQueues,
	ReviewSequenceState, ReviewTasksType, ReviewVerdict, SearchCriteria, Task, TaskId,
	compile_criteria,
};
use mr_remote::ApiRequest;

use crate::{
	Collaborators, Error, NavTarget, REVIEW_NEXT_FAILURE, Result, StoreUpdate, TASKS_SAVE_FAILURE,
	locks::{LockPurpose, TaskLockManager},
	routes::{self, with_meta},
	search::{FetchOutcome, SearchCoordinator, SearchTarget},
};

/// Where a review session ends up after a submit or skip.
#[derive(Debug)]
pub enum SequenceOutcome {
	/// The next task is claimed and on screen.
	Advanced(Task),
	/// Nothing left to review; the user is at the queue root.
	Exhausted,
	/// The previous step stands, but no next task could be loaded or claimed. The user is at
	/// the queue root.
	FellBack { error: Error },
	/// The session was cancelled while the verdict was in flight. The verdict still counts;
	/// nothing further was claimed.
	Cancelled,
}

struct Inner {
	collab: Collaborators,
	locks: TaskLockManager,
	search: SearchCoordinator,
	phase: Mutex<ReviewPhase>,
	queues: Mutex<ReviewQueues>,
}

/// Drives claim, submit and move-to-next for reviewers and meta-reviewers.
#[derive(Clone)]
pub struct ReviewSequencer {
	inner: Arc<Inner>,
}
impl ReviewSequencer {
	pub fn new(
		cfg: &mr_config::Review,
		collab: Collaborators,
		locks: TaskLockManager,
		search: SearchCoordinator,
	) -> Self {
		Self {
			inner: Arc::new(Inner {
				collab,
				locks,
				search,
				phase: Mutex::new(ReviewPhase::Idle),
				queues: Mutex::new(ReviewQueues::new(cfg.page_size)),
			}),
		}
	}

	pub fn phase(&self) -> ReviewPhase {
		*self.lock_phase()
	}

	pub fn queue(&self, kind: ReviewTasksType) -> ReviewSequenceState {
		self.lock_queues().state(kind)
	}

	pub fn set_criteria(&self, kind: ReviewTasksType, criteria: SearchCriteria) {
		self.update_queue(kind, |queues| queues.set_criteria(kind, criteria));
	}

	pub fn set_page_size(&self, kind: ReviewTasksType, page_size: u32) {
		self.update_queue(kind, |queues| queues.set_page_size(kind, page_size));
	}

	/// Loads one page of the queue using that queue's own criteria.
	pub async fn fetch_queue(&self, kind: ReviewTasksType) -> Result<FetchOutcome> {
		self.update_queue(kind, |queues| queues.set_loading(kind, true));

		let criteria = self.queue(kind).criteria;
		let outcome = self.inner.search.fetch_review_queue(kind, &criteria).await;
		// A superseded response must not end the newer request's loading state.
		let loading = self.inner.search.is_loading(SearchTarget::ReviewQueue(kind));

		self.update_queue(kind, |queues| queues.set_loading(kind, loading));

		outcome
	}

	/// Locks the task for review. Whatever task was claimed before is released first.
	pub async fn claim(&self, task_id: TaskId, meta: bool) -> Result<Task> {
		if self.phase() != ReviewPhase::Idle {
			self.cancel();
		}

		let task = self.inner.locks.lock_for(task_id, LockPurpose::Review { meta }).await?;

		self.transition(ReviewEvent::Claimed { task_id, meta })?;
		self.inner.collab.navigator.navigate(NavTarget::ReviewTask { task_id, meta });

		Ok(task)
	}

	/// Records the verdict on the claimed task and moves on.
	///
	/// With [`NextTaskStrategy::NextInSortOrder`] the next task is looked up before the verdict
	/// is sent, because the server locates it relative to the current task's position. Other
	/// strategies send the verdict first. Only a failed verdict is an error; a failed lookup
	/// still counts the review as submitted.
	pub async fn submit(
		&self,
		verdict: ReviewVerdict,
		comment: Option<&str>,
		kind: ReviewTasksType,
		strategy: NextTaskStrategy,
	) -> Result<SequenceOutcome> {
		let (task_id, meta) = match self.transition(ReviewEvent::Submit)? {
			ReviewPhase::Submitting { task_id, meta } => (task_id, meta),
			phase => return Err(invalid_transition(phase, ReviewEvent::Submit)),
		};
		let criteria = self.queue(kind).criteria;
		let early = if strategy.needs_position_reference() {
			Some(self.find_next(task_id, meta, &criteria, strategy).await)
		} else {
			None
		};

		if let Err(err) = self.send_verdict(task_id, meta, verdict, comment).await {
			tracing::warn!(task_id, error = %err, "Failed to submit review.");

			self.inner.collab.surface(TASKS_SAVE_FAILURE, &err);

			// A cancel during the request left the task locked with no session to own it.
			if self.transition(ReviewEvent::SubmitFailed).is_err() {
				self.inner.locks.unlock(task_id);
			}

			return Err(err);
		}

		tracing::info!(task_id, meta, verdict = verdict.code(), "Review submitted.");

		self.inner.locks.mark_released(task_id);

		if let Err(err) = self.transition(ReviewEvent::Submitted) {
			tracing::info!(task_id, error = %err, "Review session ended during submission.");

			return Ok(SequenceOutcome::Cancelled);
		}

		let next = match early {
			Some(next) => next,
			None => self.find_next(task_id, meta, &criteria, strategy).await,
		};

		Ok(self.advance(next, meta).await)
	}

	/// Gives the claimed task back without a verdict and moves on.
	pub async fn skip(
		&self,
		kind: ReviewTasksType,
		strategy: NextTaskStrategy,
	) -> Result<SequenceOutcome> {
		let (task_id, meta) = match self.transition(ReviewEvent::Skip)? {
			ReviewPhase::Sequencing { from_task_id, meta } => (from_task_id, meta),
			phase => return Err(invalid_transition(phase, ReviewEvent::Skip)),
		};
		let criteria = self.queue(kind).criteria;

		self.inner.locks.unlock(task_id);

		let next = self.find_next(task_id, meta, &criteria, strategy).await;

		Ok(self.advance(next, meta).await)
	}

	/// Leaves the session, releasing a claimed task.
	pub fn cancel(&self) {
		let previous = self.phase();

		if let ReviewPhase::Claimed { task_id, .. } = previous {
			self.inner.locks.unlock(task_id);
		}

		if previous != ReviewPhase::Idle {
			self.settle(ReviewEvent::Cancel);
		}
	}

	async fn find_next(
		&self,
		from: TaskId,
		meta: bool,
		criteria: &SearchCriteria,
		strategy: NextTaskStrategy,
	) -> Result<Option<TaskId>> {
		let request = match strategy {
			NextTaskStrategy::NextInSortOrder => ApiRequest::get(routes::REVIEW_NEXT)
				.params(compile_criteria(criteria, &[]))
				.param(routes::PARAM_LAST_TASK, from.to_string()),
			NextTaskStrategy::Nearby { chosen: Some(task_id) } => return Ok(Some(task_id)),
			NextTaskStrategy::Nearby { chosen: None } => ApiRequest::get(routes::REVIEW_NEARBY)
				.var("id", from)
				.params(compile_criteria(criteria, &[from]))
				.param(mr_domain::compile::PARAM_LIMIT, "1"),
			NextTaskStrategy::Inbox { task_id } => return Ok(Some(task_id)),
		};

		match self.inner.collab.server.request(with_meta(request, meta)).await {
			Ok(payload) => next_task_id(&payload),
			Err(err) if err.status == Some(404) => Ok(None),
			Err(err) => Err(err.into()),
		}
	}

	async fn send_verdict(
		&self,
		task_id: TaskId,
		meta: bool,
		verdict: ReviewVerdict,
		comment: Option<&str>,
	) -> Result<()> {
		let mut request = ApiRequest::put(routes::REVIEW_SUBMIT)
			.var("id", task_id)
			.var("status", verdict.code());

		if let Some(comment) = comment.filter(|comment| !comment.trim().is_empty()) {
			request = request.param(routes::PARAM_COMMENT, comment);
		}

		self.inner.collab.server.request(with_meta(request, meta)).await?;

		Ok(())
	}

	async fn advance(&self, next: Result<Option<TaskId>>, meta: bool) -> SequenceOutcome {
		let queue_root = NavTarget::ReviewQueue { meta };
		let task_id = match next {
			Ok(Some(task_id)) => task_id,
			Ok(None) => {
				tracing::info!(meta, "Review queue exhausted.");

				self.settle(ReviewEvent::Exhausted);
				self.inner.collab.navigator.navigate(queue_root);

				return SequenceOutcome::Exhausted;
			},
			Err(error) => {
				tracing::warn!(error = %error, "Failed to load the next review task.");

				self.inner.collab.surface(REVIEW_NEXT_FAILURE, &error);
				self.settle(ReviewEvent::Exhausted);
				self.inner.collab.navigator.navigate(queue_root);

				return SequenceOutcome::FellBack { error };
			},
		};

		match self.inner.locks.lock_for(task_id, LockPurpose::Review { meta }).await {
			Ok(task) => {
				self.settle(ReviewEvent::Claimed { task_id, meta });
				self.inner.collab.navigator.navigate(NavTarget::ReviewTask { task_id, meta });

				SequenceOutcome::Advanced(task)
			},
			Err(error) => {
				self.settle(ReviewEvent::Exhausted);

				// A denial already moved the user to the queue root.
				if !matches!(error, Error::LockDenied { .. }) {
					self.inner.collab.navigator.navigate(queue_root);
				}

				SequenceOutcome::FellBack { error }
			},
		}
	}

	fn transition(&self, event: ReviewEvent) -> Result<ReviewPhase> {
		let next = {
			let mut phase = self.lock_phase();
			let next = phase.transition(event)?;

			*phase = next;

			next
		};

		self.inner.collab.store.record(StoreUpdate::ReviewPhase { phase: next });

		Ok(next)
	}

	/// Like `transition`, for steps where a concurrent cancel may already have moved the session.
	fn settle(&self, event: ReviewEvent) {
		if let Err(err) = self.transition(event) {
			tracing::debug!(error = %err, "Review session moved on before this step.");
		}
	}

	fn update_queue(&self, kind: ReviewTasksType, edit: impl FnOnce(&mut ReviewQueues)) {
		let state = {
			let mut queues = self.lock_queues();

			edit(&mut queues);

			queues.state(kind)
		};

		self.inner.collab.store.record(StoreUpdate::ReviewQueue { state });
	}

	fn lock_phase(&self) -> MutexGuard<'_, ReviewPhase> {
		self.inner.phase.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn lock_queues(&self) -> MutexGuard<'_, ReviewQueues> {
		self.inner.queues.lock().unwrap_or_else(|err| err.into_inner())
	}
}

/// The next-task endpoints answer with a task, a list of candidates, or nothing.
fn next_task_id(payload: &Value) -> Result<Option<TaskId>> {
	let task = match payload {
		Value::Null => return Ok(None),
		Value::Array(items) => match items.first() {
			Some(task) => task,
			None => return Ok(None),
		},
		task => task,
	};

	task.get("id")
		.and_then(Value::as_u64)
		.map(Some)
		.ok_or_else(|| Error::InvalidResponse { message: "next task has no id.".to_string() })
}

fn invalid_transition(phase: ReviewPhase, event: ReviewEvent) -> Error {
	DomainError::InvalidTransition { phase: phase.name(), event: event.name() }.into()
}
