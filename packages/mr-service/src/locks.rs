use std::{
	collections::HashMap,
	sync::{Arc, Mutex, MutexGuard},
	time::Duration,
};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use mr_domain::{BundleId, BundleRemoval, Error as DomainError, Task, TaskBundle, TaskId};
use mr_remote::ApiRequest;

use crate::{
	BUNDLE_LOCK_FAILURE, BUNDLE_SAVE_FAILURE, BundleError, Collaborators, Error, ErrorDescriptor,
	NavTarget, Result, StoreUpdate, TASKS_LOCK_FAILURE, TASKS_LOCKED,
	routes::{self, with_meta},
};

/// What this session believes about its own hold on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockHint {
	/// Lock requested, no answer yet.
	Tentative,
	Confirmed,
	/// Unlock sent; the hint outlives it by the grace period.
	Releasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPurpose {
	Edit,
	Review { meta: bool },
}
impl LockPurpose {
	fn lock_request(self, task_id: TaskId) -> ApiRequest {
		match self {
			Self::Edit => ApiRequest::get(routes::TASK_LOCK).var("id", task_id),
			Self::Review { meta } => with_meta(ApiRequest::get(routes::REVIEW_LOCK), meta)
				.var("id", task_id),
		}
	}

	fn release_request(self, task_id: TaskId) -> ApiRequest {
		match self {
			Self::Edit => ApiRequest::get(routes::TASK_RELEASE).var("id", task_id),
			Self::Review { meta } => with_meta(ApiRequest::get(routes::REVIEW_RELEASE), meta)
				.var("id", task_id),
		}
	}

	/// Where the user goes when the task turns out to belong to someone else.
	pub fn exit(self) -> NavTarget {
		match self {
			Self::Edit => NavTarget::Browse,
			Self::Review { meta } => NavTarget::ReviewQueue { meta },
		}
	}
}

#[derive(Debug, Clone, Copy)]
struct HeldTask {
	hint: LockHint,
	purpose: LockPurpose,
	generation: u64,
}

#[derive(Default)]
struct LockState {
	held: HashMap<TaskId, HeldTask>,
	generation: u64,
	releases: HashMap<TaskId, JoinHandle<()>>,
}

struct Inner {
	collab: Collaborators,
	grace: Duration,
	state: Mutex<LockState>,
}

/// Acquires and releases task locks, and keeps bundles all-locked or not at all.
///
/// Unlocks run in the background, but a later lock or bundle edit on the same task waits for the
/// pending release first so the server never sees them reordered.
#[derive(Clone)]
pub struct TaskLockManager {
	inner: Arc<Inner>,
}
impl TaskLockManager {
	pub fn new(cfg: &mr_config::Locks, collab: Collaborators) -> Self {
		Self {
			inner: Arc::new(Inner {
				collab,
				grace: Duration::from_millis(cfg.unlock_grace_ms),
				state: Mutex::new(LockState::default()),
			}),
		}
	}

	pub fn hint(&self, task_id: TaskId) -> Option<LockHint> {
		self.lock_state().held.get(&task_id).map(|held| held.hint)
	}

	/// True from the moment a lock is requested until the grace period after its release.
	pub fn is_locked_by_me(&self, task_id: TaskId) -> bool {
		self.hint(task_id).is_some()
	}

	pub async fn lock(&self, task_id: TaskId) -> Result<Task> {
		self.lock_for(task_id, LockPurpose::Edit).await
	}

	/// Locks the task. A denial reports `tasks.locked` and navigates away from the task.
	pub async fn lock_for(&self, task_id: TaskId, purpose: LockPurpose) -> Result<Task> {
		let err = match self.acquire(task_id, purpose).await {
			Ok(task) => return Ok(task),
			Err(err) => err,
		};

		if let Error::LockDenied { .. } = err {
			tracing::info!(task_id, "Task is locked by another user.");

			self.inner.collab.errors.report(ErrorDescriptor::new(TASKS_LOCKED, err.to_string()));
			self.inner.collab.navigator.navigate(purpose.exit());
		} else {
			tracing::warn!(task_id, error = %err, "Failed to lock task.");

			self.inner.collab.surface(TASKS_LOCK_FAILURE, &err);
		}

		Err(err)
	}

	/// Best effort. The release runs in the background; failures are logged and reported.
	pub fn unlock(&self, task_id: TaskId) {
		let purpose = self.purpose_of(task_id);
		let generation = self.set_hint(task_id, purpose, LockHint::Releasing);
		let previous = self.lock_state().releases.remove(&task_id);
		let this = self.clone();
		let handle = tokio::spawn(async move {
			if let Some(previous) = previous {
				let _ = previous.await;
			}

			this.release(task_id, purpose).await;
			this.expire_hint(task_id, generation);
		});

		self.lock_state().releases.insert(task_id, handle);
	}

	pub async fn unlock_and_wait(&self, task_id: TaskId) {
		self.unlock(task_id);
		self.wait_for_release(task_id).await;
	}

	/// The server already released the lock, e.g. as part of a review submission.
	pub fn mark_released(&self, task_id: TaskId) {
		let purpose = self.purpose_of(task_id);
		let generation = self.set_hint(task_id, purpose, LockHint::Releasing);

		self.expire_hint(task_id, generation);
	}

	/// Extends the lock. If the server says another user now holds the task, the user is moved
	/// away from it just like on a denied lock.
	pub async fn refresh_lock(&self, task_id: TaskId) -> Result<()> {
		let purpose = self.purpose_of(task_id);
		let request = ApiRequest::get(routes::TASK_REFRESH_LOCK).var("id", task_id);
		let err = match self.inner.collab.server.request(request).await {
			Ok(_) => return Ok(()),
			Err(err) if err.is_lock_conflict() => Error::LockDenied { task_id },
			Err(err) => Error::from(err),
		};

		if let Error::LockDenied { .. } = err {
			tracing::info!(task_id, "Lost the task lock to another user.");

			self.clear_hint(task_id);
			self.inner.collab.errors.report(ErrorDescriptor::new(TASKS_LOCKED, err.to_string()));
			self.inner.collab.navigator.navigate(purpose.exit());
		} else {
			tracing::warn!(task_id, error = %err, "Failed to refresh task lock.");

			self.inner.collab.surface(TASKS_LOCK_FAILURE, &err);
		}

		Err(err)
	}

	/// Locks every task, then saves the bundle. On any failure the locks taken here are released
	/// before the error is returned; tasks this session already held stay locked.
	pub async fn create_bundle(
		&self,
		name: &str,
		task_ids: &[TaskId],
	) -> Result<TaskBundle, BundleError> {
		let mut unique = Vec::with_capacity(task_ids.len());

		for task_id in task_ids {
			if !unique.contains(task_id) {
				unique.push(*task_id);
			}
		}

		if unique.len() < 2 {
			return Err(DomainError::BundleTooSmall { count: unique.len() }.into());
		}

		let mut acquired = Vec::new();
		let mut tasks = Vec::with_capacity(unique.len());

		for task_id in unique.iter().copied() {
			let newly_locked = !self.holds(task_id);

			match self.acquire(task_id, LockPurpose::Edit).await {
				Ok(task) => {
					if newly_locked {
						acquired.push(task_id);
					}

					tasks.push(task);
				},
				Err(err) => {
					tracing::warn!(
						task_id,
						error = %err,
						released = acquired.len(),
						"Bundle lock failed. Releasing the tasks locked so far."
					);

					self.release_all(&acquired).await;

					return Err(self.bundle_failure(BundleError::LockFailed {
						task_id,
						source: Box::new(err),
					}));
				},
			}
		}

		let request = ApiRequest::post(routes::BUNDLE_CREATE)
			.body(json!({ "name": name, "taskIds": unique }));
		let created = match self.inner.collab.server.request(request).await {
			Ok(payload) => parse_created_bundle(payload, tasks, unique[0]),
			Err(err) => Err(BundleError::request(err)),
		};

		match created {
			Ok(bundle) => {
				tracing::info!(
					bundle_id = bundle.bundle_id(),
					tasks = bundle.len(),
					"Bundle created."
				);

				self.record_bundle(bundle.bundle_id(), Some(&bundle));

				Ok(bundle)
			},
			Err(err) => {
				self.release_all(&acquired).await;

				Err(self.bundle_failure(err))
			},
		}
	}

	pub async fn add_to_bundle(
		&self,
		bundle: &TaskBundle,
		task_id: TaskId,
	) -> Result<TaskBundle, BundleError> {
		if bundle.contains(task_id) {
			return Err(
				DomainError::AlreadyBundled { bundle_id: bundle.bundle_id(), task_id }.into()
			);
		}

		let newly_locked = !self.holds(task_id);
		let task = match self.acquire(task_id, LockPurpose::Edit).await {
			Ok(task) => task,
			Err(err) =>
				return Err(self.bundle_failure(BundleError::LockFailed {
					task_id,
					source: Box::new(err),
				})),
		};
		let saved = match bundle.with_task(task) {
			Ok(next) => self.send_bundle_request(update_request(&next)).await.map(|_| next),
			Err(err) => Err(err.into()),
		};

		match saved {
			Ok(next) => {
				self.record_bundle(next.bundle_id(), Some(&next));

				Ok(next)
			},
			Err(err) => {
				if newly_locked {
					self.unlock_and_wait(task_id).await;
				}

				Err(self.bundle_failure(err))
			},
		}
	}

	/// Drops one task and releases its lock. Removing from a pair dissolves the bundle and
	/// returns `None`; the remaining task keeps its lock.
	pub async fn remove_from_bundle(
		&self,
		bundle: &TaskBundle,
		task_id: TaskId,
	) -> Result<Option<TaskBundle>, BundleError> {
		let removal = bundle.without_task(task_id)?;
		let request = match &removal {
			BundleRemoval::Remaining(next) => update_request(next),
			BundleRemoval::Dissolved { bundle_id, .. } =>
				ApiRequest::delete(routes::BUNDLE).var("id", *bundle_id),
		};

		if let Err(err) = self.send_bundle_request(request).await {
			return Err(self.bundle_failure(err));
		}

		self.unlock(task_id);

		match removal {
			BundleRemoval::Remaining(next) => {
				self.record_bundle(next.bundle_id(), Some(&next));

				Ok(Some(next))
			},
			BundleRemoval::Dissolved { bundle_id, remaining_task_id } => {
				tracing::info!(bundle_id, ?remaining_task_id, "Bundle dissolved.");

				self.record_bundle(bundle_id, None);

				Ok(None)
			},
		}
	}

	/// Deletes the bundle and releases every task except the primary one.
	pub async fn dissolve_bundle(&self, bundle: &TaskBundle) -> Result<(), BundleError> {
		let request = ApiRequest::delete(routes::BUNDLE).var("id", bundle.bundle_id());

		if let Err(err) = self.send_bundle_request(request).await {
			return Err(self.bundle_failure(err));
		}

		for task_id in bundle.task_ids() {
			if *task_id != bundle.primary_task_id() {
				self.unlock(*task_id);
			}
		}

		self.record_bundle(bundle.bundle_id(), None);

		Ok(())
	}

	/// Waits for a background release of `task_id`, if one is in flight.
	pub async fn wait_for_release(&self, task_id: TaskId) {
		let pending = self.lock_state().releases.remove(&task_id);

		if let Some(handle) = pending
			&& let Err(err) = handle.await
		{
			tracing::warn!(task_id, error = %err, "Release task did not finish.");
		}
	}

	async fn acquire(&self, task_id: TaskId, purpose: LockPurpose) -> Result<Task> {
		self.wait_for_release(task_id).await;

		let previous = self
			.lock_state()
			.held
			.get(&task_id)
			.filter(|held| held.hint == LockHint::Confirmed)
			.map(|held| held.purpose);

		self.set_hint(task_id, purpose, LockHint::Tentative);

		let result = match self.inner.collab.server.request(purpose.lock_request(task_id)).await {
			Ok(payload) => serde_json::from_value::<Task>(payload).map_err(Error::invalid_response),
			Err(err) if err.is_lock_conflict() => Err(Error::LockDenied { task_id }),
			Err(err) => Err(err.into()),
		};

		match (result, previous) {
			(Ok(task), _) => {
				self.set_hint(task_id, purpose, LockHint::Confirmed);

				Ok(task)
			},
			// A lock held before this call is still held on the server.
			(Err(err), Some(held_for)) if !matches!(err, Error::LockDenied { .. }) => {
				self.set_hint(task_id, held_for, LockHint::Confirmed);

				Err(err)
			},
			(Err(err @ Error::InvalidResponse { .. }), _) => {
				// The server granted the lock; give it back since the task is unusable.
				self.unlock_and_wait(task_id).await;

				Err(err)
			},
			(Err(err), _) => {
				self.clear_hint(task_id);

				Err(err)
			},
		}
	}

	async fn release(&self, task_id: TaskId, purpose: LockPurpose) {
		match self.inner.collab.server.request(purpose.release_request(task_id)).await {
			Ok(_) => tracing::debug!(task_id, "Task lock released."),
			Err(err) => {
				let err = Error::from(err);

				tracing::warn!(task_id, error = %err, "Failed to release task lock.");

				self.inner.collab.surface(TASKS_LOCK_FAILURE, &err);
			},
		}
	}

	async fn release_all(&self, task_ids: &[TaskId]) {
		for task_id in task_ids {
			self.unlock(*task_id);
		}
		for task_id in task_ids {
			self.wait_for_release(*task_id).await;
		}
	}

	async fn send_bundle_request(&self, request: ApiRequest) -> Result<Value, BundleError> {
		self.inner.collab.server.request(request).await.map_err(BundleError::request)
	}

	fn bundle_failure(&self, err: BundleError) -> BundleError {
		let id = match err {
			BundleError::LockFailed { .. } => BUNDLE_LOCK_FAILURE,
			_ => BUNDLE_SAVE_FAILURE,
		};

		tracing::warn!(error = %err, "Bundle operation failed.");

		self.inner.collab.surface(id, &Error::Bundle(err.clone()));

		err
	}

	fn record_bundle(&self, bundle_id: BundleId, bundle: Option<&TaskBundle>) {
		self.inner
			.collab
			.store
			.record(StoreUpdate::Bundle { bundle_id, bundle: bundle.cloned() });
	}

	fn holds(&self, task_id: TaskId) -> bool {
		self.hint(task_id) == Some(LockHint::Confirmed)
	}

	fn purpose_of(&self, task_id: TaskId) -> LockPurpose {
		self.lock_state().held.get(&task_id).map(|held| held.purpose).unwrap_or(LockPurpose::Edit)
	}

	fn set_hint(&self, task_id: TaskId, purpose: LockPurpose, hint: LockHint) -> u64 {
		let generation = {
			let mut state = self.lock_state();

			state.generation += 1;

			let generation = state.generation;

			state.held.insert(task_id, HeldTask { hint, purpose, generation });

			generation
		};

		self.inner.collab.store.record(StoreUpdate::LockHint { task_id, hint: Some(hint) });

		generation
	}

	fn clear_hint(&self, task_id: TaskId) {
		if self.lock_state().held.remove(&task_id).is_some() {
			self.inner.collab.store.record(StoreUpdate::LockHint { task_id, hint: None });
		}
	}

	/// Clears the hint after the grace period unless the task was locked again meanwhile.
	fn expire_hint(&self, task_id: TaskId, generation: u64) {
		let this = self.clone();
		let grace = self.inner.grace;

		tokio::spawn(async move {
			tokio::time::sleep(grace).await;

			let cleared = {
				let mut state = this.lock_state();

				match state.held.get(&task_id) {
					Some(held) if held.generation == generation => {
						state.held.remove(&task_id);

						true
					},
					_ => false,
				}
			};

			if cleared {
				this.inner.collab.store.record(StoreUpdate::LockHint { task_id, hint: None });
			}
		});
	}

	fn lock_state(&self) -> MutexGuard<'_, LockState> {
		self.inner.state.lock().unwrap_or_else(|err| err.into_inner())
	}
}

#[derive(Deserialize)]
struct CreatedBundle {
	#[serde(alias = "bundleId")]
	id: BundleId,
	#[serde(default)]
	tasks: Vec<Task>,
}

fn parse_created_bundle(
	payload: Value,
	locked: Vec<Task>,
	primary: TaskId,
) -> Result<TaskBundle, BundleError> {
	let created = serde_json::from_value::<CreatedBundle>(payload)
		.map_err(|err| BundleError::request(Error::invalid_response(err)))?;
	let tasks = if created.tasks.is_empty() { locked } else { created.tasks };

	Ok(TaskBundle::new(created.id, tasks, Some(primary))?)
}

fn update_request(bundle: &TaskBundle) -> ApiRequest {
	let task_ids = bundle.task_ids().iter().map(ToString::to_string).collect::<Vec<_>>().join(",");

	ApiRequest::put(routes::BUNDLE_UPDATE)
		.var("id", bundle.bundle_id())
		.param(routes::PARAM_TASK_IDS, task_ids)
}
