use std::{
	sync::{Arc, Mutex},
	time::Duration,
};

use serde_json::Value;
use tokio::task::JoinHandle;

use mr_domain::{
	Applied, BoundsPolicy, ChallengeId, Error as DomainError, FetchEnvelope, FetchSequencer,
	GroupKey, GroupResults, OrderedId, ResultCache, ReviewTasksType, SearchCriteria,
	compile_criteria,
};
use mr_remote::ApiRequest;

use crate::{
	Collaborators, Error, Result, SEARCH_FETCH_FAILURE, StoreUpdate, TASKS_FETCH_FAILURE,
	debounce::Debouncer, routes,
};

/// What a search fetches. Each target owns one result group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTarget {
	Challenges,
	TaskClusters { challenge_id: Option<ChallengeId> },
	BoundedTasks,
	ReviewQueue(ReviewTasksType),
}
impl SearchTarget {
	pub fn group_key(&self) -> GroupKey {
		match self {
			Self::Challenges => GroupKey::challenge_search(),
			Self::TaskClusters { challenge_id } => GroupKey::task_clusters(*challenge_id),
			Self::BoundedTasks => GroupKey::bounded_tasks(),
			Self::ReviewQueue(kind) => GroupKey::review_queue(*kind),
		}
	}

	fn error_id(&self) -> &'static str {
		match self {
			Self::Challenges => SEARCH_FETCH_FAILURE,
			_ => TASKS_FETCH_FAILURE,
		}
	}
}

#[derive(Debug)]
pub enum FetchOutcome {
	Applied { id: OrderedId, total_count: Option<u64> },
	Failed { id: OrderedId, error: Error },
	/// A newer fetch for the same group landed first; nothing changed.
	Superseded { id: OrderedId },
}
impl FetchOutcome {
	pub fn id(&self) -> OrderedId {
		match self {
			Self::Applied { id, .. } | Self::Failed { id, .. } | Self::Superseded { id } => *id,
		}
	}
}

struct Inner {
	collab: Collaborators,
	sequencer: FetchSequencer,
	cache: Mutex<ResultCache<Value>>,
	policy: BoundsPolicy,
	cluster_threshold: u64,
	debouncer: Debouncer,
}

/// Issues searches, sequences their responses per group and keeps the visible results.
#[derive(Clone)]
pub struct SearchCoordinator {
	inner: Arc<Inner>,
}
impl SearchCoordinator {
	pub fn new(cfg: &mr_config::Search, collab: Collaborators) -> Self {
		let sequencer = FetchSequencer::new(collab.ids.clone());

		Self {
			inner: Arc::new(Inner {
				collab,
				sequencer,
				cache: Mutex::new(ResultCache::new()),
				policy: BoundsPolicy::from(cfg),
				cluster_threshold: u64::from(cfg.cluster_threshold),
				debouncer: Debouncer::new(Duration::from_millis(cfg.debounce_ms)),
			}),
		}
	}

	pub fn results(&self, target: SearchTarget) -> Option<GroupResults<Value>> {
		self.lock_cache().get(&target.group_key()).cloned()
	}

	pub fn is_loading(&self, target: SearchTarget) -> bool {
		self.lock_cache().is_loading(&target.group_key())
	}

	pub fn sequencer(&self) -> &FetchSequencer {
		&self.inner.sequencer
	}

	pub async fn fetch_challenges(&self, criteria: &SearchCriteria) -> Result<FetchOutcome> {
		self.fetch(SearchTarget::Challenges, criteria).await
	}

	pub async fn fetch_clusters(
		&self,
		challenge_id: Option<ChallengeId>,
		criteria: &SearchCriteria,
	) -> Result<FetchOutcome> {
		self.fetch(SearchTarget::TaskClusters { challenge_id }, criteria).await
	}

	/// Enumerates the tasks inside the criteria's map bounds. Boxes wider than the configured
	/// span are rejected before any request goes out.
	pub async fn fetch_bounded_tasks(&self, criteria: &SearchCriteria) -> Result<FetchOutcome> {
		self.fetch(SearchTarget::BoundedTasks, criteria).await
	}

	/// Picks what the map shows for `task_count` tasks in view: the tasks themselves when the
	/// criteria carry an admissible box and the count is within `cluster_threshold`, clusters
	/// otherwise.
	pub fn map_target(
		&self,
		challenge_id: Option<ChallengeId>,
		criteria: &SearchCriteria,
		task_count: u64,
	) -> SearchTarget {
		let admissible = criteria
			.map_bounds()
			.is_some_and(|bounds| self.inner.policy.admit_for_tasks(bounds).is_ok());

		if admissible && task_count <= self.inner.cluster_threshold {
			SearchTarget::BoundedTasks
		} else {
			SearchTarget::TaskClusters { challenge_id }
		}
	}

	pub async fn fetch_map_tasks(
		&self,
		challenge_id: Option<ChallengeId>,
		criteria: &SearchCriteria,
		task_count: u64,
	) -> Result<(SearchTarget, FetchOutcome)> {
		let target = self.map_target(challenge_id, criteria, task_count);

		tracing::debug!(?target, task_count, "Map fetch target chosen.");

		Ok((target, self.fetch(target, criteria).await?))
	}

	pub async fn fetch_review_queue(
		&self,
		kind: ReviewTasksType,
		criteria: &SearchCriteria,
	) -> Result<FetchOutcome> {
		self.fetch(SearchTarget::ReviewQueue(kind), criteria).await
	}

	/// Fails only when the request cannot be built; server failures come back as
	/// [`FetchOutcome::Failed`] after being reported.
	pub async fn fetch(
		&self,
		target: SearchTarget,
		criteria: &SearchCriteria,
	) -> Result<FetchOutcome> {
		let request = self.build_request(target, criteria)?;
		let group = target.group_key();
		let id = self.inner.sequencer.issue(&group);

		self.apply(FetchEnvelope::pending(group.clone(), id));

		match self.inner.collab.server.request(request).await {
			Ok(payload) => {
				let total_count = total_count(&payload);

				match self.apply(FetchEnvelope::success(group, id, payload, total_count)) {
					Applied::Discarded => Ok(FetchOutcome::Superseded { id }),
					_ => Ok(FetchOutcome::Applied { id, total_count }),
				}
			},
			Err(err) => {
				let error = Error::from(err);

				if let Applied::Discarded =
					self.apply(FetchEnvelope::error(group.clone(), id, error.to_string()))
				{
					return Ok(FetchOutcome::Superseded { id });
				}

				tracing::warn!(group = %group, %id, error = %error, "Search fetch failed.");

				self.inner.collab.surface(target.error_id(), &error);

				Ok(FetchOutcome::Failed { id, error })
			},
		}
	}

	/// Fetches after the debounce delay, unless another debounced search replaces this one first.
	pub fn search_debounced(
		&self,
		target: SearchTarget,
		criteria: SearchCriteria,
	) -> JoinHandle<()> {
		let this = self.clone();

		self.inner.debouncer.schedule(async move {
			if let Err(err) = this.fetch(target, &criteria).await {
				tracing::warn!(error = %err, "Debounced search was not sent.");
			}
		})
	}

	pub fn cancel_debounced(&self) {
		self.inner.debouncer.cancel();
	}

	fn build_request(&self, target: SearchTarget, criteria: &SearchCriteria) -> Result<ApiRequest> {
		let mut params = compile_criteria(criteria, &[]);
		let request = match target {
			SearchTarget::Challenges => ApiRequest::get(routes::CHALLENGE_SEARCH),
			SearchTarget::TaskClusters { challenge_id } => {
				if let Some(challenge_id) = challenge_id {
					params.insert(routes::PARAM_CHALLENGE_ID, challenge_id.to_string());
				}

				ApiRequest::get(routes::TASK_CLUSTERS)
			},
			SearchTarget::BoundedTasks => {
				let bounds = criteria.map_bounds().ok_or_else(|| DomainError::InvalidBounds {
					message: "map bounds are required to enumerate tasks.".to_string(),
				})?;
				let bounds = self.inner.policy.admit_for_tasks(bounds)?;

				ApiRequest::get(routes::BOUNDED_TASKS)
					.var("left", bounds.west())
					.var("bottom", bounds.south())
					.var("right", bounds.east())
					.var("top", bounds.north())
			},
			SearchTarget::ReviewQueue(kind) => match kind {
				ReviewTasksType::NeedsReview => ApiRequest::get(routes::REVIEW_QUEUE),
				ReviewTasksType::ReviewedByMe => ApiRequest::get(routes::REVIEWED_QUEUE)
					.param(routes::PARAM_AS_REVIEWER, "true"),
				ReviewTasksType::AllReviewed => ApiRequest::get(routes::REVIEWED_QUEUE)
					.param(routes::PARAM_ALLOW_REVIEW_NEEDED, "true"),
				ReviewTasksType::MetaReview => ApiRequest::get(routes::REVIEW_QUEUE)
					.param(routes::PARAM_META_REVIEW, "true"),
			},
		};
		let mut merged = request.query().clone();

		for (key, value) in params.iter() {
			merged.insert(key, value);
		}

		Ok(request.params(merged))
	}

	fn apply(&self, envelope: FetchEnvelope<Value>) -> Applied {
		let group = envelope.group_key.clone();
		let (applied, snapshot) = {
			let mut cache = self.lock_cache();
			let applied = cache.apply(&self.inner.sequencer, envelope);

			(applied, cache.get(&group).cloned())
		};

		if !matches!(applied, Applied::Discarded)
			&& let Some(results) = snapshot
		{
			self.inner.collab.store.record(StoreUpdate::Results { group, results });
		}

		applied
	}

	fn lock_cache(&self) -> std::sync::MutexGuard<'_, ResultCache<Value>> {
		self.inner.cache.lock().unwrap_or_else(|err| err.into_inner())
	}
}

/// Paged endpoints wrap results as `{"total": n, ...}`; plain arrays count themselves.
fn total_count(payload: &Value) -> Option<u64> {
	payload
		.get("total")
		.and_then(Value::as_u64)
		.or_else(|| payload.as_array().map(|items| items.len() as u64))
}
