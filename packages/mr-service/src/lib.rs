pub mod debounce;
pub mod locks;
pub mod review;
pub mod routes;
pub mod search;

mod error;

pub use error::{BundleError, Error, Result, ServerError};
pub use locks::{LockHint, LockPurpose, TaskLockManager};
pub use review::{ReviewSequencer, SequenceOutcome};
pub use search::{FetchOutcome, SearchCoordinator, SearchTarget};

use std::{future::Future, pin::Pin, sync::Arc};

use serde::Serialize;
use serde_json::Value;

use mr_config::Config;
use mr_domain::{
	BundleId, GroupKey, GroupResults, IdGenerator, MonotonicIds, ReviewPhase, ReviewSequenceState,
	TaskBundle, TaskId,
};
use mr_remote::{ApiRequest, RemoteClient};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const TASKS_FETCH_FAILURE: &str = "tasks.fetch_failure";
pub const SEARCH_FETCH_FAILURE: &str = "search.fetch_failure";
pub const TASKS_SAVE_FAILURE: &str = "tasks.save_failure";
pub const TASKS_LOCK_FAILURE: &str = "tasks.lock_failure";
pub const TASKS_LOCKED: &str = "tasks.locked";
pub const BUNDLE_LOCK_FAILURE: &str = "bundle.lock_failure";
pub const BUNDLE_SAVE_FAILURE: &str = "bundle.save_failure";
pub const REVIEW_NEXT_FAILURE: &str = "review.next_failure";
pub const USER_UNAUTHORIZED: &str = "user.unauthorized";

/// The remote server. Resolves to the parsed JSON payload, `Value::Null` for empty bodies.
pub trait Server
where
	Self: Send + Sync,
{
	fn request<'a>(&'a self, request: ApiRequest) -> BoxFuture<'a, Result<Value, ServerError>>;
}

/// Receives every visible state change.
pub trait Store
where
	Self: Send + Sync,
{
	fn record(&self, update: StoreUpdate);
}

pub trait ErrorReporter
where
	Self: Send + Sync,
{
	fn report(&self, error: ErrorDescriptor);
}

pub trait Navigator
where
	Self: Send + Sync,
{
	fn navigate(&self, target: NavTarget);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDescriptor {
	pub id: &'static str,
	pub message: String,
}
impl ErrorDescriptor {
	pub fn new(id: &'static str, message: impl Into<String>) -> Self {
		Self { id, message: message.into() }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "to")]
pub enum NavTarget {
	/// Out of any task context.
	Browse,
	ReviewTask { task_id: TaskId, meta: bool },
	/// The root of the review queue.
	ReviewQueue { meta: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StoreUpdate {
	Results { group: GroupKey, results: GroupResults<Value> },
	LockHint { task_id: TaskId, hint: Option<LockHint> },
	Bundle { bundle_id: BundleId, bundle: Option<TaskBundle> },
	ReviewPhase { phase: ReviewPhase },
	ReviewQueue { state: ReviewSequenceState },
	LoggedOut,
}

#[derive(Clone)]
pub struct Collaborators {
	pub server: Arc<dyn Server>,
	pub store: Arc<dyn Store>,
	pub errors: Arc<dyn ErrorReporter>,
	pub navigator: Arc<dyn Navigator>,
	pub ids: Arc<dyn IdGenerator>,
}
impl Collaborators {
	pub fn new(
		server: Arc<dyn Server>,
		store: Arc<dyn Store>,
		errors: Arc<dyn ErrorReporter>,
		navigator: Arc<dyn Navigator>,
	) -> Self {
		Self { server, store, errors, navigator, ids: Arc::new(MonotonicIds::new()) }
	}

	pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
		self.ids = ids;

		self
	}

	/// Reports `err` under `id`. An authorization failure logs the user out instead and is
	/// reported as such.
	pub(crate) fn surface(&self, id: &'static str, err: &Error) {
		if err.is_unauthorized() {
			tracing::warn!(error = %err, "Server rejected the session credentials.");

			self.store.record(StoreUpdate::LoggedOut);
			self.errors.report(ErrorDescriptor::new(USER_UNAUTHORIZED, err.to_string()));

			return;
		}

		self.errors.report(ErrorDescriptor::new(id, err.to_string()));
	}
}

/// [`Server`] backed by HTTP.
pub struct RemoteServer {
	client: RemoteClient,
}
impl RemoteServer {
	pub fn new(client: RemoteClient) -> Self {
		Self { client }
	}

	pub fn from_config(cfg: &mr_config::Server) -> Result<Self> {
		let client = RemoteClient::new(cfg)
			.map_err(|err| Error::Transport { message: err.to_string() })?;

		Ok(Self::new(client))
	}
}
impl Server for RemoteServer {
	fn request<'a>(&'a self, request: ApiRequest) -> BoxFuture<'a, Result<Value, ServerError>> {
		Box::pin(async move { self.client.send(&request).await.map_err(ServerError::from) })
	}
}

/// Everything one signed-in client session coordinates, sharing one set of collaborators.
#[derive(Clone)]
pub struct MapSession {
	pub search: SearchCoordinator,
	pub locks: TaskLockManager,
	pub review: ReviewSequencer,
}
impl MapSession {
	pub fn new(cfg: &Config, collab: Collaborators) -> Self {
		let search = SearchCoordinator::new(&cfg.search, collab.clone());
		let locks = TaskLockManager::new(&cfg.locks, collab.clone());
		let review = ReviewSequencer::new(&cfg.review, collab, locks.clone(), search.clone());

		Self { search, locks, review }
	}
}
