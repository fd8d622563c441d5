use std::{
	collections::{HashMap, VecDeque},
	sync::{Arc, Mutex, MutexGuard},
};

use serde_json::{Value, json};
use tokio::sync::oneshot;

use mr_domain::{BundleId, Task, TaskId, WireParams};
use mr_remote::{ApiRequest, Method};
use mr_service::{BoxFuture, Server, ServerError, routes};

#[derive(Debug, Clone, PartialEq)]
pub struct LoggedRequest {
	pub user: String,
	pub method: Method,
	pub template: &'static str,
	pub path: String,
	pub params: WireParams,
	pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedReview {
	pub user: String,
	pub task_id: TaskId,
	pub status: i64,
	pub meta: bool,
}

/// Holds a request at the server until opened, so tests can choose the order responses land.
pub struct Gate(oneshot::Sender<()>);
impl Gate {
	pub fn open(self) {
		let _ = self.0.send(());
	}
}

#[derive(Default)]
struct FakeState {
	tasks: HashMap<TaskId, Task>,
	locks: HashMap<TaskId, String>,
	bundles: HashMap<BundleId, Vec<TaskId>>,
	next_bundle_id: BundleId,
	failures: HashMap<&'static str, VecDeque<ServerError>>,
	responses: HashMap<&'static str, VecDeque<Value>>,
	gates: HashMap<&'static str, VecDeque<oneshot::Receiver<()>>>,
	log: Vec<LoggedRequest>,
	reviews: Vec<SubmittedReview>,
}

/// In-memory server shared by any number of user sessions. Locks are arbitrated across sessions
/// the way the real server does: a task held by one user is denied to every other user.
#[derive(Clone, Default)]
pub struct FakeServer {
	state: Arc<Mutex<FakeState>>,
}
impl FakeServer {
	pub fn new() -> Self {
		Self::default()
	}

	/// A [`Server`] that acts as `user`.
	pub fn session(&self, user: &str) -> Arc<FakeSession> {
		Arc::new(FakeSession { user: user.to_string(), server: self.clone() })
	}

	pub fn add_task(&self, task: Task) {
		self.lock_state().tasks.insert(task.id, task);
	}

	pub fn force_lock(&self, task_id: TaskId, user: &str) {
		self.lock_state().locks.insert(task_id, user.to_string());
	}

	pub fn lock_holder(&self, task_id: TaskId) -> Option<String> {
		self.lock_state().locks.get(&task_id).cloned()
	}

	pub fn bundle(&self, bundle_id: BundleId) -> Option<Vec<TaskId>> {
		self.lock_state().bundles.get(&bundle_id).cloned()
	}

	/// The next request to `template` fails with `err`, after any gate on it opens.
	pub fn fail_next(&self, template: &'static str, err: ServerError) {
		self.lock_state().failures.entry(template).or_default().push_back(err);
	}

	/// The next request to `template` answers with `payload` instead of the built-in behavior.
	pub fn respond_next(&self, template: &'static str, payload: Value) {
		self.lock_state().responses.entry(template).or_default().push_back(payload);
	}

	pub fn gate_next(&self, template: &'static str) -> Gate {
		let (tx, rx) = oneshot::channel();

		self.lock_state().gates.entry(template).or_default().push_back(rx);

		Gate(tx)
	}

	/// Every request in arrival order.
	pub fn requests(&self) -> Vec<LoggedRequest> {
		self.lock_state().log.clone()
	}

	pub fn requests_to(&self, template: &str) -> Vec<LoggedRequest> {
		self.lock_state().log.iter().filter(|req| req.template == template).cloned().collect()
	}

	/// Position of the first request to `template`, in arrival order.
	pub fn position_of(&self, template: &str) -> Option<usize> {
		self.lock_state().log.iter().position(|req| req.template == template)
	}

	pub fn reviews(&self) -> Vec<SubmittedReview> {
		self.lock_state().reviews.clone()
	}

	/// Yields until `count` requests to `template` have arrived. Returns false if they never do.
	pub async fn arrived(&self, template: &str, count: usize) -> bool {
		for _ in 0..1_000 {
			if self.requests_to(template).len() >= count {
				return true;
			}

			tokio::task::yield_now().await;
		}

		false
	}

	async fn handle(&self, user: &str, request: ApiRequest) -> Result<Value, ServerError> {
		let gate = {
			let mut state = self.lock_state();

			state.log.push(LoggedRequest {
				user: user.to_string(),
				method: request.method(),
				template: request.template(),
				path: request.path().unwrap_or_else(|_| request.template().to_string()),
				params: request.query().clone(),
				body: request.json_body().cloned(),
			});

			state.gates.get_mut(request.template()).and_then(VecDeque::pop_front)
		};

		if let Some(gate) = gate {
			let _ = gate.await;
		}

		let mut state = self.lock_state();

		if let Some(err) = state.failures.get_mut(request.template()).and_then(VecDeque::pop_front)
		{
			return Err(err);
		}
		if let Some(payload) =
			state.responses.get_mut(request.template()).and_then(VecDeque::pop_front)
		{
			return Ok(payload);
		}

		state.route(user, &request)
	}

	fn lock_state(&self) -> MutexGuard<'_, FakeState> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}
}

pub struct FakeSession {
	user: String,
	server: FakeServer,
}
impl FakeSession {
	pub fn user(&self) -> &str {
		&self.user
	}
}
impl Server for FakeSession {
	fn request<'a>(&'a self, request: ApiRequest) -> BoxFuture<'a, Result<Value, ServerError>> {
		Box::pin(self.server.handle(&self.user, request))
	}
}

impl FakeState {
	fn route(&mut self, user: &str, request: &ApiRequest) -> Result<Value, ServerError> {
		match request.template() {
			routes::TASK_LOCK | routes::REVIEW_LOCK => {
				let task_id = id_var(request)?;

				if let Some(holder) = self.locks.get(&task_id)
					&& holder != user
				{
					let message = format!("Task {task_id} is locked by {holder}.");

					return Err(ServerError::new(409, message));
				}

				self.locks.insert(task_id, user.to_string());

				Ok(self.task_json(task_id))
			},
			routes::TASK_RELEASE | routes::REVIEW_RELEASE => {
				let task_id = id_var(request)?;

				self.release(task_id, user);

				Ok(self.task_json(task_id))
			},
			routes::TASK_REFRESH_LOCK => {
				let task_id = id_var(request)?;

				match self.locks.get(&task_id) {
					Some(holder) if holder == user => Ok(Value::Null),
					_ => Err(ServerError::new(409, format!("Task {task_id} is not yours."))),
				}
			},
			routes::REVIEW_SUBMIT => {
				let task_id = id_var(request)?;
				let status = request
					.var_value("status")
					.and_then(|value| value.parse().ok())
					.ok_or_else(|| ServerError::new(400, "Invalid review status."))?;

				self.reviews.push(SubmittedReview {
					user: user.to_string(),
					task_id,
					status,
					meta: request.query().contains(routes::PARAM_META_REVIEW),
				});
				self.release(task_id, user);

				Ok(self.task_json(task_id))
			},
			routes::BUNDLE_CREATE => {
				let task_ids = request
					.json_body()
					.and_then(|body| body.get("taskIds"))
					.and_then(Value::as_array)
					.map(|ids| ids.iter().filter_map(Value::as_u64).collect::<Vec<_>>())
					.ok_or_else(|| ServerError::new(400, "Missing taskIds."))?;

				self.next_bundle_id += 1;

				let bundle_id = self.next_bundle_id;
				let tasks = task_ids.iter().map(|id| self.task_json(*id)).collect::<Vec<_>>();

				self.bundles.insert(bundle_id, task_ids);

				Ok(json!({ "id": bundle_id, "tasks": tasks }))
			},
			routes::BUNDLE_UPDATE => {
				let bundle_id = id_var(request)?;
				let task_ids = request
					.query()
					.get(routes::PARAM_TASK_IDS)
					.unwrap_or_default()
					.split(',')
					.filter_map(|id| id.parse().ok())
					.collect::<Vec<_>>();
				let bundle = self
					.bundles
					.get_mut(&bundle_id)
					.ok_or_else(|| ServerError::new(404, "No such bundle."))?;

				*bundle = task_ids;

				Ok(json!({ "id": bundle_id }))
			},
			routes::BUNDLE => {
				let bundle_id = id_var(request)?;

				self.bundles
					.remove(&bundle_id)
					.map(|_| Value::Null)
					.ok_or_else(|| ServerError::new(404, "No such bundle."))
			},
			routes::REVIEW_NEXT | routes::REVIEW_NEARBY => Ok(Value::Null),
			_ => Ok(json!({ "total": 0, "query": request.query(), "path": request.path().ok() })),
		}
	}

	fn release(&mut self, task_id: TaskId, user: &str) {
		if self.locks.get(&task_id).is_some_and(|holder| holder == user) {
			self.locks.remove(&task_id);
		}
	}

	fn task_json(&self, task_id: TaskId) -> Value {
		let task = self.tasks.get(&task_id).cloned().unwrap_or_else(|| Task::new(task_id, 1));

		serde_json::to_value(task).unwrap_or_else(|_| json!({ "id": task_id, "parent": 1 }))
	}
}

fn id_var(request: &ApiRequest) -> Result<u64, ServerError> {
	request
		.var_value("id")
		.and_then(|value| value.parse().ok())
		.ok_or_else(|| ServerError::new(400, "Invalid id."))
}
