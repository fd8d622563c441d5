use mr_domain::TaskId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure reported by a [`crate::Server`]. `status` is `None` when the server was never
/// reached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ServerError {
	pub status: Option<u16>,
	pub message: String,
}
impl ServerError {
	pub fn new(status: u16, message: impl Into<String>) -> Self {
		Self { status: Some(status), message: message.into() }
	}

	pub fn transport(message: impl Into<String>) -> Self {
		Self { status: None, message: message.into() }
	}

	pub fn is_unauthorized(&self) -> bool {
		matches!(self.status, Some(401 | 403))
	}

	/// 409 and 423 mean another user holds the task.
	pub fn is_lock_conflict(&self) -> bool {
		matches!(self.status, Some(409 | 423))
	}
}
impl From<mr_remote::Error> for ServerError {
	fn from(err: mr_remote::Error) -> Self {
		match err.status() {
			Some(status) => Self::new(status, status_message(err)),
			None => Self::transport(err.to_string()),
		}
	}
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
	#[error("Not authorized (status {status}): {message}")]
	Unauthorized { status: u16, message: String },
	#[error("Server responded with status {status}: {message}")]
	Server { status: u16, message: String },
	#[error("Request failed: {message}")]
	Transport { message: String },
	#[error("Unexpected response: {message}")]
	InvalidResponse { message: String },
	#[error("Task {task_id} is locked by another user.")]
	LockDenied { task_id: TaskId },
	#[error(transparent)]
	Domain(#[from] mr_domain::Error),
	#[error(transparent)]
	Bundle(#[from] BundleError),
}
impl Error {
	pub fn is_unauthorized(&self) -> bool {
		match self {
			Self::Unauthorized { .. } => true,
			Self::Bundle(
				BundleError::LockFailed { source, .. } | BundleError::Request { source },
			) => source.is_unauthorized(),
			_ => false,
		}
	}

	pub(crate) fn invalid_response(err: serde_json::Error) -> Self {
		Self::InvalidResponse { message: err.to_string() }
	}
}
impl From<ServerError> for Error {
	fn from(err: ServerError) -> Self {
		match err.status {
			Some(status @ (401 | 403)) => Self::Unauthorized { status, message: err.message },
			Some(status) => Self::Server { status, message: err.message },
			None => Self::Transport { message: err.message },
		}
	}
}

/// Bundle edits either complete as a whole or leave every lock they took released.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BundleError {
	#[error("Task {task_id} could not be locked for the bundle: {source}")]
	LockFailed {
		task_id: TaskId,
		#[source]
		source: Box<Error>,
	},
	#[error("Bundle request failed: {source}")]
	Request {
		#[source]
		source: Box<Error>,
	},
	#[error(transparent)]
	Invalid(#[from] mr_domain::Error),
}
impl BundleError {
	pub(crate) fn request(err: impl Into<Error>) -> Self {
		Self::Request { source: Box::new(err.into()) }
	}
}

fn status_message(err: mr_remote::Error) -> String {
	match err {
		mr_remote::Error::Status { message, .. } => message,
		other => other.to_string(),
	}
}
