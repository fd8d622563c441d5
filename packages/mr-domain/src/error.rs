pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
	#[error("Invalid bounding box: {message}")]
	InvalidBounds { message: String },
	#[error("Bounding box spans {span} degrees, exceeding the {max} degree limit.")]
	BoundsTooLarge { span: f64, max: f64 },
	#[error("A bundle needs at least two distinct tasks, got {count}.")]
	BundleTooSmall { count: usize },
	#[error("Task {task_id} is already part of bundle {bundle_id}.")]
	AlreadyBundled { bundle_id: u64, task_id: u64 },
	#[error("Task {task_id} is not part of bundle {bundle_id}.")]
	NotInBundle { bundle_id: u64, task_id: u64 },
	#[error("Cannot {event} while the review session is {phase}.")]
	InvalidTransition { phase: &'static str, event: &'static str },
}
