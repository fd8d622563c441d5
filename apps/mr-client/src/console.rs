use mr_service::{ErrorDescriptor, ErrorReporter, NavTarget, Navigator, Store, StoreUpdate};

/// Store that logs every visible state change.
pub struct LogStore;
impl Store for LogStore {
	fn record(&self, update: StoreUpdate) {
		match &update {
			StoreUpdate::LoggedOut => tracing::warn!("Session logged out."),
			_ => match serde_json::to_string(&update) {
				Ok(raw) => tracing::debug!(update = %raw, "State updated."),
				Err(err) => tracing::debug!(error = %err, "Unprintable state update."),
			},
		}
	}
}

pub struct LogReporter;
impl ErrorReporter for LogReporter {
	fn report(&self, error: ErrorDescriptor) {
		tracing::error!(id = error.id, message = %error.message, "Operation failed.");
	}
}

/// Prints where an interactive client would have gone next.
pub struct LogNavigator;
impl Navigator for LogNavigator {
	fn navigate(&self, target: NavTarget) {
		tracing::info!(target = ?target, "Navigating.");
	}
}
