mod recorders;
mod server;

pub use recorders::{RecordingNavigator, RecordingReporter, RecordingStore, SequentialIds};
pub use server::{FakeServer, FakeSession, Gate, LoggedRequest, SubmittedReview};

use std::{collections::BTreeMap, sync::Arc};

use mr_config::{Config, Locks, Review, Search, Server, Service};
use mr_service::{Collaborators, MapSession};

/// A config with short timings, pointed at an address nothing listens on.
pub fn test_config() -> Config {
	Config {
		service: Service::default(),
		server: Server {
			api_base: "http://127.0.0.1:9/api/v2".to_string(),
			api_key: None,
			default_headers: BTreeMap::new(),
		},
		search: Search { debounce_ms: 50, ..Search::default() },
		locks: Locks { unlock_grace_ms: 50 },
		review: Review::default(),
	}
}

/// One user's view of a [`FakeServer`] with recording collaborators.
pub struct Harness {
	pub server: FakeServer,
	pub store: Arc<RecordingStore>,
	pub errors: Arc<RecordingReporter>,
	pub navigator: Arc<RecordingNavigator>,
	pub collab: Collaborators,
}
impl Harness {
	pub fn new(server: &FakeServer, user: &str) -> Self {
		let store = Arc::new(RecordingStore::default());
		let errors = Arc::new(RecordingReporter::default());
		let navigator = Arc::new(RecordingNavigator::default());
		let collab = Collaborators::new(
			server.session(user),
			store.clone(),
			errors.clone(),
			navigator.clone(),
		)
		.with_ids(Arc::new(SequentialIds::new()));

		Self { server: server.clone(), store, errors, navigator, collab }
	}

	pub fn session(&self) -> MapSession {
		self.session_with(&test_config())
	}

	pub fn session_with(&self, cfg: &Config) -> MapSession {
		MapSession::new(cfg, self.collab.clone())
	}
}
