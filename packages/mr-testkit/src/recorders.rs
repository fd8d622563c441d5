use std::sync::{
	Mutex,
	atomic::{AtomicU64, Ordering},
};

use uuid::Uuid;

use mr_domain::{IdGenerator, OrderedId};
use mr_service::{ErrorDescriptor, ErrorReporter, NavTarget, Navigator, Store, StoreUpdate};

#[derive(Debug, Default)]
pub struct RecordingStore {
	updates: Mutex<Vec<StoreUpdate>>,
}
impl RecordingStore {
	pub fn updates(&self) -> Vec<StoreUpdate> {
		self.updates.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn logged_out(&self) -> bool {
		self.updates().iter().any(|update| matches!(update, StoreUpdate::LoggedOut))
	}
}
impl Store for RecordingStore {
	fn record(&self, update: StoreUpdate) {
		self.updates.lock().unwrap_or_else(|err| err.into_inner()).push(update);
	}
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
	errors: Mutex<Vec<ErrorDescriptor>>,
}
impl RecordingReporter {
	pub fn errors(&self) -> Vec<ErrorDescriptor> {
		self.errors.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn ids(&self) -> Vec<&'static str> {
		self.errors().iter().map(|error| error.id).collect()
	}
}
impl ErrorReporter for RecordingReporter {
	fn report(&self, error: ErrorDescriptor) {
		self.errors.lock().unwrap_or_else(|err| err.into_inner()).push(error);
	}
}

#[derive(Debug, Default)]
pub struct RecordingNavigator {
	targets: Mutex<Vec<NavTarget>>,
}
impl RecordingNavigator {
	pub fn targets(&self) -> Vec<NavTarget> {
		self.targets.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn last(&self) -> Option<NavTarget> {
		self.targets().last().copied()
	}
}
impl Navigator for RecordingNavigator {
	fn navigate(&self, target: NavTarget) {
		self.targets.lock().unwrap_or_else(|err| err.into_inner()).push(target);
	}
}

/// Hands out 1, 2, 3, ... so tests can name ids up front.
#[derive(Debug, Default)]
pub struct SequentialIds {
	next: AtomicU64,
}
impl SequentialIds {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn id(n: u64) -> OrderedId {
		OrderedId::from_uuid(Uuid::from_u128(u128::from(n)))
	}
}
impl IdGenerator for SequentialIds {
	fn next_id(&self) -> OrderedId {
		Self::id(self.next.fetch_add(1, Ordering::SeqCst) + 1)
	}
}
