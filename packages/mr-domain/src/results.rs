use std::collections::HashMap;

use serde::Serialize;

use crate::{
	fetch::{FetchEnvelope, FetchSequencer, FetchStatus, GroupKey},
	ordered_id::OrderedId,
};

/// Visible result state for one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupResults<T> {
	pub payload: Option<T>,
	pub total_count: Option<u64>,
	pub loading: bool,
	pub fetch_id: Option<OrderedId>,
	pub last_error: Option<String>,
}
impl<T> Default for GroupResults<T> {
	fn default() -> Self {
		Self { payload: None, total_count: None, loading: false, fetch_id: None, last_error: None }
	}
}
impl<T> GroupResults<T> {
	/// Folds an envelope that already passed the sequencer into this group's state.
	///
	/// `Pending` and `Error` keep the previous payload so a refresh or a transient failure never
	/// blanks what is on screen.
	pub fn reduce(self, envelope: FetchEnvelope<T>) -> Self {
		match envelope.status {
			FetchStatus::Pending =>
				Self { loading: true, fetch_id: Some(envelope.id), ..self },
			FetchStatus::Success => Self {
				payload: envelope.payload,
				total_count: envelope.total_count,
				loading: false,
				fetch_id: Some(envelope.id),
				last_error: None,
			},
			FetchStatus::Error => Self {
				loading: false,
				fetch_id: Some(envelope.id),
				last_error: envelope.error,
				..self
			},
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
	Updated,
	/// Accepted error envelope; the message still has to be surfaced to the user.
	Failed { message: String },
	/// Stale envelope; state was not touched.
	Discarded,
}

/// Per-group result state keyed by [`GroupKey`].
#[derive(Debug, Clone)]
pub struct ResultCache<T> {
	groups: HashMap<GroupKey, GroupResults<T>>,
}
impl<T> Default for ResultCache<T> {
	fn default() -> Self {
		Self { groups: HashMap::new() }
	}
}
impl<T> ResultCache<T> {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, group: &GroupKey) -> Option<&GroupResults<T>> {
		self.groups.get(group)
	}

	pub fn is_loading(&self, group: &GroupKey) -> bool {
		self.groups.get(group).map(|results| results.loading).unwrap_or(false)
	}

	/// Runs the ordering check, then reduces. A rejected envelope leaves state untouched.
	pub fn apply(&mut self, sequencer: &FetchSequencer, envelope: FetchEnvelope<T>) -> Applied {
		if !sequencer.accept(&envelope.group_key, envelope.id, envelope.status) {
			return Applied::Discarded;
		}

		let group = envelope.group_key.clone();
		let failure = match envelope.status {
			FetchStatus::Error => Some(envelope.error.clone().unwrap_or_default()),
			_ => None,
		};
		let previous = self.groups.remove(&group).unwrap_or_default();

		self.groups.insert(group, previous.reduce(envelope));

		match failure {
			Some(message) => Applied::Failed { message },
			None => Applied::Updated,
		}
	}
}
