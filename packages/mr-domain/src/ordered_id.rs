use std::{
	fmt::{Display, Formatter},
	sync::Mutex,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A fetch token that sorts in creation order.
///
/// Backed by a UUIDv7, whose leading 48 bits are a millisecond timestamp, so ids minted by
/// unrelated call sites still compare by when they were created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderedId(Uuid);
impl OrderedId {
	pub fn from_uuid(uuid: Uuid) -> Self {
		Self(uuid)
	}

	pub fn as_uuid(&self) -> Uuid {
		self.0
	}
}
impl Display for OrderedId {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(&self.0, f)
	}
}

pub trait IdGenerator
where
	Self: Send + Sync,
{
	fn next_id(&self) -> OrderedId;
}

/// Process-wide generator that never hands out an id lower than or equal to a previous one, even
/// if the wall clock steps backwards.
#[derive(Debug, Default)]
pub struct MonotonicIds {
	last: Mutex<Option<Uuid>>,
}
impl MonotonicIds {
	pub fn new() -> Self {
		Self::default()
	}
}
impl IdGenerator for MonotonicIds {
	fn next_id(&self) -> OrderedId {
		let mut last = self.last.lock().unwrap_or_else(|err| err.into_inner());
		let candidate = Uuid::now_v7();
		let next = match *last {
			Some(previous) if candidate <= previous =>
				Uuid::from_u128(previous.as_u128().wrapping_add(1)),
			_ => candidate,
		};

		*last = Some(next);

		OrderedId(next)
	}
}
