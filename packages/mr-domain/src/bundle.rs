use serde::{Deserialize, Serialize};

use crate::{
	Error, Result,
	task::{Task, TaskId},
};

pub type BundleId = u64;

/// Tasks grouped so they are completed or reviewed together. Always holds two or more tasks; an
/// edit that would leave fewer dissolves the bundle instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBundle {
	bundle_id: BundleId,
	task_ids: Vec<TaskId>,
	tasks: Vec<Task>,
	primary_task_id: TaskId,
}
impl TaskBundle {
	/// `primary` defaults to the first task.
	pub fn new(bundle_id: BundleId, tasks: Vec<Task>, primary: Option<TaskId>) -> Result<Self> {
		let mut unique: Vec<Task> = Vec::with_capacity(tasks.len());

		for task in tasks {
			if !unique.iter().any(|existing| existing.id == task.id) {
				unique.push(task);
			}
		}

		if unique.len() < 2 {
			return Err(Error::BundleTooSmall { count: unique.len() });
		}

		let task_ids: Vec<TaskId> = unique.iter().map(|task| task.id).collect();
		let primary_task_id = match primary {
			Some(id) if task_ids.contains(&id) => id,
			Some(id) => return Err(Error::NotInBundle { bundle_id, task_id: id }),
			None => task_ids[0],
		};

		Ok(Self { bundle_id, task_ids, tasks: unique, primary_task_id })
	}

	pub fn bundle_id(&self) -> BundleId {
		self.bundle_id
	}

	pub fn task_ids(&self) -> &[TaskId] {
		&self.task_ids
	}

	pub fn tasks(&self) -> &[Task] {
		&self.tasks
	}

	pub fn primary_task_id(&self) -> TaskId {
		self.primary_task_id
	}

	pub fn len(&self) -> usize {
		self.task_ids.len()
	}

	pub fn is_empty(&self) -> bool {
		self.task_ids.is_empty()
	}

	pub fn contains(&self, task_id: TaskId) -> bool {
		self.task_ids.contains(&task_id)
	}

	pub fn with_task(&self, task: Task) -> Result<Self> {
		if self.contains(task.id) {
			return Err(Error::AlreadyBundled { bundle_id: self.bundle_id, task_id: task.id });
		}

		let mut next = self.clone();

		next.task_ids.push(task.id);
		next.tasks.push(task);

		Ok(next)
	}

	pub fn without_task(&self, task_id: TaskId) -> Result<BundleRemoval> {
		if !self.contains(task_id) {
			return Err(Error::NotInBundle { bundle_id: self.bundle_id, task_id });
		}

		let tasks: Vec<Task> =
			self.tasks.iter().filter(|task| task.id != task_id).cloned().collect();

		if tasks.len() < 2 {
			return Ok(BundleRemoval::Dissolved {
				bundle_id: self.bundle_id,
				remaining_task_id: tasks.first().map(|task| task.id),
			});
		}

		let primary = (self.primary_task_id != task_id).then_some(self.primary_task_id);

		Self::new(self.bundle_id, tasks, primary).map(BundleRemoval::Remaining)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum BundleRemoval {
	Remaining(TaskBundle),
	/// Fewer than two tasks were left, so the bundle no longer exists.
	Dissolved { bundle_id: BundleId, remaining_task_id: Option<TaskId> },
}
