use std::{
	future::Future,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
	time::Duration,
};

use tokio::task::JoinHandle;

/// Runs only the last of a burst of scheduled jobs, once `delay` has passed without a newer one.
///
/// A job that already started is never interrupted; only jobs still waiting out the delay are
/// dropped.
#[derive(Debug)]
pub struct Debouncer {
	delay: Duration,
	generation: Arc<AtomicU64>,
}
impl Debouncer {
	pub fn new(delay: Duration) -> Self {
		Self { delay, generation: Arc::new(AtomicU64::new(0)) }
	}

	pub fn delay(&self) -> Duration {
		self.delay
	}

	pub fn schedule<F>(&self, job: F) -> JoinHandle<()>
	where
		F: Future<Output = ()> + Send + 'static,
	{
		let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
		let generation = self.generation.clone();
		let delay = self.delay;

		tokio::spawn(async move {
			tokio::time::sleep(delay).await;

			if generation.load(Ordering::SeqCst) != ticket {
				tracing::trace!(ticket, "Debounced job superseded.");

				return;
			}

			job.await;
		})
	}

	/// Drops whatever job is currently waiting.
	pub fn cancel(&self) {
		self.generation.fetch_add(1, Ordering::SeqCst);
	}
}
