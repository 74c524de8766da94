//! Periodic re-trigger driven by cycle completion.

use std::sync::Arc;
use std::time::Duration;

use sift_worker::{JoinCtrl, TaskClass};
use tokio_util::sync::CancellationToken;

use crate::pipeline::Shared;
use crate::trigger::Trigger;

/// One running poll loop. Dropping the handle does not stop the loop; call
/// [`PollingLoop::stop`].
pub(crate) struct PollingLoop {
	delay: Duration,
	cancel: CancellationToken,
	join: JoinCtrl,
}

impl PollingLoop {
	/// Spawns a loop that pushes `Interval` `delay` after each completed cycle.
	///
	/// If a cycle has already completed, the first delay starts right away.
	pub(crate) fn spawn<P, R>(shared: Arc<Shared<P, R>>, delay: Duration) -> Self
	where
		P: Send + Sync + 'static,
		R: Send + Sync + 'static,
	{
		let cancel = shared.cancel.child_token();
		let task_cancel = cancel.clone();
		let task = sift_worker::spawn(TaskClass::Polling, async move {
			run(shared, delay, task_cancel).await;
		});
		Self {
			delay,
			cancel,
			join: JoinCtrl::new(task),
		}
	}

	pub(crate) fn delay(&self) -> Duration {
		self.delay
	}

	pub(crate) fn is_active(&self) -> bool {
		!self.cancel.is_cancelled()
	}

	pub(crate) fn stop(&self) {
		self.cancel.cancel();
	}

	pub(crate) async fn join_with_timeout(&self, timeout: Duration) -> bool {
		self.join.join_with_timeout(timeout).await
	}
}

async fn run<P, R>(shared: Arc<Shared<P, R>>, delay: Duration, cancel: CancellationToken) {
	let mut completions = shared.subscribe_completions();
	if *completions.borrow() > 0 {
		completions.mark_changed();
	}
	tracing::debug!(?delay, "query.polling.start");

	let mut ticks = 0u64;
	loop {
		// Failed cycles still complete (via fallback or unchanged), so the
		// loop keeps going after errors.
		tokio::select! {
			biased;
			_ = cancel.cancelled() => break,
			changed = completions.changed() => {
				if changed.is_err() {
					break;
				}
			}
		}
		tokio::select! {
			biased;
			_ = cancel.cancelled() => break,
			_ = tokio::time::sleep(delay) => {}
		}
		if cancel.is_cancelled() {
			break;
		}

		let Some(seq) = shared.push_trigger(Trigger::Interval) else {
			break;
		};
		// Completions that landed during the delay belong to the cycle we
		// just replaced; wait for the next one.
		let _ = completions.borrow_and_update();
		ticks = ticks.wrapping_add(1);
		tracing::trace!(seq, ticks, "query.polling.tick");
	}

	tracing::debug!(ticks, "query.polling.stop");
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::QueryConfig;
	use crate::pipeline::Resolution;
	use crate::trigger::{Stamped, TriggerKind};

	/// Takes the pending trigger if there is one, without waiting.
	async fn take_pending(shared: &Shared<(), u32>) -> Option<Stamped<u32>> {
		tokio::time::timeout(Duration::ZERO, shared.bus.recv()).await.ok().flatten()
	}

	async fn completed_shared() -> Arc<Shared<(), u32>> {
		let shared = Arc::new(Shared::new(QueryConfig::new(0u32, ())));
		let seed = shared.bus.recv().await.expect("seed trigger");
		assert!(shared.begin_cycle(seed.seq, seed.kind()));
		assert!(shared.commit(seed.seq, seed.kind(), Resolution::Replace(5)));
		shared
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn pushes_interval_one_delay_after_completion() {
		let shared = completed_shared().await;
		let poll = PollingLoop::spawn(Arc::clone(&shared), Duration::from_millis(100));

		tokio::time::sleep(Duration::from_millis(99)).await;
		assert!(take_pending(&shared).await.is_none(), "tick fired before the delay elapsed");

		tokio::time::sleep(Duration::from_millis(2)).await;
		let tick = take_pending(&shared).await.expect("interval trigger");
		assert_eq!(tick.kind(), TriggerKind::Interval);

		// No further tick until that interval cycle completes.
		tokio::time::sleep(Duration::from_millis(500)).await;
		assert!(take_pending(&shared).await.is_none());
		poll.stop();
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn stop_cancels_the_scheduled_tick() {
		let shared = completed_shared().await;
		let poll = PollingLoop::spawn(Arc::clone(&shared), Duration::from_millis(100));
		assert!(poll.is_active());

		tokio::time::sleep(Duration::from_millis(50)).await;
		poll.stop();
		assert!(!poll.is_active());
		assert!(poll.join_with_timeout(Duration::from_secs(1)).await);

		tokio::time::sleep(Duration::from_millis(500)).await;
		assert!(take_pending(&shared).await.is_none());
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn waits_for_first_completion_when_none_happened_yet() {
		let shared = Arc::new(Shared::new(QueryConfig::new(0u32, ())));
		let seed = shared.bus.recv().await.expect("seed trigger");
		let poll = PollingLoop::spawn(Arc::clone(&shared), Duration::from_millis(10));

		tokio::time::sleep(Duration::from_millis(200)).await;
		assert!(take_pending(&shared).await.is_none());

		assert!(shared.begin_cycle(seed.seq, seed.kind()));
		assert!(shared.commit(seed.seq, seed.kind(), Resolution::Fallback(None)));
		tokio::time::sleep(Duration::from_millis(11)).await;
		assert!(take_pending(&shared).await.is_some());
		poll.stop();
	}
}
