use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Shareable join handle for one long-lived task.
///
/// Joiners queue on an async mutex; whoever holds it polls the handle in
/// place. A joiner that gives up (timeout, drop) leaves the handle where it
/// was, so the next one picks it up.
pub struct JoinCtrl {
	handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for JoinCtrl {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("JoinCtrl").field("finished", &self.is_finished()).finish()
	}
}

impl JoinCtrl {
	pub fn new(handle: JoinHandle<()>) -> Self {
		Self {
			handle: Mutex::new(Some(handle)),
		}
	}

	/// Waits until the task finishes. Repeated and concurrent calls are fine.
	pub async fn join(&self) {
		let mut slot = self.handle.lock().await;
		let Some(handle) = slot.as_mut() else {
			return;
		};
		let result = handle.await;
		*slot = None;
		if let Err(err) = result
			&& err.is_panic()
		{
			tracing::warn!(panic = crate::panic_message(err).as_deref(), "worker.join.panicked");
		}
	}

	/// Joins with a deadline. Returns `true` if the task completed.
	pub async fn join_with_timeout(&self, timeout: Duration) -> bool {
		tokio::time::timeout(timeout, self.join()).await.is_ok()
	}

	/// Whether the task has exited. `false` while another caller is joining.
	pub fn is_finished(&self) -> bool {
		match self.handle.try_lock() {
			Ok(slot) => slot.as_ref().is_none_or(JoinHandle::is_finished),
			Err(_) => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use tokio::sync::Notify;

	use super::*;

	#[tokio::test]
	async fn concurrent_joins_all_return() {
		let ctrl = Arc::new(JoinCtrl::new(tokio::spawn(async {
			tokio::time::sleep(Duration::from_millis(20)).await;
		})));

		let joiners: Vec<_> = (0..3)
			.map(|_| {
				let ctrl = Arc::clone(&ctrl);
				tokio::spawn(async move { ctrl.join().await })
			})
			.collect();

		tokio::time::timeout(Duration::from_secs(1), async {
			for joiner in joiners {
				joiner.await.unwrap();
			}
		})
		.await
		.expect("joins should not hang");
		assert!(ctrl.is_finished());
		ctrl.join().await;
	}

	#[tokio::test]
	async fn timed_out_join_keeps_handle_for_followup() {
		let gate = Arc::new(Notify::new());
		let task_gate = Arc::clone(&gate);
		let ctrl = JoinCtrl::new(tokio::spawn(async move {
			task_gate.notified().await;
		}));

		assert!(!ctrl.join_with_timeout(Duration::from_millis(10)).await);
		assert!(!ctrl.is_finished());

		gate.notify_one();
		assert!(ctrl.join_with_timeout(Duration::from_secs(1)).await);
		assert!(ctrl.is_finished());
	}

	#[tokio::test]
	async fn panicked_task_still_counts_as_joined() {
		let ctrl = JoinCtrl::new(tokio::spawn(async { panic!("task blew up") }));
		assert!(ctrl.join_with_timeout(Duration::from_secs(1)).await);
		assert!(ctrl.is_finished());
	}
}
