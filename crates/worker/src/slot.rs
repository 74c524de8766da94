use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Outcome from pushing into a [`LatestSlot`].
#[derive(Debug, PartialEq, Eq)]
pub enum SlotPush<T> {
	/// Slot was empty; value is now pending.
	Enqueued,
	/// A pending value was displaced and is handed back.
	Replaced(T),
}

struct SlotState<T> {
	pending: Option<T>,
	closed: bool,
}

struct SlotInner<T> {
	state: Mutex<SlotState<T>>,
	notify_recv: Notify,
}

/// Single-value, latest-wins handoff between synchronous producers and one
/// async consumer.
///
/// Pushing never blocks: a pending value is replaced by the newer one. The
/// consumer always observes the most recent value pushed since its last
/// receive, including values pushed before it started waiting.
pub struct LatestSlot<T> {
	inner: Arc<SlotInner<T>>,
}

impl<T> Clone for LatestSlot<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> Default for LatestSlot<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> LatestSlot<T> {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(SlotInner {
				state: Mutex::new(SlotState { pending: None, closed: false }),
				notify_recv: Notify::new(),
			}),
		}
	}

	/// Builds the value under the slot lock and stores it as the pending
	/// value, displacing any older one. Values built by concurrent producers
	/// land in the same order they were built.
	///
	/// `make` is not called when the slot is closed; returns `None` then.
	pub fn push_with(&self, make: impl FnOnce() -> T) -> Option<SlotPush<T>> {
		let mut state = self.inner.state.lock();
		if state.closed {
			return None;
		}
		let displaced = state.pending.replace(make());
		drop(state);
		// notify_one stores a permit when nobody waits, so a push racing
		// ahead of the consumer's await is not lost.
		self.inner.notify_recv.notify_one();
		Some(match displaced {
			Some(old) => SlotPush::Replaced(old),
			None => SlotPush::Enqueued,
		})
	}

	/// Receives the pending value, waiting for one if the slot is empty.
	///
	/// Returns `None` once the slot is closed. A value still pending at close
	/// time is dropped, not delivered.
	pub async fn recv(&self) -> Option<T> {
		loop {
			{
				let mut state = self.inner.state.lock();
				if state.closed {
					return None;
				}
				if let Some(value) = state.pending.take() {
					return Some(value);
				}
			}
			self.inner.notify_recv.notified().await;
		}
	}

	/// Closes the slot and drops any pending value. Idempotent.
	///
	/// Returns `true` if this call performed the close.
	pub fn close(&self) -> bool {
		let mut state = self.inner.state.lock();
		if state.closed {
			return false;
		}
		state.closed = true;
		let pending = state.pending.take();
		drop(state);
		drop(pending);
		self.inner.notify_recv.notify_waiters();
		self.inner.notify_recv.notify_one();
		true
	}
}
