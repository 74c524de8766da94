//! Observer-facing surfaces: result stream, status flags, cycle events.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::trigger::TriggerKind;

/// How a completed cycle resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
	/// The fetcher produced a value.
	Fetched,
	/// The fetcher failed or returned nothing; the default result was stored.
	Fallback,
	/// An update's value was reconciled into the result.
	Reconciled,
	/// An update yielded nothing or failed; the result was left as is.
	Unchanged,
}

impl CycleOutcome {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Fetched => "fetched",
			Self::Fallback => "fallback",
			Self::Reconciled => "reconciled",
			Self::Unchanged => "unchanged",
		}
	}
}

/// Lifecycle events emitted by the pipeline.
///
/// Delivered over a broadcast channel; slow observers may see
/// `RecvError::Lagged` and skip events, the pipeline never waits for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
	/// The pipeline took a trigger off the bus and raised its flag.
	TriggerReceived { seq: u64, kind: TriggerKind },
	/// A newer trigger replaced this one before it was dispatched, either
	/// inside the debounce window or while it still waited on the bus.
	TriggerDiscarded { seq: u64, kind: TriggerKind, by: u64 },
	/// A debounced trigger was dispatched as a cycle.
	CycleStarted { cycle: u64, kind: TriggerKind },
	/// A newer cycle (or close) invalidated this one before it committed.
	CycleSuperseded { cycle: u64, kind: TriggerKind },
	/// The cycle committed. `error` carries the recovered failure, if any.
	CycleCompleted {
		cycle: u64,
		kind: TriggerKind,
		outcome: CycleOutcome,
		error: Option<String>,
	},
	/// The controller was closed.
	Closed,
}

/// Snapshot of the in-flight flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStatus {
	/// A fetch or interval cycle is pending.
	pub loading: bool,
	/// An update cycle is pending.
	pub updating: bool,
}

impl QueryStatus {
	pub const fn is_busy(&self) -> bool {
		self.loading || self.updating
	}
}

/// Stream of result values.
///
/// The first [`DataChanges::next`] yields the current result immediately;
/// later calls wait for the next committed cycle. Values committed faster than
/// they are read collapse to the newest one. Ends when the controller closes.
#[derive(Debug)]
pub struct DataChanges<R> {
	rx: watch::Receiver<R>,
	closed: CancellationToken,
	replayed: bool,
}

impl<R: Clone> DataChanges<R> {
	pub(crate) fn new(rx: watch::Receiver<R>, closed: CancellationToken) -> Self {
		Self { rx, closed, replayed: false }
	}

	/// Waits for the next result value. Returns `None` once closed.
	pub async fn next(&mut self) -> Option<R> {
		if self.closed.is_cancelled() {
			return None;
		}
		if !self.replayed {
			self.replayed = true;
			return Some(self.rx.borrow_and_update().clone());
		}
		tokio::select! {
			biased;
			_ = self.closed.cancelled() => None,
			changed = self.rx.changed() => {
				changed.ok()?;
				if self.closed.is_cancelled() {
					return None;
				}
				Some(self.rx.borrow_and_update().clone())
			}
		}
	}

	/// Returns the current value without waiting or marking it seen.
	pub fn current(&self) -> R {
		self.rx.borrow().clone()
	}

	/// Returns `true` if a value is waiting that `next` would yield at once.
	pub fn has_pending(&self) -> bool {
		!self.closed.is_cancelled() && (!self.replayed || self.rx.has_changed().unwrap_or(false))
	}
}
