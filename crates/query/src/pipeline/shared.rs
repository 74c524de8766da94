use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::config::QueryConfig;
use crate::error::CycleError;
use crate::events::{CycleOutcome, QueryEvent, QueryStatus};
use crate::params::ParamStore;
use crate::trigger::{Trigger, TriggerBus, TriggerKind};

const EVENT_BUFFER: usize = 64;

/// How a cycle wants to change the held result.
pub(crate) enum Resolution<R> {
	Replace(R),
	Fallback(Option<CycleError>),
	/// Value already folded from the result this cycle observed.
	Reconciled(R),
	Unchanged(Option<CycleError>),
}

/// Commit-side bookkeeping. Every write to the held result happens under this
/// lock, and `close` flips `closed` under it too.
#[derive(Debug, Default)]
struct Gate {
	closed: bool,
	/// Cycle allowed to commit. Older cycles are stale.
	current: Option<u64>,
	/// Newest trigger seq that raised `loading` / `updating`.
	loading_seq: Option<u64>,
	updating_seq: Option<u64>,
	completed: u64,
}

impl Gate {
	fn status(&self) -> QueryStatus {
		QueryStatus {
			loading: self.loading_seq.is_some(),
			updating: self.updating_seq.is_some(),
		}
	}
}

/// State shared between the controller handle and its tasks.
pub(crate) struct Shared<P, R> {
	pub(crate) params: ParamStore<P>,
	pub(crate) bus: TriggerBus<R>,
	pub(crate) default_result: R,
	pub(crate) debounce: Duration,
	/// Root token; cancelled by `close`.
	pub(crate) cancel: CancellationToken,
	gate: Mutex<Gate>,
	data: watch::Sender<R>,
	status: watch::Sender<QueryStatus>,
	completions: watch::Sender<u64>,
	events: broadcast::Sender<QueryEvent>,
}

impl<P, R> Shared<P, R>
where
	R: Clone,
{
	pub(crate) fn new(config: QueryConfig<P, R>) -> Self {
		let QueryConfig {
			default_result,
			default_parameters,
			debounce,
			page_index_offset,
		} = config;
		let (data, _) = watch::channel(default_result.clone());
		let (status, _) = watch::channel(QueryStatus::default());
		let (completions, _) = watch::channel(0);
		let (events, _) = broadcast::channel(EVENT_BUFFER);
		Self {
			params: ParamStore::new(default_parameters, page_index_offset),
			bus: TriggerBus::seeded(),
			default_result,
			debounce,
			cancel: CancellationToken::new(),
			gate: Mutex::new(Gate::default()),
			data,
			status,
			completions,
			events,
		}
	}

	pub(crate) fn data(&self) -> R {
		self.data.borrow().clone()
	}
}

impl<P, R> Shared<P, R> {
	pub(crate) fn subscribe_data(&self) -> watch::Receiver<R> {
		self.data.subscribe()
	}

	pub(crate) fn subscribe_status(&self) -> watch::Receiver<QueryStatus> {
		self.status.subscribe()
	}

	pub(crate) fn subscribe_completions(&self) -> watch::Receiver<u64> {
		self.completions.subscribe()
	}

	pub(crate) fn subscribe_events(&self) -> broadcast::Receiver<QueryEvent> {
		self.events.subscribe()
	}

	pub(crate) fn status(&self) -> QueryStatus {
		*self.status.borrow()
	}

	pub(crate) fn emit(&self, event: QueryEvent) {
		let _ = self.events.send(event);
	}

	pub(crate) fn is_closed(&self) -> bool {
		self.gate.lock().closed
	}

	/// Queues a trigger on the bus. Returns its seq, or `None` once closed.
	///
	/// A pending trigger displaced by this one is reported as discarded.
	pub(crate) fn push_trigger(&self, trigger: Trigger<R>) -> Option<u64> {
		let pushed = self.bus.push(trigger)?;
		if let Some((seq, kind)) = pushed.replaced {
			self.emit(QueryEvent::TriggerDiscarded { seq, kind, by: pushed.seq });
		}
		Some(pushed.seq)
	}

	/// Marks the controller closed. Returns `true` on the first call.
	///
	/// Once this returns, no cycle can commit. Flags are cleared since nothing
	/// will complete any more.
	pub(crate) fn close(&self) -> bool {
		{
			let mut gate = self.gate.lock();
			if gate.closed {
				return false;
			}
			gate.closed = true;
			gate.current = None;
			gate.loading_seq = None;
			gate.updating_seq = None;
			self.status.send_replace(gate.status());
		}
		self.bus.close();
		self.cancel.cancel();
		self.emit(QueryEvent::Closed);
		true
	}

	/// Raises the flag for a trigger taken off the bus.
	pub(crate) fn note_trigger(&self, seq: u64, kind: TriggerKind) {
		{
			let mut gate = self.gate.lock();
			if gate.closed {
				return;
			}
			let slot = if kind.is_query() { &mut gate.loading_seq } else { &mut gate.updating_seq };
			*slot = Some(slot.map_or(seq, |prev| prev.max(seq)));
			self.publish_status(&gate);
		}
		self.emit(QueryEvent::TriggerReceived { seq, kind });
	}

	/// Raises `loading` for an update cycle that turned into a refetch.
	pub(crate) fn note_refetch(&self, cycle: u64) {
		let mut gate = self.gate.lock();
		if gate.closed || gate.current != Some(cycle) {
			return;
		}
		gate.loading_seq = Some(gate.loading_seq.map_or(cycle, |prev| prev.max(cycle)));
		self.publish_status(&gate);
	}

	/// Makes `cycle` the only one allowed to commit. Returns `false` if closed.
	pub(crate) fn begin_cycle(&self, cycle: u64, kind: TriggerKind) -> bool {
		{
			let mut gate = self.gate.lock();
			if gate.closed {
				return false;
			}
			gate.current = Some(cycle);
		}
		self.emit(QueryEvent::CycleStarted { cycle, kind });
		true
	}

	/// Applies a cycle's resolution if the cycle is still current.
	///
	/// Returns `false` when the cycle went stale or the controller closed; the
	/// resolution is then dropped without any observable effect.
	pub(crate) fn commit(&self, cycle: u64, kind: TriggerKind, resolution: Resolution<R>) -> bool
	where
		R: Clone,
	{
		let (outcome, error) = {
			let mut gate = self.gate.lock();
			if gate.closed || gate.current != Some(cycle) {
				drop(gate);
				self.emit(QueryEvent::CycleSuperseded { cycle, kind });
				return false;
			}

			let (outcome, error) = match resolution {
				Resolution::Replace(value) => {
					self.data.send_replace(value);
					(CycleOutcome::Fetched, None)
				}
				Resolution::Fallback(error) => {
					self.data.send_replace(self.default_result.clone());
					(CycleOutcome::Fallback, error)
				}
				Resolution::Reconciled(value) => {
					self.data.send_replace(value);
					(CycleOutcome::Reconciled, None)
				}
				Resolution::Unchanged(error) => (CycleOutcome::Unchanged, error),
			};

			gate.current = None;
			if gate.loading_seq.is_some_and(|seq| seq <= cycle) {
				gate.loading_seq = None;
			}
			if gate.updating_seq.is_some_and(|seq| seq <= cycle) {
				gate.updating_seq = None;
			}
			self.publish_status(&gate);
			gate.completed = gate.completed.wrapping_add(1);
			self.completions.send_replace(gate.completed);
			(outcome, error)
		};

		tracing::debug!(
			cycle,
			kind = kind.as_str(),
			outcome = outcome.as_str(),
			error = error.as_ref().map(tracing::field::display),
			"query.cycle.complete"
		);
		self.emit(QueryEvent::CycleCompleted {
			cycle,
			kind,
			outcome,
			error: error.map(|err| err.to_string()),
		});
		true
	}

	fn publish_status(&self, gate: &Gate) {
		let next = gate.status();
		self.status.send_if_modified(|status| {
			if *status == next {
				return false;
			}
			*status = next;
			true
		});
	}
}
