//! Trigger intents and the bus that carries them to the pipeline.

use sift_worker::{GenerationClock, LatestSlot, SlotPush};

use crate::update::UpdateOp;

/// Observable classification of a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
	/// Parameter-driven query.
	Fetch,
	/// Poll-driven query; same path as `Fetch`.
	Interval,
	/// Externally supplied operation folded into the result.
	Update,
}

impl TriggerKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Fetch => "fetch",
			Self::Interval => "interval",
			Self::Update => "update",
		}
	}

	/// Whether this kind drives the `loading` flag (as opposed to `updating`).
	pub const fn is_query(self) -> bool {
		matches!(self, Self::Fetch | Self::Interval)
	}
}

pub(crate) enum Trigger<R> {
	Fetch,
	Interval,
	Update(UpdateOp<R>),
}

impl<R> Trigger<R> {
	pub(crate) fn kind(&self) -> TriggerKind {
		match self {
			Self::Fetch => TriggerKind::Fetch,
			Self::Interval => TriggerKind::Interval,
			Self::Update(_) => TriggerKind::Update,
		}
	}
}

/// A trigger tagged with its sequence number, which doubles as its cycle id.
pub(crate) struct Stamped<R> {
	pub(crate) seq: u64,
	pub(crate) trigger: Trigger<R>,
}

impl<R> Stamped<R> {
	pub(crate) fn kind(&self) -> TriggerKind {
		self.trigger.kind()
	}
}

/// Result of a push that the bus accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Pushed {
	pub(crate) seq: u64,
	/// Seq and kind of the pending trigger this push displaced.
	pub(crate) replaced: Option<(u64, TriggerKind)>,
}

/// Latest-wins trigger channel with a single consumer.
///
/// Pushing is synchronous. A trigger the consumer has not taken yet is
/// replaced by the next push; the debounce window would discard it anyway.
pub(crate) struct TriggerBus<R> {
	slot: LatestSlot<Stamped<R>>,
	clock: GenerationClock,
}

impl<R> TriggerBus<R> {
	/// Creates a bus with a pending `Fetch`, so the first consumer performs
	/// an initial query.
	pub(crate) fn seeded() -> Self {
		let bus = Self {
			slot: LatestSlot::new(),
			clock: GenerationClock::new(),
		};
		let _ = bus.push(Trigger::Fetch);
		bus
	}

	/// Queues a trigger. Returns `None` once closed.
	pub(crate) fn push(&self, trigger: Trigger<R>) -> Option<Pushed> {
		let kind = trigger.kind();
		let mut seq = 0;
		let pushed = self.slot.push_with(|| {
			seq = self.clock.next();
			Stamped { seq, trigger }
		});
		match pushed {
			Some(SlotPush::Enqueued) => {
				tracing::trace!(seq, kind = kind.as_str(), "query.trigger.push");
				Some(Pushed { seq, replaced: None })
			}
			Some(SlotPush::Replaced(old)) => {
				tracing::trace!(seq, kind = kind.as_str(), replaced = old.seq, replaced_kind = old.kind().as_str(), "query.trigger.push");
				Some(Pushed {
					seq,
					replaced: Some((old.seq, old.kind())),
				})
			}
			None => {
				tracing::trace!(kind = kind.as_str(), "query.trigger.rejected");
				None
			}
		}
	}

	pub(crate) async fn recv(&self) -> Option<Stamped<R>> {
		self.slot.recv().await
	}

	pub(crate) fn close(&self) -> bool {
		self.slot.close()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::update::UpdateMode;

	#[tokio::test]
	async fn seeded_bus_delivers_initial_fetch() {
		let bus = TriggerBus::<u32>::seeded();
		let first = bus.recv().await.expect("seed trigger");
		assert_eq!(first.seq, 1);
		assert_eq!(first.kind(), TriggerKind::Fetch);
	}

	#[tokio::test]
	async fn pending_trigger_is_replaced_and_seq_keeps_growing() {
		let bus = TriggerBus::<u32>::seeded();
		assert_eq!(
			bus.push(Trigger::Interval),
			Some(Pushed {
				seq: 2,
				replaced: Some((1, TriggerKind::Fetch)),
			})
		);
		let op = UpdateOp::new(async { Ok(Some(1u32)) }, UpdateMode::Refetch);
		assert_eq!(
			bus.push(Trigger::Update(op)),
			Some(Pushed {
				seq: 3,
				replaced: Some((2, TriggerKind::Interval)),
			})
		);

		let got = bus.recv().await.expect("latest trigger");
		assert_eq!(got.seq, 3);
		assert_eq!(got.kind(), TriggerKind::Update);

		assert_eq!(bus.push(Trigger::Fetch), Some(Pushed { seq: 4, replaced: None }));
	}

	#[tokio::test]
	async fn closed_bus_rejects_pushes() {
		let bus = TriggerBus::<u32>::seeded();
		assert!(bus.close());
		assert!(!bus.close());
		assert_eq!(bus.push(Trigger::Fetch), None);
		assert!(bus.recv().await.is_none());
	}
}
