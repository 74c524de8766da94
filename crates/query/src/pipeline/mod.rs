//! Trigger consumer: debounce, switch-latest dispatch, fallback, commit.
//!
//! # Purpose
//!
//! * Turns the trigger stream into a stream of result values with at most one
//!   cycle allowed to commit at any time.
//! * Owns the `loading` / `updating` flags and the commit of the held result.
//!
//! # Mental model
//!
//! * Every trigger gets a sequence number when pushed; once dispatched, that
//!   number is the cycle id.
//! * The pipeline loop is the single consumer of the bus. It debounces, then
//!   spawns one cycle task per dispatched trigger.
//! * A cycle task resolves its trigger (fetch, or update then maybe fetch) and
//!   asks [`Shared`] to commit. The commit lock decides whether it still counts.
//!
//! # Key types
//!
//! | Type | Meaning | Constraints | Constructed / mutated in |
//! |---|---|---|---|
//! | `Shared` | State shared by the handle and its tasks | Must be the only writer of the held result | `shared.rs` |
//! | `Resolution` | What a cycle wants to do to the result | Must be dropped unapplied when stale | `cycle.rs` |
//! | [`sift_worker::GenerationToken`] | Per-cycle cancellation | Must be cancelled when the next cycle dispatches | [`run_pipeline`] |
//!
//! # Invariants
//!
//! * Must not commit a cycle whose id differs from the gate's current cycle.
//! * Must not commit anything after `close`.
//! * Must clear `loading` only when no newer query trigger has been received,
//!   and likewise for `updating`.
//! * Must store the default result when a fetch fails, panics, or yields nothing.
//! * Must leave the result untouched when an update fails or yields nothing.
//!
//! # Data flow
//!
//! 1. Caller pushes a trigger; the bus stamps it.
//! 2. Pipeline takes it, raises the matching flag, and opens the debounce window.
//! 3. Each newer trigger inside the window replaces it and restarts the window.
//! 4. When the window closes, the previous cycle's token is cancelled, the gate
//!    moves to the new cycle id, and a cycle task is spawned.
//! 5. The cycle task runs the fetcher (or update operation) in an isolated task.
//! 6. On completion the cycle commits under the gate lock: result written,
//!    flags cleared, completion counter bumped, event emitted.
//!
//! # Concurrency & ordering
//!
//! * Suspension points: the debounce wait, the caller's future, the poll delay.
//! * Commits are serialized by the gate lock; readers of the result only see
//!   whole values through the watch channel.
//! * An older cycle finishing late is cancelled by token, and if it races the
//!   cancel it is still rejected by the gate's cycle id.
//!
//! # Failure modes & recovery
//!
//! * Fetch error, empty fetch, or fetch panic: default result, logged at warn.
//! * Update error or panic: result unchanged, logged at warn.
//! * Close while a cycle is in flight: cycle cancelled, nothing committed.

mod cycle;
mod shared;

use std::sync::Arc;

use sift_worker::{GenerationToken, TaskClass};

#[cfg(test)]
pub(crate) use shared::Resolution;
pub(crate) use shared::Shared;

use crate::events::QueryEvent;
use crate::fetch::Fetcher;
use crate::trigger::Stamped;

/// Consumes the bus until the controller closes.
pub(crate) async fn run_pipeline<P, R>(shared: Arc<Shared<P, R>>, fetcher: Arc<dyn Fetcher<P, R>>)
where
	P: Clone + Send + Sync + 'static,
	R: Clone + Send + Sync + 'static,
{
	tracing::debug!(debounce = ?shared.debounce, "query.pipeline.start");
	let mut in_flight: Option<GenerationToken> = None;

	loop {
		let first = tokio::select! {
			biased;
			_ = shared.cancel.cancelled() => None,
			next = shared.bus.recv() => next,
		};
		let Some(first) = first else {
			break;
		};
		shared.note_trigger(first.seq, first.kind());

		let Some(stamped) = debounce(&shared, first).await else {
			break;
		};

		if let Some(prev) = in_flight.take() {
			prev.cancel();
		}
		let cycle = stamped.seq;
		let kind = stamped.kind();
		if !shared.begin_cycle(cycle, kind) {
			break;
		}
		tracing::debug!(cycle, kind = kind.as_str(), "query.cycle.dispatch");

		let token = GenerationToken::new(cycle, shared.cancel.child_token());
		in_flight = Some(token.clone());
		sift_worker::spawn(TaskClass::Cycle, cycle::run_cycle(Arc::clone(&shared), Arc::clone(&fetcher), stamped, token));
	}

	if let Some(prev) = in_flight.take() {
		prev.cancel();
	}
	tracing::debug!("query.pipeline.stop");
}

/// Holds `pending` until the bus stays quiet for the debounce window.
///
/// Returns `None` if the controller closes during the wait.
async fn debounce<P, R>(shared: &Shared<P, R>, mut pending: Stamped<R>) -> Option<Stamped<R>> {
	if shared.debounce.is_zero() {
		return Some(pending);
	}
	loop {
		tokio::select! {
			biased;
			_ = shared.cancel.cancelled() => return None,
			next = shared.bus.recv() => {
				let next = next?;
				tracing::trace!(discarded = pending.seq, by = next.seq, "query.trigger.debounced");
				shared.emit(QueryEvent::TriggerDiscarded {
					seq: pending.seq,
					kind: pending.kind(),
					by: next.seq,
				});
				shared.note_trigger(next.seq, next.kind());
				pending = next;
			}
			_ = tokio::time::sleep(shared.debounce) => return Some(pending),
		}
	}
}
