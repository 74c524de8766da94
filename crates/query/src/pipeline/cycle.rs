use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use sift_worker::{GenerationToken, TaskClass};
use tokio_util::task::AbortOnDropHandle;

use super::shared::{Resolution, Shared};
use crate::error::{CycleError, Stage};
use crate::events::QueryEvent;
use crate::fetch::Fetcher;
use crate::trigger::{Stamped, Trigger};
use crate::update::UpdateOutcome;

/// Runs one dispatched cycle to commit, unless its token is cancelled first.
pub(crate) async fn run_cycle<P, R>(shared: Arc<Shared<P, R>>, fetcher: Arc<dyn Fetcher<P, R>>, stamped: Stamped<R>, token: GenerationToken)
where
	P: Clone + Send + Sync + 'static,
	R: Clone + Send + Sync + 'static,
{
	let cycle = token.generation();
	let kind = stamped.kind();

	// Dropping `resolve` aborts the isolated fetch/update task with it.
	let resolution = tokio::select! {
		biased;
		_ = token.cancelled() => None,
		resolution = resolve(&shared, &fetcher, cycle, stamped.trigger) => Some(resolution),
	};

	match resolution {
		Some(resolution) if !token.is_cancelled() => {
			shared.commit(cycle, kind, resolution);
		}
		_ => {
			tracing::debug!(cycle, kind = kind.as_str(), "query.cycle.superseded");
			shared.emit(QueryEvent::CycleSuperseded { cycle, kind });
		}
	}
}

async fn resolve<P, R>(shared: &Shared<P, R>, fetcher: &Arc<dyn Fetcher<P, R>>, cycle: u64, trigger: Trigger<R>) -> Resolution<R>
where
	P: Clone + Send + Sync + 'static,
	R: Clone + Send + Sync + 'static,
{
	match trigger {
		Trigger::Fetch | Trigger::Interval => fetch_or_fallback(shared, fetcher, cycle).await,
		Trigger::Update(op) => {
			let mode = op.mode();
			match isolate(Stage::Update, op.into_future()).await {
				Ok(Some(UpdateOutcome::Reconcile(fold))) => reconcile(shared, cycle, mode, fold),
				Ok(Some(UpdateOutcome::Refetch { reset_page })) => {
					if reset_page {
						shared.params.reset_page();
					}
					shared.note_refetch(cycle);
					fetch_or_fallback(shared, fetcher, cycle).await
				}
				Ok(None) => {
					tracing::debug!(cycle, mode, "query.update.absent");
					Resolution::Unchanged(None)
				}
				Err(err) => {
					tracing::warn!(cycle, mode, error = %err, "query.update.failed; result left unchanged");
					Resolution::Unchanged(Some(err))
				}
			}
		}
	}
}

/// Folds an update value into the current result, outside the gate lock.
///
/// Only the current cycle commits, so the snapshot is still the held result
/// at commit time unless a newer cycle took over, which rejects the commit.
fn reconcile<P, R>(shared: &Shared<P, R>, cycle: u64, mode: &'static str, fold: Box<dyn FnOnce(&R) -> R + Send>) -> Resolution<R>
where
	R: Clone,
{
	let current = shared.data();
	match std::panic::catch_unwind(AssertUnwindSafe(|| fold(&current))) {
		Ok(next) => Resolution::Reconciled(next),
		Err(payload) => {
			let err = CycleError::Panicked {
				stage: Stage::Update,
				message: sift_worker::payload_message(payload.as_ref()),
			};
			tracing::warn!(cycle, mode, error = %err, "query.update.reconcile_panicked; result left unchanged");
			Resolution::Unchanged(Some(err))
		}
	}
}

async fn fetch_or_fallback<P, R>(shared: &Shared<P, R>, fetcher: &Arc<dyn Fetcher<P, R>>, cycle: u64) -> Resolution<R>
where
	P: Clone + Send + Sync + 'static,
	R: Clone + Send + Sync + 'static,
{
	let params = shared.params.fetch_view();
	tracing::debug!(cycle, page_index = params.page_index, page_size = params.page_size, "query.fetch.start");

	let fetcher = Arc::clone(fetcher);
	match isolate(Stage::Fetch, async move { fetcher.fetch(params).await }).await {
		Ok(Some(value)) => Resolution::Replace(value),
		Ok(None) => {
			tracing::debug!(cycle, "query.fetch.empty; using default result");
			Resolution::Fallback(None)
		}
		Err(err) => {
			tracing::warn!(cycle, error = %err, "query.fetch.failed; using default result");
			Resolution::Fallback(Some(err))
		}
	}
}

/// Runs a caller-supplied future in its own task so a panic is contained and
/// reported as a [`CycleError`]. The task is aborted if this future is dropped.
async fn isolate<T, Fut>(stage: Stage, fut: Fut) -> Result<T, CycleError>
where
	T: Send + 'static,
	Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
	let handle = AbortOnDropHandle::new(sift_worker::spawn(TaskClass::Operation, fut));
	match handle.await {
		Ok(Ok(value)) => Ok(value),
		Ok(Err(err)) => Err(CycleError::failed(stage, err)),
		Err(err) if err.is_panic() => Err(CycleError::Panicked {
			stage,
			message: sift_worker::panic_message(err).unwrap_or_default(),
		}),
		Err(err) => Err(CycleError::Join {
			stage,
			message: err.to_string(),
		}),
	}
}
