//! Public handle that assembles the parameter store, trigger bus, fetch
//! pipeline and polling loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sift_worker::{JoinCtrl, TaskClass};
use tokio::sync::{broadcast, watch};

use crate::config::QueryConfig;
use crate::events::{DataChanges, QueryEvent, QueryStatus};
use crate::fetch::Fetcher;
use crate::params::{ParamChange, Params};
use crate::pipeline::{Shared, run_pipeline};
use crate::polling::PollingLoop;
use crate::trigger::Trigger;
use crate::update::{UpdateMode, UpdateOp};

/// Single source of truth for query parameters, the current result and the
/// in-flight flags.
///
/// Inert until [`start`](Self::start). Trigger methods are synchronous and
/// never fail; once closed they are ignored. Dropping the controller closes
/// it.
pub struct QueryController<P, R> {
	shared: Arc<Shared<P, R>>,
	fetcher: Arc<dyn Fetcher<P, R>>,
	pipeline: Mutex<Option<Arc<JoinCtrl>>>,
	polling: Mutex<Option<PollingLoop>>,
}

impl<P, R> std::fmt::Debug for QueryController<P, R> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("QueryController")
			.field("started", &self.pipeline.lock().is_some())
			.field("closed", &self.shared.is_closed())
			.field("status", &self.shared.status())
			.finish_non_exhaustive()
	}
}

impl<R> QueryController<(), R>
where
	R: Clone + Send + Sync + 'static,
{
	/// Controller without caller-defined parameter fields, default options.
	pub fn create(fetcher: impl Fetcher<(), R>, default_result: R) -> Self {
		Self::new(fetcher, QueryConfig::new(default_result, ()))
	}
}

impl<P, R> QueryController<P, R>
where
	P: Clone + Send + Sync + 'static,
	R: Clone + Send + Sync + 'static,
{
	pub fn new(fetcher: impl Fetcher<P, R>, config: QueryConfig<P, R>) -> Self {
		Self::with_shared_fetcher(Arc::new(fetcher), config)
	}

	/// Like [`new`](Self::new), for a fetcher already behind an `Arc`.
	pub fn with_shared_fetcher(fetcher: Arc<dyn Fetcher<P, R>>, config: QueryConfig<P, R>) -> Self {
		Self {
			shared: Arc::new(Shared::new(config)),
			fetcher,
			pipeline: Mutex::new(None),
			polling: Mutex::new(None),
		}
	}

	/// Starts consuming triggers. The first start performs an initial fetch,
	/// or runs whatever was queued before it. Idempotent; no-op once closed.
	pub fn start(&self) {
		let mut pipeline = self.pipeline.lock();
		if pipeline.is_some() || self.shared.is_closed() {
			return;
		}
		let task = sift_worker::spawn(TaskClass::Pipeline, run_pipeline(Arc::clone(&self.shared), Arc::clone(&self.fetcher)));
		*pipeline = Some(Arc::new(JoinCtrl::new(task)));
	}

	/// Alias of [`start`](Self::start).
	pub fn subscribe(&self) {
		self.start();
	}

	pub fn is_started(&self) -> bool {
		self.pipeline.lock().is_some()
	}

	/// Queues a fetch with the current parameters.
	pub fn refresh(&self) {
		self.push(Trigger::Fetch);
	}

	/// Goes back to the first page and queues a fetch.
	pub fn research(&self) {
		self.shared.params.reset_page();
		self.refresh();
	}

	/// Writes one parameter without fetching. Any key other than the page
	/// index sends the page back to the first page.
	pub fn set(&self, change: ParamChange<P>) {
		self.shared.params.set(change);
	}

	/// [`set`](Self::set), then [`refresh`](Self::refresh).
	pub fn search(&self, change: ParamChange<P>) {
		self.set(change);
		self.refresh();
	}

	/// Queues an update. When `operation` yields a value, `mode` decides
	/// whether to refetch or reconcile it into the current result. A failed
	/// or empty operation leaves the result unchanged.
	pub fn update<T, Fut>(&self, operation: Fut, mode: UpdateMode<R, T>)
	where
		T: Send + 'static,
		Fut: Future<Output = anyhow::Result<Option<T>>> + Send + 'static,
	{
		self.push(Trigger::Update(UpdateOp::new(operation, mode)));
	}

	/// Queues an update whose value replaces the current result.
	pub fn update_data<Fut>(&self, operation: Fut)
	where
		Fut: Future<Output = anyhow::Result<Option<R>>> + Send + 'static,
	{
		self.update(operation, UpdateMode::reconcile(|_current: &R, next: R| next));
	}

	fn push(&self, trigger: Trigger<R>) {
		let kind = trigger.kind();
		if self.shared.push_trigger(trigger).is_none() {
			tracing::debug!(kind = kind.as_str(), "query.controller.closed; trigger ignored");
		}
	}

	/// Snapshot of the UI-facing parameters (page index without offset).
	pub fn parameter(&self) -> Params<P> {
		self.shared.params.snapshot()
	}

	/// Reads parameters through a projection without cloning them.
	pub fn with_parameter<T>(&self, project: impl FnOnce(&Params<P>) -> T) -> T {
		self.shared.params.get(project)
	}

	/// Current result.
	pub fn data(&self) -> R {
		self.shared.data()
	}

	/// Stream of results; replays the current one first.
	pub fn data_change(&self) -> DataChanges<R> {
		DataChanges::new(self.shared.subscribe_data(), self.shared.cancel.clone())
	}

	pub fn loading(&self) -> bool {
		self.shared.status().loading
	}

	pub fn updating(&self) -> bool {
		self.shared.status().updating
	}

	/// `loading || updating`.
	pub fn is_busy(&self) -> bool {
		self.shared.status().is_busy()
	}

	pub fn status(&self) -> watch::Receiver<QueryStatus> {
		self.shared.subscribe_status()
	}

	pub fn events(&self) -> broadcast::Receiver<QueryEvent> {
		self.shared.subscribe_events()
	}

	/// Re-fetches `delay` after each completed cycle. No-op while a loop is
	/// already running or after close.
	pub fn enable_interval(&self, delay: Duration) {
		let mut polling = self.polling.lock();
		if let Some(current) = polling.as_ref()
			&& current.is_active()
		{
			tracing::trace!(current = ?current.delay(), "query.polling.already_enabled");
			return;
		}
		if self.shared.is_closed() {
			return;
		}
		*polling = Some(PollingLoop::spawn(Arc::clone(&self.shared), delay));
	}

	/// Stops polling. No effect if polling is not enabled.
	pub fn stop_interval(&self) {
		if let Some(current) = self.polling.lock().as_ref() {
			current.stop();
		}
	}

	pub fn interval_enabled(&self) -> bool {
		self.polling.lock().as_ref().is_some_and(PollingLoop::is_active)
	}

	/// Stops the pipeline and polling for good. In-flight cycles are dropped
	/// without touching the result. Idempotent.
	pub fn close(&self) {
		if self.shared.close() {
			tracing::debug!("query.controller.close");
		}
	}

	pub fn is_closed(&self) -> bool {
		self.shared.is_closed()
	}

	/// Resolves once the controller is closed.
	pub async fn closed(&self) {
		self.shared.cancel.cancelled().await;
	}

	/// Closes, then waits up to `timeout` for the pipeline and polling tasks
	/// to exit. Returns `true` if both finished in time.
	pub async fn shutdown(&self, timeout: Duration) -> bool {
		self.close();
		let deadline = tokio::time::Instant::now() + timeout;

		let pipeline = self.pipeline.lock().clone();
		let pipeline_done = match pipeline {
			Some(join) => join.join_with_timeout(timeout).await,
			None => true,
		};

		let polling = self.polling.lock().take();
		let polling_done = match polling {
			Some(poll) => poll.join_with_timeout(deadline.saturating_duration_since(tokio::time::Instant::now())).await,
			None => true,
		};

		if !(pipeline_done && polling_done) {
			tracing::warn!(pipeline_done, polling_done, "query.controller.shutdown timed out");
		}
		pipeline_done && polling_done
	}
}

impl<P, R> Drop for QueryController<P, R> {
	fn drop(&mut self) {
		self.shared.close();
	}
}
