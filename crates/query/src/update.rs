//! Update operations folded into the held result.

use std::future::Future;
use std::pin::Pin;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Folds an update value into the current result.
pub type Reconciler<R, T> = Box<dyn FnOnce(&R, T) -> R + Send>;

/// What to do with a value produced by an update operation.
pub enum UpdateMode<R, T> {
	/// Re-run the query with the current parameters.
	Refetch,
	/// Go back to the first page, then re-run the query.
	ResetAndRefetch,
	/// Compute the new result locally, without a fetch.
	Reconcile(Reconciler<R, T>),
}

impl<R, T> UpdateMode<R, T> {
	pub fn reconcile(fold: impl FnOnce(&R, T) -> R + Send + 'static) -> Self {
		Self::Reconcile(Box::new(fold))
	}

	pub(crate) fn name(&self) -> &'static str {
		match self {
			Self::Refetch => "refetch",
			Self::ResetAndRefetch => "reset_and_refetch",
			Self::Reconcile(_) => "reconcile",
		}
	}
}

impl<R, T> std::fmt::Debug for UpdateMode<R, T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

/// Type-erased resolution of an update operation, produced inside the cycle.
pub(crate) enum UpdateOutcome<R> {
	Refetch { reset_page: bool },
	Reconcile(Box<dyn FnOnce(&R) -> R + Send>),
}

/// A queued update: the caller's future with its mode already applied, so the
/// value type `T` no longer shows up in the trigger type.
pub(crate) struct UpdateOp<R> {
	mode: &'static str,
	future: BoxFuture<anyhow::Result<Option<UpdateOutcome<R>>>>,
}

impl<R: 'static> UpdateOp<R> {
	pub(crate) fn new<T, Fut>(operation: Fut, mode: UpdateMode<R, T>) -> Self
	where
		T: Send + 'static,
		Fut: Future<Output = anyhow::Result<Option<T>>> + Send + 'static,
	{
		let name = mode.name();
		let future = Box::pin(async move {
			let Some(value) = operation.await? else {
				return Ok(None);
			};
			Ok(Some(match mode {
				UpdateMode::Refetch => UpdateOutcome::Refetch { reset_page: false },
				UpdateMode::ResetAndRefetch => UpdateOutcome::Refetch { reset_page: true },
				UpdateMode::Reconcile(fold) => UpdateOutcome::Reconcile(Box::new(move |current: &R| fold(current, value))),
			}))
		});
		Self { mode: name, future }
	}
}

impl<R> UpdateOp<R> {
	pub(crate) fn mode(&self) -> &'static str {
		self.mode
	}

	pub(crate) fn into_future(self) -> BoxFuture<anyhow::Result<Option<UpdateOutcome<R>>>> {
		self.future
	}
}
