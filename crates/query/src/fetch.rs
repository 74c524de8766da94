//! Caller-supplied data sources.

use std::future::Future;

use async_trait::async_trait;

use crate::params::Params;

/// Async source of query results.
///
/// `Ok(None)` means "no data" and resolves to the controller's default
/// result, same as an error. The pipeline may call `fetch` again before a
/// previous call resolves; the older call's outcome is then discarded.
#[async_trait]
pub trait Fetcher<P, R>: Send + Sync + 'static
where
	P: Send + 'static,
{
	async fn fetch(&self, params: Params<P>) -> anyhow::Result<Option<R>>;
}

#[async_trait]
impl<P, R, F, Fut> Fetcher<P, R> for F
where
	P: Send + 'static,
	F: Fn(Params<P>) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = anyhow::Result<Option<R>>> + Send + 'static,
{
	async fn fetch(&self, params: Params<P>) -> anyhow::Result<Option<R>> {
		(self)(params).await
	}
}
