//! Reactive query state for paginated, searchable lists.
//!
//! A [`QueryController`] owns the query parameters, the current result and
//! two in-flight flags. Callers push triggers (refresh, parameter search,
//! update operations, polling ticks); the controller debounces them, runs at
//! most one cycle that can still commit, and publishes each result.
//!
//! * [`Fetcher`] is the data source. Errors, panics and empty results all
//!   resolve to the configured default result.
//! * [`UpdateMode`] decides what an update's value does: refetch, reset to the
//!   first page and refetch, or fold into the current result locally.
//! * [`DataChanges`], [`QueryStatus`] and [`QueryEvent`] are the observer
//!   surfaces.
//!
//! ```no_run
//! use sift_query::{ParamChange, Params, QueryConfig, QueryController};
//!
//! # async fn demo() {
//! let query = QueryController::new(
//! 	|params: Params<()>| async move { anyhow::Ok(Some(vec![params.page_index])) },
//! 	QueryConfig::new(Vec::new(), ()),
//! );
//! query.start();
//! query.search(ParamChange::search_text("abc"));
//! let mut data = query.data_change();
//! while let Some(rows) = data.next().await {
//! 	println!("{rows:?}");
//! }
//! # }
//! ```

mod config;
mod controller;
mod error;
mod events;
mod fetch;
mod params;
mod pipeline;
mod polling;
mod trigger;
mod update;

pub use config::{DEFAULT_DEBOUNCE, DEFAULT_PAGE_SIZE, PAGE_INDEX_BEGIN, QueryConfig, QueryOptions};
pub use controller::QueryController;
pub use error::{ConfigError, CycleError, Stage};
pub use events::{CycleOutcome, DataChanges, QueryEvent, QueryStatus};
pub use fetch::Fetcher;
pub use params::{ParamChange, ParamKey, Params};
pub use trigger::TriggerKind;
pub use update::{Reconciler, UpdateMode};
