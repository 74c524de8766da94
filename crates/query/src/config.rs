//! Construction-time configuration.
//!
//! [`QueryOptions`] holds the tunables that make sense in a config file;
//! [`QueryConfig`] adds the typed defaults (result and parameter fields) and
//! is what [`crate::QueryController::new`] consumes. Neither can be changed
//! after the controller is built.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::params::Params;

/// First UI-facing page number. Not configurable.
pub const PAGE_INDEX_BEGIN: i64 = 1;

/// Page size used when neither options nor defaults set one.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Quiet period before a trigger is dispatched.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(DEFAULT_DEBOUNCE_MS);

/// File-loadable controller tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryOptions {
	/// Debounce window in milliseconds. Zero dispatches on the next turn.
	pub debounce_ms: u64,
	/// Added to `page_index` on the fetch side only.
	pub page_index_offset: i64,
	/// Initial page size.
	pub page_size: i64,
}

impl Default for QueryOptions {
	fn default() -> Self {
		Self {
			debounce_ms: DEFAULT_DEBOUNCE_MS,
			page_index_offset: 0,
			page_size: DEFAULT_PAGE_SIZE,
		}
	}
}

impl QueryOptions {
	pub fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}

	/// Parses options from TOML. Missing keys keep their defaults.
	pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(src)?)
	}

	/// Reads and parses an options file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let src = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&src)
	}
}

/// Full construction config for a [`crate::QueryController`].
#[derive(Debug, Clone)]
pub struct QueryConfig<P, R> {
	pub(crate) default_result: R,
	pub(crate) default_parameters: Params<P>,
	pub(crate) debounce: Duration,
	pub(crate) page_index_offset: i64,
}

impl<P, R> QueryConfig<P, R> {
	/// Creates a config with default options and the given caller fields.
	pub fn new(default_result: R, fields: P) -> Self {
		let options = QueryOptions::default();
		Self {
			default_result,
			default_parameters: Params::new(fields).with_page_size(options.page_size),
			debounce: options.debounce(),
			page_index_offset: options.page_index_offset,
		}
	}

	/// Applies file-loaded options, overriding debounce, offset and page size.
	#[must_use]
	pub fn options(mut self, options: QueryOptions) -> Self {
		self.debounce = options.debounce();
		self.page_index_offset = options.page_index_offset;
		self.default_parameters.page_size = options.page_size;
		self
	}

	#[must_use]
	pub fn debounce(mut self, debounce: Duration) -> Self {
		self.debounce = debounce;
		self
	}

	/// Sets the fetch-side page offset, e.g. `-1` for a zero-based API.
	#[must_use]
	pub fn page_index_offset(mut self, offset: i64) -> Self {
		self.page_index_offset = offset;
		self
	}

	#[must_use]
	pub fn page_size(mut self, page_size: i64) -> Self {
		self.default_parameters.page_size = page_size;
		self
	}

	#[must_use]
	pub fn page_index(mut self, page_index: i64) -> Self {
		self.default_parameters.page_index = page_index;
		self
	}

	#[must_use]
	pub fn search_text(mut self, text: impl Into<String>) -> Self {
		self.default_parameters.search_text = Some(text.into());
		self
	}

	pub fn default_result(&self) -> &R {
		&self.default_result
	}

	pub fn default_parameters(&self) -> &Params<P> {
		&self.default_parameters
	}

	pub fn debounce_window(&self) -> Duration {
		self.debounce
	}

	pub fn offset(&self) -> i64 {
		self.page_index_offset
	}
}
