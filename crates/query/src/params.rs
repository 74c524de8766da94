//! Query parameters and the store that owns them.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_PAGE_SIZE, PAGE_INDEX_BEGIN};

/// Pagination, search text and caller-defined fields.
///
/// `fields` is flattened on serialization, so a fetcher can send the whole
/// struct as one flat query object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Params<P> {
	pub page_index: i64,
	pub page_size: i64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub search_text: Option<String>,
	#[serde(flatten)]
	pub fields: P,
}

impl<P> Params<P> {
	/// First page, default page size, no search text.
	pub fn new(fields: P) -> Self {
		Self {
			page_index: PAGE_INDEX_BEGIN,
			page_size: DEFAULT_PAGE_SIZE,
			search_text: None,
			fields,
		}
	}

	#[must_use]
	pub fn with_page_size(mut self, page_size: i64) -> Self {
		self.page_size = page_size;
		self
	}
}

impl<P: Default> Default for Params<P> {
	fn default() -> Self {
		Self::new(P::default())
	}
}

/// Identifies which parameter a [`ParamChange`] touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKey {
	PageIndex,
	PageSize,
	SearchText,
	Field,
}

impl ParamKey {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::PageIndex => "page_index",
			Self::PageSize => "page_size",
			Self::SearchText => "search_text",
			Self::Field => "field",
		}
	}
}

/// A keyed parameter write.
///
/// Every variant except [`ParamChange::PageIndex`] sends the page back to
/// [`PAGE_INDEX_BEGIN`].
pub enum ParamChange<P> {
	PageIndex(i64),
	PageSize(i64),
	SearchText(Option<String>),
	/// Writes caller-defined fields.
	Field(Box<dyn FnOnce(&mut P) + Send>),
}

impl<P> ParamChange<P> {
	pub fn search_text(text: impl Into<String>) -> Self {
		Self::SearchText(Some(text.into()))
	}

	/// Wraps a write to caller-defined fields.
	pub fn field(apply: impl FnOnce(&mut P) + Send + 'static) -> Self {
		Self::Field(Box::new(apply))
	}

	pub fn key(&self) -> ParamKey {
		match self {
			Self::PageIndex(_) => ParamKey::PageIndex,
			Self::PageSize(_) => ParamKey::PageSize,
			Self::SearchText(_) => ParamKey::SearchText,
			Self::Field(_) => ParamKey::Field,
		}
	}

	fn apply(self, params: &mut Params<P>) {
		match self {
			Self::PageIndex(index) => params.page_index = index,
			Self::PageSize(size) => params.page_size = size,
			Self::SearchText(text) => params.search_text = text,
			Self::Field(apply) => apply(&mut params.fields),
		}
	}
}

impl<P> std::fmt::Debug for ParamChange<P> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::PageIndex(index) => f.debug_tuple("PageIndex").field(index).finish(),
			Self::PageSize(size) => f.debug_tuple("PageSize").field(size).finish(),
			Self::SearchText(text) => f.debug_tuple("SearchText").field(text).finish(),
			Self::Field(_) => f.write_str("Field(..)"),
		}
	}
}

/// Owner of the live parameter object.
///
/// Writes go through [`ParamStore::set`] so the page reset rule always holds.
/// Reads hand out projections or clones, never references into the store.
pub(crate) struct ParamStore<P> {
	params: RwLock<Params<P>>,
	page_index_offset: i64,
}

impl<P> ParamStore<P> {
	pub(crate) fn new(defaults: Params<P>, page_index_offset: i64) -> Self {
		Self {
			params: RwLock::new(defaults),
			page_index_offset,
		}
	}

	/// Reads through a projection.
	pub(crate) fn get<T>(&self, project: impl FnOnce(&Params<P>) -> T) -> T {
		project(&self.params.read())
	}

	pub(crate) fn set(&self, change: ParamChange<P>) {
		let key = change.key();
		let mut params = self.params.write();
		change.apply(&mut params);
		if key != ParamKey::PageIndex {
			params.page_index = PAGE_INDEX_BEGIN;
		}
		tracing::trace!(key = key.as_str(), page_index = params.page_index, "query.params.set");
	}

	pub(crate) fn reset_page(&self) {
		self.params.write().page_index = PAGE_INDEX_BEGIN;
	}
}

impl<P: Clone> ParamStore<P> {
	/// UI-facing copy; page index excludes the offset.
	pub(crate) fn snapshot(&self) -> Params<P> {
		self.params.read().clone()
	}

	/// Copy handed to the fetcher; page index includes the offset.
	pub(crate) fn fetch_view(&self) -> Params<P> {
		let mut params = self.snapshot();
		params.page_index = params.page_index.saturating_add(self.page_index_offset);
		params
	}
}

#[cfg(test)]
mod tests;
