//! In-memory paginated backend.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sift_query::{Fetcher, Params};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
	Active,
	Archived,
}

/// Caller-defined query fields, flattened next to the paging keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<Status>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
	pub id: u32,
	pub name: String,
	pub status: Status,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Page {
	pub rows: Vec<Item>,
	pub total: usize,
}

impl Page {
	/// Swaps in `item` where a row with the same id is shown.
	pub fn with_item(&self, item: Item) -> Self {
		let mut next = self.clone();
		if let Some(row) = next.rows.iter_mut().find(|row| row.id == item.id) {
			*row = item;
		}
		next
	}
}

pub struct Catalogue {
	items: RwLock<Vec<Item>>,
	latency: Duration,
}

impl Catalogue {
	/// `count` items named `item-N`; every fifth one starts archived.
	pub fn seeded(count: u32, latency: Duration) -> Self {
		let items = (1..=count)
			.map(|id| Item {
				id,
				name: format!("item-{id}"),
				status: if id % 5 == 0 { Status::Archived } else { Status::Active },
			})
			.collect();
		Self {
			items: RwLock::new(items),
			latency,
		}
	}

	pub async fn rename(&self, id: u32, name: String) -> anyhow::Result<Option<Item>> {
		tokio::time::sleep(self.latency).await;
		let mut items = self.items.write();
		Ok(items.iter_mut().find(|item| item.id == id).map(|item| {
			item.name = name;
			item.clone()
		}))
	}

	/// Marks an item archived. `None` when the id is unknown.
	pub async fn archive(&self, id: u32) -> anyhow::Result<Option<()>> {
		tokio::time::sleep(self.latency).await;
		Ok(self.archive_now(id))
	}

	/// Archives without the simulated latency, as another client would.
	pub fn archive_now(&self, id: u32) -> Option<()> {
		let mut items = self.items.write();
		let item = items.iter_mut().find(|item| item.id == id)?;
		item.status = Status::Archived;
		Some(())
	}
}

#[async_trait]
impl Fetcher<Filters, Page> for Catalogue {
	async fn fetch(&self, params: Params<Filters>) -> anyhow::Result<Option<Page>> {
		tracing::debug!(query = %serde_json::to_string(&params)?, "demo.catalogue.fetch");
		tokio::time::sleep(self.latency).await;
		anyhow::ensure!(params.page_size > 0, "page size must be positive, got {}", params.page_size);
		anyhow::ensure!(params.page_index >= 1, "page index starts at 1, got {}", params.page_index);

		let items = self.items.read();
		let matching: Vec<&Item> = items
			.iter()
			.filter(|item| params.fields.status.is_none_or(|status| item.status == status))
			.filter(|item| params.search_text.as_deref().is_none_or(|text| item.name.contains(text)))
			.collect();
		if matching.is_empty() {
			return Ok(None);
		}

		let size = params.page_size as usize;
		let skip = (params.page_index as usize - 1).saturating_mul(size);
		Ok(Some(Page {
			rows: matching.iter().skip(skip).take(size).map(|item| (*item).clone()).collect(),
			total: matching.len(),
		}))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn catalogue() -> Catalogue {
		Catalogue::seeded(23, Duration::ZERO)
	}

	#[tokio::test]
	async fn pages_are_one_based() {
		let page = catalogue().fetch(Params::new(Filters::default()).with_page_size(10)).await.unwrap().unwrap();
		assert_eq!(page.total, 23);
		assert_eq!(page.rows.first().map(|item| item.id), Some(1));

		let mut params = Params::new(Filters::default()).with_page_size(10);
		params.page_index = 3;
		let page = catalogue().fetch(params).await.unwrap().unwrap();
		assert_eq!(page.rows.iter().map(|item| item.id).collect::<Vec<_>>(), vec![21, 22, 23]);
	}

	#[tokio::test]
	async fn filters_by_status_and_text() {
		let mut params = Params::new(Filters {
			status: Some(Status::Archived),
		});
		params.search_text = Some("item-1".into());
		let page = catalogue().fetch(params).await.unwrap().unwrap();
		assert_eq!(page.rows.iter().map(|item| item.id).collect::<Vec<_>>(), vec![10, 15]);
	}

	#[tokio::test]
	async fn no_match_is_empty_and_bad_paging_errors() {
		let mut params = Params::new(Filters::default());
		params.search_text = Some("nothing".into());
		assert_eq!(catalogue().fetch(params).await.unwrap(), None);

		let params = Params::new(Filters::default()).with_page_size(0);
		assert!(catalogue().fetch(params).await.is_err());
	}

	#[tokio::test]
	async fn rename_reports_unknown_ids() {
		let catalogue = catalogue();
		let item = catalogue.rename(4, "four".into()).await.unwrap().unwrap();
		assert_eq!(item.name, "four");
		assert_eq!(catalogue.rename(99, "x".into()).await.unwrap(), None);
		assert_eq!(catalogue.archive_now(99), None);
	}

	#[test]
	fn with_item_replaces_only_matching_row() {
		let page = Page {
			rows: vec![
				Item { id: 1, name: "a".into(), status: Status::Active },
				Item { id: 2, name: "b".into(), status: Status::Active },
			],
			total: 2,
		};
		let next = page.with_item(Item { id: 2, name: "B".into(), status: Status::Archived });
		assert_eq!(next.rows[0], page.rows[0]);
		assert_eq!(next.rows[1].name, "B");
		assert_eq!(page.with_item(Item { id: 9, name: "z".into(), status: Status::Active }), page);
	}
}
