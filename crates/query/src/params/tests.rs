use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
struct Filters {
	state: Option<String>,
}

fn store(offset: i64) -> ParamStore<Filters> {
	ParamStore::new(Params::new(Filters::default()), offset)
}

#[test]
fn page_index_change_is_kept_as_is() {
	let store = store(0);
	store.set(ParamChange::PageIndex(3));
	assert_eq!(store.get(|p| p.page_index), 3);

	// Out-of-range values pass through untouched.
	store.set(ParamChange::PageIndex(-2));
	assert_eq!(store.get(|p| p.page_index), -2);
}

#[test]
fn field_change_resets_page_and_writes_field() {
	let store = store(0);
	store.set(ParamChange::PageIndex(4));
	store.set(ParamChange::field(|f: &mut Filters| f.state = Some("open".into())));

	assert_eq!(
		store.snapshot(),
		Params {
			page_index: 1,
			page_size: 10,
			search_text: None,
			fields: Filters { state: Some("open".into()) },
		}
	);
}

#[test]
fn fetch_view_applies_offset_without_touching_store() {
	let store = store(-1);
	store.set(ParamChange::PageIndex(5));

	assert_eq!(store.fetch_view().page_index, 4);
	assert_eq!(store.snapshot().page_index, 5);
}

#[test]
fn serializes_flat_with_camel_case_keys() {
	let mut params = Params::new(Filters { state: Some("b".into()) });
	params.search_text = Some("abc".into());

	let json = serde_json::to_value(&params).unwrap();
	assert_eq!(
		json,
		serde_json::json!({
			"pageIndex": 1,
			"pageSize": 10,
			"searchText": "abc",
			"state": "b",
		})
	);
}

#[test]
fn change_debug_hides_closure() {
	let change: ParamChange<Filters> = ParamChange::field(|_| {});
	assert_eq!(format!("{change:?}"), "Field(..)");
	assert_eq!(change.key(), ParamKey::Field);
}

#[derive(Debug, Clone)]
enum Op {
	PageSize(i64),
	SearchText(Option<String>),
	State(Option<String>),
}

fn arb_op() -> impl Strategy<Value = Op> {
	prop_oneof![
		any::<i64>().prop_map(Op::PageSize),
		proptest::option::of("[a-z]{0,8}").prop_map(Op::SearchText),
		proptest::option::of("[a-z]{0,8}").prop_map(Op::State),
	]
}

proptest! {
	/// Any non-page write sends the page back to the first page.
	#[test]
	fn prop_non_page_writes_reset_page(start in any::<i64>(), ops in proptest::collection::vec(arb_op(), 1..16)) {
		let store = store(0);
		store.set(ParamChange::PageIndex(start));
		for op in ops {
			let change = match op {
				Op::PageSize(size) => ParamChange::PageSize(size),
				Op::SearchText(text) => ParamChange::SearchText(text),
				Op::State(state) => ParamChange::field(move |f: &mut Filters| f.state = state),
			};
			store.set(change);
			prop_assert_eq!(store.get(|p| p.page_index), PAGE_INDEX_BEGIN);
		}
	}
}
