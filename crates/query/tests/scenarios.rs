//! End-to-end behaviour on real runtimes and real time.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sift_query::{ParamChange, Params, QueryConfig, QueryController, QueryOptions, UpdateMode};

fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

/// Polls `check` until it holds or two seconds pass.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
	let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
	while tokio::time::Instant::now() < deadline {
		if check() {
			return true;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	check()
}

fn echo_search(params: Params<()>) -> impl Future<Output = anyhow::Result<Option<String>>> {
	async move { Ok(params.search_text) }
}

#[test]
fn runs_on_fallback_runtime_outside_tokio() {
	init_tracing();
	let query = QueryController::new(
		|params: Params<()>| async move { anyhow::Ok(Some(params.page_size)) },
		QueryConfig::new(0i64, ()).debounce(Duration::ZERO).page_size(42),
	);
	query.start();

	let deadline = std::time::Instant::now() + Duration::from_secs(2);
	while query.data() != 42 && std::time::Instant::now() < deadline {
		std::thread::sleep(Duration::from_millis(5));
	}
	assert_eq!(query.data(), 42);
	query.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_searches_settle_on_final_parameters() {
	init_tracing();
	let query = Arc::new(QueryController::new(
		echo_search,
		QueryConfig::new(String::new(), ()).debounce(Duration::from_millis(20)),
	));
	query.start();

	let writers: Vec<_> = (0..4)
		.map(|writer| {
			let query = Arc::clone(&query);
			std::thread::spawn(move || {
				for step in 0..25 {
					query.search(ParamChange::search_text(format!("w{writer}-{step}")));
				}
			})
		})
		.collect();
	for writer in writers {
		writer.join().expect("writer thread panicked");
	}

	let settled = eventually(|| !query.is_busy() && Some(query.data()) == query.parameter().search_text).await;
	assert!(settled, "data {:?} vs params {:?}", query.data(), query.parameter().search_text);
	assert!(query.shutdown(Duration::from_secs(1)).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn toml_options_drive_fetch_parameters() {
	init_tracing();
	let options = QueryOptions::from_toml_str("debounce_ms = 0\npage_index_offset = -1\npage_size = 25\n").expect("valid options");
	let seen = Arc::new(Mutex::new(Vec::new()));
	let record = Arc::clone(&seen);
	let query = QueryController::new(
		move |params: Params<()>| {
			record.lock().push((params.page_index, params.page_size));
			async { anyhow::Ok(Some(1u8)) }
		},
		QueryConfig::new(0u8, ()).options(options),
	);
	query.start();

	assert!(eventually(|| query.data() == 1).await);
	assert_eq!(seen.lock().as_slice(), &[(0, 25)]);
	assert_eq!(query.parameter().page_index, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn optimistic_list_edit_then_poll() {
	init_tracing();
	let backend = Arc::new(Mutex::new(vec!["a".to_string(), "b".to_string()]));
	let source = Arc::clone(&backend);
	let query = QueryController::new(
		move |_params: Params<()>| {
			let rows = source.lock().clone();
			async move { anyhow::Ok(Some(rows)) }
		},
		QueryConfig::new(Vec::<String>::new(), ()).debounce(Duration::from_millis(10)),
	);
	query.start();
	assert!(eventually(|| query.data().len() == 2).await);

	// Write goes to the backend and is folded in locally without a fetch.
	let write_target = Arc::clone(&backend);
	query.update(
		async move {
			write_target.lock().push("c".to_string());
			anyhow::Ok(Some("c".to_string()))
		},
		UpdateMode::reconcile(|rows: &Vec<String>, row: String| {
			let mut rows = rows.clone();
			rows.push(row);
			rows
		}),
	);
	assert!(eventually(|| query.data() == ["a", "b", "c"]).await);

	// Another client edits the backend; polling picks it up.
	backend.lock().retain(|row| row != "a");
	query.enable_interval(Duration::from_millis(20));
	assert!(eventually(|| query.data() == ["b", "c"]).await);
	assert!(query.shutdown(Duration::from_secs(1)).await);
	assert!(!query.interval_enabled());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unit_parameter_controller_via_create() {
	init_tracing();
	let query = QueryController::create(|params: Params<()>| async move { anyhow::Ok(Some(params.page_index)) }, 0i64);
	query.start();
	assert!(eventually(|| query.data() == 1).await);

	query.search(ParamChange::PageIndex(2));
	assert!(eventually(|| query.data() == 2).await);
	drop(query);
}
