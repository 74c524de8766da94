//! Sift demo binary.
//!
//! Drives a [`QueryController`] through a scripted session against an
//! in-memory catalogue and prints every published page:
//! - a typing burst collapsed by the debounce window
//! - paging and a caller-defined filter
//! - an optimistic rename folded in without a fetch
//! - an archive followed by a reset-and-refetch
//! - polling picking up a change made by another client

mod catalogue;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use sift_query::{DataChanges, ParamChange, QueryConfig, QueryController, QueryEvent, QueryOptions, UpdateMode};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use crate::catalogue::{Catalogue, Filters, Item, Page, Status};

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Demo command line arguments.
#[derive(Parser, Debug)]
#[command(name = "sift-demo")]
#[command(about = "Drive a query controller against an in-memory catalogue")]
struct Args {
	/// Query options file (TOML)
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Number of catalogue items
	#[arg(long, default_value_t = 57)]
	items: u32,

	/// Simulated backend latency in milliseconds
	#[arg(long, default_value_t = 40)]
	latency_ms: u64,

	/// Poll interval in milliseconds, 0 to skip polling
	#[arg(long, default_value_t = 250)]
	poll_ms: u64,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

type Query = QueryController<Filters, Page>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	let options = match &args.config {
		Some(path) => QueryOptions::load(path).with_context(|| format!("loading query options from {}", path.display()))?,
		None => QueryOptions::default(),
	};
	info!(?options, "starting sift-demo");

	let catalogue = Arc::new(Catalogue::seeded(args.items, Duration::from_millis(args.latency_ms)));
	let query: Query = QueryController::with_shared_fetcher(
		Arc::clone(&catalogue) as _,
		QueryConfig::new(Page::default(), Filters::default()).options(options),
	);
	let printer = tokio::spawn(print_pages(query.data_change()));

	step(&query, "initial fetch", Query::start).await?;

	step(&query, "typing burst", |query| {
		for text in ["i", "it", "item-1"] {
			query.search(ParamChange::search_text(text));
		}
	})
	.await?;

	step(&query, "second page", |query| query.search(ParamChange::PageIndex(2))).await?;

	step(&query, "active only", |query| {
		query.search(ParamChange::field(|filters: &mut Filters| filters.status = Some(Status::Active)));
	})
	.await?;

	if let Some(id) = query.data().rows.first().map(|item| item.id) {
		let backend = Arc::clone(&catalogue);
		step(&query, "optimistic rename", |query| {
			query.update(
				async move { backend.rename(id, format!("item-{id} (renamed)")).await },
				UpdateMode::reconcile(|page: &Page, item: Item| page.with_item(item)),
			);
		})
		.await?;

		let backend = Arc::clone(&catalogue);
		step(&query, "archive and reset", |query| {
			query.update(async move { backend.archive(id).await }, UpdateMode::ResetAndRefetch);
		})
		.await?;
	}

	if args.poll_ms > 0 {
		let poll = Duration::from_millis(args.poll_ms);
		step(&query, "first poll", |query| query.enable_interval(poll)).await?;

		if let Some(id) = query.data().rows.last().map(|item| item.id) {
			catalogue.archive_now(id);
			info!(id, "another client archived an item");
		}
		step(&query, "second poll", |_| {}).await?;
		query.stop_interval();
	}

	let clean = query.shutdown(Duration::from_secs(1)).await;
	printer.await.context("page printer task failed")?;
	info!(clean, "sift-demo finished");
	Ok(())
}

/// Runs `action`, then waits for the next cycle to complete.
async fn step(query: &Query, label: &str, action: impl FnOnce(&Query)) -> anyhow::Result<()> {
	let mut events = query.events();
	action(query);

	let completed = async {
		loop {
			match events.recv().await {
				Ok(QueryEvent::CycleCompleted {
					cycle,
					kind,
					outcome,
					error,
				}) => return Ok((cycle, kind, outcome, error)),
				Ok(_) => {}
				Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "demo event stream lagged"),
				Err(RecvError::Closed) => anyhow::bail!("controller closed"),
			}
		}
	};
	let (cycle, kind, outcome, error) = tokio::time::timeout(STEP_TIMEOUT, completed)
		.await
		.with_context(|| format!("{label}: no cycle completed within {STEP_TIMEOUT:?}"))??;

	info!(
		step = label,
		cycle,
		kind = kind.as_str(),
		outcome = outcome.as_str(),
		error = error.as_deref(),
		"demo.step"
	);
	Ok(())
}

async fn print_pages(mut pages: DataChanges<Page>) {
	while let Some(page) = pages.next().await {
		let names: Vec<&str> = page.rows.iter().map(|item| item.name.as_str()).collect();
		println!("{:>3} total | {}", page.total, names.join(", "));
	}
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::prelude::*;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("sift_query=trace,sift_worker=debug,sift_demo=debug,info")
		} else {
			EnvFilter::new("sift_demo=info,warn")
		}
	});

	tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
		.init();
}
