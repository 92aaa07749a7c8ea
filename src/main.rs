//! # Uni Harvest
//!
//! A pipeline that harvests structured facts about universities from
//! unreliable web sources, reconciles repeated scraping passes into one
//! authoritative record set, and produces the merged dataset a presentation
//! layer reads.
//!
//! ## Usage
//!
//! ```sh
//! uni_harvest extract
//! uni_harvest deadlines
//! uni_harvest reconcile
//! uni_harvest merge
//! uni_harvest show --page 0
//! ```
//!
//! ## Architecture
//!
//! The pipeline is staged; stages communicate only through persisted CSV
//! datasets and can be re-run independently:
//! 1. **Extract**: turn rendered detail pages into structured records
//! 2. **Mine**: locate and mine application-deadline pages
//! 3. **Reconcile**: classify the latest run, upsert the cumulative
//!    success set, recompute the retry list
//! 4. **Merge**: left-join universities, deadlines, and faculty into the
//!    final record set

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod extract;
mod fetch;
mod merge;
mod mine;
mod models;
mod reconcile;
mod snapshot;
mod store;
mod utils;

use cli::{Cli, Command};
use config::HarvestConfig;
use extract::faculty::FacultyExtractor;
use extract::university::{fetch_records, UniversityExtractor};
use fetch::{HttpFetcher, HtmlSearch, PageFetcher, RetryFetch};
use snapshot::DatasetSnapshot;
use utils::truncate_for_log;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(date = %Local::now().date_naive(), "uni_harvest starting up");

    let args = Cli::parse();
    debug!(?args.config, "Parsed CLI arguments");
    let config = HarvestConfig::load(args.config.as_deref())?;

    let result = match args.command {
        Command::Extract { urls } => run_extract(&config, urls.as_deref()).await,
        Command::Faculty { url, affiliation, append } => {
            run_faculty(&config, &url, &affiliation, append).await
        }
        Command::Deadlines { retry_only } => run_deadlines(&config, retry_only).await,
        Command::Reconcile => run_reconcile(&config),
        Command::Merge => run_merge(&config),
        Command::Show { page, per_page } => run_show(&config, page, per_page),
    };

    if let Err(ref e) = result {
        error!(error = %e, "Stage failed");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    result
}

fn retrying_fetcher(config: &HarvestConfig) -> Result<RetryFetch<HttpFetcher>, Box<dyn Error>> {
    Ok(RetryFetch::new(
        HttpFetcher::new(config.fetch.timeout_secs)?,
        config.fetch.max_retries,
        Duration::from_secs(config.fetch.base_delay_secs),
    ))
}

/// `extract` stage: fetch every detail page and write the university dataset.
async fn run_extract(config: &HarvestConfig, urls_path: Option<&str>) -> Result<(), Box<dyn Error>> {
    let urls_path = urls_path.unwrap_or(&config.files.url_list);
    let urls = store::read_url_list(urls_path)?;
    info!(count = urls.len(), source = %urls_path, "Starting detail page extraction");

    let fetcher = retrying_fetcher(config)?;
    let extractor = UniversityExtractor::new(&config.detail_selectors)?;
    let records = fetch_records(&fetcher, &extractor, urls, config).await;

    if records.is_empty() {
        warn!("No university data was extracted; leaving prior dataset untouched");
        return Ok(());
    }
    store::write_university_data(&config.files.university_data, &records)?;
    info!(
        count = records.len(),
        path = %config.files.university_data,
        "Extract stage complete"
    );
    Ok(())
}

/// `faculty` stage: fetch one roster page and write (or extend) the faculty
/// dataset.
async fn run_faculty(
    config: &HarvestConfig,
    url: &str,
    affiliation: &str,
    append: bool,
) -> Result<(), Box<dyn Error>> {
    let fetcher = retrying_fetcher(config)?;
    let extractor = FacultyExtractor::new(&config.faculty_selectors)?;

    let html = fetcher.fetch_rendered(url).await?;
    let mut members = extractor.extract(&html, affiliation);
    info!(count = members.len(), %affiliation, "Extracted roster");

    if append && std::path::Path::new(&config.files.faculty).exists() {
        let mut existing = store::read_faculty(&config.files.faculty)?;
        existing.append(&mut members);
        members = existing;
    }
    store::write_faculty(&config.files.faculty, &members)?;
    info!(total = members.len(), path = %config.files.faculty, "Faculty stage complete");
    Ok(())
}

/// `deadlines` stage: run one mining pass over the universe (or the retry
/// list) and write the run output.
async fn run_deadlines(config: &HarvestConfig, retry_only: bool) -> Result<(), Box<dyn Error>> {
    let entities = if retry_only {
        // An absent retry list means nothing is known to need a retry.
        if std::path::Path::new(&config.files.retry_list).exists() {
            store::read_retry_list(&config.files.retry_list)?
        } else {
            info!(path = %config.files.retry_list, "No retry list; nothing to mine");
            Vec::new()
        }
    } else {
        store::read_universe(&config.files.university_data)?
    };
    info!(count = entities.len(), retry_only, "Starting deadline mining pass");

    let page_fetcher = retrying_fetcher(config)?;
    let search = HtmlSearch::new(retrying_fetcher(config)?, &config.search)?;

    let results = mine::run_pass(&page_fetcher, &search, &entities, config).await;
    let successes = results.iter().filter(|r| r.outcome.is_success()).count();
    store::write_deadline_run(&config.files.deadline_run, &results)?;
    info!(
        total = results.len(),
        successes,
        failures = results.len() - successes,
        path = %config.files.deadline_run,
        "Deadline mining pass complete"
    );
    Ok(())
}

/// `reconcile` stage: classify the latest run, upsert the success store,
/// recompute the retry list.
fn run_reconcile(config: &HarvestConfig) -> Result<(), Box<dyn Error>> {
    let universe = store::read_universe(&config.files.university_data)?;
    let latest = store::read_deadline_run(&config.files.deadline_run)?;
    let prior = store::read_success_store(&config.files.successful)?;

    let out = reconcile::reconcile(&universe, &latest, prior);

    if !out.store.is_empty() {
        store::write_success_store(&config.files.successful, &out.store)?;
    }
    store::persist_retry_list(&config.files.retry_list, &out.retry)?;

    if out.retry.is_empty() {
        info!("No unresolved entities remain");
    } else {
        info!(count = out.retry.len(), path = %config.files.retry_list, "Entities queued for retry");
    }
    Ok(())
}

/// `merge` stage: build the final dataset from the three inputs.
///
/// The anchor dataset is required; absent deadline/faculty datasets merge
/// as empty.
fn run_merge(config: &HarvestConfig) -> Result<(), Box<dyn Error>> {
    let anchors = store::read_university_data(&config.files.university_data)?;
    let deadlines = store::read_success_store(&config.files.successful)?;
    let faculty = if std::path::Path::new(&config.files.faculty).exists() {
        store::read_faculty(&config.files.faculty)?
    } else {
        warn!(path = %config.files.faculty, "No faculty dataset; merging without professors");
        Vec::new()
    };

    let grouped = merge::group_faculty(faculty);
    let records = merge::merge(&anchors, &deadlines, &grouped);
    store::write_final(&config.files.final_db, &records)?;
    info!(count = records.len(), path = %config.files.final_db, "Merge stage complete");
    Ok(())
}

/// `show` stage: load a snapshot and print one page.
fn run_show(config: &HarvestConfig, page: usize, per_page: usize) -> Result<(), Box<dyn Error>> {
    let snapshot = DatasetSnapshot::load(&config.files.final_db)?;
    let rows = snapshot.page(page, per_page);

    println!(
        "Page {}/{}: {} universities total",
        page + 1,
        snapshot.page_count(per_page).max(1),
        snapshot.len()
    );
    for (i, record) in rows.iter().enumerate() {
        println!(
            "{:>3}. {} ({})",
            page * per_page + i + 1,
            record.university_name,
            record.university_website
        );
        println!(
            "     deadline: {} ({})",
            truncate_for_log(&record.deadline_info, 100),
            record.deadline_url
        );
        println!("     professors: {}", record.professors.len());
    }
    if rows.is_empty() {
        println!("(no records on this page)");
    }
    Ok(())
}
