//! Deadline mining: candidate page location and date-context extraction.
//!
//! Mining is best-effort text mining, not date parsing: the miner locates
//! passages around month/day tokens and reports them verbatim. `"Nov 31"`
//! is accepted; validating calendar dates is a non-goal.
//!
//! # Two-step page location
//!
//! 1. Search `"<entity> undergraduate application deadlines"` against the
//!    configured engine.
//! 2. Take the first hit whose host ends with an allow-listed institutional
//!    TLD and is not the engine's own domain. First match wins, no scoring.
//!    No eligible hit means no page, not a fallback to an ineligible one.
//!
//! # Snippet extraction
//!
//! One case-insensitive pattern matches any full or abbreviated month name
//! (optional trailing period) adjacent to a 1-2 digit number, in either
//! order. Every non-overlapping match yields a fixed asymmetric window
//! (50 chars back, 100 ahead by default), whitespace-collapsed and
//! deduplicated by exact equality.

use crate::config::{HarvestConfig, MiningConfig, SearchConfig};
use crate::fetch::{PageFetcher, SearchHit, SearchProvider};
use crate::models::{DeadlineOutcome, DeadlineResult};
use crate::utils::{ceil_char_boundary, collapse_whitespace, floor_char_boundary};
use itertools::Itertools;
use once_cell::sync::Lazy;
use rand::{rng, Rng};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

const FULL_MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

const ABBREVIATED_MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun",
    "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// `"<month> <day>"` or `"<day> <month>"`, month optionally abbreviated
/// with a trailing period.
static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let months = FULL_MONTHS
        .iter()
        .chain(ABBREVIATED_MONTHS.iter())
        .join("|");
    let month = format!(r"\b(?:{months})\b\.?");
    Regex::new(&format!(r"(?i)(?:{month}\s+\d{{1,2}}|\d{{1,2}}\s+{month})")).unwrap()
});

static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// Extract the visible text of a rendered page's body, space-separated.
pub fn body_text(html: &str) -> String {
    let document = Html::parse_document(html);
    match document.select(&BODY_SELECTOR).next() {
        Some(body) => body.text().collect::<Vec<_>>().join(" "),
        None => String::new(),
    }
}

/// Find all deadline-context snippets in a free-text body.
///
/// Each match yields a window of `look_back` chars before and `look_ahead`
/// chars after the matched token, clamped to UTF-8 boundaries, collapsed,
/// and wrapped in ellipses. Exact repeats deduplicate via the set.
pub fn mine_snippets(text: &str, mining: &MiningConfig) -> BTreeSet<String> {
    let mut snippets = BTreeSet::new();
    for m in DATE_PATTERN.find_iter(text) {
        let start = floor_char_boundary(text, m.start().saturating_sub(mining.look_back));
        let end = ceil_char_boundary(text, (m.end() + mining.look_ahead).min(text.len()));
        let clean = collapse_whitespace(&text[start..end]);
        snippets.insert(format!("...{clean}..."));
    }
    snippets
}

/// Mine a text body into a tagged outcome.
///
/// Zero matches reports [`DeadlineOutcome::NoDates`] rather than an empty
/// string, so downstream classification can tell "page fetched, nothing
/// found" from "fetch failed."
pub fn mine_text(text: &str, mining: &MiningConfig) -> DeadlineOutcome {
    let snippets = mine_snippets(text, mining);
    if snippets.is_empty() {
        DeadlineOutcome::NoDates
    } else {
        DeadlineOutcome::Found(snippets.iter().join("; "))
    }
}

fn host_matches(host: &str, suffix: &str) -> bool {
    host == suffix.trim_start_matches('.') || host.ends_with(suffix)
}

/// Whether a hit's host belongs to an allow-listed institutional domain and
/// is not the search engine itself.
fn eligible(url: &str, search: &SearchConfig) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    if host_matches(host, &format!(".{}", search.engine_domain)) {
        return false;
    }
    search.allowed_tlds.iter().any(|tld| host_matches(host, tld))
}

/// Select the deadline page to mine: first eligible hit wins.
pub fn select_candidate(hits: &[SearchHit], search: &SearchConfig) -> Option<String> {
    hits.iter()
        .find(|hit| eligible(&hit.url, search))
        .map(|hit| hit.url.clone())
}

/// Locate and mine the deadline page for one entity.
#[instrument(level = "info", skip_all, fields(%name))]
pub async fn mine_entity<F, S>(
    fetcher: &F,
    search: &S,
    name: &str,
    config: &HarvestConfig,
) -> DeadlineResult
where
    F: PageFetcher,
    S: SearchProvider,
{
    let query = config.search.query_template.replace("{name}", name);
    debug!(%query, "Searching for deadline page");

    let hits = match search.search(&query).await {
        Ok(hits) => hits,
        Err(e) => {
            warn!(error = %e, "Search failed");
            return DeadlineResult {
                university: name.to_string(),
                outcome: DeadlineOutcome::FetchFailed(e.to_string()),
                page_url: None,
            };
        }
    };

    let Some(page_url) = select_candidate(&hits, &config.search) else {
        info!(hit_count = hits.len(), "No eligible deadline page among search hits");
        return DeadlineResult {
            university: name.to_string(),
            outcome: DeadlineOutcome::NoPage,
            page_url: None,
        };
    };
    info!(%page_url, "Found a potential deadline page");

    let outcome = match fetcher.fetch_rendered(&page_url).await {
        Ok(html) => mine_text(&body_text(&html), &config.mining),
        Err(e) => {
            warn!(error = %e, %page_url, "Deadline page fetch failed");
            DeadlineOutcome::FetchFailed(e.to_string())
        }
    };

    DeadlineResult {
        university: name.to_string(),
        outcome,
        page_url: Some(page_url),
    }
}

/// Run one full mining pass over `entities`, sequentially, with a randomized
/// politeness pause between successive entities.
#[instrument(level = "info", skip_all, fields(count = entities.len()))]
pub async fn run_pass<F, S>(
    fetcher: &F,
    search: &S,
    entities: &[String],
    config: &HarvestConfig,
) -> Vec<DeadlineResult>
where
    F: PageFetcher,
    S: SearchProvider,
{
    let mut results = Vec::with_capacity(entities.len());
    for (i, name) in entities.iter().enumerate() {
        let result = mine_entity(fetcher, search, name, config).await;
        info!(
            index = i,
            university = %name,
            success = result.outcome.is_success(),
            "Mined entity"
        );
        results.push(result);

        if i + 1 < entities.len() {
            let secs = rng().random_range(config.pacing.min_secs..config.pacing.max_secs);
            debug!(pause_secs = secs, "Politeness pause");
            sleep(Duration::from_secs_f64(secs)).await;
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mining() -> MiningConfig {
        MiningConfig::default()
    }

    #[test]
    fn test_pattern_matches_both_orders_and_abbreviations() {
        assert!(DATE_PATTERN.is_match("apply by November 15"));
        assert!(DATE_PATTERN.is_match("15 November is the due date"));
        assert!(DATE_PATTERN.is_match("due Nov. 1"));
        assert!(DATE_PATTERN.is_match("DUE NOVEMBER 15"));
        assert!(!DATE_PATTERN.is_match("apply in November"));
        assert!(!DATE_PATTERN.is_match("room 15, building B"));
    }

    #[test]
    fn test_no_semantic_validation() {
        // "Nov 31" is not a real date but is still a match.
        assert!(matches!(
            mine_text("materials are due Nov 31 at noon", &mining()),
            DeadlineOutcome::Found(_)
        ));
    }

    #[test]
    fn test_single_snippet_with_window_bounds() {
        let text = "Lorem ipsum filler text before the key passage. You must apply by November 15 for fall admission; late applications are not considered under any circumstances whatsoever.";
        let snippets = mine_snippets(text, &mining());
        assert_eq!(snippets.len(), 1);
        let snippet = snippets.iter().next().unwrap();
        assert!(snippet.contains("November 15"));
        // "..." + look_back + match + look_ahead + "..."
        assert!(snippet.len() <= 3 + 50 + "November 15".len() + 100 + 3);
    }

    #[test]
    fn test_no_dates_sentinel_outcome() {
        assert_eq!(
            mine_text("no month day pairs anywhere here", &mining()),
            DeadlineOutcome::NoDates
        );
        assert_eq!(mine_text("", &mining()), DeadlineOutcome::NoDates);
    }

    #[test]
    fn test_exact_duplicate_snippets_collapse() {
        // Identical contexts produce identical snippets, which the set folds.
        let text = "apply by May 1. apply by May 1.";
        let snippets = mine_snippets(text, &mining());
        let joined = snippets.iter().join("; ");
        assert!(joined.contains("May 1"));
        // Two matches, but windows differ only when context differs.
        assert!(snippets.len() <= 2);
    }

    #[test]
    fn test_window_clamps_to_char_boundaries() {
        let text = format!("{}November 15 due", "é".repeat(40));
        let snippets = mine_snippets(&text, &mining());
        assert_eq!(snippets.len(), 1);
        assert!(snippets.iter().next().unwrap().contains("November 15"));
    }

    #[test]
    fn test_whitespace_collapsed_in_snippets() {
        let text = "deadline:\n\n  January 15\t(priority)";
        let snippet = mine_snippets(text, &mining()).into_iter().next().unwrap();
        assert!(snippet.contains("deadline: January 15 (priority)"));
    }

    fn hits(urls: &[&str]) -> Vec<SearchHit> {
        urls.iter().map(|u| SearchHit { url: u.to_string() }).collect()
    }

    #[test]
    fn test_select_candidate_first_eligible_wins() {
        let search = SearchConfig::default();
        let candidates = hits(&[
            "https://www.google.com/maps",
            "https://news.example.com/deadlines",
            "https://admissions.acme.edu/deadlines",
            "https://other.ac.uk/apply",
        ]);
        assert_eq!(
            select_candidate(&candidates, &search),
            Some("https://admissions.acme.edu/deadlines".to_string())
        );
    }

    #[test]
    fn test_select_candidate_excludes_engine_domain() {
        let mut search = SearchConfig::default();
        search.allowed_tlds.push(".com".to_string());
        // The engine's own properties never count, even with an allowed TLD.
        let candidates = hits(&[
            "https://maps.google.com/",
            "https://www.google.com/travel",
            "https://acme.com/admissions",
        ]);
        assert_eq!(
            select_candidate(&candidates, &search),
            Some("https://acme.com/admissions".to_string())
        );
    }

    #[test]
    fn test_select_candidate_none_eligible() {
        let search = SearchConfig::default();
        let candidates = hits(&["https://blog.example.com/", "not a url"]);
        assert_eq!(select_candidate(&candidates, &search), None);
    }

    #[test]
    fn test_body_text_extraction() {
        let html = "<html><body><h1>Deadlines</h1><p>Apply by May 1.</p></body></html>";
        let text = body_text(html);
        assert!(text.contains("Deadlines"));
        assert!(text.contains("Apply by May 1."));
    }
}
