//! Data models for harvested university records and run results.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`UniversityRecord`]: Structured facts scraped from one detail page
//! - [`DeadlineOutcome`] / [`DeadlineResult`]: Tagged outcome of one deadline
//!   mining attempt for one entity
//! - [`FacultyMember`]: One row of the flat faculty dataset
//! - [`FinalRecord`]: One row of the merged, authoritative dataset
//! - [`NormalizedKey`]: Lossy matching key derived from a display name
//!
//! Classification of deadline outcomes is structural (an enum), not a string
//! comparison; the legacy sentinel strings survive only at the CSV boundary
//! so files written by older runs remain readable.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Sentinel written when no eligible deadline page could be located.
pub const NO_PAGE_SENTINEL: &str = "Could not find deadline page.";
/// Sentinel written when a page was fetched but contained no date matches.
pub const NO_DATES_SENTINEL: &str =
    "Could not find specific deadline dates. Check URL manually.";
/// Prefix written when the fetch itself failed.
pub const ERROR_PREFIX: &str = "An error occurred:";
/// Sentinel for a structurally-required field with no data.
pub const NOT_FOUND: &str = "Not Found";
/// Sentinel for an absent URL.
pub const NA: &str = "N/A";

/// One key/value attribute row from a detail page, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Attribute {
    pub label: String,
    pub value: String,
}

/// One ranking entry from a detail page.
///
/// Rendered as `"<rank> in <subject>"` at the interchange boundary.
/// Repeated identical entries are legitimate (tied subjects) and are kept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Ranking {
    pub rank: String,
    pub subject: String,
}

impl Ranking {
    pub fn render(&self) -> String {
        format!("{} in {}", self.rank, self.subject)
    }
}

/// Structured facts for one university, scraped from one detail page visit.
///
/// Identity is `name` (source-of-truth spelling). A record is created once
/// per visit and superseded wholesale on re-scrape, never merged in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniversityRecord {
    pub name: String,
    /// Official website URL, or [`NOT_FOUND`] when the page carried none.
    pub website: String,
    /// Ordered label/value pairs, insertion order = page order.
    pub attributes: Vec<Attribute>,
    /// Ordered ranking entries, document order, not deduplicated.
    pub rankings: Vec<Ranking>,
}

impl UniversityRecord {
    /// Render `attributes` as a JSON object string (insertion order kept).
    pub fn attributes_json(&self) -> String {
        let mut map = serde_json::Map::new();
        for attr in &self.attributes {
            map.insert(
                attr.label.clone(),
                serde_json::Value::String(attr.value.clone()),
            );
        }
        serde_json::Value::Object(map).to_string()
    }

    /// Render `rankings` as a JSON array of `"<rank> in <subject>"` strings.
    pub fn rankings_json(&self) -> String {
        let rendered: Vec<String> = self.rankings.iter().map(Ranking::render).collect();
        serde_json::to_string(&rendered).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Tagged outcome of one deadline mining attempt.
///
/// Everything that decodes as `Found` counts as a success, even a degenerate
/// snippet that merely happens to contain a month name. That permissiveness
/// is deliberate; snippet quality is not validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadlineOutcome {
    /// Deduplicated context snippets, joined with `"; "`.
    Found(String),
    /// No eligible deadline page could be located.
    NoPage,
    /// Page fetched, but zero month/day matches in its text.
    NoDates,
    /// The fetch itself failed; carries the reason.
    FetchFailed(String),
}

impl DeadlineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeadlineOutcome::Found(_))
    }

    /// Encode for the CSV boundary using the legacy sentinel strings.
    pub fn encode(&self) -> String {
        match self {
            DeadlineOutcome::Found(info) => info.clone(),
            DeadlineOutcome::NoPage => NO_PAGE_SENTINEL.to_string(),
            DeadlineOutcome::NoDates => NO_DATES_SENTINEL.to_string(),
            DeadlineOutcome::FetchFailed(reason) => format!("{ERROR_PREFIX} {reason}"),
        }
    }

    /// Decode a boundary string back into a tagged outcome.
    ///
    /// Failure is recognized only by the two exact sentinels plus the error
    /// prefix; any other text is a `Found`.
    pub fn decode(info: &str) -> Self {
        if info == NO_PAGE_SENTINEL {
            DeadlineOutcome::NoPage
        } else if info == NO_DATES_SENTINEL {
            DeadlineOutcome::NoDates
        } else if let Some(reason) = info.strip_prefix(ERROR_PREFIX) {
            DeadlineOutcome::FetchFailed(reason.trim_start().to_string())
        } else {
            DeadlineOutcome::Found(info.to_string())
        }
    }
}

/// Result of one deadline mining attempt for one entity in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlineResult {
    pub university: String,
    pub outcome: DeadlineOutcome,
    /// The page that was mined, absent when no page was located.
    pub page_url: Option<String>,
}

impl DeadlineResult {
    pub fn page_url_or_na(&self) -> &str {
        self.page_url.as_deref().unwrap_or(NA)
    }
}

/// One faculty member from the flat faculty dataset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FacultyMember {
    pub name: String,
    pub affiliation: String,
    pub homepage: String,
    pub dblp: String,
    /// Research area tokens; comma-joined at the CSV boundary.
    pub areas: Vec<String>,
}

/// One row of the final merged dataset: exactly seven fields, no field
/// is ever absent. Rebuilt wholesale on every merge run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalRecord {
    pub university_name: String,
    pub university_website: String,
    /// JSON object string of attribute label/value pairs.
    pub university_data: String,
    /// JSON array string of rendered rankings.
    pub rankings_data: String,
    pub deadline_info: String,
    pub deadline_url: String,
    /// Faculty for this university; serialized as a JSON array at the
    /// boundary, empty when no match exists.
    pub professors: Vec<FacultyMember>,
}

impl FinalRecord {
    pub fn professors_json(&self) -> String {
        serde_json::to_string(&self.professors).unwrap_or_else(|_| "[]".to_string())
    }
}

static KEY_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s-]").unwrap());
static KEY_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Lossy matching key derived from a display name.
///
/// Used only for join/merge matching, never displayed. Two distinct display
/// names that normalize identically are treated as the same entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Normalize a display name: lowercase, strip characters outside
/// `[a-z0-9\s-]`, collapse internal whitespace, trim.
pub fn normalize(name: &str) -> NormalizedKey {
    let lowered = name.to_lowercase();
    let stripped = KEY_STRIP.replace_all(lowered.trim(), "");
    let collapsed = KEY_WS.replace_all(&stripped, " ");
    NormalizedKey(collapsed.trim().to_string())
}
