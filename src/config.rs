//! Pipeline configuration.
//!
//! All tunables live in [`HarvestConfig`]: interchange file paths, the CSS
//! selectors for the detail and roster pages, search-engine settings with the
//! institutional TLD allow-list, snippet window sizes, fetch retry limits,
//! and the politeness pacing bounds.
//!
//! Defaults cover the stock deployment; an optional YAML file overlays them
//! (`uni_harvest --config harvest.yaml ...`). Every section carries
//! `#[serde(default)]` so a partial file only overrides what it names.

use serde::Deserialize;
use std::error::Error;
use tracing::info;

/// Interchange file locations. All files are UTF-8 CSV with a header row.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Detail-page URL list consumed by the `extract` stage (`Url` column).
    pub url_list: String,
    /// Entity Extractor output; doubles as the universe (`Name` column) and
    /// the merge anchor.
    pub university_data: String,
    /// Latest deadline run output.
    pub deadline_run: String,
    /// Cumulative success set, sorted by university.
    pub successful: String,
    /// Entities still needing a retry; absent file means none known.
    pub retry_list: String,
    /// Flat faculty dataset.
    pub faculty: String,
    /// Final merged dataset, the only file the presentation layer reads.
    pub final_db: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            url_list: "university_urls.csv".to_string(),
            university_data: "usnews_university_data.csv".to_string(),
            deadline_run: "university_deadlines.csv".to_string(),
            successful: "successful_deadlines.csv".to_string(),
            retry_list: "retry_list.csv".to_string(),
            faculty: "all_professors.csv".to_string(),
            final_db: "final_university_database.csv".to_string(),
        }
    }
}

/// CSS selectors for a university detail page.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetailSelectors {
    pub name: String,
    pub website: String,
    pub data_container: String,
    pub data_row: String,
    pub data_label: String,
    pub data_value: String,
    pub rankings_container: String,
    pub rankings_item: String,
    pub rank: String,
    pub subject: String,
}

impl Default for DetailSelectors {
    fn default() -> Self {
        Self {
            name: "div[class*='Villain__TitleContainer'] h1".to_string(),
            website: "a[class*='WebsiteIconLink__IconAnchor']".to_string(),
            data_container: "#uniData".to_string(),
            data_row: "div[class*='DataRow__Row']".to_string(),
            data_label: "p:first-child".to_string(),
            data_value: "p:last-child".to_string(),
            rankings_container: "#rankings".to_string(),
            rankings_item: "li[class*='RankList__ListItem']".to_string(),
            rank: "div[class*='RankList__Rank']".to_string(),
            subject: "a > strong:last-of-type".to_string(),
        }
    }
}

/// CSS selectors for a faculty roster page.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FacultySelectors {
    pub row: String,
    pub cell: String,
    pub area: String,
}

impl Default for FacultySelectors {
    fn default() -> Self {
        Self {
            row: "table > tbody > tr".to_string(),
            cell: "td".to_string(),
            area: "span.areaname > span".to_string(),
        }
    }
}

/// Search-engine settings for locating deadline pages.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Results-page URL with a `{query}` placeholder (query is URL-encoded).
    pub results_url: String,
    /// The engine's own registrable domain; its links are never eligible.
    pub engine_domain: String,
    /// Anchor selector scoped to the results area.
    pub result_selector: String,
    /// A result anchor must contain this element to count as a hit.
    pub result_title_selector: String,
    /// Query template with a `{name}` placeholder.
    pub query_template: String,
    /// Host suffixes of institutional domains eligible for mining.
    pub allowed_tlds: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            results_url: "https://www.google.com/search?q={query}".to_string(),
            engine_domain: "google.com".to_string(),
            result_selector: "div#search a".to_string(),
            result_title_selector: "h3".to_string(),
            query_template: "{name} undergraduate application deadlines".to_string(),
            allowed_tlds: vec![
                ".edu".to_string(),
                ".ca".to_string(),
                ".ac.uk".to_string(),
                ".de".to_string(),
                ".ch".to_string(),
                ".org".to_string(),
            ],
        }
    }
}

/// Snippet window bounds around a matched date token.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    /// Characters of context kept before the match.
    pub look_back: usize,
    /// Characters of context kept after the match.
    pub look_ahead: usize,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self { look_back: 50, look_ahead: 100 }
    }
}

/// Fetch collaborator tuning: per-request timeout and transient-error retry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub base_delay_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_secs: 30, max_retries: 5, base_delay_secs: 1 }
    }
}

/// Politeness pause between successive external fetches.
///
/// A pacing control, not a correctness mechanism.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self { min_secs: 6.0, max_secs: 11.0 }
    }
}

/// Top-level configuration for every pipeline stage.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub files: FileConfig,
    pub detail_selectors: DetailSelectors,
    pub faculty_selectors: FacultySelectors,
    pub search: SearchConfig,
    pub mining: MiningConfig,
    pub fetch: FetchConfig,
    pub pacing: PacingConfig,
}

impl HarvestConfig {
    /// Load configuration, overlaying the YAML file at `path` over defaults
    /// when given.
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)?;
                let config: HarvestConfig = serde_yaml::from_str(&raw)?;
                info!(config_path = %p, "Loaded configuration");
                Ok(config)
            }
            None => Ok(HarvestConfig::default()),
        }
    }
}
