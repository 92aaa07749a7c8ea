//! University detail page extractor.
//!
//! Turns one rendered detail page into a [`UniversityRecord`]. The name is
//! the only structurally-required piece: a page without its name container
//! fails with [`ExtractError::MissingName`]. Website, attributes, and
//! rankings are each independently best-effort.
//!
//! Attribute rows are parsed as ordered label/value pairs in document order;
//! ranking entries preserve document order and are not deduplicated
//! (repeated identical rankings are legitimate, e.g. tied subjects).

use crate::config::{DetailSelectors, HarvestConfig};
use crate::fetch::{FetchError, PageFetcher};
use crate::models::{Attribute, Ranking, UniversityRecord, NOT_FOUND};
use crate::utils::parse_selector;
use futures::stream::{self, StreamExt};
use rand::{rng, Rng};
use scraper::{Html, Selector};
use std::error::Error;
use std::time::Duration;
use thiserror::Error as ThisError;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Structural failure while extracting a detail page.
///
/// Fetch-level failures (the page never became interactive) surface earlier
/// as [`FetchError`]; this covers the page itself.
#[derive(Debug, ThisError)]
pub enum ExtractError {
    #[error("detail page is missing its name container")]
    MissingName,
}

/// Detail-page extractor with selectors parsed once up front.
pub struct UniversityExtractor {
    name: Selector,
    website: Selector,
    data_container: Selector,
    data_row: Selector,
    data_label: Selector,
    data_value: Selector,
    rankings_container: Selector,
    rankings_item: Selector,
    rank: Selector,
    subject: Selector,
}

impl UniversityExtractor {
    pub fn new(selectors: &DetailSelectors) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            name: parse_selector(&selectors.name)?,
            website: parse_selector(&selectors.website)?,
            data_container: parse_selector(&selectors.data_container)?,
            data_row: parse_selector(&selectors.data_row)?,
            data_label: parse_selector(&selectors.data_label)?,
            data_value: parse_selector(&selectors.data_value)?,
            rankings_container: parse_selector(&selectors.rankings_container)?,
            rankings_item: parse_selector(&selectors.rankings_item)?,
            rank: parse_selector(&selectors.rank)?,
            subject: parse_selector(&selectors.subject)?,
        })
    }

    /// Extract one [`UniversityRecord`] from a rendered detail page.
    pub fn extract(&self, html: &str) -> Result<UniversityRecord, ExtractError> {
        let document = Html::parse_document(html);

        let name = document
            .select(&self.name)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or(ExtractError::MissingName)?;

        let website = document
            .select(&self.website)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(str::to_string)
            .unwrap_or_else(|| {
                debug!(%name, "No website link on detail page");
                NOT_FOUND.to_string()
            });

        let mut attributes = Vec::new();
        if let Some(container) = document.select(&self.data_container).next() {
            for row in container.select(&self.data_row) {
                let label = row
                    .select(&self.data_label)
                    .next()
                    .map(|el| el.text().collect::<String>().trim().to_string());
                let value = row
                    .select(&self.data_value)
                    .next()
                    .map(|el| el.text().collect::<String>().trim().to_string());
                if let (Some(label), Some(value)) = (label, value) {
                    if !label.is_empty() {
                        attributes.push(Attribute { label, value });
                    }
                }
            }
        } else {
            debug!(%name, "No data container on detail page");
        }

        let mut rankings = Vec::new();
        if let Some(container) = document.select(&self.rankings_container).next() {
            for item in container.select(&self.rankings_item) {
                let rank = item
                    .select(&self.rank)
                    .next()
                    .map(|el| el.text().collect::<String>().trim().to_string());
                let subject = item
                    .select(&self.subject)
                    .next()
                    .map(|el| el.text().collect::<String>().trim().to_string());
                if let (Some(rank), Some(subject)) = (rank, subject) {
                    rankings.push(Ranking { rank, subject });
                }
            }
        } else {
            debug!(%name, "No rankings container on detail page");
        }

        Ok(UniversityRecord { name, website, attributes, rankings })
    }
}

/// Fetch and extract every detail page in `urls`, sequentially, with a
/// randomized politeness pause between successive fetches.
///
/// Failed pages are logged and skipped without failing the batch.
#[instrument(level = "info", skip_all, fields(count = urls.len()))]
pub async fn fetch_records<F>(
    fetcher: &F,
    extractor: &UniversityExtractor,
    urls: Vec<String>,
    config: &HarvestConfig,
) -> Vec<UniversityRecord>
where
    F: PageFetcher,
{
    let total = urls.len();
    let records: Vec<UniversityRecord> = stream::iter(urls.into_iter().enumerate())
        .then(|(i, url)| async move {
            let record = match fetcher.fetch_rendered(&url).await {
                Ok(html) => match extractor.extract(&html) {
                    Ok(record) => {
                        debug!(index = i, %url, name = %record.name, "Extracted record");
                        Some(record)
                    }
                    Err(e) => {
                        warn!(index = i, %url, error = %e, "Extraction failed; skipping page");
                        None
                    }
                },
                Err(e @ FetchError::Timeout) => {
                    warn!(index = i, %url, error = %e, "Page never became interactive; skipping");
                    None
                }
                Err(e) => {
                    warn!(index = i, %url, error = %e, "Fetch failed; skipping page");
                    None
                }
            };

            if i + 1 < total {
                let secs = rng().random_range(config.pacing.min_secs..config.pacing.max_secs);
                sleep(Duration::from_secs_f64(secs)).await;
            }
            record
        })
        .filter_map(std::future::ready)
        .collect()
        .await;

    info!(extracted = records.len(), total, "Extracted university records");
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> UniversityExtractor {
        let selectors = DetailSelectors {
            name: "h1.uni-name".to_string(),
            website: "a.site-link".to_string(),
            data_container: "#uniData".to_string(),
            data_row: "div.row".to_string(),
            data_label: "p:first-child".to_string(),
            data_value: "p:last-child".to_string(),
            rankings_container: "#rankings".to_string(),
            rankings_item: "li.rk".to_string(),
            rank: "div.rank".to_string(),
            subject: "strong.subject".to_string(),
        };
        UniversityExtractor::new(&selectors).unwrap()
    }

    #[test]
    fn test_extract_full_page() {
        let html = r#"<html><body>
            <h1 class="uni-name"> Acme University </h1>
            <a class="site-link" href="https://acme.edu">Visit</a>
            <div id="uniData">
                <div class="row"><p>Total enrollment</p><p>12,000</p></div>
                <div class="row"><p>Founded</p><p>1870</p></div>
            </div>
            <ul id="rankings">
                <li class="rk"><div class="rank">#5</div><strong class="subject">Computer Science</strong></li>
                <li class="rk"><div class="rank">#5</div><strong class="subject">Computer Science</strong></li>
            </ul>
        </body></html>"#;

        let record = extractor().extract(html).unwrap();
        assert_eq!(record.name, "Acme University");
        assert_eq!(record.website, "https://acme.edu");
        assert_eq!(record.attributes.len(), 2);
        assert_eq!(record.attributes[0].label, "Total enrollment");
        assert_eq!(record.attributes[0].value, "12,000");
        // Attributes keep page order.
        assert_eq!(record.attributes[1].label, "Founded");
        // Tied rankings are not deduplicated.
        assert_eq!(record.rankings.len(), 2);
        assert_eq!(record.rankings[0].render(), "#5 in Computer Science");
    }

    #[test]
    fn test_missing_website_yields_sentinel() {
        let html = r#"<html><body><h1 class="uni-name">Acme University</h1></body></html>"#;
        let record = extractor().extract(html).unwrap();
        assert_eq!(record.website, NOT_FOUND);
        assert!(record.attributes.is_empty());
        assert!(record.rankings.is_empty());
    }

    #[test]
    fn test_missing_name_fails_record() {
        let html = r#"<html><body><a class="site-link" href="https://acme.edu">x</a></body></html>"#;
        let err = extractor().extract(html).unwrap_err();
        assert!(matches!(err, ExtractError::MissingName));
    }

    #[test]
    fn test_empty_name_fails_record() {
        let html = r#"<html><body><h1 class="uni-name">   </h1></body></html>"#;
        assert!(extractor().extract(html).is_err());
    }

    #[test]
    fn test_partial_data_preferred_over_no_data() {
        // Malformed rows are skipped, well-formed ones kept.
        let html = r#"<html><body>
            <h1 class="uni-name">Acme University</h1>
            <div id="uniData">
                <div class="row"><span>not a p row</span></div>
                <div class="row"><p>Setting</p><p>Urban</p></div>
            </div>
        </body></html>"#;
        let record = extractor().extract(html).unwrap();
        assert_eq!(record.attributes.len(), 1);
        assert_eq!(record.attributes[0].label, "Setting");
    }
}
