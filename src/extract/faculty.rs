//! Faculty roster page extractor.
//!
//! Simpler sibling of the detail-page extractor: one rendered roster page
//! yields flat [`FacultyMember`] rows for a single affiliation. A row needs
//! at least two cells and a name anchor in the second cell; anything else is
//! skipped. Rows never fail the page.

use crate::config::FacultySelectors;
use crate::models::{FacultyMember, NA};
use crate::utils::parse_selector;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::error::Error;
use tracing::{debug, info, instrument};

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Roster-page extractor with selectors parsed once up front.
pub struct FacultyExtractor {
    row: Selector,
    cell: Selector,
    area: Selector,
}

impl FacultyExtractor {
    pub fn new(selectors: &FacultySelectors) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            row: parse_selector(&selectors.row)?,
            cell: parse_selector(&selectors.cell)?,
            area: parse_selector(&selectors.area)?,
        })
    }

    /// Extract every faculty row from a rendered roster page.
    ///
    /// `affiliation` is the university display name the rows belong to; it
    /// becomes the grouping key downstream.
    #[instrument(level = "info", skip_all, fields(%affiliation))]
    pub fn extract(&self, html: &str, affiliation: &str) -> Vec<FacultyMember> {
        let document = Html::parse_document(html);
        let mut members = Vec::new();

        for row in document.select(&self.row) {
            let cells: Vec<_> = row.select(&self.cell).collect();
            // The second cell carries the member info.
            if cells.len() < 2 {
                continue;
            }
            let cell = cells[1];

            let Some(name_anchor) = cell.select(&ANCHOR_SELECTOR).next() else {
                debug!("Roster row without a name anchor; skipping");
                continue;
            };
            let name = name_anchor.text().collect::<String>().trim().to_string();
            if name.is_empty() {
                continue;
            }
            let homepage = name_anchor
                .value()
                .attr("href")
                .map(str::to_string)
                .unwrap_or_else(|| NA.to_string());

            let dblp = cell
                .select(&ANCHOR_SELECTOR)
                .find(|a| a.value().attr("href").is_some_and(|h| h.contains("dblp.org")))
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string)
                .unwrap_or_else(|| NA.to_string());

            let areas = cell
                .select(&self.area)
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|a| !a.is_empty())
                .collect();

            members.push(FacultyMember {
                name,
                affiliation: affiliation.to_string(),
                homepage,
                dblp,
                areas,
            });
        }

        info!(count = members.len(), "Extracted faculty members");
        members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> FacultyExtractor {
        FacultyExtractor::new(&FacultySelectors::default()).unwrap()
    }

    const ROSTER: &str = r#"<html><body><table><tbody>
        <tr>
            <td>1</td>
            <td>
                <a href="https://jane.example.org/">Jane Doe</a>
                <a href="https://dblp.org/pid/12/345">[dblp]</a>
                <span class="areaname"><span>ai</span></span>
                <span class="areaname"><span>ml</span></span>
            </td>
        </tr>
        <tr><td>only one cell</td></tr>
        <tr>
            <td>2</td>
            <td><span>no anchor here</span></td>
        </tr>
        <tr>
            <td>3</td>
            <td><a href="https://sam.example.edu/">Sam Roe</a></td>
        </tr>
    </tbody></table></body></html>"#;

    #[test]
    fn test_extract_roster_rows() {
        let members = extractor().extract(ROSTER, "Acme University");
        assert_eq!(members.len(), 2);

        let jane = &members[0];
        assert_eq!(jane.name, "Jane Doe");
        assert_eq!(jane.affiliation, "Acme University");
        assert_eq!(jane.homepage, "https://jane.example.org/");
        assert_eq!(jane.dblp, "https://dblp.org/pid/12/345");
        assert_eq!(jane.areas, vec!["ai".to_string(), "ml".to_string()]);

        let sam = &members[1];
        assert_eq!(sam.name, "Sam Roe");
        assert_eq!(sam.dblp, NA);
        assert!(sam.areas.is_empty());
    }

    #[test]
    fn test_empty_page_yields_no_rows() {
        let members = extractor().extract("<html><body></body></html>", "Acme University");
        assert!(members.is_empty());
    }
}
