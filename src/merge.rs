//! Record merging: join the university, deadline, and faculty datasets into
//! the final authoritative record set.
//!
//! The university dataset anchors two sequential left-joins on the
//! normalized name key. Anchor rows are never dropped or duplicated, no
//! matter how many (or few) rows the other datasets contribute under the
//! same key. Absent matches fill with explicit sentinels so downstream
//! consumers never observe missing fields. The output is rebuilt wholesale
//! on every merge run.

use crate::models::{normalize, FacultyMember, FinalRecord, NormalizedKey, UniversityRecord, NA, NOT_FOUND};
use crate::reconcile::SuccessStore;
use itertools::Itertools;
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Group the flat faculty dataset by normalized affiliation.
///
/// Rows with an absent name are removed before grouping, so empty-name rows
/// never appear in any final professor list. Multiple members under one key
/// are expected; they are the point of the grouping.
#[instrument(level = "info", skip_all, fields(rows = rows.len()))]
pub fn group_faculty(rows: Vec<FacultyMember>) -> BTreeMap<NormalizedKey, Vec<FacultyMember>> {
    let grouped: BTreeMap<NormalizedKey, Vec<FacultyMember>> = rows
        .into_iter()
        .filter(|member| !member.name.trim().is_empty())
        .map(|member| (normalize(&member.affiliation), member))
        .into_group_map()
        .into_iter()
        .collect();
    info!(groups = grouped.len(), "Grouped faculty by affiliation");
    grouped
}

/// Produce one [`FinalRecord`] per anchor row via two left-joins.
#[instrument(level = "info", skip_all, fields(anchors = anchors.len()))]
pub fn merge(
    anchors: &[UniversityRecord],
    deadlines: &SuccessStore,
    faculty: &BTreeMap<NormalizedKey, Vec<FacultyMember>>,
) -> Vec<FinalRecord> {
    let records: Vec<FinalRecord> = anchors
        .iter()
        .map(|anchor| {
            let key = normalize(&anchor.name);

            let (deadline_info, deadline_url) = match deadlines.get(&key) {
                Some(result) => (result.outcome.encode(), result.page_url_or_na().to_string()),
                None => (NOT_FOUND.to_string(), NA.to_string()),
            };

            let professors = faculty.get(&key).cloned().unwrap_or_default();

            FinalRecord {
                university_name: anchor.name.clone(),
                university_website: anchor.website.clone(),
                university_data: anchor.attributes_json(),
                rankings_data: anchor.rankings_json(),
                deadline_info,
                deadline_url,
                professors,
            }
        })
        .collect();

    let with_deadlines = records.iter().filter(|r| r.deadline_info != NOT_FOUND).count();
    let with_faculty = records.iter().filter(|r| !r.professors.is_empty()).count();
    info!(
        total = records.len(),
        with_deadlines,
        with_faculty,
        "Merged final record set"
    );
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeadlineOutcome, DeadlineResult};

    fn anchor(name: &str) -> UniversityRecord {
        UniversityRecord {
            name: name.to_string(),
            website: format!("https://{}.edu", name.to_lowercase().replace(' ', "")),
            attributes: vec![],
            rankings: vec![],
        }
    }

    fn member(name: &str, affiliation: &str) -> FacultyMember {
        FacultyMember {
            name: name.to_string(),
            affiliation: affiliation.to_string(),
            homepage: NA.to_string(),
            dblp: NA.to_string(),
            areas: vec![],
        }
    }

    #[test]
    fn test_merge_completeness_one_row_per_anchor() {
        let anchors = vec![anchor("Acme U"), anchor("Borealis College")];
        let mut deadlines = SuccessStore::new();
        deadlines.insert(
            normalize("Acme U"),
            DeadlineResult {
                university: "Acme U".to_string(),
                outcome: DeadlineOutcome::Found("...May 1...".to_string()),
                page_url: Some("https://acmeu.edu/apply".to_string()),
            },
        );

        let out = merge(&anchors, &deadlines, &BTreeMap::new());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].deadline_info, "...May 1...");
        assert_eq!(out[0].deadline_url, "https://acmeu.edu/apply");
        assert_eq!(out[1].deadline_info, NOT_FOUND);
        assert_eq!(out[1].deadline_url, NA);
    }

    #[test]
    fn test_end_to_end_defaults() {
        // Anchor only, empty success store, no faculty.
        let anchors = vec![UniversityRecord {
            name: "Acme U".to_string(),
            website: NOT_FOUND.to_string(),
            attributes: vec![],
            rankings: vec![],
        }];
        let out = merge(&anchors, &SuccessStore::new(), &BTreeMap::new());

        assert_eq!(out.len(), 1);
        let record = &out[0];
        assert_eq!(record.university_name, "Acme U");
        assert_eq!(record.deadline_info, NOT_FOUND);
        assert_eq!(record.deadline_url, NA);
        assert_eq!(record.professors_json(), "[]");
    }

    #[test]
    fn test_faculty_grouping_drops_empty_names() {
        let rows = vec![
            member("Jane Doe", "Acme U"),
            member("", "Acme U"),
            member("   ", "Acme U"),
            member("Sam Roe", "Acme U"),
        ];
        let grouped = group_faculty(rows);
        assert_eq!(grouped.get(&normalize("Acme U")).unwrap().len(), 2);
    }

    #[test]
    fn test_multiple_faculty_join_under_one_anchor() {
        let anchors = vec![anchor("Acme U")];
        let grouped = group_faculty(vec![
            member("Jane Doe", "Acme University"),
            member("Sam Roe", "acme university!"),
        ]);
        // Both spellings normalize away from the anchor's "Acme U", so no
        // match here; group them under the anchor's own spelling instead.
        assert!(merge(&anchors, &SuccessStore::new(), &grouped)[0].professors.is_empty());

        let grouped = group_faculty(vec![
            member("Jane Doe", "Acme U"),
            member("Sam Roe", "ACME U!"),
        ]);
        let out = merge(&anchors, &SuccessStore::new(), &grouped);
        assert_eq!(out[0].professors.len(), 2);
    }

    #[test]
    fn test_anchor_fields_carried_through() {
        use crate::models::{Attribute, Ranking};
        let anchors = vec![UniversityRecord {
            name: "Acme U".to_string(),
            website: "https://acme.edu".to_string(),
            attributes: vec![Attribute { label: "Founded".to_string(), value: "1870".to_string() }],
            rankings: vec![Ranking { rank: "#5".to_string(), subject: "CS".to_string() }],
        }];
        let out = merge(&anchors, &SuccessStore::new(), &BTreeMap::new());
        assert_eq!(out[0].university_website, "https://acme.edu");
        assert_eq!(out[0].university_data, r#"{"Founded":"1870"}"#);
        assert_eq!(out[0].rankings_data, r##"["#5 in CS"]"##);
    }
}
