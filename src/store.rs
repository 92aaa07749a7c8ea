//! CSV interchange between pipeline stages.
//!
//! Every dataset crosses stage boundaries as a UTF-8 CSV with a header row,
//! using the legacy column names so files from earlier deployments stay
//! readable:
//!
//! | Dataset | Columns |
//! |---------|---------|
//! | URL list | `Url` |
//! | University data (universe + anchor) | `Name, Website, Data, Rankings` |
//! | Deadline run / success store | `University, Found Deadline Info, Deadline Page URL` |
//! | Retry list | `University` |
//! | Faculty | `name, affiliation, homepage, dblp, areas` |
//! | Final dataset | seven `university_*`/`deadline_*`/`professors` columns |
//!
//! Nested data (`Data`, `Rankings`, `professors`) is JSON inside the cell;
//! the typed models own the schema and this module owns the encoding. A
//! missing required input is fatal for the calling stage only: it surfaces
//! as [`StoreError::InputMissing`] before any output file is touched.

use crate::models::{
    normalize, Attribute, DeadlineOutcome, DeadlineResult, FacultyMember, FinalRecord, Ranking,
    UniversityRecord,
};
use crate::reconcile::SuccessStore;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error as ThisError;
use tracing::{info, instrument, warn};

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("required input file {path:?} was not found; run the upstream stage first")]
    InputMissing { path: String },

    #[error("csv error in {path:?}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("io error on {path:?}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path:?} has no {column:?} column")]
    MissingColumn { path: String, column: String },
}

fn open_reader(path: &str) -> Result<csv::Reader<std::fs::File>, StoreError> {
    if !Path::new(path).exists() {
        return Err(StoreError::InputMissing { path: path.to_string() });
    }
    csv::Reader::from_path(path).map_err(|source| StoreError::Csv { path: path.to_string(), source })
}

fn open_writer(path: &str) -> Result<csv::Writer<std::fs::File>, StoreError> {
    csv::Writer::from_path(path).map_err(|source| StoreError::Csv { path: path.to_string(), source })
}

fn csv_err(path: &str, source: csv::Error) -> StoreError {
    StoreError::Csv { path: path.to_string(), source }
}

/// Read one named column out of any CSV with at least that column.
fn read_column(path: &str, column: &str) -> Result<Vec<String>, StoreError> {
    let mut reader = open_reader(path)?;
    let headers = reader.headers().map_err(|e| csv_err(path, e))?.clone();
    let index = headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| StoreError::MissingColumn {
            path: path.to_string(),
            column: column.to_string(),
        })?;

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_err(path, e))?;
        if let Some(value) = record.get(index) {
            if !value.trim().is_empty() {
                values.push(value.to_string());
            }
        }
    }
    Ok(values)
}

/// Read the universe of entity names (`Name` column).
#[instrument(level = "info", fields(%path))]
pub fn read_universe(path: &str) -> Result<Vec<String>, StoreError> {
    let names = read_column(path, "Name")?;
    info!(count = names.len(), "Loaded universe");
    Ok(names)
}

/// Read the detail-page URL list (`Url` column).
#[instrument(level = "info", fields(%path))]
pub fn read_url_list(path: &str) -> Result<Vec<String>, StoreError> {
    let urls = read_column(path, "Url")?;
    info!(count = urls.len(), "Loaded detail page URLs");
    Ok(urls)
}

#[derive(Debug, Deserialize, Serialize)]
struct UniversityRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Website")]
    website: String,
    #[serde(rename = "Data")]
    data: String,
    #[serde(rename = "Rankings")]
    rankings: String,
}

fn decode_attributes(data: &str) -> Vec<Attribute> {
    // serde_json's preserve_order feature keeps document order through the
    // object round trip.
    match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(data) {
        Ok(map) => map
            .into_iter()
            .map(|(label, value)| Attribute {
                label,
                value: match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                },
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "Unparseable Data cell; treating as empty");
            Vec::new()
        }
    }
}

fn decode_rankings(rankings: &str) -> Vec<Ranking> {
    match serde_json::from_str::<Vec<String>>(rankings) {
        Ok(rendered) => rendered
            .into_iter()
            .map(|entry| match entry.split_once(" in ") {
                Some((rank, subject)) => Ranking {
                    rank: rank.to_string(),
                    subject: subject.to_string(),
                },
                None => Ranking { rank: entry, subject: String::new() },
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "Unparseable Rankings cell; treating as empty");
            Vec::new()
        }
    }
}

/// Write the Entity Extractor output.
#[instrument(level = "info", skip(records), fields(%path, count = records.len()))]
pub fn write_university_data(path: &str, records: &[UniversityRecord]) -> Result<(), StoreError> {
    let mut writer = open_writer(path)?;
    for record in records {
        writer
            .serialize(UniversityRow {
                name: record.name.clone(),
                website: record.website.clone(),
                data: record.attributes_json(),
                rankings: record.rankings_json(),
            })
            .map_err(|e| csv_err(path, e))?;
    }
    writer.flush().map_err(|source| StoreError::Io { path: path.to_string(), source })?;
    info!("Wrote university data");
    Ok(())
}

/// Read the Entity Extractor output back as typed records.
#[instrument(level = "info", fields(%path))]
pub fn read_university_data(path: &str) -> Result<Vec<UniversityRecord>, StoreError> {
    let mut reader = open_reader(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize::<UniversityRow>() {
        let row = row.map_err(|e| csv_err(path, e))?;
        records.push(UniversityRecord {
            name: row.name,
            website: row.website,
            attributes: decode_attributes(&row.data),
            rankings: decode_rankings(&row.rankings),
        });
    }
    info!(count = records.len(), "Loaded university data");
    Ok(records)
}

#[derive(Debug, Deserialize, Serialize)]
struct DeadlineRow {
    #[serde(rename = "University")]
    university: String,
    #[serde(rename = "Found Deadline Info")]
    info: String,
    #[serde(rename = "Deadline Page URL")]
    page_url: String,
}

impl DeadlineRow {
    fn encode(result: &DeadlineResult) -> Self {
        Self {
            university: result.university.clone(),
            info: result.outcome.encode(),
            page_url: result.page_url_or_na().to_string(),
        }
    }

    fn decode(self) -> DeadlineResult {
        let page_url = if self.page_url == crate::models::NA || self.page_url.is_empty() {
            None
        } else {
            Some(self.page_url)
        };
        DeadlineResult {
            university: self.university,
            outcome: DeadlineOutcome::decode(&self.info),
            page_url,
        }
    }
}

fn write_deadline_rows(path: &str, results: &[DeadlineResult]) -> Result<(), StoreError> {
    let mut writer = open_writer(path)?;
    for result in results {
        writer.serialize(DeadlineRow::encode(result)).map_err(|e| csv_err(path, e))?;
    }
    writer.flush().map_err(|source| StoreError::Io { path: path.to_string(), source })
}

/// Write one mining run's results.
#[instrument(level = "info", skip(results), fields(%path, count = results.len()))]
pub fn write_deadline_run(path: &str, results: &[DeadlineResult]) -> Result<(), StoreError> {
    write_deadline_rows(path, results)?;
    info!("Wrote deadline run");
    Ok(())
}

/// Read one mining run's results.
#[instrument(level = "info", fields(%path))]
pub fn read_deadline_run(path: &str) -> Result<Vec<DeadlineResult>, StoreError> {
    let mut reader = open_reader(path)?;
    let mut results = Vec::new();
    for row in reader.deserialize::<DeadlineRow>() {
        results.push(row.map_err(|e| csv_err(path, e))?.decode());
    }
    info!(count = results.len(), "Loaded deadline run");
    Ok(results)
}

/// Read the persisted success store; an absent file means an empty store.
#[instrument(level = "info", fields(%path))]
pub fn read_success_store(path: &str) -> Result<SuccessStore, StoreError> {
    if !Path::new(path).exists() {
        info!("No prior success store");
        return Ok(SuccessStore::new());
    }
    let mut store = SuccessStore::new();
    let mut reader = open_reader(path)?;
    for row in reader.deserialize::<DeadlineRow>() {
        let result = row.map_err(|e| csv_err(path, e))?.decode();
        store.insert(normalize(&result.university), result);
    }
    info!(count = store.len(), "Loaded success store");
    Ok(store)
}

/// Persist the success store, sorted by university display name.
#[instrument(level = "info", skip(store), fields(%path, count = store.len()))]
pub fn write_success_store(path: &str, store: &SuccessStore) -> Result<(), StoreError> {
    let sorted: Vec<DeadlineResult> = store
        .values()
        .cloned()
        .sorted_by(|a, b| a.university.cmp(&b.university))
        .collect();
    write_deadline_rows(path, &sorted)?;
    info!("Wrote success store");
    Ok(())
}

#[derive(Debug, Deserialize, Serialize)]
struct RetryRow {
    #[serde(rename = "University")]
    university: String,
}

/// Persist the retry list, or delete a stale one when the list is empty.
///
/// An empty retry set actively removes any previously persisted artifact so
/// it cannot be reused by mistake.
#[instrument(level = "info", skip(retry), fields(%path, count = retry.len()))]
pub fn persist_retry_list(path: &str, retry: &[String]) -> Result<(), StoreError> {
    if retry.is_empty() {
        if Path::new(path).exists() {
            std::fs::remove_file(path)
                .map_err(|source| StoreError::Io { path: path.to_string(), source })?;
            info!("No retries left; removed stale retry list");
        }
        return Ok(());
    }
    let mut writer = open_writer(path)?;
    for university in retry {
        writer
            .serialize(RetryRow { university: university.clone() })
            .map_err(|e| csv_err(path, e))?;
    }
    writer.flush().map_err(|source| StoreError::Io { path: path.to_string(), source })?;
    info!("Wrote retry list");
    Ok(())
}

/// Read the persisted retry list (`University` column).
#[instrument(level = "info", fields(%path))]
pub fn read_retry_list(path: &str) -> Result<Vec<String>, StoreError> {
    let names = read_column(path, "University")?;
    info!(count = names.len(), "Loaded retry list");
    Ok(names)
}

#[derive(Debug, Deserialize, Serialize)]
struct FacultyRow {
    name: String,
    affiliation: String,
    homepage: String,
    dblp: String,
    areas: String,
}

/// Write the flat faculty dataset; `areas` is comma-joined.
#[instrument(level = "info", skip(members), fields(%path, count = members.len()))]
pub fn write_faculty(path: &str, members: &[FacultyMember]) -> Result<(), StoreError> {
    let mut writer = open_writer(path)?;
    for member in members {
        writer
            .serialize(FacultyRow {
                name: member.name.clone(),
                affiliation: member.affiliation.clone(),
                homepage: member.homepage.clone(),
                dblp: member.dblp.clone(),
                areas: member.areas.join(", "),
            })
            .map_err(|e| csv_err(path, e))?;
    }
    writer.flush().map_err(|source| StoreError::Io { path: path.to_string(), source })?;
    info!("Wrote faculty dataset");
    Ok(())
}

/// Read the flat faculty dataset.
#[instrument(level = "info", fields(%path))]
pub fn read_faculty(path: &str) -> Result<Vec<FacultyMember>, StoreError> {
    let mut reader = open_reader(path)?;
    let mut members = Vec::new();
    for row in reader.deserialize::<FacultyRow>() {
        let row = row.map_err(|e| csv_err(path, e))?;
        members.push(FacultyMember {
            name: row.name,
            affiliation: row.affiliation,
            homepage: row.homepage,
            dblp: row.dblp,
            areas: row
                .areas
                .split(',')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
        });
    }
    info!(count = members.len(), "Loaded faculty dataset");
    Ok(members)
}

#[derive(Debug, Deserialize, Serialize)]
struct FinalRow {
    university_name: String,
    university_website: String,
    university_data: String,
    rankings_data: String,
    deadline_info: String,
    deadline_url: String,
    professors: String,
}

/// Write the final merged dataset.
#[instrument(level = "info", skip(records), fields(%path, count = records.len()))]
pub fn write_final(path: &str, records: &[FinalRecord]) -> Result<(), StoreError> {
    let mut writer = open_writer(path)?;
    for record in records {
        writer
            .serialize(FinalRow {
                university_name: record.university_name.clone(),
                university_website: record.university_website.clone(),
                university_data: record.university_data.clone(),
                rankings_data: record.rankings_data.clone(),
                deadline_info: record.deadline_info.clone(),
                deadline_url: record.deadline_url.clone(),
                professors: record.professors_json(),
            })
            .map_err(|e| csv_err(path, e))?;
    }
    writer.flush().map_err(|source| StoreError::Io { path: path.to_string(), source })?;
    info!("Wrote final dataset");
    Ok(())
}

/// Read the final merged dataset.
///
/// A `professors` cell that fails to parse as JSON is treated as absent.
#[instrument(level = "info", fields(%path))]
pub fn read_final(path: &str) -> Result<Vec<FinalRecord>, StoreError> {
    let mut reader = open_reader(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize::<FinalRow>() {
        let row = row.map_err(|e| csv_err(path, e))?;
        let professors = serde_json::from_str::<Vec<FacultyMember>>(&row.professors)
            .unwrap_or_else(|e| {
                warn!(university = %row.university_name, error = %e, "Unparseable professors cell; treating as absent");
                Vec::new()
            });
        records.push(FinalRecord {
            university_name: row.university_name,
            university_website: row.university_website,
            university_data: row.university_data,
            rankings_data: row.rankings_data,
            deadline_info: row.deadline_info,
            deadline_url: row.deadline_url,
            professors,
        });
    }
    info!(count = records.len(), "Loaded final dataset");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attribute, Ranking, NA, NOT_FOUND};
    use tempfile::tempdir;

    fn path_in(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_str().unwrap().to_string()
    }

    #[test]
    fn test_missing_input_is_reported_not_panicked() {
        let err = read_universe("/nonexistent/universe.csv").unwrap_err();
        assert!(matches!(err, StoreError::InputMissing { .. }));
    }

    #[test]
    fn test_universe_requires_name_column() {
        let dir = tempdir().unwrap();
        let path = path_in(&dir, "bad.csv");
        std::fs::write(&path, "Title\nAcme U\n").unwrap();
        let err = read_universe(&path).unwrap_err();
        assert!(matches!(err, StoreError::MissingColumn { .. }));
    }

    #[test]
    fn test_university_data_round_trip() {
        let dir = tempdir().unwrap();
        let path = path_in(&dir, "unis.csv");
        let records = vec![UniversityRecord {
            name: "Acme U".to_string(),
            website: "https://acme.edu".to_string(),
            attributes: vec![
                Attribute { label: "Total enrollment".to_string(), value: "12,000".to_string() },
                Attribute { label: "Founded".to_string(), value: "1870".to_string() },
            ],
            rankings: vec![Ranking { rank: "#5".to_string(), subject: "Computer Science".to_string() }],
        }];

        write_university_data(&path, &records).unwrap();
        let loaded = read_university_data(&path).unwrap();
        assert_eq!(loaded, records);

        // The universe view reads the same file.
        assert_eq!(read_universe(&path).unwrap(), vec!["Acme U".to_string()]);
    }

    #[test]
    fn test_deadline_run_round_trip_preserves_outcomes() {
        let dir = tempdir().unwrap();
        let path = path_in(&dir, "run.csv");
        let results = vec![
            DeadlineResult {
                university: "Acme U".to_string(),
                outcome: DeadlineOutcome::Found("...May 1...".to_string()),
                page_url: Some("https://acme.edu/apply".to_string()),
            },
            DeadlineResult {
                university: "Borealis College".to_string(),
                outcome: DeadlineOutcome::NoPage,
                page_url: None,
            },
        ];

        write_deadline_run(&path, &results).unwrap();
        let loaded = read_deadline_run(&path).unwrap();
        assert_eq!(loaded, results);

        // The raw cell for the failure carries the legacy sentinel.
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("Could not find deadline page."));
        assert!(raw.contains(NA));
    }

    #[test]
    fn test_success_store_sorted_by_university() {
        let dir = tempdir().unwrap();
        let path = path_in(&dir, "successful.csv");
        let mut store = SuccessStore::new();
        for name in ["Zenith U", "Acme U", "Midway College"] {
            store.insert(
                normalize(name),
                DeadlineResult {
                    university: name.to_string(),
                    outcome: DeadlineOutcome::Found("...Jan 15...".to_string()),
                    page_url: None,
                },
            );
        }
        write_success_store(&path, &store).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert!(lines[1].starts_with("Acme U"));
        assert!(lines[2].starts_with("Midway College"));
        assert!(lines[3].starts_with("Zenith U"));

        assert_eq!(read_success_store(&path).unwrap(), store);
    }

    #[test]
    fn test_absent_success_store_is_empty() {
        let dir = tempdir().unwrap();
        let path = path_in(&dir, "successful.csv");
        assert!(read_success_store(&path).unwrap().is_empty());
    }

    #[test]
    fn test_empty_retry_list_deletes_stale_file() {
        let dir = tempdir().unwrap();
        let path = path_in(&dir, "retry_list.csv");

        persist_retry_list(&path, &["Acme U".to_string()]).unwrap();
        assert!(Path::new(&path).exists());
        assert_eq!(read_retry_list(&path).unwrap(), vec!["Acme U".to_string()]);

        persist_retry_list(&path, &[]).unwrap();
        assert!(!Path::new(&path).exists());

        // Deleting when nothing exists is a no-op.
        persist_retry_list(&path, &[]).unwrap();
    }

    #[test]
    fn test_faculty_round_trip_comma_joined_areas() {
        let dir = tempdir().unwrap();
        let path = path_in(&dir, "profs.csv");
        let members = vec![FacultyMember {
            name: "Jane Doe".to_string(),
            affiliation: "Acme U".to_string(),
            homepage: "https://jane.example.org/".to_string(),
            dblp: NA.to_string(),
            areas: vec!["ai".to_string(), "ml".to_string()],
        }];

        write_faculty(&path, &members).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"ai, ml\""));
        assert_eq!(read_faculty(&path).unwrap(), members);
    }

    #[test]
    fn test_final_round_trip_and_malformed_professors() {
        let dir = tempdir().unwrap();
        let path = path_in(&dir, "final.csv");
        let records = vec![FinalRecord {
            university_name: "Acme U".to_string(),
            university_website: NOT_FOUND.to_string(),
            university_data: "{}".to_string(),
            rankings_data: "[]".to_string(),
            deadline_info: NOT_FOUND.to_string(),
            deadline_url: NA.to_string(),
            professors: vec![],
        }];
        write_final(&path, &records).unwrap();
        assert_eq!(read_final(&path).unwrap(), records);

        // Corrupt the professors cell: it degrades to absent, not an error.
        std::fs::write(
            &path,
            "university_name,university_website,university_data,rankings_data,deadline_info,deadline_url,professors\n\
             Acme U,Not Found,{},[],Not Found,N/A,not-json\n",
        )
        .unwrap();
        let loaded = read_final(&path).unwrap();
        assert!(loaded[0].professors.is_empty());
    }
}
