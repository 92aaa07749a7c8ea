//! Structured extraction from rendered pages.
//!
//! Each extractor turns one rendered page into flat records, and follows the
//! same pattern:
//!
//! 1. **Selection**: locate containers via configured CSS selectors
//! 2. **Best-effort sub-extraction**: a missing sub-container degrades to a
//!    sentinel or an empty collection, never a failed record; partial data
//!    is strictly preferred over no data
//!
//! # Extractors
//!
//! | Page | Module | Output |
//! |------|--------|--------|
//! | University detail page | [`university`] | One `UniversityRecord` |
//! | Faculty roster page | [`faculty`] | Flat `FacultyMember` rows |
//!
//! Fetch loops are sequential with a randomized politeness pause; failed
//! pages are logged and skipped without failing the batch.

pub mod faculty;
pub mod university;
