//! Core data models for the catalog pipeline

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::ItemError;

/// Stage 1 output: file stem to absolute path.
///
/// Backed by a sorted map so checkpoints serialize in a stable order.
pub type ScanCatalog = BTreeMap<String, String>;

/// A file that survived the size and extension filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    /// File name without its final extension
    pub file_stem: String,
    /// Absolute path to the file
    pub absolute_path: String,
}

/// Two files with the same stem; only `kept` is in the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StemCollision {
    pub stem: String,
    /// Path that was processed last and kept
    pub kept: String,
    /// Path that was overwritten
    pub replaced: String,
}

/// Result of a directory scan
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Accepted entries keyed by stem
    pub catalog: ScanCatalog,
    /// Stems seen more than once
    pub collisions: Vec<StemCollision>,
    /// Total number of files inspected
    pub total_files: u64,
    /// Total number of directories traversed
    pub total_dirs: u64,
    /// Files rejected by size or extension
    pub skipped_files: u64,
    /// Errors encountered during scanning
    pub errors: Vec<ItemError>,
    /// Total scan duration in milliseconds
    pub duration_ms: u64,
}

impl ScanResult {
    /// Create a new empty scan result
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, recording a collision if the stem already exists
    pub fn insert(&mut self, entry: ScanEntry) {
        if let Some(replaced) = self
            .catalog
            .insert(entry.file_stem.clone(), entry.absolute_path.clone())
        {
            if replaced != entry.absolute_path {
                self.collisions.push(StemCollision {
                    stem: entry.file_stem,
                    kept: entry.absolute_path,
                    replaced,
                });
            }
        }
    }

    /// Get the number of errors
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Check if the scan completed without errors
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Structured metadata guessed from one cataloged file name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseMovieRecord {
    pub path_to_movie: String,
    pub file_name: String,
    /// Title-cased when present
    pub title: Option<String>,
    pub year: Option<i32>,
    pub cd: Option<Value>,
    pub format: Option<Value>,
    pub screen_size: Option<Value>,
    pub video_codec: Option<Value>,
    pub release_group: Option<Value>,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
}

impl BaseMovieRecord {
    /// A record with only the identifying fields set
    pub fn new(path_to_movie: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            path_to_movie: path_to_movie.into(),
            file_name: file_name.into(),
            title: None,
            year: None,
            cd: None,
            format: None,
            screen_size: None,
            video_codec: None,
            release_group: None,
            media_type: None,
        }
    }

    /// Whether the record carries a usable title
    pub fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

/// Result of base-data extraction, split into classification buckets
#[derive(Debug, Clone, Default)]
pub struct BaseDataResult {
    /// Records with a non-empty title
    pub movies_with_base_info: Vec<BaseMovieRecord>,
    /// Records where no title could be guessed
    pub movies_without_info: Vec<BaseMovieRecord>,
    /// Entries that failed to process
    pub errors: Vec<ItemError>,
    /// Total duration in milliseconds
    pub duration_ms: u64,
}

impl BaseDataResult {
    /// Create a new empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a record into exactly one bucket
    pub fn classify(&mut self, record: BaseMovieRecord) {
        if record.has_title() {
            self.movies_with_base_info.push(record);
        } else {
            self.movies_without_info.push(record);
        }
    }

    /// Number of records processed successfully
    pub fn total_records(&self) -> usize {
        self.movies_with_base_info.len() + self.movies_without_info.len()
    }

    /// Get the number of errors
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Title/year pair sent to the metadata service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieQuery {
    pub title: String,
    pub year: Option<i32>,
}

/// What enriching a single input produced
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentOutcome {
    /// The service answered; the body is passed through untouched
    Found { query: MovieQuery, response: Value },
    /// The guess says this is not a movie
    NotAMovie(String),
    /// Guessed as a movie but without a title to query
    Untitled(String),
}

/// Buckets accumulated over a run of enrichment calls
#[derive(Debug, Clone, Default)]
pub struct EnrichmentReport {
    /// Inputs the service answered for
    pub found: u64,
    /// Inputs guessed as something other than a movie
    pub not_a_movie: Vec<String>,
    /// Inputs guessed as a movie but without a usable title
    pub movie_not_found: Vec<String>,
    /// Recoverable failures (guess or service)
    pub errors: Vec<ItemError>,
    /// Total duration in milliseconds
    pub duration_ms: u64,
}

impl EnrichmentReport {
    /// Number of inputs handled, failures included
    pub fn total_inputs(&self) -> u64 {
        self.found
            + self.not_a_movie.len() as u64
            + self.movie_not_found.len() as u64
            + self.errors.len() as u64
    }

    /// Get the number of errors
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(stem: &str, path: &str) -> ScanEntry {
        ScanEntry {
            file_stem: stem.to_string(),
            absolute_path: path.to_string(),
        }
    }

    #[test]
    fn test_scan_result_insert_and_collision() {
        let mut result = ScanResult::new();
        result.insert(entry("Heat.1995", "/a/Heat.1995.avi"));
        result.insert(entry("Heat.1995", "/a/Heat.1995.mkv"));

        assert_eq!(result.catalog.len(), 1);
        assert_eq!(result.catalog["Heat.1995"], "/a/Heat.1995.mkv");
        assert_eq!(
            result.collisions,
            vec![StemCollision {
                stem: "Heat.1995".to_string(),
                kept: "/a/Heat.1995.mkv".to_string(),
                replaced: "/a/Heat.1995.avi".to_string(),
            }]
        );
    }

    #[test]
    fn test_same_path_twice_is_not_a_collision() {
        let mut result = ScanResult::new();
        result.insert(entry("Heat", "/a/Heat.mkv"));
        result.insert(entry("Heat", "/a/Heat.mkv"));
        assert!(result.collisions.is_empty());
    }

    #[test]
    fn test_record_serializes_absent_as_null() {
        let record = BaseMovieRecord::new("/m/x.mkv", "x");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["path_to_movie"], "/m/x.mkv");
        assert_eq!(json["file_name"], "x");
        for key in [
            "title",
            "year",
            "cd",
            "format",
            "screen_size",
            "video_codec",
            "release_group",
            "type",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
            assert!(json[key].is_null());
        }
    }

    #[test]
    fn test_classify_buckets() {
        let mut result = BaseDataResult::new();

        let mut titled = BaseMovieRecord::new("/m/a.mkv", "a");
        titled.title = Some("Alien".to_string());
        let mut blank = BaseMovieRecord::new("/m/b.mkv", "b");
        blank.title = Some("   ".to_string());
        let untitled = BaseMovieRecord::new("/m/c.mkv", "c");

        result.classify(titled);
        result.classify(blank);
        result.classify(untitled);

        assert_eq!(result.movies_with_base_info.len(), 1);
        assert_eq!(result.movies_without_info.len(), 2);
        assert_eq!(result.total_records(), 3);
    }
}
