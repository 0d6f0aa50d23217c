//! Base-data extraction: guess structured metadata for every cataloged file

use std::time::Instant;

use crate::checkpoint::CheckpointStore;
use crate::error::{log_error_report, CatalogError, ItemError};
use crate::guess::{Guess, GuessMetadata, GuessOptions};
use crate::models::{BaseDataResult, BaseMovieRecord, ScanCatalog};
use crate::normalize::title_case;
use crate::progress::{ProgressReporter, Stage, StageProgress};

/// Map a raw guess onto a record. Unset keys become `None`; a blank title
/// counts as unset.
pub fn record_from_guess(file_name: &str, path_to_movie: &str, guess: &Guess) -> BaseMovieRecord {
    let title = guess
        .title()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(title_case);

    BaseMovieRecord {
        path_to_movie: path_to_movie.to_string(),
        file_name: file_name.to_string(),
        title,
        year: guess.year(),
        cd: guess.get("cd").cloned(),
        format: guess.get("format").cloned(),
        screen_size: guess.get("screen_size").cloned(),
        video_codec: guess.get("video_codec").cloned(),
        release_group: guess.get("release_group").cloned(),
        media_type: guess.media_type().map(str::to_string),
    }
}

/// Guess and classify every catalog entry, in stem order.
///
/// A failing guess is logged into the result's error list and the loop
/// moves on.
pub fn extract_base_data<G>(
    catalog: &ScanCatalog,
    guesser: &G,
    reporter: &ProgressReporter,
) -> BaseDataResult
where
    G: GuessMetadata + ?Sized,
{
    let start = Instant::now();
    let options = GuessOptions::batch();
    let mut result = BaseDataResult::new();
    let mut progress = StageProgress {
        total: Some(catalog.len() as u64),
        ..Default::default()
    };

    reporter.report_start(Stage::BaseData, progress.total);

    for (file_name, path_to_movie) in catalog {
        progress.processed += 1;

        match guesser.guess(file_name, &options) {
            Ok(guess) => {
                let record = record_from_guess(file_name, path_to_movie, &guess);
                if record.has_title() {
                    progress.accepted += 1;
                } else {
                    log::debug!("No title guessed for {:?}", file_name);
                }
                result.classify(record);
            }
            Err(e) => result.errors.push(ItemError::guess_failed(path_to_movie, &e)),
        }

        if reporter.should_report() {
            progress.current = file_name.clone();
            reporter.report_progress(Stage::BaseData, &progress);
        }
    }

    result.duration_ms = start.elapsed().as_millis() as u64;
    reporter.report_done(
        Stage::BaseData,
        &progress,
        result.error_count(),
        result.duration_ms,
    );
    result
}

/// Stage 2: read the scan checkpoint, extract, and write both bucket files.
///
/// Fails without writing anything if the scan checkpoint is missing or
/// unreadable; stage 1 is never re-run from here.
pub fn run_base_data_stage<G>(
    store: &CheckpointStore,
    guesser: &G,
    debug: bool,
    reporter: &ProgressReporter,
) -> Result<BaseDataResult, CatalogError>
where
    G: GuessMetadata + ?Sized,
{
    let catalog = store.load_scan()?;
    log::info!("Guessing movie names for {} file(s)...", catalog.len());

    let result = extract_base_data(&catalog, guesser, reporter);
    log_error_report("generating data from file names", &result.errors);

    let path = store.save_base_data(
        &result.movies_with_base_info,
        &result.movies_without_info,
        debug,
    )?;

    log::info!(
        "{} record(s): {} with base info, {} without ({}ms), saved to {:?}",
        result.total_records(),
        result.movies_with_base_info.len(),
        result.movies_without_info.len(),
        result.duration_ms,
        path
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GuessError, ItemErrorKind};
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    /// Returns canned guesses keyed by input; unknown inputs fail
    struct CannedGuesser(HashMap<String, Value>);

    impl CannedGuesser {
        fn new(entries: &[(&str, Value)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            )
        }
    }

    impl GuessMetadata for CannedGuesser {
        fn guess(&self, input: &str, options: &GuessOptions) -> Result<Guess, GuessError> {
            assert_eq!(options, &GuessOptions::batch());
            self.0
                .get(input)
                .cloned()
                .and_then(Guess::from_value)
                .ok_or_else(|| GuessError::Failed(format!("no guess for {}", input)))
        }
    }

    fn catalog(entries: &[(&str, &str)]) -> ScanCatalog {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_record_from_guess_full() {
        let guess = Guess::from_value(json!({
            "title": "the dark knight",
            "year": 2008,
            "format": "BluRay",
            "screen_size": "1080p",
            "video_codec": "h264",
            "release_group": "GRP",
            "cd": 1,
            "type": "movie"
        }))
        .unwrap();

        let record = record_from_guess("The.Dark.Knight.2008", "/m/tdk.mkv", &guess);
        assert_eq!(record.title.as_deref(), Some("The Dark Knight"));
        assert_eq!(record.year, Some(2008));
        assert_eq!(record.format, Some(json!("BluRay")));
        assert_eq!(record.cd, Some(json!(1)));
        assert_eq!(record.media_type.as_deref(), Some("movie"));
        assert_eq!(record.file_name, "The.Dark.Knight.2008");
        assert_eq!(record.path_to_movie, "/m/tdk.mkv");
    }

    #[test]
    fn test_record_from_guess_defaults_to_none() {
        let guess = Guess::from_value(json!({"type": "movie", "title": "  "})).unwrap();
        let record = record_from_guess("x", "/m/x.mkv", &guess);

        assert!(record.title.is_none());
        assert!(record.year.is_none());
        assert!(record.cd.is_none());
        assert!(record.release_group.is_none());
    }

    #[test]
    fn test_extract_classifies_and_collects_errors() {
        let catalog = catalog(&[
            ("Inception.2010.BluRay", "/movies/Inception.2010.BluRay.mkv"),
            ("1080p.x264", "/movies/1080p.x264.mkv"),
            ("Broken", "/movies/Broken.mkv"),
        ]);
        let guesser = CannedGuesser::new(&[
            (
                "Inception.2010.BluRay",
                json!({"title": "inception", "year": 2010, "type": "movie"}),
            ),
            ("1080p.x264", json!({"screen_size": "1080p", "type": "movie"})),
        ]);

        let result = extract_base_data(&catalog, &guesser, &ProgressReporter::disabled());

        assert_eq!(result.movies_with_base_info.len(), 1);
        assert_eq!(
            result.movies_with_base_info[0].title.as_deref(),
            Some("Inception")
        );
        assert_eq!(result.movies_without_info.len(), 1);
        assert_eq!(result.movies_without_info[0].file_name, "1080p.x264");
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.errors[0].kind, ItemErrorKind::GuessFailed);
    }

    #[test]
    fn test_run_stage_requires_scan_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let guesser = CannedGuesser::new(&[]);

        let err = run_base_data_stage(&store, &guesser, false, &ProgressReporter::disabled())
            .unwrap_err();
        assert!(matches!(err, CatalogError::MissingCheckpoint(_)));
        assert!(!store.base_data_path().exists());
    }

    #[test]
    fn test_run_stage_persists_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store
            .save_scan(
                &catalog(&[("Heat.1995", "/m/Heat.1995.avi"), ("x", "/m/x.mkv")]),
                false,
            )
            .unwrap();
        let guesser = CannedGuesser::new(&[
            ("Heat.1995", json!({"title": "heat", "year": 1995, "type": "movie"})),
            ("x", json!({"type": "movie"})),
        ]);

        run_base_data_stage(&store, &guesser, true, &ProgressReporter::disabled()).unwrap();

        let with_info = store.load_base_data().unwrap();
        assert_eq!(with_info.len(), 1);
        assert_eq!(with_info[0].title.as_deref(), Some("Heat"));
        let without = store.load_without_info().unwrap();
        assert_eq!(without.len(), 1);
        assert_eq!(without[0].file_name, "x");
    }

    /// Echoes the input back as the title, or nothing for inputs starting with '_'
    struct EchoGuesser;

    impl GuessMetadata for EchoGuesser {
        fn guess(&self, input: &str, _options: &GuessOptions) -> Result<Guess, GuessError> {
            let mut guess = Guess::new();
            if !input.starts_with('_') {
                guess.insert("title", input);
            }
            Ok(guess)
        }
    }

    proptest! {
        #[test]
        fn prop_every_entry_lands_in_exactly_one_bucket(
            stems in prop::collection::btree_set("_?[a-z]{1,8}", 0..20),
        ) {
            let catalog: ScanCatalog = stems
                .iter()
                .map(|s| (s.clone(), format!("/m/{}.mkv", s)))
                .collect();
            let result = extract_base_data(&catalog, &EchoGuesser, &ProgressReporter::disabled());

            prop_assert_eq!(result.total_records(), catalog.len());
            prop_assert!(result.movies_with_base_info.iter().all(|r| r.has_title()));
            prop_assert!(result.movies_without_info.iter().all(|r| !r.has_title()));
            for record in result.movies_with_base_info.iter().chain(&result.movies_without_info) {
                prop_assert_eq!(&catalog[&record.file_name], &record.path_to_movie);
            }
        }
    }
}
