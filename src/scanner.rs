//! Scanner module - walks the movie roots and builds the stem catalog

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

use crate::checkpoint::CheckpointStore;
use crate::config::CatalogConfig;
use crate::error::{log_error_report, CatalogError, ItemError};
use crate::models::{ScanEntry, ScanResult};
use crate::progress::{ProgressReporter, Stage, StageProgress};

/// A regular file found while walking, before any filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    /// Absolute path to the file
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
}

/// Iterates over every regular file below a queue of roots.
///
/// Roots are processed in order; within a root walkdir keeps its own
/// explicit stack, so depth does not grow the call stack. Symlinks are
/// not followed.
pub struct RootWalker {
    pending: VecDeque<PathBuf>,
    current: Option<walkdir::IntoIter>,
    dirs_seen: u64,
}

impl RootWalker {
    pub fn new(roots: &[PathBuf]) -> Self {
        Self {
            pending: roots.iter().cloned().collect(),
            current: None,
            dirs_seen: 0,
        }
    }

    /// Directories traversed so far
    pub fn dirs_seen(&self) -> u64 {
        self.dirs_seen
    }

    fn open_next_root(&mut self) -> Option<Result<(), ItemError>> {
        let root = self.pending.pop_front()?;
        let root = match std::path::absolute(&root) {
            Ok(abs) => abs,
            Err(e) => return Some(Err(ItemError::from(e).with_path(root))),
        };
        if !root.exists() {
            return Some(Err(ItemError::not_found(root)));
        }

        self.current = Some(WalkDir::new(root).follow_links(false).into_iter());
        Some(Ok(()))
    }
}

impl Iterator for RootWalker {
    type Item = Result<FileCandidate, ItemError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                if let Err(e) = self.open_next_root()? {
                    return Some(Err(e));
                }
                continue;
            }

            let entry = match self.current.as_mut()?.next() {
                Some(Ok(entry)) => entry,
                Some(Err(e)) => return Some(Err(e.into())),
                None => {
                    self.current = None;
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                self.dirs_seen += 1;
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path().to_path_buf();
            return Some(match entry.metadata() {
                Ok(metadata) => Ok(FileCandidate {
                    path,
                    size: metadata.len(),
                }),
                Err(e) => Err(ItemError::from(e).with_path(path)),
            });
        }
    }
}

/// Dot-prefixed extension, or an empty string when there is none.
///
/// A non-UTF-8 extension yields `None`; it can never be on the allow-list.
fn dotted_extension(path: &Path) -> Option<String> {
    match path.extension() {
        Some(ext) => ext.to_str().map(|ext| format!(".{}", ext)),
        None => Some(String::new()),
    }
}

/// Turn a candidate into a catalog entry if it passes both filters.
///
/// Filters run on the raw name, so a file that would be skipped anyway is
/// never reported for having a non-UTF-8 path.
pub fn accept_candidate(
    candidate: &FileCandidate,
    config: &CatalogConfig,
) -> Result<Option<ScanEntry>, ItemError> {
    let path = &candidate.path;
    let extension_ok =
        dotted_extension(path).is_some_and(|ext| config.should_include_extension(&ext));
    if !extension_ok || !config.is_large_enough(candidate.size) {
        return Ok(None);
    }

    let invalid = || ItemError::invalid_path(path.clone());
    let file_stem = match path.file_stem() {
        Some(stem) => stem.to_str().ok_or_else(invalid)?.to_string(),
        None => String::new(),
    };
    let absolute_path = path.to_str().ok_or_else(invalid)?.to_string();

    Ok(Some(ScanEntry {
        file_stem,
        absolute_path,
    }))
}

/// Filter candidates into a catalog.
///
/// Traversal-agnostic: any iterator of candidates works, which is how the
/// tests feed in synthetic file listings. Per-file errors are collected and
/// never stop the loop.
pub fn build_catalog<I>(
    candidates: I,
    config: &CatalogConfig,
    reporter: &ProgressReporter,
) -> ScanResult
where
    I: IntoIterator<Item = Result<FileCandidate, ItemError>>,
{
    let start = Instant::now();
    let mut result = ScanResult::new();
    let mut progress = StageProgress::default();

    for candidate in candidates {
        progress.processed += 1;
        let candidate = match candidate {
            Ok(candidate) => candidate,
            Err(e) => {
                result.errors.push(e);
                continue;
            }
        };
        result.total_files += 1;

        match accept_candidate(&candidate, config) {
            Ok(Some(entry)) => {
                log::debug!("Cataloged {:?}", entry.absolute_path);
                result.insert(entry);
                progress.accepted += 1;
            }
            Ok(None) => result.skipped_files += 1,
            Err(e) => result.errors.push(e),
        }

        if reporter.should_report() {
            progress.current = candidate.path.to_string_lossy().to_string();
            reporter.report_progress(Stage::Scan, &progress);
        }
    }

    result.duration_ms = start.elapsed().as_millis() as u64;
    reporter.report_done(Stage::Scan, &progress, result.error_count(), result.duration_ms);
    result
}

/// Walk every configured root and build the catalog
pub fn scan_directories(config: &CatalogConfig, reporter: &ProgressReporter) -> ScanResult {
    reporter.report_start(Stage::Scan, None);

    let mut walker = RootWalker::new(&config.roots);
    let mut result = build_catalog(walker.by_ref(), config, reporter);
    result.total_dirs = walker.dirs_seen();
    result
}

/// Stage 1: scan, report, and replace the scan checkpoint
pub fn run_scan_stage(
    config: &CatalogConfig,
    store: &CheckpointStore,
    reporter: &ProgressReporter,
) -> Result<ScanResult, CatalogError> {
    if config.roots.is_empty() {
        log::warn!("No movie directories configured; the catalog will be empty");
    }
    log::info!("Scanning {} director(ies)...", config.roots.len());

    let result = scan_directories(config, reporter);

    if !result.collisions.is_empty() {
        log::warn!(
            "{} file stem(s) matched more than one file; only the last path was kept:",
            result.collisions.len()
        );
        for collision in &result.collisions {
            log::warn!(
                "  {}: kept {:?}, dropped {:?}",
                collision.stem,
                collision.kept,
                collision.replaced
            );
        }
    }
    if !result.is_success() {
        log_error_report("scanning directories", &result.errors);
    }

    let path = store.save_scan(&result.catalog, config.debug)?;
    log::info!(
        "Cataloged {} movie file(s) out of {} in {} director(ies) ({}ms), saved to {:?}",
        result.catalog.len(),
        result.total_files,
        result.total_dirs,
        result.duration_ms,
        path
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MIN_FILE_SIZE;
    use crate::error::ItemErrorKind;
    use proptest::prelude::*;
    use std::fs::File;

    const MIB: u64 = 1024 * 1024;

    fn candidate(path: &str, size: u64) -> Result<FileCandidate, ItemError> {
        Ok(FileCandidate {
            path: PathBuf::from(path),
            size,
        })
    }

    fn sparse_file(path: &Path, size: u64) {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).unwrap();
        }
        File::create(path).unwrap().set_len(size).unwrap();
    }

    #[test]
    fn test_dotted_extension() {
        assert_eq!(
            dotted_extension(Path::new("/m/Movie.Name.2020.1080p.mkv")),
            Some(".mkv".to_string())
        );
        assert_eq!(dotted_extension(Path::new("/m/README")), Some(String::new()));
        assert_eq!(dotted_extension(Path::new("/m/.mkv")), Some(String::new()));
    }

    #[test]
    fn test_accept_candidate_stem() {
        let config = CatalogConfig::default();
        let entry = accept_candidate(
            &FileCandidate {
                path: PathBuf::from("/m/Movie.Name.2020.1080p.mkv"),
                size: 40 * MIB,
            },
            &config,
        )
        .unwrap()
        .unwrap();
        assert_eq!(entry.file_stem, "Movie.Name.2020.1080p");
        assert_eq!(entry.absolute_path, "/m/Movie.Name.2020.1080p.mkv");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_only_fail_when_accepted() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let config = CatalogConfig::default();
        let name = |bytes: &[u8]| PathBuf::from("/m").join(OsStr::from_bytes(bytes));

        let small_subtitle = FileCandidate {
            path: name(b"Caf\xe9.srt"),
            size: 10,
        };
        assert_eq!(accept_candidate(&small_subtitle, &config).unwrap(), None);

        let odd_extension = FileCandidate {
            path: name(b"Movie.\xffmkv"),
            size: 40 * MIB,
        };
        assert_eq!(accept_candidate(&odd_extension, &config).unwrap(), None);

        let large_movie = FileCandidate {
            path: name(b"Caf\xe9.mkv"),
            size: 40 * MIB,
        };
        let err = accept_candidate(&large_movie, &config).unwrap_err();
        assert_eq!(err.kind, ItemErrorKind::InvalidPath);
    }

    #[test]
    fn test_build_catalog_filters() {
        let config = CatalogConfig::default();
        let result = build_catalog(
            vec![
                candidate("/m/Big.Movie.mkv", 40 * MIB),
                candidate("/m/sample.mkv", 2 * MIB),
                candidate("/m/Big.Subs.srt", 40 * MIB),
                candidate("/m/Upper.Case.MKV", 40 * MIB),
                candidate("/m/Exactly.Threshold.avi", DEFAULT_MIN_FILE_SIZE),
            ],
            &config,
            &ProgressReporter::disabled(),
        );

        assert_eq!(result.catalog.len(), 1);
        assert_eq!(result.catalog["Big.Movie"], "/m/Big.Movie.mkv");
        assert_eq!(result.total_files, 5);
        assert_eq!(result.skipped_files, 4);
        assert!(result.is_success());
    }

    #[test]
    fn test_build_catalog_keeps_going_after_errors() {
        let config = CatalogConfig::default();
        let result = build_catalog(
            vec![
                Err(ItemError::not_found(PathBuf::from("/gone"))),
                candidate("/m/Heat.1995.avi", 30 * MIB),
                Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied).into()),
                candidate("/m/Alien.1979.mp4", 30 * MIB),
            ],
            &config,
            &ProgressReporter::disabled(),
        );

        assert_eq!(result.catalog.len(), 2);
        assert_eq!(result.error_count(), 2);
        assert_eq!(result.errors[0].kind, ItemErrorKind::NotFound);
        assert_eq!(result.errors[1].kind, ItemErrorKind::PermissionDenied);
    }

    #[test]
    fn test_build_catalog_stem_collision_last_wins() {
        let config = CatalogConfig::default();
        let result = build_catalog(
            vec![
                candidate("/a/Heat.1995.avi", 30 * MIB),
                candidate("/b/Heat.1995.mkv", 30 * MIB),
            ],
            &config,
            &ProgressReporter::disabled(),
        );

        assert_eq!(result.catalog["Heat.1995"], "/b/Heat.1995.mkv");
        assert_eq!(result.collisions.len(), 1);
        assert_eq!(result.collisions[0].replaced, "/a/Heat.1995.avi");
    }

    #[test]
    fn test_scan_directories_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        sparse_file(&root.join("Movie.Name.2020.1080p.mkv"), 40 * MIB);
        sparse_file(&root.join("sample.mkv"), 2 * MIB);
        sparse_file(&root.join("nested/deeper/Heat.1995.avi"), 26 * MIB);
        sparse_file(&root.join("nested/notes.txt"), 30 * MIB);

        let config = CatalogConfig::new(vec![root.to_path_buf()]);
        let result = scan_directories(&config, &ProgressReporter::disabled());

        assert_eq!(result.catalog.len(), 2);
        assert_eq!(
            PathBuf::from(&result.catalog["Movie.Name.2020.1080p"]),
            root.join("Movie.Name.2020.1080p.mkv")
        );
        assert!(result.catalog.contains_key("Heat.1995"));
        assert_eq!(result.total_files, 4);
        assert_eq!(result.total_dirs, 3);
        assert!(result.is_success());
    }

    #[test]
    fn test_scan_directories_missing_root_does_not_stop_others() {
        let dir = tempfile::tempdir().unwrap();
        sparse_file(&dir.path().join("Heat.1995.avi"), 30 * MIB);

        let config = CatalogConfig::new(vec![
            dir.path().join("does-not-exist"),
            dir.path().to_path_buf(),
        ]);
        let result = scan_directories(&config, &ProgressReporter::disabled());

        assert_eq!(result.catalog.len(), 1);
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.errors[0].kind, ItemErrorKind::NotFound);
    }

    #[test]
    fn test_scan_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        sparse_file(&dir.path().join("a/One.mkv"), 30 * MIB);
        sparse_file(&dir.path().join("b/Two.mp4"), 30 * MIB);
        sparse_file(&dir.path().join("Three.avi"), 30 * MIB);

        let config = CatalogConfig::new(vec![dir.path().to_path_buf()]);
        let first = scan_directories(&config, &ProgressReporter::disabled());
        let second = scan_directories(&config, &ProgressReporter::disabled());

        assert_eq!(first.catalog, second.catalog);
        assert_eq!(first.catalog.len(), 3);
    }

    #[test]
    fn test_run_scan_stage_writes_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let movies = dir.path().join("movies");
        sparse_file(&movies.join("Alien.1979.mkv"), 30 * MIB);

        let config = CatalogConfig::builder()
            .add_root(movies.clone())
            .data_dir(dir.path().join("data"))
            .build();
        let store = CheckpointStore::new(config.checkpoint_dir());

        let result = run_scan_stage(&config, &store, &ProgressReporter::disabled()).unwrap();
        assert_eq!(store.load_scan().unwrap(), result.catalog);
        assert!(store.scan_path().starts_with(dir.path().join("data").join("UserData")));
    }

    proptest! {
        #[test]
        fn prop_small_files_always_excluded(
            size in 0..=DEFAULT_MIN_FILE_SIZE,
            ext_idx in 0..crate::config::VIDEO_EXTENSIONS.len(),
        ) {
            let ext = crate::config::VIDEO_EXTENSIONS[ext_idx];
            let c = FileCandidate { path: PathBuf::from(format!("/m/Film{}", ext)), size };
            prop_assert_eq!(accept_candidate(&c, &CatalogConfig::default()).unwrap(), None);
        }

        #[test]
        fn prop_unknown_extensions_always_excluded(
            size in DEFAULT_MIN_FILE_SIZE..u64::MAX,
            ext in "[a-z0-9]{1,5}",
        ) {
            let dotted = format!(".{}", ext);
            prop_assume!(!crate::config::VIDEO_EXTENSIONS.contains(&dotted.as_str()));
            let c = FileCandidate { path: PathBuf::from(format!("/m/Film{}", dotted)), size };
            prop_assert_eq!(accept_candidate(&c, &CatalogConfig::default()).unwrap(), None);
        }

        #[test]
        fn prop_large_video_files_included(
            size in (DEFAULT_MIN_FILE_SIZE + 1)..u64::MAX,
            ext_idx in 0..crate::config::VIDEO_EXTENSIONS.len(),
            stem in "[A-Za-z][A-Za-z0-9]{0,12}",
        ) {
            let ext = crate::config::VIDEO_EXTENSIONS[ext_idx];
            let path = format!("/m/{}{}", stem, ext);
            let c = FileCandidate { path: PathBuf::from(&path), size };
            let entry = accept_candidate(&c, &CatalogConfig::default()).unwrap().unwrap();
            prop_assert_eq!(entry.file_stem, stem);
            prop_assert_eq!(entry.absolute_path, path);
        }
    }
}
