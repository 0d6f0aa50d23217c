//! Checkpoint files: the on-disk contract between pipeline stages
//!
//! Each stage owns its files and replaces them wholesale on every run.
//! Writes go to a temporary sibling first and are renamed into place so a
//! reader never observes a half-written checkpoint.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::CatalogError;
use crate::models::{BaseMovieRecord, ScanCatalog};

/// Stage 1 output file name
pub const SCAN_CHECKPOINT: &str = "1_data_from_files.json";

/// Stage 2 output file name (records with a title)
pub const BASE_DATA_CHECKPOINT: &str = "2_movies_names.json";

/// Stage 2 side output (records without a title)
pub const WITHOUT_INFO_CHECKPOINT: &str = "2_movies_without_info.json";

/// Checkpoint files rooted at one directory
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Use `dir` as the checkpoint directory. Nothing is created until a write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn scan_path(&self) -> PathBuf {
        self.dir.join(SCAN_CHECKPOINT)
    }

    pub fn base_data_path(&self) -> PathBuf {
        self.dir.join(BASE_DATA_CHECKPOINT)
    }

    pub fn without_info_path(&self) -> PathBuf {
        self.dir.join(WITHOUT_INFO_CHECKPOINT)
    }

    /// Replace the stage 1 checkpoint
    pub fn save_scan(&self, catalog: &ScanCatalog, pretty: bool) -> Result<PathBuf, CatalogError> {
        let path = self.scan_path();
        write_json(&path, catalog, pretty)?;
        Ok(path)
    }

    /// Load the stage 1 checkpoint
    pub fn load_scan(&self) -> Result<ScanCatalog, CatalogError> {
        read_json(&self.scan_path())
    }

    /// Replace both stage 2 files: titled records and title-less records.
    ///
    /// Both are fully written to temporary files before either is renamed
    /// into place, so a failed write leaves the previous pair untouched.
    pub fn save_base_data(
        &self,
        with_info: &[BaseMovieRecord],
        without_info: &[BaseMovieRecord],
        pretty: bool,
    ) -> Result<PathBuf, CatalogError> {
        let path = self.base_data_path();
        let staged = [
            stage_json(&path, with_info, pretty)?,
            stage_json(&self.without_info_path(), without_info, pretty)?,
        ];
        for file in &staged {
            file.commit()?;
        }
        Ok(path)
    }

    /// Load the stage 2 checkpoint
    pub fn load_base_data(&self) -> Result<Vec<BaseMovieRecord>, CatalogError> {
        read_json(&self.base_data_path())
    }

    /// Load the list of records that have no title
    pub fn load_without_info(&self) -> Result<Vec<BaseMovieRecord>, CatalogError> {
        read_json(&self.without_info_path())
    }
}

/// A checkpoint fully written to its temporary sibling, not yet in place
#[derive(Debug)]
pub struct StagedFile {
    temp_path: PathBuf,
    path: PathBuf,
}

impl StagedFile {
    /// Rename the temporary file over the real checkpoint
    pub fn commit(&self) -> Result<(), CatalogError> {
        fs::rename(&self.temp_path, &self.path).map_err(|source| {
            CatalogError::CheckpointWrite {
                path: self.path.clone(),
                source,
            }
        })?;
        log::debug!("Wrote checkpoint {:?}", self.path);
        Ok(())
    }
}

/// Serialize `value` next to `path` without touching `path` itself
pub fn stage_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    pretty: bool,
) -> Result<StagedFile, CatalogError> {
    let write_error = |source: std::io::Error| CatalogError::CheckpointWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(write_error)?;
    }

    let bytes = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    }
    .map_err(|e| write_error(e.into()))?;

    let temp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&temp_path).map_err(write_error)?;
    file.write_all(&bytes).map_err(write_error)?;
    file.sync_all().map_err(write_error)?;

    Ok(StagedFile {
        temp_path,
        path: path.to_path_buf(),
    })
}

/// Serialize `value` to `path` atomically
pub fn write_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    pretty: bool,
) -> Result<(), CatalogError> {
    stage_json(path, value, pretty)?.commit()
}

/// Deserialize a checkpoint written by [`write_json`]
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CatalogError::MissingCheckpoint(path.to_path_buf()));
        }
        Err(e) => {
            return Err(CatalogError::CorruptCheckpoint {
                path: path.to_path_buf(),
                message: e.to_string(),
            });
        }
    };

    serde_json::from_str(&contents).map_err(|e| CatalogError::CorruptCheckpoint {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
