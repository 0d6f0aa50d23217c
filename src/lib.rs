//! Movie cataloging pipeline
//!
//! Three stages, each reading the previous stage's checkpoint:
//! directory scanning, base-data extraction from file names, and
//! enrichment from an external movie database.

pub mod checkpoint;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod extractor;
pub mod guess;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod scanner;

pub use checkpoint::CheckpointStore;
pub use config::{CatalogConfig, Settings};
pub use enrichment::{
    query_params, run_detailed_stage, EnrichmentSession, MetadataService, OmdbClient,
};
pub use error::{CatalogError, GuessError, ItemError, ItemErrorKind};
pub use extractor::{extract_base_data, run_base_data_stage};
pub use guess::{Guess, GuessMetadata, GuessOptions, ReleaseNameGuesser};
pub use models::{
    BaseDataResult, BaseMovieRecord, EnrichmentOutcome, EnrichmentReport, MovieQuery, ScanCatalog,
    ScanResult,
};
pub use progress::{DoneMessage, ProgressMessage, ProgressReporter, Stage, StartMessage};
pub use scanner::{run_scan_stage, scan_directories};
