//! Enrichment: query the external movie database for guessed titles
//!
//! Each call is a single blocking GET against an OMDb-compatible endpoint.
//! The response body is handed back untouched; nothing is validated,
//! cached, or retried here. Whether a failed call ends the run is the
//! caller's decision (see [`CatalogError::is_recoverable`]).

use reqwest::blocking::Client;
use reqwest::Url;
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::checkpoint::CheckpointStore;
use crate::config::CatalogConfig;
use crate::error::{log_error_report, CatalogError, ItemError};
use crate::guess::{GuessMetadata, GuessOptions};
use crate::models::{EnrichmentOutcome, EnrichmentReport, MovieQuery};
use crate::normalize::ascii_only;
use crate::progress::{ProgressReporter, Stage, StageProgress};

/// A source of authoritative movie details
pub trait MetadataService {
    /// Look up one title/year pair and return the raw response
    fn lookup(&self, query: &MovieQuery) -> Result<Value, CatalogError>;
}

/// Query parameters for one lookup, in request order
pub fn query_params(query: &MovieQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("t", ascii_only(&query.title)),
        ("plot", "full".to_string()),
        ("type", "movie".to_string()),
        ("tomatoes", "true".to_string()),
    ];
    if let Some(year) = query.year {
        params.push(("y", year.to_string()));
    }
    params
}

/// Blocking OMDb client
#[derive(Debug, Clone)]
pub struct OmdbClient {
    http: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl OmdbClient {
    /// Build a client from the endpoint, key, and timeout in `config`
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let base_url = Url::parse(&config.omdb_url).map_err(|e| {
            CatalogError::MissingCapability(format!(
                "invalid metadata service URL {:?}: {}",
                config.omdb_url, e
            ))
        })?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| CatalogError::MissingCapability(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            api_key: config.omdb_api_key.clone(),
        })
    }

    /// Full request URL for `query`
    pub fn request_url(&self, query: &MovieQuery) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query_params(query) {
                pairs.append_pair(key, &value);
            }
            if let Some(key) = &self.api_key {
                pairs.append_pair("apikey", key);
            }
        }
        url
    }
}

impl MetadataService for OmdbClient {
    fn lookup(&self, query: &MovieQuery) -> Result<Value, CatalogError> {
        let url = self.request_url(query);
        log::debug!("GET {}", url);

        let response = self.http.get(url).send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Value>()?);
        }

        // error bodies like {"Response":"False","Error":"Invalid API key!"}
        // are still answers
        let body = response.text()?;
        match serde_json::from_str::<Value>(&body) {
            Ok(value) => {
                log::debug!("HTTP {} with JSON body", status);
                Ok(value)
            }
            Err(_) => Err(CatalogError::ServiceStatus {
                status: status.as_u16(),
            }),
        }
    }
}

/// Enrichment calls sharing one guesser, one service, and one report
pub struct EnrichmentSession<'a, G: ?Sized, S: ?Sized> {
    guesser: &'a G,
    service: &'a S,
    report: EnrichmentReport,
}

impl<'a, G, S> EnrichmentSession<'a, G, S>
where
    G: GuessMetadata + ?Sized,
    S: MetadataService + ?Sized,
{
    pub fn new(guesser: &'a G, service: &'a S) -> Self {
        Self {
            guesser,
            service,
            report: EnrichmentReport::default(),
        }
    }

    /// Buckets accumulated so far
    pub fn report(&self) -> &EnrichmentReport {
        &self.report
    }

    pub fn into_report(self) -> EnrichmentReport {
        self.report
    }

    /// Classify `name` and, for movies, fetch details.
    ///
    /// Non-movies and untitled guesses are recorded in their buckets and
    /// produce no request. Service and guess failures are returned to the
    /// caller as-is.
    pub fn enrich(&mut self, name: &str) -> Result<EnrichmentOutcome, CatalogError> {
        let guess = self
            .guesser
            .guess(name, &GuessOptions::default())
            .map_err(|source| CatalogError::GuessFailed {
                input: name.to_string(),
                source,
            })?;

        if !guess.is_movie() {
            log::debug!("{:?} is not a movie ({:?})", name, guess.media_type());
            self.report.not_a_movie.push(name.to_string());
            return Ok(EnrichmentOutcome::NotAMovie(name.to_string()));
        }

        let Some(title) = guess.title().map(str::trim).filter(|t| !t.is_empty()) else {
            self.report.movie_not_found.push(name.to_string());
            return Ok(EnrichmentOutcome::Untitled(name.to_string()));
        };

        let query = MovieQuery {
            title: title.to_string(),
            year: guess.year(),
        };
        let response = self.service.lookup(&query)?;
        self.report.found += 1;
        Ok(EnrichmentOutcome::Found { query, response })
    }

    /// Enrich every name in order.
    ///
    /// Recoverable failures are logged into the report and the loop
    /// continues; anything else stops the batch. `on_found` sees each
    /// successful response as it arrives.
    pub fn enrich_all<I, F>(
        &mut self,
        names: I,
        reporter: &ProgressReporter,
        mut on_found: F,
    ) -> Result<(), CatalogError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        F: FnMut(&str, &MovieQuery, &Value),
    {
        let start = Instant::now();
        let mut progress = StageProgress::default();
        reporter.report_start(Stage::Enrich, None);

        for name in names {
            let name = name.as_ref();
            progress.processed += 1;

            match self.enrich(name) {
                Ok(EnrichmentOutcome::Found { query, response }) => {
                    progress.accepted += 1;
                    on_found(name, &query, &response);
                }
                Ok(_) => {}
                Err(e) if e.is_recoverable() => {
                    self.report.errors.push(ItemError::service_failed(name, &e));
                }
                Err(e) => return Err(e),
            }

            if reporter.should_report() {
                progress.current = name.to_string();
                reporter.report_progress(Stage::Enrich, &progress);
            }
        }

        self.report.duration_ms += start.elapsed().as_millis() as u64;
        reporter.report_done(
            Stage::Enrich,
            &progress,
            self.report.error_count(),
            self.report.duration_ms,
        );
        Ok(())
    }
}

/// Log the buckets of a finished enrichment run
pub fn log_enrichment_report(report: &EnrichmentReport) {
    log::info!(
        "Enriched {} of {} input(s) ({}ms)",
        report.found,
        report.total_inputs(),
        report.duration_ms
    );
    if !report.not_a_movie.is_empty() {
        log::info!(
            "{} input(s) are not movies: {}",
            report.not_a_movie.len(),
            report.not_a_movie.join(", ")
        );
    }
    if !report.movie_not_found.is_empty() {
        log::warn!(
            "{} movie(s) without a usable title: {}",
            report.movie_not_found.len(),
            report.movie_not_found.join(", ")
        );
    }
    log_error_report("fetching movie details", &report.errors);
}

/// Detailed-data stage: enrich every titled record of the base-data
/// checkpoint. Results go to `on_found`; nothing is persisted.
///
/// Each record is guessed from its full path so the guesser sees the real
/// extension; the stem alone would lose title words that look like one
/// (`Bee.Movie`, `Jack.in.the.Box`).
pub fn run_detailed_stage<G, S, F>(
    store: &CheckpointStore,
    guesser: &G,
    service: &S,
    reporter: &ProgressReporter,
    on_found: F,
) -> Result<EnrichmentReport, CatalogError>
where
    G: GuessMetadata + ?Sized,
    S: MetadataService + ?Sized,
    F: FnMut(&str, &MovieQuery, &Value),
{
    let records = store.load_base_data()?;
    log::info!("Fetching details for {} movie(s)...", records.len());

    let mut session = EnrichmentSession::new(guesser, service);
    session.enrich_all(records.iter().map(|r| &r.path_to_movie), reporter, on_found)?;

    let report = session.into_report();
    log_enrichment_report(&report);
    Ok(report)
}
