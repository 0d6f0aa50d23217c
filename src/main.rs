//! movies_db CLI
//!
//! Runs one pipeline stage per invocation; stages hand data to each other
//! through checkpoint files in the data directory.

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use serde_json::json;
use std::path::PathBuf;

use movies_db::progress::DEFAULT_PROGRESS_INTERVAL_MS;
use movies_db::{
    config::resolve_data_dir, enrichment::log_enrichment_report, run_base_data_stage,
    run_detailed_stage, run_scan_stage, CatalogConfig, CatalogError, CheckpointStore,
    EnrichmentOutcome, EnrichmentSession, OmdbClient, ProgressReporter, ReleaseNameGuesser,
    Settings,
};

const ABOUT: &str = r#"
movies_db - catalog the movie files on your disks

Examples:
  movies_db movies scan                    scan the directories in config.toml
  movies_db movies scan -r /media/films    scan an explicit directory
  movies_db movies base-data --debug       guess titles, pretty-print checkpoints
  movies_db movies detailed-data           fetch details for every guessed title
  movies_db movies enrich "Heat.1995.mkv"  fetch details for one name
"#;

/// Movie cataloging pipeline
#[derive(Parser)]
#[command(name = "movies_db")]
#[command(author, version, about = ABOUT, long_about = None)]
#[command(help_template = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Args)]
struct GlobalArgs {
    /// Directory holding config.toml and the UserData checkpoints
    #[arg(long, global = true, env = "MOVIES_DB_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Emit JSON progress lines on stderr
    #[arg(long, global = true)]
    progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Movie catalog stages
    #[command(subcommand)]
    Movies(MoviesCommand),
}

#[derive(Subcommand)]
enum MoviesCommand {
    /// Scan movie directories and write the file catalog
    Scan {
        /// Pretty-print the checkpoint
        #[arg(long)]
        debug: bool,

        /// Root directory to scan (repeatable); overrides movies_paths
        #[arg(short = 'r', long = "root")]
        roots: Vec<PathBuf>,
    },

    /// Guess base data (title, year, ...) from the cataloged file names
    BaseData {
        /// Pretty-print the checkpoints
        #[arg(long)]
        debug: bool,
    },

    /// Query the movie database for every record with base data
    DetailedData,

    /// Query the movie database for the given names
    Enrich {
        /// File names or titles
        #[arg(required = true)]
        names: Vec<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let Some(Commands::Movies(command)) = cli.command else {
        println!("{}", ABOUT);
        println!("Use 'movies_db --help' for the full help");
        return;
    };

    if let Err(e) = run(command, cli.global) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(command: MoviesCommand, global: GlobalArgs) -> Result<(), CatalogError> {
    let data_dir = resolve_data_dir(global.data_dir)?;
    let mut builder = CatalogConfig::builder()
        .data_dir(data_dir)
        .show_progress(global.progress);

    match &command {
        MoviesCommand::Scan { debug, roots } => {
            builder = builder.roots(roots.clone()).debug(*debug);
        }
        MoviesCommand::BaseData { debug } => builder = builder.debug(*debug),
        MoviesCommand::DetailedData | MoviesCommand::Enrich { .. } => {}
    }

    let config = builder.build();
    let settings = Settings::load(&config.settings_path())?;
    let config = config.apply_settings(settings);

    let store = CheckpointStore::new(config.checkpoint_dir());
    let reporter = ProgressReporter::new(config.show_progress, DEFAULT_PROGRESS_INTERVAL_MS);
    info!("Data directory: {:?}", config.data_dir);

    match command {
        MoviesCommand::Scan { .. } => {
            info!("Roots: {:?}", config.roots);
            run_scan_stage(&config, &store, &reporter)?;
        }
        MoviesCommand::BaseData { .. } => {
            let guesser = release_name_guesser()?;
            run_base_data_stage(&store, &guesser, config.debug, &reporter)?;
        }
        MoviesCommand::DetailedData => {
            let guesser = release_name_guesser()?;
            let client = OmdbClient::new(&config)?;
            run_detailed_stage(&store, &guesser, &client, &reporter, |name, _, response| {
                print_found(name, response)
            })?;
        }
        MoviesCommand::Enrich { names } => {
            let guesser = release_name_guesser()?;
            let client = OmdbClient::new(&config)?;
            let mut session = EnrichmentSession::new(&guesser, &client);

            for name in &names {
                match session.enrich(name)? {
                    EnrichmentOutcome::Found { response, .. } => print_found(name, &response),
                    EnrichmentOutcome::NotAMovie(name) => info!("{:?} is not a movie", name),
                    EnrichmentOutcome::Untitled(name) => {
                        info!("No title could be guessed from {:?}", name)
                    }
                }
            }
            log_enrichment_report(session.report());
        }
    }

    Ok(())
}

fn release_name_guesser() -> Result<ReleaseNameGuesser, CatalogError> {
    ReleaseNameGuesser::new()
        .map_err(|e| CatalogError::MissingCapability(format!("release name guesser: {}", e)))
}

fn print_found(name: &str, response: &serde_json::Value) {
    println!("{}", json!({ "input": name, "response": response }));
}
