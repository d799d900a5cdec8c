//! Rotation - rebuilds a playlist from a random sample of monthly playlists.
//!
//! By default one sync run is executed against the catalog. With `--serve`
//! the read-only query server is started over the cache directory instead.

mod logging;
mod server;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rotation_core::{
    AppConfig, CatalogCache, EntityCache, Error as CoreError, PlaylistLibrary, SyncOrchestrator,
    WebCatalog,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::logging::LoggingConfig;

/// Command-line flags. Each one overrides the matching config file setting.
#[derive(Debug, Parser)]
#[command(name = "rotation", version, about = "Rebuild a rotation playlist from monthly playlists")]
struct Cli {
    /// Compute the new playlist without changing it
    #[arg(long)]
    dry: bool,

    /// Refetch cached playlists and track lists
    #[arg(long)]
    refresh: bool,

    /// User who owns the target playlist
    #[arg(long = "self", value_name = "USER")]
    self_user: Option<String>,

    /// User whose monthly playlists are sampled
    #[arg(long = "user", value_name = "USER")]
    source_user: Option<String>,

    /// Target playlist name
    #[arg(long, value_name = "PLAYLIST")]
    name: Option<String>,

    /// Number of tracks to sample
    #[arg(long)]
    size: Option<usize>,

    /// Seed for reproducible sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Cache directory
    #[arg(long, value_name = "PATH")]
    cache_dir: Option<PathBuf>,

    /// Config file (defaults to the user config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Catalog access token
    #[arg(long, env = "ROTATION_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Start the query server instead of syncing
    #[arg(long)]
    serve: bool,

    /// Query server bind address
    #[arg(long)]
    host: Option<String>,

    /// Query server port
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    /// Layer flags over loaded settings.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(user) = &self.self_user {
            config.self_user.clone_from(user);
        }
        if let Some(user) = &self.source_user {
            config.source_user.clone_from(user);
        }
        if let Some(name) = &self.name {
            config.playlist_name.clone_from(name);
        }
        if let Some(size) = self.size {
            config.sample_size = size;
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_directory.clone_from(dir);
        }
        if let Some(token) = &self.token {
            config.access_token = Some(token.clone());
        }
        if let Some(host) = &self.host {
            config.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}

/// Errors that end the process.
#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Server failed: {0}")]
    Server(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _logging = match logging::init(&LoggingConfig::auto()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: {e}");
            None
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    cli.apply(&mut config);

    if cli.serve {
        serve(&config)
    } else {
        sync(cli, &config)
    }
}

fn serve(config: &AppConfig) -> Result<(), CliError> {
    config.validate_for_serve()?;

    let library = PlaylistLibrary::new(&config.cache_directory);
    let address = config.server.bind_address();
    info!(
        "Serving {} on {}",
        config.cache_directory.display(),
        address
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(server::serve(&address, library))?;
    Ok(())
}

fn sync(cli: &Cli, config: &AppConfig) -> Result<(), CliError> {
    config.validate_for_sync()?;

    let token = config
        .access_token
        .clone()
        .ok_or_else(|| CoreError::configuration("no access token"))?;
    let catalog = WebCatalog::new(&config.api_base_url, token).map_err(CoreError::from)?;
    let entities = EntityCache::new(&config.cache_directory)?;
    let cache = CatalogCache::new(&catalog, entities).with_refresh(cli.refresh);

    let rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut orchestrator = SyncOrchestrator::new(cache, rng, config.sync_options(cli.dry));
    let report = match orchestrator.run() {
        Ok(report) => report,
        Err(e) => {
            warn!("Sync failed at phase: {}", orchestrator.phase());
            return Err(e.into());
        }
    };

    for id in &report.selected {
        println!("{id}");
    }
    println!("{}", report.summary());
    Ok(())
}
