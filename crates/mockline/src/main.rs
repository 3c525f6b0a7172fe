use anyhow::Context;
use clap::Parser;
use mockline::admin_api::{HttpServer, ServerState};
use mockline::config::Config;
use mockline::index::MatchIndex;
use mockline::logging::{self, LogFormat};
use mockline::predicate::{PatternCompiler, RegexCache};
use mockline::{store, StubRule, SyncCoordinator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "mockline", version, about = "HTTP stub server")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "MOCKLINE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short, long, env = "MOCKLINE_PORT")]
    port: Option<u16>,

    #[arg(long, env = "MOCKLINE_HOST")]
    host: Option<String>,

    /// Persist stubs to this JSON file instead of keeping them in memory
    #[arg(long, env = "MOCKLINE_STORAGE_PATH")]
    storage_path: Option<PathBuf>,

    /// Stubs to create at startup (JSON array)
    #[arg(long, env = "MOCKLINE_SEED")]
    seed: Option<PathBuf>,

    #[arg(long, env = "MOCKLINE_LOG_LEVEL")]
    log_level: Option<String>,

    #[arg(long, env = "MOCKLINE_JSON_LOGS")]
    json_logs: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(port) = self.port {
            config.listen.port = port;
        }
        if let Some(host) = self.host {
            config.listen.host = host;
        }
        if let Some(path) = self.storage_path {
            config.storage.backend = mockline::config::StorageBackend::File;
            config.storage.path = path;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if self.json_logs {
            config.logging.json = true;
        }

        config.validate()?;
        Ok(config)
    }
}

fn read_seed(path: &Path) -> anyhow::Result<Vec<StubRule>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Seed file {} is not a JSON array of stubs", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config()?;
    logging::init(
        &config.logging.level,
        LogFormat::from_json_flag(config.logging.json),
    )?;

    let store = store::open(&config.storage)?;
    let cache = Arc::new(RegexCache::with_max_entries(config.regex_cache.max_entries));
    let index = Arc::new(MatchIndex::new(PatternCompiler::new(cache)));
    let coordinator = Arc::new(SyncCoordinator::new(store, index));
    coordinator.start()?;

    if let Some(seed) = &config.seed {
        let rules = read_seed(seed)?;
        let total = rules.len();
        let created = coordinator.create_batch(rules)?;
        info!(
            "Seeded {} of {} stubs from {}",
            created.len(),
            total,
            seed.display()
        );
    }

    let state = Arc::new(ServerState::new(Arc::clone(&coordinator)));
    let server = HttpServer::bind(config.socket_addr()?, state).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Received shutdown signal");
        }
    }

    coordinator.stop();
    Ok(())
}
