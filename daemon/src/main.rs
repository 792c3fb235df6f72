//! chainwatch daemon: walks the ledger and serves the query API.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use chainwatch_node::{init_logging, LogFormat, StorageBackend, Watcher, WatcherConfig};
use chainwatch_rpc::{ApiState, QueryService, RpcServer};

#[derive(Parser)]
#[command(name = "chainwatch", about = "Ledger address watcher", version)]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "CHAINWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// JSON-RPC endpoint of the ledger node.
    #[arg(long, env = "CHAINWATCH_RPC_ENDPOINT")]
    rpc_endpoint: Option<String>,

    /// Start at the current ledger head (default).
    #[arg(long, conflicts_with = "resume")]
    live: bool,

    /// Resume right after the last processed block instead of the head.
    #[arg(long)]
    resume: bool,

    /// Storage backend: "memory" or "lmdb".
    #[arg(long, env = "CHAINWATCH_STORAGE")]
    storage: Option<StorageBackend>,

    /// Data directory for the LMDB backend.
    #[arg(long, env = "CHAINWATCH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// HTTP API port.
    #[arg(long, env = "CHAINWATCH_API_PORT")]
    api_port: Option<u16>,

    /// Do not serve the HTTP API.
    #[arg(long, env = "CHAINWATCH_NO_API")]
    no_api: bool,

    /// Addresses to subscribe at startup (comma-separated).
    #[arg(long, env = "CHAINWATCH_SUBSCRIBE", value_delimiter = ',')]
    subscribe: Vec<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "CHAINWATCH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "CHAINWATCH_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the walker and the API until SIGINT/SIGTERM (default).
    Run,
    /// Print the effective configuration as TOML and exit.
    Config,
}

impl Cli {
    /// Overlay flags and env vars on top of `base`.
    fn apply(self, mut config: WatcherConfig) -> WatcherConfig {
        if let Some(endpoint) = self.rpc_endpoint {
            config.rpc_endpoint = endpoint;
        }
        if self.live {
            config.live = true;
        }
        if self.resume {
            config.live = false;
        }
        if let Some(storage) = self.storage {
            config.storage = storage;
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(port) = self.api_port {
            config.api_port = port;
        }
        if self.no_api {
            config.enable_api = false;
        }
        for address in self.subscribe {
            if !config.subscriptions.contains(&address) {
                config.subscriptions.push(address);
            }
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        config
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<WatcherConfig> {
    match path {
        Some(path) => WatcherConfig::from_toml_file(&path.to_string_lossy())
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(WatcherConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();
    let command = cli.command.take().unwrap_or(Command::Run);
    let config_path = cli.config.clone();

    let config = cli.apply(load_config(config_path.as_ref())?);
    config.validate().context("invalid configuration")?;

    match command {
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        Command::Run => run(config, config_path).await,
    }
}

async fn run(config: WatcherConfig, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    init_logging(config.log_format, &config.log_level);
    if let Some(path) = &config_path {
        tracing::info!(path = %path.display(), "loaded config file");
    }
    let api = if config.enable_api {
        config.api_port.to_string()
    } else {
        "off".to_string()
    };
    tracing::info!(
        endpoint = %config.rpc_endpoint,
        live = config.live,
        storage = %config.storage,
        api = %api,
        "starting chainwatch"
    );

    let mut watcher = Watcher::new(config.clone()).context("initialising watcher")?;
    let added = watcher.subscribe_initial()?;
    if added > 0 {
        tracing::info!(added, "subscribed configured addresses");
    }
    watcher.start()?;

    let server = config.enable_api.then(|| {
        let state = ApiState {
            service: QueryService::new(watcher.store()),
            status: watcher.status(),
            metrics: config.enable_metrics.then(|| watcher.metrics()),
        };
        tokio::spawn(RpcServer::new(config.api_port, state).serve(watcher.shutdown_signal()))
    });

    let controller = watcher.shutdown_controller();
    match server {
        Some(mut server) => {
            tokio::select! {
                _ = controller.wait_for_signal() => {}
                result = &mut server => {
                    // The API only returns early if it failed to bind or serve.
                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => tracing::error!(error = %e, "HTTP API failed"),
                        Err(e) => tracing::error!(error = %e, "HTTP API task panicked"),
                    }
                    controller.shutdown();
                }
            }
            let exit = watcher.stop().await?;
            if !server.is_finished() {
                server.await??;
            }
            tracing::info!(last_processed = ?exit.last_processed, "shutdown complete");
        }
        None => {
            controller.wait_for_signal().await;
            let exit = watcher.stop().await?;
            tracing::info!(last_processed = ?exit.last_processed, "shutdown complete");
        }
    }

    Ok(())
}
