//! Agora daemon: entry point for running the governance service.

use agora_node::{open_lmdb, open_memory, AgoraNode, NodeConfig, StoreBackend};
use agora_store::GovernanceStore;
use agora_utils::{init_logging, LogFormat};
use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "agora", version, about = "Agora DAO governance daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "AGORA_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the LMDB store.
    #[arg(long, env = "AGORA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Store backend.
    #[arg(long, value_enum, env = "AGORA_STORE")]
    store: Option<StoreArg>,

    /// Log format: "human" or "json".
    #[arg(long, env = "AGORA_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log filter, e.g. "info" or "info,agora_governance=debug". RUST_LOG wins.
    #[arg(long, env = "AGORA_LOG_LEVEL")]
    log_level: Option<String>,

    /// URL the effect executor listens on.
    #[arg(long, env = "AGORA_EXECUTOR_URL")]
    executor_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StoreArg {
    Lmdb,
    Memory,
}

impl From<StoreArg> for StoreBackend {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::Lmdb => StoreBackend::Lmdb,
            StoreArg::Memory => StoreBackend::Memory,
        }
    }
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API and run drain workers until SIGINT/SIGTERM.
    Serve {
        /// Address the HTTP API binds to.
        #[arg(long, env = "AGORA_RPC_BIND")]
        rpc_bind: Option<String>,

        /// HTTP API port.
        #[arg(long, env = "AGORA_RPC_PORT")]
        rpc_port: Option<u16>,

        /// Number of drain workers.
        #[arg(long, env = "AGORA_DRAIN_WORKERS")]
        drain_workers: Option<usize>,

        /// Only drain; do not serve the HTTP API.
        #[arg(long)]
        no_rpc: bool,
    },
    /// Run a single drain pass, print its report and exit.
    Drain,
    /// Print the effective configuration as TOML and exit.
    Config,
}

impl Cli {
    /// File config (or defaults) with CLI flags and env vars applied on top.
    fn resolve_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => NodeConfig::default(),
        };

        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(store) = self.store {
            config.store = store.into();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(url) = &self.executor_url {
            config.executor_url = Some(url.clone());
        }
        if let Command::Serve {
            rpc_bind,
            rpc_port,
            drain_workers,
            no_rpc,
        } = &self.command
        {
            if let Some(bind) = rpc_bind {
                config.rpc_bind = bind.clone();
            }
            if let Some(port) = rpc_port {
                config.rpc_port = *port;
            }
            if let Some(workers) = drain_workers {
                config.drain_workers = *workers;
            }
            if *no_rpc {
                config.enable_rpc = false;
            }
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    init_logging(config.log_format, &config.log_level);

    if let Some(path) = &cli.config {
        tracing::info!("Loaded config from {}", path.display());
    }

    match cli.command {
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        command => match config.store {
            StoreBackend::Lmdb => {
                let store = open_lmdb(&config)?;
                run(command, config, store).await
            }
            StoreBackend::Memory => run(command, config, open_memory()).await,
        },
    }
}

async fn run<S: GovernanceStore + 'static>(
    command: Command,
    config: NodeConfig,
    store: Arc<S>,
) -> anyhow::Result<()> {
    let mut node = AgoraNode::new(config, store)?;
    match command {
        Command::Serve { .. } => {
            node.start().await?;
            let rpc = if node.config().enable_rpc {
                format!("{}:{}", node.config().rpc_bind, node.config().rpc_port)
            } else {
                "off".to_string()
            };
            tracing::info!(
                rpc = %rpc,
                workers = node.config().drain_workers,
                "Agora daemon running"
            );
            node.wait_for_signal().await;
            tracing::info!("Shutdown signal received, stopping node");
            node.stop().await?;
            tracing::info!("Agora daemon exited cleanly");
        }
        Command::Drain => {
            let report = node
                .drain_once()
                .await
                .context("drain pass failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Config => {}
    }
    Ok(())
}
