use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use nodemgr_node::{DEFAULT_LISTEN_ADDR, DEFAULT_NETWORK, LocalNodeConfig};
use tracing_subscriber::EnvFilter;

pub const DEFAULT_CONFIG_DIR: &str = "config";
pub const SOCKET_FILE_NAME: &str = "file.sock";
pub const EXEC_USAGE: &str = "use 'exec [command]'";

/// Location of the manager socket, shared by both binaries.
#[derive(Args, Debug, Clone)]
pub struct SocketArgs {
    /// Configuration directory; the socket defaults to `<config>/file.sock`.
    #[arg(long, env = "NODEMGR_CONFIG_DIR", default_value = DEFAULT_CONFIG_DIR)]
    pub config: PathBuf,
    /// Explicit socket path, overriding the configuration directory.
    #[arg(long, env = "NODEMGR_SOCKET")]
    pub socket: Option<PathBuf>,
}

impl SocketArgs {
    /// Absolute socket path.
    pub fn socket_path(&self) -> std::io::Result<PathBuf> {
        let path = match &self.socket {
            Some(socket) => socket.clone(),
            None => self.config.join(SOCKET_FILE_NAME),
        };
        std::path::absolute(path)
    }
}

#[derive(Parser, Debug)]
#[command(name = "nodectl", about = "Operator console for a running node", version)]
pub struct ConsoleCli {
    #[command(flatten)]
    pub socket: SocketArgs,
    #[command(subcommand)]
    pub mode: Option<ConsoleMode>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConsoleMode {
    /// Run one console command and exit.
    Exec {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

impl ConsoleMode {
    /// The command line passed to `exec`, or `None` when it is empty.
    pub fn command_line(&self) -> Option<String> {
        match self {
            ConsoleMode::Exec { command } => {
                let line = command.join(" ");
                (!line.trim().is_empty()).then_some(line)
            }
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "nodemgrd", about = "Local node exposing the manager service", version)]
pub struct DaemonCli {
    #[command(flatten)]
    pub socket: SocketArgs,
    /// Human-readable node name.
    #[arg(long, default_value = "local")]
    pub moniker: String,
    /// Network (chain) identifier.
    #[arg(long, default_value = DEFAULT_NETWORK)]
    pub network: String,
    /// Address advertised for peer-to-peer connections.
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: String,
    /// Blocks produced before the socket is opened.
    #[arg(long, default_value_t = 1)]
    pub seed_blocks: u64,
    /// Interval between produced blocks; 0 disables the producer.
    #[arg(long, default_value_t = 1000)]
    pub block_interval_ms: u64,
}

impl DaemonCli {
    pub fn node_config(&self) -> LocalNodeConfig {
        LocalNodeConfig {
            moniker: self.moniker.clone(),
            network: self.network.clone(),
            listen_addr: self.listen_addr.clone(),
            ..LocalNodeConfig::default()
        }
    }
}

/// Creates the directory that will hold the socket file.
pub fn ensure_socket_dir(socket_path: &Path) -> std::io::Result<()> {
    match socket_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

/// Logs to standard error; `RUST_LOG` overrides `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
