use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{ClientConfig, FileConfig};
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "chatline")]
#[command(version)]
#[command(about = "Terminal chat client for a scalable assistant service")]
pub struct Args {
    /// Base URL of the HTTP API (overrides CHAT_API_URL)
    #[arg(long)]
    pub api_url: Option<String>,

    /// WebSocket host (defaults to the API host)
    #[arg(long)]
    pub ws_host: Option<String>,

    /// WebSocket port
    #[arg(long)]
    pub ws_port: Option<u16>,

    /// Connect with wss:// instead of ws://
    #[arg(long)]
    pub secure: bool,

    /// Seconds to wait before reconnecting a closed channel
    #[arg(long)]
    pub reconnect_secs: Option<u64>,

    /// Timeout in seconds for one-shot HTTP requests
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Never open the persistent channel; every message uses POST /chat
    #[arg(long)]
    pub http_only: bool,

    /// Verbose logging (debug level unless RUST_LOG is set)
    #[arg(long, short)]
    pub verbose: bool,

    /// Print shell completions and exit
    #[arg(long, value_enum)]
    pub completions: Option<clap_complete::Shell>,
}

/// Build the effective config: defaults, then `--config`, then the
/// `CHAT_API_URL` value, then flags.
pub fn resolve_config(args: &Args, env_api_url: Option<String>) -> Result<ClientConfig> {
    let mut config = ClientConfig::default();
    if let Some(path) = &args.config {
        config.apply_file(&FileConfig::load(path)?);
    }
    config.apply_env(env_api_url);
    if let Some(url) = &args.api_url {
        config = config.with_api_base(url.as_str());
    }
    if let Some(host) = &args.ws_host {
        config.ws_host = Some(host.clone());
    }
    if let Some(port) = args.ws_port {
        config.ws_port = port;
    }
    if args.secure {
        config.ws_secure = true;
    }
    if let Some(secs) = args.reconnect_secs {
        config.reconnect_delay = Duration::from_secs(secs);
    }
    if let Some(secs) = args.timeout_secs {
        config.request_timeout = Some(Duration::from_secs(secs));
    }
    Ok(config)
}
