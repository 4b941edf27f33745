//! Wordgate - content-censoring HTTP forward proxy.
//!
//! Binary entry point: parses CLI flags, initializes logging, and runs the
//! proxy. The proxy waits for the operator's control connection before it
//! starts serving browser clients.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wordgate_core::{DEFAULT_CAPACITY, DEFAULT_MAX_WORD_LEN};
use wordgate_proxy::{
    ProxyConfig, ProxyServer, DEFAULT_CLIENT_PORT, DEFAULT_CONTROL_PORT, DEFAULT_ERROR_URL,
    DEFAULT_ORIGIN_PORT,
};

/// Wordgate - content-censoring HTTP forward proxy
#[derive(Parser, Debug)]
#[command(name = "wordgate", version, about)]
struct Args {
    /// Port browser clients connect to
    #[arg(long, default_value_t = DEFAULT_CLIENT_PORT)]
    port: u16,

    /// Port for the operator control connection
    #[arg(long, default_value_t = DEFAULT_CONTROL_PORT)]
    control_port: u16,

    /// Port used when connecting to origin servers
    #[arg(long, default_value_t = DEFAULT_ORIGIN_PORT)]
    origin_port: u16,

    /// URL served in place of blocked requests
    #[arg(long, default_value = DEFAULT_ERROR_URL)]
    error_url: String,

    /// Also scan fetched HTML bodies for denylisted words
    #[arg(long)]
    deep_inspection: bool,

    /// Maximum number of denylisted words
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Maximum length of one denylisted word, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_WORD_LEN)]
    max_word_len: usize,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Initialize console logging, honoring RUST_LOG when set.
fn init_logging(args: &Args) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,wordgate_core={0},wordgate_proxy={0},wordgate_app={0}",
            args.log_level
        ))
    });

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let config = ProxyConfig::default()
        .with_client_port(args.port)
        .with_control_port(args.control_port)
        .with_origin_port(args.origin_port)
        .with_error_url(args.error_url)
        .with_deep_inspection(args.deep_inspection)
        .with_policy_limits(args.capacity, args.max_word_len);

    tracing::info!(
        "starting wordgate (clients on {}, control on {})",
        config.client_addr,
        config.control_addr
    );

    ProxyServer::new(config)
        .run()
        .await
        .context("proxy server failed")?;

    Ok(())
}
