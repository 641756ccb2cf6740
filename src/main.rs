//! Socksdial - SOCKS5 client dialer
//!
//! Connects to a destination, through a SOCKS5 proxy when one is configured,
//! and relays stdin/stdout over the connection.

use anyhow::{Context, Result};
use clap::Parser;
use socksdial::config::{load_config, Config};
use socksdial::transport::{Connector, DialContext};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Socksdial - open a TCP connection through a SOCKS5 proxy
#[derive(Parser, Debug)]
#[command(name = "socksdial")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Destination address (host:port)
    destination: String,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Proxy URI ([socks5://][user[:password]@]host:port), overrides the config file
    #[arg(short, long)]
    proxy: Option<String>,

    /// Dial timeout in seconds, overrides the config file
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level, args.json_log)?;

    // Load configuration
    let mut config = match &args.config {
        Some(path) => {
            info!("Configuration loaded from: {:?}", path);
            load_config(path)?
        }
        None => Config::default(),
    };
    if let Some(proxy) = args.proxy {
        config.dialer.proxy = proxy;
    }
    if let Some(timeout) = args.timeout {
        config.dialer.timeout_secs = timeout;
    }

    let connector = Connector::new(config.dialer.clone()).context("Invalid proxy setting")?;

    info!("Socksdial v{}", socksdial::VERSION);
    if let Some(endpoint) = config.dialer.proxy_endpoint()? {
        info!("Dialing {} via {}", args.destination, endpoint);
    } else {
        info!("Dialing {} directly", args.destination);
    }

    let stream = connector
        .dial(&DialContext::background(), "tcp", &args.destination)
        .await
        .with_context(|| format!("Failed to dial {}", args.destination))?;

    tokio::select! {
        result = relay_stdio(stream) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    Ok(())
}

/// Copy stdin to the connection and the connection to stdout
///
/// Returns once the remote side closes.
async fn relay_stdio(stream: TcpStream) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();

    let upload = async {
        let sent = tokio::io::copy(&mut stdin, &mut writer).await?;
        writer.shutdown().await?;
        Ok::<_, std::io::Error>(sent)
    };
    let download = async {
        let received = tokio::io::copy(&mut reader, &mut stdout).await?;
        stdout.flush().await?;
        Ok::<_, std::io::Error>(received)
    };
    tokio::pin!(upload);
    tokio::pin!(download);

    tokio::select! {
        received = &mut download => {
            debug!("Connection closed by remote after {} bytes", received?);
        }
        sent = &mut upload => {
            debug!("Stdin closed after {} bytes", sent?);
            let received = (&mut download).await?;
            debug!("Connection closed by remote after {} bytes", received);
        }
    }

    Ok(())
}

/// Setup logging based on configuration
///
/// Logs go to stderr; stdout carries relayed data.
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
