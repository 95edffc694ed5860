//! Glance stream server — entry point.
//!
//! ```text
//! glance-server                  Run with defaults
//! glance-server --config <path>  Load a custom config TOML
//! glance-server --port 9000      Override the listening port
//! glance-server --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use glance_core::{ServerEvent, StreamServer};
use glance_server::config::ServerConfig;
use glance_server::source::FileFrameSource;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "glance-server", about = "Glance screen stream server")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "glance-server.toml")]
    config: PathBuf,

    /// Listening port (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Encoded frame file to stream (overrides config).
    #[arg(short, long)]
    frame: Option<PathBuf>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ServerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Logging is configured from the file, so a load failure is only
    // reported once the subscriber exists.
    let (mut config, load_error) = match ServerConfig::load(&cli.config) {
        Ok(config) => (config, None),
        Err(e) => (ServerConfig::default(), Some(e)),
    };
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(frame) = cli.frame {
        config.source.frame_path = frame;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(e) = load_error {
        warn!("{e}; using defaults");
    }

    info!("glance-server v{}", env!("CARGO_PKG_VERSION"));
    info!("frame source: {}", config.source.frame_path.display());
    info!(
        "initial tunables: {} fps, quality {}, scale {}",
        config.stream.fps, config.stream.quality, config.stream.scale
    );

    let source = FileFrameSource::new(config.source.frame_path.clone());
    let mut server = StreamServer::new(config.to_server_config()?, source);
    let mut events = server.take_events().ok_or("event channel already taken")?;
    server.start(config.network.port).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received — shutting down");
                break;
            }
            event = events.recv() => match event {
                Some(ServerEvent::ClientsChanged(n)) => info!("{n} viewer(s) connected"),
                Some(ServerEvent::IdleStopped) => {
                    warn!("idle timeout reached; exiting");
                    break;
                }
                Some(ServerEvent::Stopped) | None => break,
                Some(ServerEvent::Started(addr)) => info!("accepting viewers on {addr}"),
            },
        }
    }

    server.stop().await;
    Ok(())
}
