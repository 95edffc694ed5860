//! Glance viewer — entry point.
//!
//! ```text
//! glance-viewer                      Connect with defaults
//! glance-viewer --config <path>      Use custom config TOML
//! glance-viewer --host 10.0.0.5      Override the server host
//! glance-viewer --gen-config         Dump default config and exit
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use glance_core::{ClientEvent, ConnectionStatus, DeliveryStats, StreamClient};
use glance_viewer::commands::ViewerCommand;
use glance_viewer::config::ViewerConfig;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "glance-viewer", about = "Glance screen stream viewer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "glance-viewer.toml")]
    config: PathBuf,

    /// Server host (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Shared secret (overrides config).
    #[arg(short, long)]
    secret: Option<String>,

    /// File overwritten with every received frame (overrides config).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ViewerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Logging is configured from the file, so a load failure is only
    // reported once the subscriber exists.
    let (mut config, load_error) = match ViewerConfig::load(&cli.config) {
        Ok(config) => (config, None),
        Err(e) => (ViewerConfig::default(), Some(e)),
    };
    if let Some(host) = cli.host {
        config.network.host = host;
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(secret) = cli.secret {
        config.auth.secret = secret;
    }
    if let Some(output) = cli.output {
        config.output.latest_frame = output.display().to_string();
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(e) = load_error {
        warn!("{e}; using defaults");
    }

    info!("glance-viewer v{}", env!("CARGO_PKG_VERSION"));

    let latest_frame = config.latest_frame_path();
    let mut client = StreamClient::new(config.to_client_config());
    let mut events = client.take_events().ok_or("event channel already taken")?;

    info!(
        "connecting to {}:{}",
        config.network.host, config.network.port
    );
    client
        .connect(&config.network.host, config.network.port)
        .await?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    // A zero interval disables the periodic stats line.
    let stats_every = Duration::from_secs(config.output.stats_interval_secs.max(1));
    let mut stats_tick = tokio::time::interval(stats_every);
    let log_stats = config.output.stats_interval_secs > 0;

    let mut tunables_sent = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received — disconnecting");
                break;
            }

            event = events.recv() => match event {
                Some(ClientEvent::Status(ConnectionStatus::Authenticated)) => {
                    info!("authenticated");
                    if !tunables_sent {
                        apply_initial_tunables(&client, &config);
                        tunables_sent = true;
                    }
                }
                Some(ClientEvent::Status(ConnectionStatus::Disconnected)) | None => {
                    warn!("disconnected from server");
                    break;
                }
                Some(ClientEvent::Status(status)) => debug!("status: {status}"),
                Some(ClientEvent::Frame(frame)) => {
                    debug!("frame: {} bytes", frame.len());
                    if let Some(path) = &latest_frame {
                        if let Err(e) = tokio::fs::write(path, &frame).await {
                            warn!("cannot write {}: {e}", path.display());
                        }
                    }
                }
                Some(ClientEvent::Error(message)) => error!("{message}"),
            },

            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match ViewerCommand::parse(&line) {
                        Ok(ViewerCommand::Quit) => break,
                        Ok(command) => run_command(&client, command),
                        Err(e) => warn!("{e}"),
                    }
                }
                Ok(None) => {
                    debug!("stdin closed");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("stdin: {e}");
                    stdin_open = false;
                }
            },

            _ = stats_tick.tick(), if log_stats => {
                if client.is_authenticated() {
                    log_delivery(&client.stats());
                }
            }
        }
    }

    client.disconnect();
    log_delivery(&client.stats());
    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────

fn apply_initial_tunables(client: &StreamClient, config: &ViewerConfig) {
    if let Some(fps) = config.stream.fps {
        client.set_fps(fps);
    }
    if let Some(quality) = config.stream.quality {
        client.set_quality(quality);
    }
    if let Some(scale) = config.stream.scale {
        client.set_scale(scale);
    }
}

fn run_command(client: &StreamClient, command: ViewerCommand) {
    let sent = match command {
        ViewerCommand::Fps(fps) => client.set_fps(fps),
        ViewerCommand::Quality(quality) => client.set_quality(quality),
        ViewerCommand::Scale(scale) => client.set_scale(scale),
        ViewerCommand::Stats => {
            log_delivery(&client.stats());
            return;
        }
        ViewerCommand::Quit => return,
    };
    if sent {
        info!("sent {command:?}");
    } else {
        warn!("not authenticated; {command:?} dropped");
    }
}

fn log_delivery(stats: &DeliveryStats) {
    info!(
        "{} frames, {} bytes, {:.1} fps",
        stats.frames_received, stats.bytes_received, stats.fps
    );
}
