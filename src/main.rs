use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use beacon_remote::commands::resolve;
use beacon_remote::transport::{LoopbackTransport, SerialTransport, Transport};
use beacon_remote::{Config, Daemon, SessionManager};

/// Beacon Remote - drive a micro:bit robot with spoken commands
#[derive(Parser)]
#[command(name = "beacon-remote", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// HTTP API port
    #[arg(long)]
    port: Option<u16>,

    /// Don't serve the HTTP API
    #[arg(long)]
    no_api: bool,

    /// Use the in-memory loopback transport instead of a serial port
    #[arg(long, env = "BEACON_REMOTE_LOOPBACK")]
    loopback: bool,

    /// Device name prefix used during discovery
    #[arg(long)]
    device_prefix: Option<String>,

    /// Serial port to use instead of discovery by name
    #[arg(long)]
    port_path: Option<String>,

    /// Connect to the peripheral at startup
    #[arg(long)]
    connect: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the command vocabulary
    Commands,
    /// Show what an utterance would send, without sending it
    Resolve {
        /// Utterance to resolve
        utterance: String,
    },
    /// List serial devices matching the discovery filter
    Devices,
    /// Connect, send one payload and disconnect
    Send {
        /// Payload to send (a newline is appended)
        payload: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,beacon_remote=info",
        1 => "info,beacon_remote=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    apply_overrides(&mut config, &cli);

    let transport: Arc<dyn Transport> = if cli.loopback {
        Arc::new(LoopbackTransport::new())
    } else {
        Arc::new(SerialTransport::new(config.device.serial))
    };

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Commands => print_commands(&config),
            Command::Resolve { utterance } => resolve_utterance(&config, &utterance),
            Command::Devices => list_devices(&config, cli.loopback),
            Command::Send { payload } => send_once(&config, transport, &payload).await,
        };
    }

    tracing::info!(
        transport = transport.name(),
        api = config.api_server.enabled,
        port = config.api_server.port,
        "starting beacon remote"
    );

    let daemon = Daemon::new(config, transport)?;
    tracing::info!("beacon remote ready - type or pipe utterances, one per line");

    // Run until interrupted
    daemon.run().await?;

    Ok(())
}

/// Apply command-line flags on top of env and file configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(port) = cli.port {
        config.api_server.port = port;
    }
    if cli.no_api {
        config.api_server.enabled = false;
    }
    if let Some(prefix) = &cli.device_prefix {
        config.device.filter.name_prefix.clone_from(prefix);
    }
    if let Some(path) = &cli.port_path {
        config.device.filter.port = Some(path.clone());
    }
    if cli.connect {
        config.device.auto_connect = true;
    }
}

fn print_commands(config: &Config) -> anyhow::Result<()> {
    let vocabulary = config.build_vocabulary()?;

    for row in vocabulary.list_all() {
        let marker = if row.user_defined { " (user)" } else { "" };
        println!("{:<40} -> {}{marker}", row.trigger, row.payload);
    }

    Ok(())
}

fn resolve_utterance(config: &Config, utterance: &str) -> anyhow::Result<()> {
    let vocabulary = config.build_vocabulary()?;

    match resolve(&vocabulary, utterance) {
        Some(resolution) => println!("{} ({:?})", resolution.payload, resolution.source),
        None => println!("no match"),
    }

    Ok(())
}

fn list_devices(config: &Config, loopback: bool) -> anyhow::Result<()> {
    let devices = if loopback {
        vec![LoopbackTransport::default_device()]
    } else {
        SerialTransport::scan(&config.device.filter)?
    };

    if devices.is_empty() {
        println!("No devices matching '{}'", config.device.filter.name_prefix);
        return Ok(());
    }

    for device in devices {
        println!("{}\t{}", device.id, device.name);
    }

    Ok(())
}

async fn send_once(
    config: &Config,
    transport: Arc<dyn Transport>,
    payload: &str,
) -> anyhow::Result<()> {
    let session = SessionManager::new(transport, config.device.filter.clone());

    let state = session.connect().await?;
    println!("{state}");

    let sent = session.send(payload).await;
    let outcome = session.disconnect().await;
    sent?;

    println!("Sent {payload}");
    println!("{outcome}");
    Ok(())
}
