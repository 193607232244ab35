mod dispatch_commands;
mod doctor_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {dray_common::ChannelType, dray_config::DrayConfig};

#[derive(Parser)]
#[command(name = "dray", about = "Dray - route assignment dispatch for fleet drivers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file path (overrides discovery).
    #[arg(long, global = true, env = "DRAY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every delivery channel and print per-channel status.
    Health,
    /// Render a channel's message from a fixture file to stdout.
    Render {
        /// Channel whose template to render.
        #[arg(long)]
        channel: ChannelType,
        /// Dispatch fixture (route/driver/vehicle/stops as JSON).
        #[arg(long)]
        fixture: PathBuf,
    },
    /// Run one dispatch through the orchestrator and print each attempt.
    Send {
        /// Dispatch fixture (route/driver/vehicle/stops as JSON).
        #[arg(long)]
        fixture: PathBuf,
        /// Explicit channel override; repeat the flag to request several.
        #[arg(long = "channel")]
        channels: Vec<ChannelType>,
        /// Fan out to every available channel.
        #[arg(long, default_value_t = false)]
        multi_channel: bool,
    },
    /// Validate config and templates, print a structured report.
    Doctor,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<DrayConfig> {
    match cli.config.as_deref() {
        // An explicit path must load; discovery may fall back to defaults.
        Some(path) => dray_config::load_config(path),
        None => Ok(dray_config::discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "dray starting");

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Health => dispatch_commands::handle_health(&config).await,
        Commands::Render { channel, fixture } => {
            dispatch_commands::handle_render(&config, channel, &fixture)
        }
        Commands::Send {
            fixture,
            channels,
            multi_channel,
        } => dispatch_commands::handle_send(&config, &fixture, channels, multi_channel).await,
        Commands::Doctor => doctor_commands::handle_doctor(cli.config.as_deref(), &config),
    }
}
