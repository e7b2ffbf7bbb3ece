use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hikwatch::{
    CameraClient, DayNightProfile, HikwatchApp, HikwatchConfig, OutputFormat, StreamChannel,
};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "hikwatch")]
#[command(about = "Alarm stream watcher and control client for Hikvision IP cameras")]
#[command(version)]
#[command(long_about = "Connects to a Hikvision camera's alert stream, turns the device's \
repeated per-packet alarm reports into Start/Stop transitions and prints them. Also issues \
one-shot PTZ, day/night profile, snapshot and stream queries.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "hikwatch.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, global = true, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, global = true, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, global = true, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Camera host, overrides the configuration file
    #[arg(long)]
    host: Option<String>,

    /// Camera HTTP port
    #[arg(long)]
    port: Option<u16>,

    /// Camera user name
    #[arg(long)]
    user: Option<String>,

    /// Camera password
    #[arg(long)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the alarm stream and print every notification
    Watch {
        /// Print one JSON object per line
        #[arg(long)]
        json: bool,
    },
    /// Pan/tilt/zoom control
    Ptz {
        #[command(subcommand)]
        action: PtzCommand,
    },
    /// Switch the image profile
    Profile {
        #[arg(value_enum)]
        mode: ProfileArg,
    },
    /// Save a JPEG snapshot
    Snapshot {
        #[arg(long, default_value = "main", value_parser = parse_channel)]
        channel: StreamChannel,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Show codec and resolution of a stream
    ChannelInfo {
        #[arg(long, default_value = "main", value_parser = parse_channel)]
        channel: StreamChannel,
    },
    /// Print the RTSP URL of a stream
    RtspUrl {
        #[arg(long, default_value = "main", value_parser = parse_channel)]
        channel: StreamChannel,
    },
    /// Print the effective configuration (password masked) and exit
    PrintConfig,
    /// Validate the configuration and exit
    ValidateConfig,
}

#[derive(Subcommand, Debug)]
enum PtzCommand {
    /// Raw command code with up to four numeric arguments
    Raw {
        code: String,
        #[arg(default_value_t = 0, allow_hyphen_values = true)]
        arg1: i32,
        #[arg(default_value_t = 0, allow_hyphen_values = true)]
        arg2: i32,
        #[arg(default_value_t = 0, allow_hyphen_values = true)]
        arg3: i32,
        #[arg(default_value_t = 0, allow_hyphen_values = true)]
        arg4: i32,
    },
    /// Go to a stored preset
    Preset { number: u32 },
    /// Zoom in (positive) or out (negative)
    Zoom {
        #[arg(allow_hyphen_values = true)]
        multiplier: i32,
    },
    /// Start or stop moving in a direction (Up, LeftDown, ...)
    Move {
        direction: String,
        #[arg(default_value = "start")]
        action: String,
        #[arg(long, default_value_t = 4)]
        speed: u8,
    },
    /// Print the current PTZ position
    Status,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ProfileArg {
    Day,
    Night,
}

impl From<ProfileArg> for DayNightProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Day => DayNightProfile::Day,
            ProfileArg::Night => DayNightProfile::Night,
        }
    }
}

fn parse_channel(value: &str) -> Result<StreamChannel, String> {
    value.parse().map_err(|e: hikwatch::HikwatchError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args)?;

    init_logging(&args, config.camera.log)?;

    info!("Starting hikwatch v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    match args.command {
        Command::PrintConfig => {
            println!("{}", config.to_toml()?);
        }
        Command::ValidateConfig => match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        },
        Command::Watch { json } => {
            let output = if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            };
            let mut app = HikwatchApp::new(config, output).map_err(|e| {
                error!("Failed to create watcher: {}", e);
                e
            })?;

            let exit_code = app.run().await.map_err(|e| {
                error!("Watcher error during execution: {}", e);
                e
            })?;

            info!("hikwatch exited with code: {}", exit_code);
            std::process::exit(exit_code);
        }
        command => run_command(config, command).await?,
    }

    Ok(())
}

/// One-shot control commands; no alarm session is started
async fn run_command(config: HikwatchConfig, command: Command) -> Result<()> {
    let client = CameraClient::new(config)?;
    let commands = client.commands();

    match command {
        Command::Ptz { action } => match action {
            PtzCommand::Raw {
                code,
                arg1,
                arg2,
                arg3,
                arg4,
            } => commands.ptz_command(&code, [arg1, arg2, arg3, arg4]).await?,
            PtzCommand::Preset { number } => commands.ptz_preset(number).await?,
            PtzCommand::Zoom { multiplier } => commands.ptz_zoom(multiplier).await?,
            PtzCommand::Move {
                direction,
                action,
                speed,
            } => commands.ptz_move_named(&direction, &action, speed).await?,
            PtzCommand::Status => println!("{}", commands.ptz_status().await?),
        },
        Command::Profile { mode } => commands.set_profile(mode.into()).await?,
        Command::Snapshot { channel, output } => {
            let image = commands.snapshot(channel).await?;
            tokio::fs::write(&output, &image)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Saved {} bytes to {}", image.len(), output.display());
        }
        Command::ChannelInfo { channel } => {
            let descriptor = commands.channel_info(channel).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&descriptor).context("Failed to render channel")?
            );
        }
        Command::RtspUrl { channel } => println!("{}", commands.rtsp_url(channel)),
        Command::Watch { .. } | Command::PrintConfig | Command::ValidateConfig => {}
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<HikwatchConfig> {
    let mut config = HikwatchConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;

    if let Some(host) = &args.host {
        config.camera.host = host.clone();
    }
    if let Some(port) = args.port {
        config.camera.port = port;
    }
    if let Some(user) = &args.user {
        config.camera.username = user.clone();
    }
    if let Some(password) = &args.password {
        config.camera.password = password.clone();
    }

    Ok(config)
}

/// Level for the `hikwatch` target; `camera.log` counts as `--debug`
fn log_level(args: &Args, camera_log: bool) -> &'static str {
    if args.debug || camera_log {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    }
}

fn init_logging(args: &Args, camera_log: bool) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = log_level(args, camera_log);
    let debug = log_level == "debug";

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hikwatch={}", log_level)));

    // Logs go to stderr so watcher output on stdout stays machine-readable
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(debug)
            .with_file(debug)
            .with_line_number(debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(debug)
                .with_file(debug)
                .with_line_number(debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_flags() {
        let args = Args::parse_from(["hikwatch", "watch"]);
        assert_eq!(log_level(&args, false), "warn");

        let args = Args::parse_from(["hikwatch", "-v", "watch"]);
        assert_eq!(log_level(&args, false), "info");

        let args = Args::parse_from(["hikwatch", "watch", "--quiet"]);
        assert_eq!(log_level(&args, false), "error");
    }

    #[test]
    fn test_camera_log_enables_debug() {
        let args = Args::parse_from(["hikwatch", "watch"]);
        assert_eq!(log_level(&args, true), "debug");

        let args = Args::parse_from(["hikwatch", "--quiet", "watch"]);
        assert_eq!(log_level(&args, true), "debug");
    }
}
