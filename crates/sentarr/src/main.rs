//! sentarr - Plex log monitor
//!
//! This binary follows a Plex Media Server log, counts known error patterns
//! over a sliding window and sends throttled alerts to email, Discord, Slack
//! or a generic webhook.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use sentarr::config::{DEFAULT_CONFIG_PATH, SentarrConfig};
use sentarr::monitor::{ConfigHandle, Monitor};
use sentarr_alerts::{AlertStore, Notifier};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "sentarr")]
#[command(about = "Plex log monitor with throttled alerts")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "SENTARR_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the Plex log and send alerts
    Run {
        /// Plex log file or log directory (overrides log_path)
        #[arg(long, env = "PLEX_LOG_PATH")]
        log_path: Option<PathBuf>,

        /// Replay the existing log instead of starting at its end
        #[arg(long)]
        from_beginning: bool,
    },

    /// Validate the config file and print a summary
    CheckConfig,

    /// Send a test notification through one channel
    TestChannel {
        /// Channel name as configured
        name: String,
    },

    /// Generate a sample config file
    InitConfig {
        /// Path to write config (defaults to --config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    match cli.command {
        Commands::Run {
            log_path,
            from_beginning,
        } => {
            run_monitor(&cli.config, log_path, from_beginning).await?;
        }

        Commands::CheckConfig => {
            check_config(&cli.config)?;
        }

        Commands::TestChannel { name } => {
            test_channel(&cli.config, &name).await?;
        }

        Commands::InitConfig { output, force } => {
            init_config(output.as_deref().unwrap_or(&cli.config), force)?;
        }
    }

    Ok(())
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("sentarr=info".parse()?)
        .add_directive("sentarr_alerts=info".parse()?)
        .add_directive("sentarr_logs=info".parse()?);

    tracing_subscriber::registry()
        .with((format == LogFormat::Text).then(fmt::layer))
        .with((format == LogFormat::Json).then(|| fmt::layer().json()))
        .with(filter)
        .init();

    Ok(())
}

async fn run_monitor(
    config_path: &Path,
    log_path: Option<PathBuf>,
    from_beginning: bool,
) -> anyhow::Result<()> {
    info!(config = %config_path.display(), "starting sentarr");

    let mut config = SentarrConfig::from_file(config_path)?;
    if let Some(path) = log_path {
        config.log_path = path;
    }
    if from_beginning {
        config.start_at_beginning = true;
    }

    let mut monitor = Monitor::new(&config, AlertStore::new())?;
    info!(
        log_file = %monitor.log_file().display(),
        error_threshold = config.monitor.error_threshold,
        window_minutes = config.monitor.time_window_minutes,
        cooldown_minutes = config.monitor.alert_cooldown_minutes,
        channels = config.channels.iter().filter(|c| c.enabled).count(),
        "loaded config"
    );

    spawn_reload_task(config_path.to_path_buf(), monitor.config_handle());

    if let Err(e) = monitor.run(shutdown_signal()).await {
        error!(error = %e, "monitor stopped");
        return Err(e.into());
    }
    Ok(())
}

#[cfg(unix)]
fn spawn_reload_task(config_path: PathBuf, handle: ConfigHandle) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "SIGHUP handler unavailable, config reload disabled");
            return;
        }
    };

    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!(config = %config_path.display(), "SIGHUP received, reloading config");
            match SentarrConfig::from_file(&config_path) {
                Ok(next) => {
                    if let Err(e) = handle.apply(&next) {
                        warn!(error = %e, "reload rejected, keeping previous config");
                    }
                }
                Err(e) => warn!(error = %e, "reload failed, keeping previous config"),
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_task(_config_path: PathBuf, _handle: ConfigHandle) {}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}

fn check_config(config_path: &Path) -> anyhow::Result<()> {
    let config = SentarrConfig::from_file(config_path)?;

    println!("Config OK: {}", config_path.display());
    println!();
    println!("  Log file: {}", config.log_file().display());
    println!(
        "  Monitoring: errors={} warnings={}",
        config.monitor.monitor_errors, config.monitor.monitor_warnings
    );
    println!("  Error threshold: {}", config.monitor.error_threshold);
    if let Some(threshold) = config.monitor.warning_threshold {
        println!("  Warning threshold: {threshold}");
    }
    println!("  Time window: {}", config.monitor.window_description());
    println!("  Cooldown: {} minutes", config.monitor.alert_cooldown_minutes);
    println!();

    if config.channels.is_empty() {
        println!("  No channels configured");
    }
    for channel in &config.channels {
        let state = if channel.enabled { "enabled" } else { "disabled" };
        println!("  Channel {} ({}): {state}", channel.name, channel.kind());
    }

    Ok(())
}

async fn test_channel(config_path: &Path, name: &str) -> anyhow::Result<()> {
    let config = SentarrConfig::from_file(config_path)?;
    let Some(channel) = config.channel(name) else {
        anyhow::bail!("no channel named '{name}' in {}", config_path.display());
    };

    let result = Notifier::new().test_channel(channel).await;
    if result.success {
        println!("Test notification sent via {}", result.channel);
        Ok(())
    } else {
        anyhow::bail!(
            "test notification via {} failed: {}",
            result.channel,
            result.message.unwrap_or_default()
        )
    }
}

fn init_config(output: &Path, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let config = SentarrConfig::sample();
    std::fs::write(output, config.to_toml()?)?;

    println!("Config written to {}", output.display());
    println!();
    println!("Enable a channel and fill in its settings, then run:");
    println!("  sentarr --config {} run", output.display());

    Ok(())
}
