// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/nvrwatch-rs

//! nvrwatch - camera event watcher for NVR motion alerts
//!
//! Watches the platform stream for motion, has each event described by the
//! analysis relay and forwards the ones worth a human's attention.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nvrwatch::detection::PRIORITY_HIGH;
use nvrwatch::streaming::{LogNotifier, Notification, Notifier, RelayClient, WebSocketSource};
use nvrwatch::{Collaborators, Config, Engine, VERSION};

/// nvrwatch - camera event watcher
#[derive(Parser, Debug)]
#[command(name = "nvrwatch")]
#[command(author = "bad-antics")]
#[command(version = VERSION)]
#[command(about = "Watch NVR motion events and send prioritised notifications")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "NVRWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Send notifications
    #[arg(short, long)]
    notify: bool,

    /// Analyse every camera update, not only motion events
    #[arg(short, long)]
    test: bool,

    /// Log to file only
    #[arg(short, long)]
    quiet: bool,

    /// Send one test alarm and exit
    #[arg(long)]
    test_alarm: bool,

    /// Exit once a day at the configured restart time
    #[arg(long)]
    scheduled_restart: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration, then overlay environment and command line
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;
    config.apply_env()?;
    if args.notify {
        config.notify = true;
    }
    if args.test {
        config.test_mode = true;
    }
    if args.scheduled_restart {
        config.schedule.scheduled_restart = true;
    }

    let guard = init_logging(&args, &config)?;

    info!("nvrwatch v{} - camera event watcher", VERSION);
    info!("Configuration loaded from {:?}", config_path);

    let code = match run(&args, config) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };

    // flush the file writer before exiting
    drop(guard);
    std::process::exit(code);
}

fn init_logging(args: &Args, config: &Config) -> Result<WorkerGuard> {
    let level = if args.trace {
        "trace"
    } else if args.debug {
        "debug"
    } else {
        config.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("creating log directory {}", config.log_dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "nvrwatch.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let console = (!args.quiet).then(|| {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(true)
            .with_file(args.debug)
            .with_line_number(args.debug)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false),
        )
        .try_init()?;

    Ok(guard)
}

fn run(args: &Args, config: Config) -> Result<i32> {
    let missing = config.missing_settings();
    if !missing.is_empty() {
        error!("Missing required settings: {}", missing.join(", "));
        return Ok(1);
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(watch(args, config))
}

/// Build the collaborators and run until an exit is requested
async fn watch(args: &Args, config: Config) -> Result<i32> {
    let relay = Arc::new(RelayClient::new(&config.relay)?);
    let notifier: Arc<dyn Notifier> = if relay.has_notify_endpoint() {
        relay.clone()
    } else {
        info!("No notify endpoint configured, notifications go to the log");
        Arc::new(LogNotifier)
    };

    if args.test_alarm {
        send_test_alarm(notifier.as_ref()).await?;
        return Ok(0);
    }

    let collaborators = Collaborators {
        source: Arc::new(WebSocketSource::new(&config.platform)?),
        analyzer: relay.clone(),
        comparator: relay,
        notifier,
    };

    info!(
        notify = config.notify,
        test_mode = config.test_mode,
        camera = config.camera_filter.as_deref().unwrap_or("all"),
        "Watching platform stream"
    );
    info!("   Press Ctrl+C to shutdown");

    let reason = Engine::new(config, collaborators).run().await?;
    info!("nvrwatch exiting: {:?}", reason);
    Ok(reason.exit_code())
}

async fn send_test_alarm(notifier: &dyn Notifier) -> Result<()> {
    let notification = Notification {
        message: "Manual test of the alarm function".to_string(),
        priority: PRIORITY_HIGH,
        title: Some("ALARM: This is just a test".to_string()),
        attachment: None,
    };
    notifier
        .dispatch(&notification)
        .await
        .context("sending test alarm")?;
    notifier.flush().await?;
    info!("Test alarm sent");
    Ok(())
}
