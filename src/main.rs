// belapanel - Terminal control panel for a BELABOX streaming appliance
// Shows modem throughput and temperatures, starts/stops the stream and tunes bitrate live
use anyhow::{Context, Result};
use clap::Parser;
use notify::{Config, Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::{mpsc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod client;
mod commands;
mod config;
mod i18n;
mod panel;
mod runtime;
mod sliders;
mod telemetry;
mod tui;
mod types;

use client::ApplianceClient;
use commands::AdminCommand;
use config::{Args, PanelConfig};
use i18n::Labels;
use panel::PanelController;
use runtime::PanelRuntime;
use telemetry::ModemTracker;
use types::BitrateBounds;

/// Log to a file while the TUI owns the terminal, to stderr otherwise.
/// RUST_LOG takes precedence over the configured level.
fn init_logging(config: &PanelConfig, to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if to_file {
        let path = config.log_path()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.with_writer(Mutex::new(file)).with_ansi(false).init();
    } else {
        builder.with_writer(io::stderr).init();
    }
    Ok(())
}

/// Watch the config file and notify the panel when it is modified
fn spawn_config_watcher(config_path: PathBuf, config_change_tx: UnboundedSender<()>) {
    std::thread::spawn(move || {
        let (tx, rx) = mpsc::channel();
        let mut watcher = match RecommendedWatcher::new(tx, Config::default()) {
            Ok(w) => w,
            Err(e) => {
                warn!("Config watcher unavailable: {}", e);
                return;
            }
        };

        if let Err(e) = watcher.watch(&config_path, RecursiveMode::NonRecursive) {
            warn!("Cannot watch {}: {}", config_path.display(), e);
            return;
        }

        for result in rx {
            match result {
                Ok(NotifyEvent { kind: EventKind::Modify(_), .. }) => {
                    if config_change_tx.send(()).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Config watcher error: {}", e),
            }
        }
    });
}

// Two samples one interval apart so throughput is real on the second
async fn print_status(client: &ApplianceClient, interval: Duration) -> Result<()> {
    let mut tracker = ModemTracker::new();

    let first = client.fetch_status().await?;
    if let Some(modems) = first.modems {
        tracker.update(modems);
    }
    tokio::time::sleep(interval).await;
    let second = client.fetch_status().await?;

    let state = match second.active {
        Some(true) => "live",
        Some(false) => "idle",
        None => "unknown",
    };
    println!("Stream: {}", state);

    println!("\nModems");
    for row in tracker.update(second.modems.unwrap_or_default()) {
        println!("  {:>3}  {:<18} {:>8} Kbps", row.index, row.ip, row.kbps);
    }

    println!("\nTemperatures");
    for row in telemetry::temperature_rows(&second.temps.unwrap_or_default()) {
        println!("  {:>3}  {:<18} {:>5} °C", row.index, row.name, row.celsius);
    }
    Ok(())
}

async fn run_one_shot(args: &Args, client: &ApplianceClient, config: &PanelConfig, labels: &Labels) -> Result<()> {
    if let Some(ref token) = args.cmd {
        let command = AdminCommand::from_token(token)?;
        let response = client.send_command(command).await?;
        let overlay = command.overlay(labels, &response);
        println!("{}: {}", overlay.title, overlay.text);
    }

    if let Some(requested) = args.bitrate {
        // Same normalization the bitrate slider applies
        let (low, high) = sliders::bitrate_slider((requested.min_br, requested.max_br)).values();
        client
            .set_bitrate(BitrateBounds { min_br: low as u32, max_br: high as u32 })
            .await?;
        println!("{}", sliders::bitrate_label(&labels.bitrate, (low, high)));
    }

    if args.stop {
        client.stop().await?;
        println!("Stream stopped");
    }

    if args.status {
        print_status(client, config.poll_interval()).await?;
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set global config path immediately (before any config loads)
    PanelConfig::set_config_path(args.cfg.clone());

    let cfg_arg = args.cfg.as_deref();
    let config_path = PanelConfig::config_path(cfg_arg)?;
    let config_file_exists = config_path.exists();

    let mut config = if config_file_exists {
        match PanelConfig::load_with_path(cfg_arg) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config file: {:#}", e);
                eprintln!("Config file: {}", config_path.display());
                eprintln!("Please fix the config file or delete it to regenerate with defaults.");
                return Err(e);
            }
        }
    } else {
        let mut default_config = PanelConfig::default();
        default_config.config_path = Some(config_path.clone());
        default_config
    };

    // Persist on first run and whenever the command line changed something
    let args_provided = config.merge_with_args(&args);
    if !config_file_exists || args_provided {
        config.save()?;
    }

    let one_shot = args.status || args.stop || args.bitrate.is_some() || args.cmd.is_some();
    init_logging(&config, !one_shot)?;

    let labels = config.labels().unwrap_or_else(|e| {
        warn!("Falling back to English labels: {:#}", e);
        Labels::default()
    });
    let client = ApplianceClient::new(&config.appliance_url, config.request_timeout())?;

    // Everything runs on one thread; the terminal reader is the only helper thread
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    if one_shot {
        return rt.block_on(run_one_shot(&args, &client, &config, &labels));
    }

    info!(config = %config_path.display(), "using config file");
    println!("Using config file: {}", config_path.display());

    let (config_change_tx, config_change_rx) = tokio::sync::mpsc::unbounded_channel();
    spawn_config_watcher(config_path, config_change_tx);

    rt.block_on(async {
        let (runtime, panel_rx) = PanelRuntime::new(
            PanelController::new(labels),
            client,
            config.poll_interval(),
        );
        tui::run(runtime, panel_rx, config_change_rx, args.cfg.clone()).await
    })
}
