// Config Module - Configuration management and command-line argument parsing
use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use crate::i18n::Labels;
use crate::types::BitrateBounds;

// Global storage for custom config path
static CUSTOM_CONFIG_PATH: OnceLock<Option<String>> = OnceLock::new();

#[derive(Parser, Debug, Default)]
#[command(
    author,
    version,
    about = "Terminal control panel for a BELABOX streaming appliance",
    long_about = "Polls the appliance for modem throughput and temperatures, and starts/stops the stream.\n\
                  Without an action flag an interactive panel is shown; --status, --stop, --bitrate and --cmd\n\
                  run a single request and exit."
)]
pub struct Args {
    /// Appliance base URL (e.g. http://belabox.local)
    #[arg(short, long)]
    pub url: Option<String>,

    /// Config file path or name (e.g., --cfg /full/path or --cfg studio for ~/.config/belapanel/studio.conf)
    #[arg(long)]
    pub cfg: Option<String>,

    /// Status poll interval in milliseconds
    #[arg(short = 'p', long)]
    pub poll_ms: Option<u64>,

    /// JSON language file used for panel labels
    #[arg(long)]
    pub lang_file: Option<String>,

    /// Print modem and temperature tables once and exit
    #[arg(short, long)]
    pub status: bool,

    /// Stop the running stream and exit
    #[arg(long)]
    pub stop: bool,

    /// Set the live bitrate window, e.g. --bitrate 1000:6000
    #[arg(short, long, value_parser = parse_bitrate)]
    pub bitrate: Option<BitrateBounds>,

    /// Send an admin command (test, update, rollback, reboot, mm) and exit
    #[arg(long)]
    pub cmd: Option<String>,
}

fn parse_bitrate(value: &str) -> Result<BitrateBounds, String> {
    let (min, max) = value
        .split_once(':')
        .ok_or_else(|| format!("expected MIN:MAX, got '{}'", value))?;
    let min_br = min.trim().parse::<u32>().map_err(|e| format!("bad minimum bitrate: {}", e))?;
    let max_br = max.trim().parse::<u32>().map_err(|e| format!("bad maximum bitrate: {}", e))?;
    if min_br > max_br {
        return Err(format!("minimum bitrate {} is above maximum {}", min_br, max_br));
    }
    Ok(BitrateBounds { min_br, max_br })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PanelConfig {
    #[serde(skip)]
    pub config_path: Option<PathBuf>,  // Stores the config file path (not serialized)

    pub appliance_url: String,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub language_file: String,  // Empty = built-in English labels
    pub log_file: String,  // Empty = belapanel.log next to the config file
    pub log_level: String,
}

impl Default for PanelConfig {
    fn default() -> Self {
        PanelConfig {
            config_path: None,
            appliance_url: "http://127.0.0.1".to_string(),
            poll_interval_ms: 1000,
            request_timeout_ms: 5000,
            language_file: "".to_string(),
            log_file: "".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl PanelConfig {
    pub fn merge_with_args(&mut self, args: &Args) -> bool {
        // Track if any args were actually provided
        let mut args_provided = false;

        if let Some(ref url) = args.url {
            self.appliance_url = url.clone();
            args_provided = true;
        }

        if let Some(poll_ms) = args.poll_ms {
            self.poll_interval_ms = poll_ms;
            args_provided = true;
        }

        if let Some(ref lang_file) = args.lang_file {
            self.language_file = lang_file.clone();
            args_provided = true;
        }

        if args_provided {
            self.sanitize();
        }
        args_provided
    }

    /// Set the global config path (called once at startup)
    pub fn set_config_path(cfg: Option<String>) {
        let _ = CUSTOM_CONFIG_PATH.set(cfg);
    }

    /// Get the global config path (if set)
    fn get_config_path_arg() -> Option<&'static str> {
        CUSTOM_CONFIG_PATH.get().and_then(|opt| opt.as_deref())
    }

    fn config_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        let config_dir = PathBuf::from(home).join(".config").join("belapanel");
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create {}", config_dir.display()))?;
        Ok(config_dir)
    }

    pub fn config_path(cfg_arg: Option<&str>) -> Result<PathBuf> {
        // Priority: explicit arg > global > default
        let cfg = cfg_arg.or_else(|| Self::get_config_path_arg());

        let Some(cfg) = cfg else {
            return Ok(Self::config_dir()?.join("config.conf"));
        };

        let path = PathBuf::from(cfg);
        if path.is_absolute() || cfg.contains('/') || cfg.contains('\\') {
            return Ok(path);
        }

        // Otherwise treat as config name in config directory
        let filename = if cfg.ends_with(".conf") {
            cfg.to_string()
        } else {
            format!("{}.conf", cfg)
        };
        Ok(Self::config_dir()?.join(filename))
    }

    pub fn load_with_path(cfg_arg: Option<&str>) -> Result<Self> {
        let path = Self::config_path(cfg_arg)?;
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut parsed: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        parsed.config_path = Some(path);
        parsed.sanitize();
        Ok(parsed)
    }

    /// Sanitize config values to handle common formatting issues
    pub fn sanitize(&mut self) {
        self.appliance_url = self.appliance_url.trim().trim_end_matches('/').to_string();
        if !self.appliance_url.contains("://") && !self.appliance_url.is_empty() {
            self.appliance_url = format!("http://{}", self.appliance_url);
        }
        self.language_file = self.language_file.trim().to_string();
        self.log_file = self.log_file.trim().to_string();
        self.log_level = self.log_level.trim().to_lowercase();
        if self.log_level.is_empty() {
            self.log_level = "info".to_string();
        }

        // Clamp numeric values to reasonable ranges
        self.poll_interval_ms = self.poll_interval_ms.clamp(100, 60_000);
        self.request_timeout_ms = self.request_timeout_ms.clamp(100, 120_000);
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if !self.log_file.is_empty() {
            return Ok(PathBuf::from(&self.log_file));
        }
        match self.config_path.as_ref().and_then(|p| p.parent()) {
            Some(dir) => Ok(dir.join("belapanel.log")),
            None => Ok(Self::config_dir()?.join("belapanel.log")),
        }
    }

    /// Labels from `language_file`, or English when none is configured.
    pub fn labels(&self) -> Result<Labels> {
        if self.language_file.is_empty() {
            return Ok(Labels::default());
        }
        Labels::load(std::path::Path::new(&self.language_file))
    }

    pub fn save(&self) -> Result<()> {
        let path = match self.config_path.clone() {
            Some(path) => path,
            None => Self::config_path(None)?,
        };

        // Sanitize values before saving
        let mut sanitized = self.clone();
        sanitized.sanitize();

        // Build TOML with comments manually for better documentation
        let contents = format!(
            r#"# belapanel Configuration File
# Poll interval and language changes apply while the panel is running

# Base URL of the appliance web interface
appliance_url = {}

# How often the status endpoint is polled, in milliseconds (100-60000)
poll_interval_ms = {}

# Timeout for every request to the appliance, in milliseconds (100-120000)
request_timeout_ms = {}

# JSON language file with panel labels (empty = English)
# Uses the appliance's language keys: "start", "stop", "bitrate", "audio-delay", ...
language_file = {}

# Log file (empty = belapanel.log next to this file)
log_file = {}

# Log level: "error", "warn", "info", "debug", "trace"
# RUST_LOG overrides this when set
log_level = {}
"#,
            toml_string(&sanitized.appliance_url),
            sanitized.poll_interval_ms,
            sanitized.request_timeout_ms,
            toml_string(&sanitized.language_file),
            toml_string(&sanitized.log_file),
            toml_string(&sanitized.log_level),
        );

        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

// Quote and escape a string for the hand-written TOML template
fn toml_string(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}
