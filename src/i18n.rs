// Language labels - UI strings keyed the same way as the appliance's language files
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    pub start: String,
    pub stop: String,
    pub starting: String,
    pub bitrate: String,
    pub audio_delay: String,
    pub srt_latency: String,
    pub update: String,
    pub rollback: String,
    pub restart: String,
    pub power_off: String,
}

impl Default for Labels {
    fn default() -> Self {
        Labels {
            start: "Start".to_string(),
            stop: "Stop".to_string(),
            starting: "Starting".to_string(),
            bitrate: "Bitrate".to_string(),
            audio_delay: "Audio delay".to_string(),
            srt_latency: "SRT latency".to_string(),
            update: "Update".to_string(),
            rollback: "Rollback".to_string(),
            restart: "Restart".to_string(),
            power_off: "Power off".to_string(),
        }
    }
}

// Language files carry many more keys than the panel uses
#[derive(Deserialize)]
#[serde(transparent)]
struct LanguageFile(HashMap<String, serde_json::Value>);

impl Labels {
    /// English labels overridden by whatever keys `path` provides.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read language file {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("Failed to parse language file {}", path.display()))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let LanguageFile(entries) = serde_json::from_str(contents)?;
        let mut labels = Labels::default();

        for (key, value) in entries {
            let Some(text) = value.as_str() else { continue };
            let slot = match key.as_str() {
                "start" => &mut labels.start,
                "stop" => &mut labels.stop,
                "starting" => &mut labels.starting,
                "bitrate" => &mut labels.bitrate,
                "audio-delay" => &mut labels.audio_delay,
                "srt-latency" => &mut labels.srt_latency,
                "update" => &mut labels.update,
                "rollback" => &mut labels.rollback,
                "restart" => &mut labels.restart,
                "power-off" => &mut labels.power_off,
                _ => continue,
            };
            *slot = text.to_string();
        }

        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_override() {
        let labels = Labels::from_json(r#"{"bitrate": "Débit", "srt-latency": "Latence SRT", "title": "x"}"#).unwrap();
        assert_eq!(labels.bitrate, "Débit");
        assert_eq!(labels.srt_latency, "Latence SRT");
        assert_eq!(labels.start, "Start");
    }

    #[test]
    fn test_non_string_values_ignored() {
        let labels = Labels::from_json(r#"{"stop": 5, "starting": "Démarrage"}"#).unwrap();
        assert_eq!(labels.stop, "Stop");
        assert_eq!(labels.starting, "Démarrage");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"power-off": "Ausschalten"}}"#).unwrap();
        let labels = Labels::load(file.path()).unwrap();
        assert_eq!(labels.power_off, "Ausschalten");
    }

    #[test]
    fn test_invalid_file() {
        assert!(Labels::from_json("[1, 2]").is_err());
    }
}
