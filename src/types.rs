// Shared types module - Wire types exchanged with the appliance and the form bodies we send back
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

// Fallbacks used when /config omits a field
pub const DEFAULT_MIN_BITRATE: u32 = 500;
pub const DEFAULT_MAX_BITRATE: u32 = 5000;
pub const DEFAULT_DELAY_MS: i32 = 0;
pub const DEFAULT_SRT_LATENCY_MS: u32 = 2000;

/// One modem entry from `/data`. Identity is its position in the list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModemReading {
    #[serde(rename = "i", default)]
    pub index: u32,
    #[serde(default)]
    pub ip: String,
    #[serde(rename = "txb", default)]
    pub tx_bytes: Option<u64>,  // Cumulative transmitted bytes
}

/// One temperature sensor entry from `/data`. Identity is its position in the list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TempReading {
    #[serde(rename = "i", default)]
    pub index: u32,
    #[serde(rename = "type_name", default)]
    pub name: String,
    #[serde(rename = "type_value", default)]
    pub raw_milli_degrees: f64,
}

/// Result of one `/data` poll.
///
/// Each section is decoded on its own so that a malformed section leaves the
/// other views untouched. `None` means "keep showing what you had".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    pub active: Option<bool>,
    pub modems: Option<Vec<ModemReading>>,
    pub temps: Option<Vec<TempReading>>,
}

impl StatusSnapshot {
    pub fn from_json(body: &Value) -> Self {
        StatusSnapshot {
            active: body.get("active").and_then(Value::as_bool),
            modems: decode_section(body, "modems"),
            temps: decode_section(body, "temps"),
        }
    }
}

fn decode_section<T: for<'de> Deserialize<'de>>(body: &Value, key: &str) -> Option<Vec<T>> {
    let section = body.get(key)?;
    match serde_json::from_value::<Vec<T>>(section.clone()) {
        Ok(entries) => Some(entries),
        Err(e) => {
            warn!(section = key, error = %e, "dropping malformed status section");
            None
        }
    }
}

/// Stream settings as served by `/config`. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    #[serde(deserialize_with = "lenient_number")]
    pub min_br: Option<u32>,
    #[serde(deserialize_with = "lenient_number")]
    pub max_br: Option<u32>,
    #[serde(deserialize_with = "lenient_number")]
    pub delay: Option<i32>,
    #[serde(deserialize_with = "lenient_number")]
    pub srt_latency: Option<u32>,
    #[serde(deserialize_with = "string_or_number")]
    pub srt_streamid: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub srtla_addr: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub srtla_port: Option<String>,
}

impl StreamConfig {
    pub fn bitrate(&self) -> (u32, u32) {
        (
            self.min_br.unwrap_or(DEFAULT_MIN_BITRATE),
            self.max_br.unwrap_or(DEFAULT_MAX_BITRATE),
        )
    }

    pub fn delay_ms(&self) -> i32 {
        self.delay.unwrap_or(DEFAULT_DELAY_MS)
    }

    pub fn srt_latency_ms(&self) -> u32 {
        self.srt_latency.unwrap_or(DEFAULT_SRT_LATENCY_MS)
    }
}

// The appliance is not consistent about quoting ports, accept both
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// Numbers may arrive quoted; anything unusable falls back to the field default
fn lenient_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.to_string().parse().ok(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineOption {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitrateBounds {
    pub min_br: u32,
    pub max_br: u32,
}

impl BitrateBounds {
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("min_br", self.min_br.to_string()),
            ("max_br", self.max_br.to_string()),
        ]
    }
}

/// Everything POSTed to `/start`, gathered from the settings controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartForm {
    pub pipeline: String,
    pub delay: i32,
    pub bitrate: BitrateBounds,
    pub srtla_addr: String,
    pub srtla_port: String,
    pub srt_streamid: String,
    pub srt_latency: u32,
}

impl StartForm {
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("pipeline", self.pipeline.clone()),
            ("delay", self.delay.to_string()),
            ("min_br", self.bitrate.min_br.to_string()),
            ("max_br", self.bitrate.max_br.to_string()),
            ("srtla_addr", self.srtla_addr.clone()),
            ("srtla_port", self.srtla_port.clone()),
            ("srt_streamid", self.srt_streamid.clone()),
            ("srt_latency", self.srt_latency.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_sections_decode_independently() {
        let body = json!({
            "active": true,
            "modems": [{"i": 0, "ip": "10.0.0.2", "txb": 1000}],
            "temps": [{"i": 0, "type_name": "soc", "type_value": "hot"}],
        });
        let snapshot = StatusSnapshot::from_json(&body);

        assert_eq!(snapshot.active, Some(true));
        assert_eq!(snapshot.modems.as_ref().map(|m| m.len()), Some(1));
        assert_eq!(snapshot.temps, None);
    }

    #[test]
    fn test_modem_without_counter() {
        let body = json!({"modems": [{"i": 3, "ip": "192.168.1.5"}]});
        let snapshot = StatusSnapshot::from_json(&body);
        let modems = snapshot.modems.unwrap();

        assert_eq!(modems[0].index, 3);
        assert_eq!(modems[0].tx_bytes, None);
        assert_eq!(snapshot.active, None);
    }

    #[test]
    fn test_stream_config_defaults() {
        let config: StreamConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config.bitrate(), (500, 5000));
        assert_eq!(config.delay_ms(), 0);
        assert_eq!(config.srt_latency_ms(), 2000);
        assert_eq!(config.srtla_addr, None);
    }

    #[test]
    fn test_stream_config_port_as_number() {
        let config: StreamConfig = serde_json::from_value(json!({
            "min_br": 1000,
            "max_br": 8000,
            "srtla_port": 5000,
            "srtla_addr": "relay.example.net",
        }))
        .unwrap();

        assert_eq!(config.bitrate(), (1000, 8000));
        assert_eq!(config.srtla_port.as_deref(), Some("5000"));
        assert_eq!(config.srtla_addr.as_deref(), Some("relay.example.net"));
    }

    #[test]
    fn test_stream_config_quoted_numbers() {
        let config: StreamConfig = serde_json::from_value(json!({
            "min_br": "1500",
            "max_br": 7000,
            "delay": "-60",
            "srt_latency": "soon",
            "srt_streamid": "live/cam1",
        }))
        .unwrap();

        assert_eq!(config.bitrate(), (1500, 7000));
        assert_eq!(config.delay_ms(), -60);
        assert_eq!(config.srt_latency_ms(), 2000);
        assert_eq!(config.srt_streamid.as_deref(), Some("live/cam1"));
    }

    #[test]
    fn test_start_form_field_order() {
        let form = StartForm {
            pipeline: "h265_cam".to_string(),
            delay: -40,
            bitrate: BitrateBounds { min_br: 800, max_br: 6000 },
            srtla_addr: "relay".to_string(),
            srtla_port: "5000".to_string(),
            srt_streamid: "live/abc".to_string(),
            srt_latency: 1500,
        };
        let keys: Vec<&str> = form.form_fields().iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            ["pipeline", "delay", "min_br", "max_br", "srtla_addr", "srtla_port", "srt_streamid", "srt_latency"]
        );
        assert_eq!(form.form_fields()[1].1, "-40");
    }
}
