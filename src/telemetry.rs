// Telemetry Module - Turns status snapshots into modem/temperature table rows
use crate::types::{ModemReading, TempReading};

/// Rounds half-way cases towards positive infinity, matching how the
/// appliance's own page rounds displayed values.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Kbps transmitted between two cumulative byte counters one poll apart.
pub fn throughput_kbps(prev_bytes: u64, curr_bytes: u64) -> i64 {
    let delta = curr_bytes as f64 - prev_bytes as f64;
    round_half_up(delta * 8.0 / 1024.0)
}

pub fn temperature_celsius(raw_milli_degrees: f64) -> i64 {
    round_half_up(raw_milli_degrees / 1000.0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModemRow {
    pub index: u32,
    pub ip: String,
    pub kbps: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempRow {
    pub index: u32,
    pub name: String,
    pub celsius: i64,
}

// Entries are correlated with the previous poll purely by list position
#[derive(Debug, Default)]
pub struct ModemTracker {
    prev: Option<Vec<ModemReading>>,
}

impl ModemTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute display rows for `modems` and remember them for the next poll.
    pub fn update(&mut self, modems: Vec<ModemReading>) -> Vec<ModemRow> {
        let rows = modems
            .iter()
            .enumerate()
            .map(|(i, modem)| {
                let prev_bytes = self
                    .prev
                    .as_ref()
                    .and_then(|prev| prev.get(i))
                    .and_then(|prev| prev.tx_bytes);

                let kbps = match (prev_bytes, modem.tx_bytes) {
                    (Some(prev), Some(curr)) => throughput_kbps(prev, curr),
                    _ => 0,
                };

                ModemRow {
                    index: modem.index,
                    ip: modem.ip.clone(),
                    kbps,
                }
            })
            .collect();

        self.prev = Some(modems);
        rows
    }
}

pub fn temperature_rows(temps: &[TempReading]) -> Vec<TempRow> {
    temps
        .iter()
        .map(|t| TempRow {
            index: t.index,
            name: t.name.clone(),
            celsius: temperature_celsius(t.raw_milli_degrees),
        })
        .collect()
}
