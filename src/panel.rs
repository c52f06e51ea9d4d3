// Panel Module - Controller state for the control panel
//
// The controller never performs I/O. Every user action and every finished
// request arrives as a PanelEvent; the controller updates its state and
// answers with the Effects the runtime has to carry out.
use tracing::{debug, error, warn};

use crate::commands::{AdminCommand, Overlay};
use crate::i18n::Labels;
use crate::sliders::{self, RangeSlider, Slider};
use crate::telemetry::{self, ModemRow, ModemTracker, TempRow};
use crate::types::{BitrateBounds, PipelineOption, StartForm, StatusSnapshot, StreamConfig};

/// Start/stop button state. Settings are editable only while not `Live`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Idle,
    Starting,  // Start sent, waiting for a poll to confirm
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    SrtStreamId,
    SrtlaAddr,
    SrtlaPort,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelEvent {
    PipelinesLoaded(Vec<PipelineOption>),
    ConfigLoaded(StreamConfig),
    Tick,
    StatusReceived { seq: u64, snapshot: StatusSnapshot },
    StartStopPressed,
    StartFinished(Result<(), String>),
    StopFinished(Result<(), String>),
    BitrateDragged(i32, i32),
    DelayDragged(i32),
    SrtLatencyDragged(i32),
    PipelineSelected(usize),
    FieldEdited(TextField, String),
    CommandRequested(String),
    CommandFinished { command: AdminCommand, result: Result<String, String> },
    DismissOverlay,
    DismissError,
    LabelsChanged(Labels),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchPipelines,
    FetchConfig,
    Poll(u64),
    StartTimer,
    StopTimer,
    SetBitrate(BitrateBounds),
    Start(StartForm),
    Stop,
    SendCommand(AdminCommand),
}

pub struct PanelController {
    labels: Labels,
    button: ButtonState,

    // Settings editor
    pipelines: Vec<PipelineOption>,
    selected_pipeline: Option<usize>,
    bitrate: RangeSlider,
    delay: Slider,
    srt_latency: Slider,
    srt_streamid: String,
    srtla_addr: String,
    srtla_port: String,

    // Status views
    modems: ModemTracker,
    modem_rows: Vec<ModemRow>,
    temp_rows: Vec<TempRow>,
    last_poll_seq: u64,    // Last poll handed to the runtime
    last_status_seq: u64,  // Last poll whose result was applied
    start_floor: u64,      // Polls at or below this were issued before Start

    error: Option<String>,
    overlay: Option<Overlay>,
}

impl PanelController {
    pub fn new(labels: Labels) -> Self {
        let defaults = StreamConfig::default();
        PanelController {
            labels,
            button: ButtonState::Idle,
            pipelines: Vec::new(),
            selected_pipeline: None,
            bitrate: sliders::bitrate_slider(defaults.bitrate()),
            delay: sliders::delay_slider(defaults.delay_ms()),
            srt_latency: sliders::srt_latency_slider(defaults.srt_latency_ms()),
            srt_streamid: String::new(),
            srtla_addr: String::new(),
            srtla_port: String::new(),
            modems: ModemTracker::new(),
            modem_rows: Vec::new(),
            temp_rows: Vec::new(),
            last_poll_seq: 0,
            last_status_seq: 0,
            start_floor: 0,
            error: None,
            overlay: None,
        }
    }

    /// Effects to run once when the panel comes up.
    pub fn boot(&mut self) -> Vec<Effect> {
        vec![Effect::FetchPipelines, Effect::FetchConfig, self.poll(), Effect::StartTimer]
    }

    // Every poll gets a fresh sequence number so late results can be told apart
    fn poll(&mut self) -> Effect {
        self.last_poll_seq += 1;
        Effect::Poll(self.last_poll_seq)
    }

    pub fn handle(&mut self, event: PanelEvent) -> Vec<Effect> {
        match event {
            PanelEvent::PipelinesLoaded(pipelines) => {
                self.selected_pipeline = pipelines
                    .iter()
                    .position(|p| p.selected)
                    .or(if pipelines.is_empty() { None } else { Some(0) });
                self.pipelines = pipelines;
                vec![]
            }
            PanelEvent::ConfigLoaded(config) => {
                self.seed(&config);
                vec![]
            }
            PanelEvent::Tick => vec![self.poll()],
            PanelEvent::StatusReceived { seq, snapshot } => {
                if seq <= self.last_status_seq {
                    debug!(seq, last = self.last_status_seq, "ignoring stale status");
                    return vec![];
                }
                self.last_status_seq = seq;
                self.apply_status(seq, snapshot);
                vec![]
            }
            PanelEvent::StartStopPressed => match self.button {
                ButtonState::Idle => {
                    self.error = None;
                    self.button = ButtonState::Starting;
                    self.start_floor = self.last_poll_seq;
                    vec![Effect::StopTimer, Effect::Start(self.start_form())]
                }
                ButtonState::Live => vec![Effect::StopTimer, Effect::Stop],
                ButtonState::Starting => vec![],
            },
            PanelEvent::StartFinished(result) => {
                if let Err(message) = result {
                    warn!(%message, "stream start rejected");
                    self.error = Some(format!("Failed to start the stream: {}", message));
                }
                vec![Effect::StartTimer]
            }
            PanelEvent::StopFinished(result) => match result {
                Ok(()) => vec![self.poll(), Effect::StartTimer],
                Err(message) => {
                    warn!(%message, "stream stop failed, resuming status polling");
                    vec![Effect::StartTimer]
                }
            },
            PanelEvent::BitrateDragged(low, high) => {
                self.bitrate.set((low, high));
                vec![Effect::SetBitrate(self.bitrate_bounds())]
            }
            PanelEvent::DelayDragged(value) => {
                self.delay.set(value);
                vec![]
            }
            PanelEvent::SrtLatencyDragged(value) => {
                self.srt_latency.set(value);
                vec![]
            }
            PanelEvent::PipelineSelected(index) => {
                if index < self.pipelines.len() {
                    self.selected_pipeline = Some(index);
                }
                vec![]
            }
            PanelEvent::FieldEdited(field, value) => {
                match field {
                    TextField::SrtStreamId => self.srt_streamid = value,
                    TextField::SrtlaAddr => self.srtla_addr = value,
                    TextField::SrtlaPort => self.srtla_port = value,
                }
                vec![]
            }
            PanelEvent::CommandRequested(token) => match AdminCommand::from_token(&token) {
                Ok(command) => vec![Effect::SendCommand(command)],
                Err(e) => {
                    error!("{:#}", e);
                    vec![]
                }
            },
            PanelEvent::CommandFinished { command, result } => {
                match result {
                    Ok(text) => self.overlay = Some(command.overlay(&self.labels, &text)),
                    Err(message) => warn!(command = command.token(), %message, "command failed"),
                }
                vec![]
            }
            PanelEvent::DismissOverlay => {
                self.overlay = None;
                vec![]
            }
            PanelEvent::DismissError => {
                self.error = None;
                vec![]
            }
            PanelEvent::LabelsChanged(labels) => {
                self.labels = labels;
                vec![]
            }
        }
    }

    fn seed(&mut self, config: &StreamConfig) {
        self.bitrate = sliders::bitrate_slider(config.bitrate());
        self.delay = sliders::delay_slider(config.delay_ms());
        self.srt_latency = sliders::srt_latency_slider(config.srt_latency_ms());
        self.srt_streamid = config.srt_streamid.clone().unwrap_or_default();
        self.srtla_addr = config.srtla_addr.clone().unwrap_or_default();
        self.srtla_port = config.srtla_port.clone().unwrap_or_default();
    }

    // Each section updates its own view; a missing one leaves the old view up
    fn apply_status(&mut self, seq: u64, snapshot: StatusSnapshot) {
        if let Some(active) = snapshot.active {
            // A poll sent before Start was pressed cannot confirm the new state
            if self.button == ButtonState::Starting && seq <= self.start_floor {
                debug!(seq, floor = self.start_floor, "keeping start lock for pre-start poll");
            } else {
                self.button = if active { ButtonState::Live } else { ButtonState::Idle };
            }
        }
        if let Some(modems) = snapshot.modems {
            self.modem_rows = self.modems.update(modems);
        }
        if let Some(temps) = snapshot.temps {
            self.temp_rows = telemetry::temperature_rows(&temps);
        }
    }

    pub fn start_form(&self) -> StartForm {
        StartForm {
            pipeline: self.selected_pipeline_option().map(|p| p.id.clone()).unwrap_or_default(),
            delay: self.delay.value(),
            bitrate: self.bitrate_bounds(),
            srtla_addr: self.srtla_addr.clone(),
            srtla_port: self.srtla_port.clone(),
            srt_streamid: self.srt_streamid.clone(),
            srt_latency: self.srt_latency.value().max(0) as u32,
        }
    }

    fn bitrate_bounds(&self) -> BitrateBounds {
        let (low, high) = self.bitrate.values();
        BitrateBounds {
            min_br: low.max(0) as u32,
            max_br: high.max(0) as u32,
        }
    }

    pub fn button(&self) -> ButtonState {
        self.button
    }

    pub fn button_label(&self) -> String {
        match self.button {
            ButtonState::Idle => self.labels.start.clone(),
            ButtonState::Starting => format!("{}...", self.labels.starting),
            ButtonState::Live => self.labels.stop.clone(),
        }
    }

    pub fn button_enabled(&self) -> bool {
        self.button != ButtonState::Starting
    }

    pub fn settings_visible(&self) -> bool {
        self.button != ButtonState::Live
    }

    pub fn pipelines(&self) -> &[PipelineOption] {
        &self.pipelines
    }

    pub fn selected_pipeline(&self) -> Option<usize> {
        self.selected_pipeline
    }

    pub fn selected_pipeline_option(&self) -> Option<&PipelineOption> {
        self.selected_pipeline.and_then(|i| self.pipelines.get(i))
    }

    pub fn bitrate(&self) -> RangeSlider {
        self.bitrate
    }

    pub fn delay(&self) -> Slider {
        self.delay
    }

    pub fn srt_latency(&self) -> Slider {
        self.srt_latency
    }

    pub fn bitrate_label(&self) -> String {
        sliders::bitrate_label(&self.labels.bitrate, self.bitrate.values())
    }

    pub fn delay_label(&self) -> String {
        sliders::millis_label(&self.labels.audio_delay, self.delay.value())
    }

    pub fn srt_latency_label(&self) -> String {
        sliders::millis_label(&self.labels.srt_latency, self.srt_latency.value())
    }

    pub fn field(&self, field: TextField) -> &str {
        match field {
            TextField::SrtStreamId => &self.srt_streamid,
            TextField::SrtlaAddr => &self.srtla_addr,
            TextField::SrtlaPort => &self.srtla_port,
        }
    }

    pub fn modem_rows(&self) -> &[ModemRow] {
        &self.modem_rows
    }

    pub fn temp_rows(&self) -> &[TempRow] {
        &self.temp_rows
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }
}
