// Runtime Module - Carries out controller effects: HTTP requests and the poll timer
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::client::ApplianceClient;
use crate::i18n::Labels;
use crate::panel::{Effect, PanelController, PanelEvent};

/// Repeating timer that feeds `PanelEvent::Tick` into the event channel.
pub struct Poller {
    interval: Duration,
    tx: UnboundedSender<PanelEvent>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn new(interval: Duration, tx: UnboundedSender<PanelEvent>) -> Self {
        Poller { interval, tx, handle: None }
    }

    /// (Re)start ticking. Any timer already running is cancelled first.
    pub fn start(&mut self) {
        self.stop();

        let period = self.interval;
        let tx = self.tx.clone();
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.send(PanelEvent::Tick).is_err() {
                    break;
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        if interval == self.interval {
            return;
        }
        self.interval = interval;
        if self.is_running() {
            self.start();
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct PanelRuntime {
    controller: PanelController,
    client: ApplianceClient,
    poller: Poller,
    tx: UnboundedSender<PanelEvent>,
}

impl PanelRuntime {
    /// Build the runtime and the receiving end of its event channel.
    /// Everything sent on that channel must be passed back to `dispatch`.
    pub fn new(
        controller: PanelController,
        client: ApplianceClient,
        poll_interval: Duration,
    ) -> (Self, UnboundedReceiver<PanelEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let runtime = PanelRuntime {
            controller,
            client,
            poller: Poller::new(poll_interval, tx.clone()),
            tx,
        };
        (runtime, rx)
    }

    pub fn controller(&self) -> &PanelController {
        &self.controller
    }

    pub fn client(&self) -> &ApplianceClient {
        &self.client
    }

    #[cfg(test)]
    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    pub fn boot(&mut self) {
        info!(url = %self.client.base_url(), "starting control panel");
        let effects = self.controller.boot();
        self.execute(effects);
    }

    pub fn dispatch(&mut self, event: PanelEvent) {
        let effects = self.controller.handle(event);
        self.execute(effects);
    }

    pub fn set_poll_interval(&mut self, interval: Duration) {
        if interval != self.poller.interval() {
            info!(interval_ms = interval.as_millis() as u64, "poll interval changed");
            self.poller.set_interval(interval);
        }
    }

    pub fn set_labels(&mut self, labels: Labels) {
        self.dispatch(PanelEvent::LabelsChanged(labels));
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.run_effect(effect);
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        let client = self.client.clone();
        let tx = self.tx.clone();

        match effect {
            Effect::StartTimer => self.poller.start(),
            Effect::StopTimer => self.poller.stop(),
            Effect::Poll(seq) => {
                tokio::spawn(async move {
                    match client.fetch_status().await {
                        Ok(snapshot) => {
                            let _ = tx.send(PanelEvent::StatusReceived { seq, snapshot });
                        }
                        Err(e) => debug!(seq, "status poll skipped: {:#}", e),
                    }
                });
            }
            Effect::FetchPipelines => {
                tokio::spawn(async move {
                    match client.fetch_pipelines().await {
                        Ok(pipelines) => {
                            let _ = tx.send(PanelEvent::PipelinesLoaded(pipelines));
                        }
                        Err(e) => warn!("Failed to load pipelines: {:#}", e),
                    }
                });
            }
            Effect::FetchConfig => {
                tokio::spawn(async move {
                    match client.fetch_config().await {
                        Ok(config) => {
                            let _ = tx.send(PanelEvent::ConfigLoaded(config));
                        }
                        Err(e) => warn!("Failed to load stream config: {:#}", e),
                    }
                });
            }
            Effect::SetBitrate(bounds) => {
                tokio::spawn(async move {
                    if let Err(e) = client.set_bitrate(bounds).await {
                        warn!("Failed to set bitrate: {:#}", e);
                    }
                });
            }
            Effect::Start(form) => {
                info!(pipeline = %form.pipeline, "starting stream");
                tokio::spawn(async move {
                    let result = client.start(&form).await.map_err(|e| format!("{:#}", e));
                    let _ = tx.send(PanelEvent::StartFinished(result));
                });
            }
            Effect::Stop => {
                info!("stopping stream");
                tokio::spawn(async move {
                    let result = client.stop().await.map_err(|e| format!("{:#}", e));
                    let _ = tx.send(PanelEvent::StopFinished(result));
                });
            }
            Effect::SendCommand(command) => {
                info!(command = command.token(), "sending command");
                tokio::spawn(async move {
                    let result = client.send_command(command).await.map_err(|e| format!("{:#}", e));
                    let _ = tx.send(PanelEvent::CommandFinished { command, result });
                });
            }
        }
    }
}
