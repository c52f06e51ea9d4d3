// TUI Module - Terminal rendering of the control panel and key handling
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Row, Table, Wrap};
use ratatui::{Frame, Terminal};
use std::io::{self, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use crate::commands::AdminCommand;
use crate::config::PanelConfig;
use crate::panel::{ButtonState, PanelController, PanelEvent, TextField};
use crate::runtime::PanelRuntime;
use crate::sliders::Handle;

/// Settings control that currently receives arrow keys and typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Pipeline,
    BitrateLow,
    BitrateHigh,
    Delay,
    SrtLatency,
    SrtStreamId,
    SrtlaAddr,
    SrtlaPort,
}

impl Focus {
    const ORDER: [Focus; 8] = [
        Focus::Pipeline,
        Focus::BitrateLow,
        Focus::BitrateHigh,
        Focus::Delay,
        Focus::SrtLatency,
        Focus::SrtStreamId,
        Focus::SrtlaAddr,
        Focus::SrtlaPort,
    ];

    fn position(self) -> usize {
        Self::ORDER.iter().position(|f| *f == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ORDER[(self.position() + 1) % Self::ORDER.len()]
    }

    pub fn prev(self) -> Self {
        Self::ORDER[(self.position() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }

    fn text_field(self) -> Option<TextField> {
        match self {
            Focus::SrtStreamId => Some(TextField::SrtStreamId),
            Focus::SrtlaAddr => Some(TextField::SrtlaAddr),
            Focus::SrtlaPort => Some(TextField::SrtlaPort),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyAction {
    Quit,
    Panel(PanelEvent),
    Ignore,
}

pub fn map_key(key: KeyEvent, focus: &mut Focus, panel: &PanelController) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyAction::Quit;
    }

    // The dialog is modal
    if panel.overlay().is_some() {
        return match key.code {
            KeyCode::Esc | KeyCode::Enter => KeyAction::Panel(PanelEvent::DismissOverlay),
            _ => KeyAction::Ignore,
        };
    }

    match key.code {
        KeyCode::Esc => return KeyAction::Panel(PanelEvent::DismissError),
        KeyCode::Enter => return KeyAction::Panel(PanelEvent::StartStopPressed),
        KeyCode::F(n @ 1..=5) => {
            let command = AdminCommand::ALL[(n - 1) as usize];
            return KeyAction::Panel(PanelEvent::CommandRequested(command.token().to_string()));
        }
        KeyCode::Tab => {
            *focus = focus.next();
            return KeyAction::Ignore;
        }
        KeyCode::BackTab => {
            *focus = focus.prev();
            return KeyAction::Ignore;
        }
        _ => {}
    }

    // Bitrate is applied live, everything else is locked while streaming
    if !panel.settings_visible() {
        return match key.code {
            KeyCode::Left if is_bitrate(*focus) => drag(*focus, panel, -1),
            KeyCode::Right if is_bitrate(*focus) => drag(*focus, panel, 1),
            KeyCode::Char('q') => KeyAction::Quit,
            _ => KeyAction::Ignore,
        };
    }

    if let Some(field) = focus.text_field() {
        let mut value = panel.field(field).to_string();
        return match key.code {
            KeyCode::Char(c) => {
                value.push(c);
                KeyAction::Panel(PanelEvent::FieldEdited(field, value))
            }
            KeyCode::Backspace if !value.is_empty() => {
                value.pop();
                KeyAction::Panel(PanelEvent::FieldEdited(field, value))
            }
            _ => KeyAction::Ignore,
        };
    }

    match key.code {
        KeyCode::Left => drag(*focus, panel, -1),
        KeyCode::Right => drag(*focus, panel, 1),
        KeyCode::Char('q') => KeyAction::Quit,
        _ => KeyAction::Ignore,
    }
}

fn is_bitrate(focus: Focus) -> bool {
    matches!(focus, Focus::BitrateLow | Focus::BitrateHigh)
}

// One arrow press moves the focused control one step; no movement, no event
fn drag(focus: Focus, panel: &PanelController, steps: i32) -> KeyAction {
    let event = match focus {
        Focus::Pipeline => {
            let count = panel.pipelines().len();
            if count == 0 {
                return KeyAction::Ignore;
            }
            let current = panel.selected_pipeline().unwrap_or(0) as i64;
            let next = (current + steps as i64).rem_euclid(count as i64) as usize;
            PanelEvent::PipelineSelected(next)
        }
        Focus::BitrateLow | Focus::BitrateHigh => {
            let handle = if focus == Focus::BitrateLow { Handle::Low } else { Handle::High };
            let mut slider = panel.bitrate();
            let (low, high) = slider.nudge(handle, steps);
            if (low, high) == panel.bitrate().values() {
                return KeyAction::Ignore;
            }
            PanelEvent::BitrateDragged(low, high)
        }
        Focus::Delay => {
            let mut slider = panel.delay();
            let value = slider.nudge(steps);
            if value == panel.delay().value() {
                return KeyAction::Ignore;
            }
            PanelEvent::DelayDragged(value)
        }
        Focus::SrtLatency => {
            let mut slider = panel.srt_latency();
            let value = slider.nudge(steps);
            if value == panel.srt_latency().value() {
                return KeyAction::Ignore;
            }
            PanelEvent::SrtLatencyDragged(value)
        }
        Focus::SrtStreamId | Focus::SrtlaAddr | Focus::SrtlaPort => return KeyAction::Ignore,
    };
    KeyAction::Panel(event)
}

/// Read terminal input on a blocking thread and forward it to the async loop.
fn spawn_input_reader(tx: UnboundedSender<Event>, shutdown: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !shutdown.load(Ordering::Relaxed) {
            match event::poll(Duration::from_millis(100)) {
                Ok(true) => match event::read() {
                    Ok(input) => {
                        if tx.send(input).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Terminal read failed: {}", e);
                        break;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    warn!("Terminal poll failed: {}", e);
                    break;
                }
            }
        }
    })
}

/// Run the interactive panel until the user quits. The terminal is restored
/// even when the loop fails.
pub async fn run(
    mut runtime: PanelRuntime,
    panel_rx: UnboundedReceiver<PanelEvent>,
    config_rx: UnboundedReceiver<()>,
    cfg_arg: Option<String>,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    terminal.hide_cursor()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let input_thread = spawn_input_reader(input_tx, shutdown.clone());

    let result = event_loop(
        &mut terminal,
        &mut runtime,
        input_rx,
        panel_rx,
        config_rx,
        cfg_arg.as_deref(),
    )
    .await;

    shutdown.store(true, Ordering::Relaxed);
    let _ = input_thread.join();

    terminal.show_cursor()?;
    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;

    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    runtime: &mut PanelRuntime,
    mut input_rx: UnboundedReceiver<Event>,
    mut panel_rx: UnboundedReceiver<PanelEvent>,
    mut config_rx: UnboundedReceiver<()>,
    cfg_arg: Option<&str>,
) -> Result<()> {
    runtime.boot();
    let mut focus = Focus::Pipeline;

    loop {
        let url = runtime.client().base_url().to_string();
        terminal.draw(|f| draw(f, runtime.controller(), focus, &url))?;

        tokio::select! {
            Some(input) = input_rx.recv() => {
                let Event::Key(key) = input else { continue };
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match map_key(key, &mut focus, runtime.controller()) {
                    KeyAction::Quit => break,
                    KeyAction::Panel(event) => runtime.dispatch(event),
                    KeyAction::Ignore => {}
                }
            }
            Some(event) = panel_rx.recv() => runtime.dispatch(event),
            Some(()) = config_rx.recv() => reload_config(runtime, cfg_arg),
            else => break,
        }
    }

    info!("control panel closed");
    Ok(())
}

fn reload_config(runtime: &mut PanelRuntime, cfg_arg: Option<&str>) {
    let config = match PanelConfig::load_with_path(cfg_arg) {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring config change: {:#}", e);
            return;
        }
    };

    runtime.set_poll_interval(config.poll_interval());
    match config.labels() {
        Ok(labels) => runtime.set_labels(labels),
        Err(e) => warn!("Keeping current labels: {:#}", e),
    }

    let current = runtime.client().base_url().as_str().trim_end_matches('/').to_string();
    if current != config.appliance_url {
        info!(new_url = %config.appliance_url, "appliance_url changed, restart the panel to apply it");
    }
}

fn draw(f: &mut Frame, panel: &PanelController, focus: Focus, url: &str) {
    let settings_height = if panel.settings_visible() { 8 } else { 0 };
    let error_height = if panel.error().is_some() { 3 } else { 0 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),                // Header
            Constraint::Length(3),                // Start/stop button
            Constraint::Length(3),                // Bitrate, adjustable while live
            Constraint::Length(settings_height),  // Settings
            Constraint::Length(error_height),     // Error banner
            Constraint::Min(6),                   // Modems + temperatures
            Constraint::Length(3),                // Footer
        ])
        .split(f.size());

    let state = match panel.button() {
        ButtonState::Idle => "idle",
        ButtonState::Starting => "starting",
        ButtonState::Live => "LIVE",
    };
    let header = Paragraph::new(format!("Appliance: {} | Stream: {}", url, state))
        .block(Block::default().borders(Borders::ALL).title("belapanel"));
    f.render_widget(header, chunks[0]);

    let button_style = if !panel.button_enabled() {
        Style::default().fg(Color::Gray).add_modifier(Modifier::DIM)
    } else if panel.button() == ButtonState::Live {
        Style::default().fg(Color::White).bg(Color::Red)
    } else {
        Style::default().fg(Color::Black).bg(Color::Green)
    };
    let button = Paragraph::new(Line::from(Span::styled(format!("  {}  ", panel.button_label()), button_style)))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(button, chunks[1]);

    let bitrate_marker = match focus {
        Focus::BitrateLow => "  [min]",
        Focus::BitrateHigh => "  [max]",
        _ => "",
    };
    let bitrate_style = if is_bitrate(focus) {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let bitrate = Paragraph::new(Line::from(Span::styled(
        format!("{}{}", panel.bitrate_label(), bitrate_marker),
        bitrate_style,
    )))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(bitrate, chunks[2]);

    if panel.settings_visible() {
        draw_settings(f, chunks[3], panel, focus);
    }

    if let Some(message) = panel.error() {
        let banner = Paragraph::new(message)
            .style(Style::default().fg(Color::Red))
            .block(Block::default().borders(Borders::ALL).title("Error (Esc to dismiss)"));
        f.render_widget(banner, chunks[4]);
    }

    let tables = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[5]);

    let modem_rows: Vec<Row> = panel
        .modem_rows()
        .iter()
        .map(|m| Row::new(vec![m.index.to_string(), m.ip.clone(), format!("{} Kbps", m.kbps)]))
        .collect();
    let modems = Table::new(
        modem_rows,
        [Constraint::Length(4), Constraint::Min(15), Constraint::Length(14)],
    )
    .header(Row::new(vec!["#", "IP", "Throughput"]).style(Style::default().add_modifier(Modifier::BOLD)))
    .block(Block::default().borders(Borders::ALL).title("Modems"));
    f.render_widget(modems, tables[0]);

    let temp_rows: Vec<Row> = panel
        .temp_rows()
        .iter()
        .map(|t| Row::new(vec![t.index.to_string(), t.name.clone(), format!("{} °C", t.celsius)]))
        .collect();
    let temps = Table::new(
        temp_rows,
        [Constraint::Length(4), Constraint::Min(10), Constraint::Length(8)],
    )
    .header(Row::new(vec!["#", "Sensor", "Temp"]).style(Style::default().add_modifier(Modifier::BOLD)))
    .block(Block::default().borders(Borders::ALL).title("Temperatures"));
    f.render_widget(temps, tables[1]);

    let footer = Paragraph::new(
        "Enter start/stop | Tab focus | ←/→ adjust | F1 test F2 update F3 rollback F4 reboot F5 power off | Esc dismiss | q quit",
    )
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, chunks[6]);

    if let Some(overlay) = panel.overlay() {
        let area = centered_rect(60, 30, f.size());
        f.render_widget(Clear, area);
        let dialog = Paragraph::new(overlay.text.as_str())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("{} (Esc to close)", overlay.title)),
            );
        f.render_widget(dialog, area);
    }
}

fn draw_settings(f: &mut Frame, area: Rect, panel: &PanelController, focus: Focus) {
    let pipeline = panel
        .selected_pipeline_option()
        .map(|p| p.name.clone())
        .unwrap_or_else(|| "(none)".to_string());

    let entries = [
        (Focus::Pipeline, format!("Pipeline: < {} >", pipeline)),
        (Focus::Delay, panel.delay_label()),
        (Focus::SrtLatency, panel.srt_latency_label()),
        (Focus::SrtStreamId, format!("SRT stream ID: {}", panel.field(TextField::SrtStreamId))),
        (Focus::SrtlaAddr, format!("SRTLA address: {}", panel.field(TextField::SrtlaAddr))),
        (Focus::SrtlaPort, format!("SRTLA port: {}", panel.field(TextField::SrtlaPort))),
    ];

    let highlight = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let lines: Vec<Line> = entries
        .into_iter()
        .map(|(owner, text)| {
            if owner == focus {
                Line::from(Span::styled(format!("> {}", text), highlight))
            } else {
                Line::from(format!("  {}", text))
            }
        })
        .collect();

    let settings = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Settings"));
    f.render_widget(settings, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Labels;
    use crate::types::{PipelineOption, StatusSnapshot};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn panel() -> PanelController {
        PanelController::new(Labels::default())
    }

    #[test]
    fn test_enter_toggles_stream() {
        let mut focus = Focus::Pipeline;
        assert_eq!(
            map_key(key(KeyCode::Enter), &mut focus, &panel()),
            KeyAction::Panel(PanelEvent::StartStopPressed)
        );
    }

    #[test]
    fn test_arrow_drags_bitrate_handle() {
        let mut focus = Focus::BitrateHigh;
        assert_eq!(
            map_key(key(KeyCode::Right), &mut focus, &panel()),
            KeyAction::Panel(PanelEvent::BitrateDragged(500, 5100))
        );
        // low handle already at the bottom of the range
        let mut focus = Focus::BitrateLow;
        assert_eq!(map_key(key(KeyCode::Left), &mut focus, &panel()), KeyAction::Ignore);
    }

    #[test]
    fn test_function_keys_send_commands() {
        let mut focus = Focus::Pipeline;
        assert_eq!(
            map_key(key(KeyCode::F(2)), &mut focus, &panel()),
            KeyAction::Panel(PanelEvent::CommandRequested("update".to_string()))
        );
        assert_eq!(
            map_key(key(KeyCode::F(5)), &mut focus, &panel()),
            KeyAction::Panel(PanelEvent::CommandRequested("mm".to_string()))
        );
    }

    #[test]
    fn test_typing_into_text_field() {
        let mut focus = Focus::SrtlaAddr;
        assert_eq!(
            map_key(key(KeyCode::Char('q')), &mut focus, &panel()),
            KeyAction::Panel(PanelEvent::FieldEdited(TextField::SrtlaAddr, "q".to_string()))
        );
        assert_eq!(map_key(key(KeyCode::Backspace), &mut focus, &panel()), KeyAction::Ignore);
    }

    #[test]
    fn test_quit_keys() {
        let mut focus = Focus::Delay;
        assert_eq!(map_key(key(KeyCode::Char('q')), &mut focus, &panel()), KeyAction::Quit);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let mut focus = Focus::SrtStreamId;
        assert_eq!(map_key(ctrl_c, &mut focus, &panel()), KeyAction::Quit);
    }

    #[test]
    fn test_settings_locked_while_live() {
        let mut live = panel();
        live.handle(PanelEvent::StatusReceived {
            seq: 1,
            snapshot: StatusSnapshot { active: Some(true), modems: None, temps: None },
        });
        let mut focus = Focus::Delay;
        assert_eq!(map_key(key(KeyCode::Right), &mut focus, &live), KeyAction::Ignore);
        let mut focus = Focus::SrtlaAddr;
        assert_eq!(map_key(key(KeyCode::Char('x')), &mut focus, &live), KeyAction::Ignore);
    }

    #[test]
    fn test_bitrate_adjustable_while_live() {
        let mut live = panel();
        live.handle(PanelEvent::StatusReceived {
            seq: 1,
            snapshot: StatusSnapshot { active: Some(true), modems: None, temps: None },
        });
        let mut focus = Focus::BitrateHigh;
        assert_eq!(
            map_key(key(KeyCode::Right), &mut focus, &live),
            KeyAction::Panel(PanelEvent::BitrateDragged(500, 5100))
        );
        let mut focus = Focus::BitrateLow;
        assert_eq!(
            map_key(key(KeyCode::Right), &mut focus, &live),
            KeyAction::Panel(PanelEvent::BitrateDragged(600, 5000))
        );
    }

    #[test]
    fn test_pipeline_cycles() {
        let mut controller = panel();
        controller.handle(PanelEvent::PipelinesLoaded(vec![
            PipelineOption { id: "a".to_string(), name: "A".to_string(), selected: false },
            PipelineOption { id: "b".to_string(), name: "B".to_string(), selected: false },
        ]));
        let mut focus = Focus::Pipeline;
        assert_eq!(
            map_key(key(KeyCode::Left), &mut focus, &controller),
            KeyAction::Panel(PanelEvent::PipelineSelected(1))
        );
    }

    #[test]
    fn test_tab_wraps_focus() {
        let mut focus = Focus::SrtlaPort;
        map_key(key(KeyCode::Tab), &mut focus, &panel());
        assert_eq!(focus, Focus::Pipeline);
        map_key(key(KeyCode::BackTab), &mut focus, &panel());
        assert_eq!(focus, Focus::SrtlaPort);
    }
}
