//! Central UI driver: owns the terminal, the panels and the event loop,
//! and runs every action the panels emit. Remote calls and client-side
//! rendering jobs are spawned onto the runtime and report back through
//! the `AppEvent` channel, tagged with a ticket where staleness matters.

use crate::core::attack::{export_attacked, AttackParameters};
use crate::core::config::{
    ARTIFACT_FILE_NAME, DIFF_FILE_NAME, DOWNLOAD_FILE_NAME, HEALTH_POLL_INTERVAL, UI_TICK,
};
use crate::core::diff::render_difference;
use crate::core::gateway::{EmbedResult, ExtractResult, Gateway, GatewayError, VerifyResult};
use crate::core::raster;
use crate::core::resources::{ImageResource, ResourceStore, SlotKey};
use crate::core::session::{Mode, Session, Ticket};
use crate::ui::panels::{
    embed::EmbedPanel, extract::ExtractPanel, logs::LogsPanel, verify::VerifyPanel,
};
use crate::ui::traits::{Action, Component, Handler};
use crate::utils::data_dir;
use crate::utils::log_buffer::LogBuffer;
use crate::utils::sos::SignalOfStop;
use crate::workers::app::{App, DiffReport, View};
use crate::workers::args::Args;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::{Frame, Terminal};
use std::io::stdout;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Completions flowing back into the UI loop from spawned work.
pub enum AppEvent {
    Health(bool),
    EmbedDone(Ticket, Result<EmbedResult, GatewayError>),
    ExtractDone(Ticket, Result<ExtractResult, GatewayError>),
    VerifyDone(Ticket, Result<VerifyResult, GatewayError>),
    DiffReady(Result<DiffReport, String>),
    AttackReady(Result<ImageResource, String>),
    DownloadDone(Result<PathBuf, String>),
}

pub struct UIExecuter {
    app: App,
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
    gateway: Gateway,
    log_buffer: LogBuffer,
    event_tx: mpsc::UnboundedSender<AppEvent>,

    embed_panel: EmbedPanel,
    extract_panel: ExtractPanel,
    verify_panel: VerifyPanel,
    logs_panel: LogsPanel,
}

pub async fn run(args: Args, sos: SignalOfStop, log_buffer: LogBuffer) -> anyhow::Result<()> {
    let gateway = Gateway::new(args.api_url())
        .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?;

    let resources = ResourceStore::new(data_dir::get().join("previews"))?;
    let session = Session::new(resources);
    let app = App::new(session, args.output_dir());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AppEvent>();

    // Health poll runs for the whole app lifetime and only feeds the
    // header indicator.
    {
        let gateway = gateway.clone();
        let tx = event_tx.clone();
        let sos = sos.clone();
        tokio::spawn(async move {
            loop {
                let online = gateway.health().await;
                if tx.send(AppEvent::Health(online)).is_err() {
                    break;
                }
                tokio::select! {
                    _ = tokio::time::sleep(HEALTH_POLL_INTERVAL) => {}
                    _ = sos.wait() => break,
                }
            }
        });
    }

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Drain any queued events
    while event::poll(std::time::Duration::from_millis(0))? {
        let _ = event::read()?;
    }

    let mut executer = UIExecuter::new(app, terminal, gateway, log_buffer, event_tx);
    let result = executer.run_event_loop(&mut event_rx, &sos).await;

    disable_raw_mode()?;
    execute!(executer.terminal.backend_mut(), LeaveAlternateScreen)?;
    executer.terminal.show_cursor()?;

    // The store revokes the remaining previews on drop; the counts must
    // agree here or a preview leaked mid-session.
    let store = executer.app.session.resources();
    if let Ok(previews) = store.live_previews() {
        tracing::debug!(slots = store.occupied_slots(), previews, "ui teardown");
    }

    if result? {
        sos.cancel();
    }

    Ok(())
}

impl UIExecuter {
    fn new(
        app: App,
        terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
        gateway: Gateway,
        log_buffer: LogBuffer,
        event_tx: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            app,
            terminal,
            gateway,
            log_buffer,
            event_tx,
            embed_panel: EmbedPanel::new(),
            extract_panel: ExtractPanel::new(),
            verify_panel: VerifyPanel::new(),
            logs_panel: LogsPanel::new(),
        }
    }

    /// Returns `true` when the user asked to quit.
    async fn run_event_loop(
        &mut self,
        event_rx: &mut mpsc::UnboundedReceiver<AppEvent>,
        sos: &SignalOfStop,
    ) -> anyhow::Result<bool> {
        loop {
            self.render_frame()?;

            if event::poll(UI_TICK)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key(key.code) {
                        return Ok(true);
                    }
                }
            }

            while let Ok(ev) = event_rx.try_recv() {
                self.handle_app_event(ev);
            }

            if sos.cancelled() {
                return Ok(false);
            }
        }
    }

    /// Panel first; a key the panel does not consume falls through to the
    /// global bindings. Returns `true` on quit.
    fn handle_key(&mut self, key: KeyCode) -> bool {
        let action = match self.app.view {
            View::Embed => self.embed_panel.handle_key(&mut self.app, key),
            View::Extract => self.extract_panel.handle_key(&mut self.app, key),
            View::Verify => self.verify_panel.handle_key(&mut self.app, key),
            View::Logs => self.logs_panel.handle_key(&mut self.app, key),
        };

        let action = match action {
            Some(action) => action,
            None => match key {
                KeyCode::Char('1') => Action::SwitchView(View::Embed),
                KeyCode::Char('2') => Action::SwitchView(View::Extract),
                KeyCode::Char('3') => Action::SwitchView(View::Verify),
                KeyCode::Char('4') => Action::SwitchView(View::Logs),
                KeyCode::Char('q') => Action::Quit,
                _ => Action::None,
            },
        };

        self.execute_action(action)
    }

    fn execute_action(&mut self, action: Action) -> bool {
        match action {
            Action::SwitchView(view) => {
                self.app.set_view(view);
            }
            Action::Notify(level, message) => {
                self.app.notify.notify(level, message);
            }
            Action::LoadResource { slot, path } => self.load_resource(slot, &path),
            Action::Submit(mode) => self.submit(mode),
            Action::RenderDiff => self.render_diff(),
            Action::ExportAttack => self.export_attack(),
            Action::Download => self.download(),
            Action::Quit => return true,
            Action::None => {}
        }
        false
    }

    fn load_resource(&mut self, slot: SlotKey, path: &std::path::Path) {
        let resource = match ImageResource::from_file(path) {
            Ok(resource) => resource,
            Err(e) => {
                warn!(slot = slot.label(), "failed to load image: {e}");
                self.app.notify.error(format!("Cannot load image: {e}"));
                return;
            }
        };
        let name = resource.name().to_string();
        let size = resource.len();
        match self.app.session.set_resource(slot, resource) {
            Ok(()) => {
                info!(slot = slot.label(), name = %name, size, "image loaded");
                if slot == SlotKey::EmbedInput {
                    self.app.reset_result_views();
                }
                self.app
                    .notify
                    .success(format!("Loaded {} into {}", name, slot.label()));
            }
            Err(e) => {
                self.app.notify.error(format!("Cannot store image: {e}"));
            }
        }
    }

    fn submit(&mut self, mode: Mode) {
        let ticket = match self.app.session.begin_submit(mode) {
            Ok(ticket) => ticket,
            Err(e) => {
                self.app.notify.warning(e.to_string());
                return;
            }
        };

        self.app
            .notify
            .info(format!("{} request submitted", ticket.mode().label()));

        let gateway = self.gateway.clone();
        let tx = self.event_tx.clone();
        let session = &self.app.session;

        match mode {
            Mode::Embed => {
                // begin_submit validated presence of the input.
                let Some(image) = session.resource(SlotKey::EmbedInput).cloned() else {
                    self.fail_flight(ticket, "input image disappeared");
                    return;
                };
                let text = session.embed_form.payload_text.clone();
                let alpha = session.embed_form.strength;
                tokio::spawn(async move {
                    let outcome = gateway.embed(&image, &text, alpha).await;
                    let _ = tx.send(AppEvent::EmbedDone(ticket, outcome));
                });
            }
            Mode::ExtractWithOriginal => {
                let Some(original) = session.resource(SlotKey::ExtractOriginal).cloned() else {
                    self.fail_flight(ticket, "original image disappeared");
                    return;
                };
                let Some(suspect) = session.resource(SlotKey::ExtractSuspect).cloned() else {
                    self.fail_flight(ticket, "suspect image disappeared");
                    return;
                };
                tokio::spawn(async move {
                    let outcome = gateway.extract(&original, &suspect).await;
                    let _ = tx.send(AppEvent::ExtractDone(ticket, outcome));
                });
            }
            Mode::BlindVerify => {
                let Some(suspect) = session.resource(SlotKey::VerifyInput).cloned() else {
                    self.fail_flight(ticket, "suspect image disappeared");
                    return;
                };
                tokio::spawn(async move {
                    let outcome = gateway.verify(&suspect).await;
                    let _ = tx.send(AppEvent::VerifyDone(ticket, outcome));
                });
            }
        }
    }

    fn fail_flight(&mut self, ticket: Ticket, reason: &str) {
        let err = GatewayError::Transport(reason.to_string());
        match ticket.mode() {
            Mode::Embed => self.app.session.complete_embed(ticket, Err(err)),
            Mode::ExtractWithOriginal => self.app.session.complete_extract(ticket, Err(err)),
            Mode::BlindVerify => self.app.session.complete_verify(ticket, Err(err)),
        };
        self.app.notify.error(reason.to_string());
    }

    /// Download the watermarked artifact next to a cached copy of the
    /// input preview and render their pixel difference.
    fn render_diff(&mut self) {
        let url = match self.app.session.embed_result() {
            Some(result) => result.image_url.clone(),
            None => return,
        };
        let Some(preview) = self
            .app
            .session
            .preview_path(SlotKey::EmbedInput)
            .map(|p| p.to_path_buf())
        else {
            self.app
                .notify
                .warning("Original input is gone; reload it to render a diff".to_string());
            return;
        };

        self.app.diff_in_flight = true;
        let gateway = self.gateway.clone();
        let tx = self.event_tx.clone();
        let artifact_path = data_dir::get().join(ARTIFACT_FILE_NAME);
        let diff_path = data_dir::get().join(DIFF_FILE_NAME);

        tokio::spawn(async move {
            let outcome = diff_job(gateway, url, preview, artifact_path, diff_path).await;
            let _ = tx.send(AppEvent::DiffReady(outcome.map_err(|e| e.to_string())));
        });
    }

    fn export_attack(&mut self) {
        let url = match self.app.session.embed_result() {
            Some(result) => result.image_url.clone(),
            None => return,
        };
        let params = self.app.session.attack;

        self.app.attack_in_flight = true;
        let gateway = self.gateway.clone();
        let tx = self.event_tx.clone();

        tokio::spawn(async move {
            let outcome = attack_job(gateway, url, params).await;
            let _ = tx.send(AppEvent::AttackReady(outcome.map_err(|e| e.to_string())));
        });
    }

    fn download(&mut self) {
        let url = match self.app.session.embed_result() {
            Some(result) => result.image_url.clone(),
            None => return,
        };
        let target = self.app.output_dir.join(DOWNLOAD_FILE_NAME);

        self.app.download_in_flight = true;
        let gateway = self.gateway.clone();
        let tx = self.event_tx.clone();

        tokio::spawn(async move {
            let outcome = async {
                let bytes = gateway
                    .fetch_artifact(&url)
                    .await
                    .map_err(|e| e.to_string())?;
                tokio::fs::write(&target, &bytes)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(target)
            }
            .await;
            let _ = tx.send(AppEvent::DownloadDone(outcome));
        });
    }

    fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Health(online) => {
                if online != self.app.online {
                    if online {
                        info!("watermarking service is reachable");
                    } else {
                        warn!("watermarking service is unreachable");
                    }
                }
                self.app.online = online;
            }
            AppEvent::EmbedDone(ticket, outcome) => {
                if self.app.session.complete_embed(ticket, outcome) {
                    match self.app.session.last_error(Mode::Embed) {
                        None => {
                            self.app.reset_result_views();
                            self.app.notify.success("Watermark embedded".to_string());
                        }
                        Some(err) => {
                            let err = err.to_string();
                            self.app.notify.error(err);
                        }
                    }
                }
            }
            AppEvent::ExtractDone(ticket, outcome) => {
                if self.app.session.complete_extract(ticket, outcome) {
                    match self.app.session.last_error(Mode::ExtractWithOriginal) {
                        None => self.app.notify.success("Extraction finished".to_string()),
                        Some(err) => {
                            let err = err.to_string();
                            self.app.notify.error(err);
                        }
                    }
                }
            }
            AppEvent::VerifyDone(ticket, outcome) => {
                if self.app.session.complete_verify(ticket, outcome) {
                    match self.app.session.last_error(Mode::BlindVerify) {
                        None => self.app.notify.success("Verification finished".to_string()),
                        Some(err) => {
                            let err = err.to_string();
                            self.app.notify.error(err);
                        }
                    }
                }
            }
            AppEvent::DiffReady(outcome) => {
                self.app.diff_in_flight = false;
                match outcome {
                    Ok(report) => {
                        info!(
                            changed = report.summary.changed_pixels,
                            max_delta = report.summary.max_delta,
                            "diff map rendered"
                        );
                        self.app.diff_report = Some(report);
                        self.app.notify.success("Diff map rendered".to_string());
                    }
                    Err(e) => {
                        error!("diff render failed: {e}");
                        self.app.notify.error(format!("Diff render failed: {e}"));
                    }
                }
            }
            AppEvent::AttackReady(outcome) => {
                self.app.attack_in_flight = false;
                match outcome {
                    Ok(resource) => match self.app.session.accept_attacked(resource) {
                        Ok(()) => {
                            self.app.follow_session_mode();
                            self.app.notify.success(
                                "Attacked image loaded as extraction suspect".to_string(),
                            );
                        }
                        Err(e) => {
                            self.app.notify.error(format!("Cannot store attacked image: {e}"));
                        }
                    },
                    Err(e) => {
                        error!("attack export failed: {e}");
                        self.app.notify.error(format!("Attack failed: {e}"));
                    }
                }
            }
            AppEvent::DownloadDone(outcome) => {
                self.app.download_in_flight = false;
                match outcome {
                    Ok(path) => {
                        info!(path = %path.display(), "artifact downloaded");
                        self.app
                            .notify
                            .success(format!("Saved to {}", path.display()));
                    }
                    Err(e) => {
                        self.app.notify.error(format!("Download failed: {e}"));
                    }
                }
            }
        }
    }

    // ── Rendering ───────────────────────────────────────────────────────────

    fn render_frame(&mut self) -> std::io::Result<()> {
        let app = &self.app;
        let log_buffer = &self.log_buffer;
        let embed_panel = &mut self.embed_panel;
        let extract_panel = &mut self.extract_panel;
        let verify_panel = &mut self.verify_panel;
        let logs_panel = &mut self.logs_panel;

        self.terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(1),
                    Constraint::Min(1),
                    Constraint::Length(2),
                ])
                .split(f.area());

            Self::render_tabs(f, app, chunks[0]);

            match app.view {
                View::Embed => embed_panel.render(f, app, chunks[1]),
                View::Extract => extract_panel.render(f, app, chunks[1]),
                View::Verify => verify_panel.render(f, app, chunks[1]),
                View::Logs => logs_panel.render_with_buffer(f, app, log_buffer, chunks[1]),
            }

            Self::render_status_bar(f, app, chunks[2]);
        })?;

        Ok(())
    }

    fn render_tabs(f: &mut Frame, app: &App, area: Rect) {
        let mut spans = Vec::new();
        for (i, view) in View::ALL.iter().enumerate() {
            let style = if *view == app.view {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            spans.push(Span::styled(format!(" {}:{} ", i + 1, view.label()), style));
        }
        spans.push(Span::raw("  "));
        if app.online {
            spans.push(Span::styled(
                "● System Online",
                Style::default().fg(Color::Green),
            ));
        } else {
            spans.push(Span::styled(
                "● Connecting...",
                Style::default().fg(Color::Yellow),
            ));
        }
        f.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1)])
            .split(area);

        let help = match app.view {
            View::Embed => {
                "Tab: next field | Enter: load/submit | d: download | v: cycle view | [ ] - +: attack | a: export | 1-4: tabs | q: quit"
            }
            View::Extract => "Tab: next field | Enter: load/submit | 1-4: tabs | q: quit",
            View::Verify => "Tab: next field | Enter: load/submit | 1-4: tabs | q: quit",
            View::Logs => "Up/Down: scroll | PgUp/PgDn: page | Home: top | Esc: back | q: quit",
        };
        let help_line = if let Some(notif) = app.notify.current() {
            Paragraph::new(format!(" {} {}", notif.level.icon(), notif.message))
                .style(Style::default().fg(notif.level.color()))
        } else {
            Paragraph::new(help).style(Style::default().fg(Color::DarkGray))
        };
        f.render_widget(help_line, chunks[0]);

        let mut jobs = Vec::new();
        for mode in Mode::ALL {
            if app.session.is_busy(mode) {
                jobs.push(mode.short());
            }
        }
        if app.diff_in_flight {
            jobs.push("diff");
        }
        if app.attack_in_flight {
            jobs.push("attack");
        }
        if app.download_in_flight {
            jobs.push("download");
        }
        let status = if jobs.is_empty() {
            Span::styled(" idle", Style::default().fg(Color::DarkGray))
        } else {
            Span::styled(
                format!(" busy: {}", jobs.join(", ")),
                Style::default().fg(Color::Yellow),
            )
        };
        f.render_widget(
            Paragraph::new(Line::from(status)).style(Style::default().bg(Color::Black)),
            chunks[1],
        );
    }
}

/// Fetch the watermarked artifact, cache it on disk and render the
/// difference against the cached input preview.
async fn diff_job(
    gateway: Gateway,
    url: String,
    preview: PathBuf,
    artifact_path: PathBuf,
    diff_path: PathBuf,
) -> anyhow::Result<DiffReport> {
    let bytes = gateway
        .fetch_artifact(&url)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    tokio::fs::write(&artifact_path, &bytes).await?;

    let (map, summary) = render_difference(&preview, &artifact_path).await?;
    let png = raster::encode_png(&map)?;
    tokio::fs::write(&diff_path, &png).await?;

    Ok(DiffReport {
        path: diff_path,
        summary,
    })
}

/// Fetch the watermarked artifact and run the geometric attack on it.
async fn attack_job(
    gateway: Gateway,
    url: String,
    params: AttackParameters,
) -> anyhow::Result<ImageResource> {
    let bytes = gateway
        .fetch_artifact(&url)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let resource = tokio::task::spawn_blocking(move || {
        let src = raster::decode_bytes(&bytes)?;
        export_attacked(&src, params)
    })
    .await??;
    Ok(resource)
}
