//! Embed panel: upload an image, set payload text and strength, submit,
//! inspect the result (watermarked / diff map / signal map), download it,
//! and drive the attack simulator whose export hands off to Extract.

use crate::core::config::{
    MAX_PAYLOAD_CHARS, ROTATION_MAX, ROTATION_MIN, ROTATION_STEP, SCALE_MAX, SCALE_MIN,
    SCALE_STEP, STRENGTH_MAX, STRENGTH_MIN, STRENGTH_STEP,
};
use crate::core::resources::SlotKey;
use crate::core::session::Mode;
use crate::ui::helpers::{format_file_size, truncate_name};
use crate::ui::notify::NotifyLevel;
use crate::ui::traits::{Action, Component, Handler};
use crate::workers::app::{App, ResultView};
use crossterm::event::KeyCode;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Path,
    Payload,
    Strength,
    Actions,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Path => Focus::Payload,
            Focus::Payload => Focus::Strength,
            Focus::Strength => Focus::Actions,
            Focus::Actions => Focus::Path,
        }
    }

    fn prev(self) -> Self {
        match self {
            Focus::Path => Focus::Actions,
            Focus::Payload => Focus::Path,
            Focus::Strength => Focus::Payload,
            Focus::Actions => Focus::Strength,
        }
    }
}

pub struct EmbedPanel {
    focus: Focus,
    path_input: String,
}

impl Default for EmbedPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbedPanel {
    pub fn new() -> Self {
        Self {
            focus: Focus::Path,
            path_input: String::new(),
        }
    }

    fn border(&self, focus: Focus) -> Style {
        if self.focus == focus {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    }

    fn handle_path_key(&mut self, key: KeyCode) -> Option<Action> {
        match key {
            KeyCode::Char(c) => {
                self.path_input.push(c);
                Some(Action::None)
            }
            KeyCode::Backspace => {
                self.path_input.pop();
                Some(Action::None)
            }
            KeyCode::Enter => {
                let path = self.path_input.trim();
                if path.is_empty() {
                    Some(Action::Notify(
                        NotifyLevel::Warning,
                        "Enter an image path first".into(),
                    ))
                } else {
                    Some(Action::LoadResource {
                        slot: SlotKey::EmbedInput,
                        path: PathBuf::from(path),
                    })
                }
            }
            _ => None,
        }
    }

    fn handle_payload_key(&mut self, app: &mut App, key: KeyCode) -> Option<Action> {
        match key {
            KeyCode::Char(c) => {
                let form = &mut app.session.embed_form;
                if form.payload_text.chars().count() < MAX_PAYLOAD_CHARS {
                    form.payload_text.push(c);
                }
                Some(Action::None)
            }
            KeyCode::Backspace => {
                app.session.embed_form.payload_text.pop();
                Some(Action::None)
            }
            KeyCode::Enter => {
                self.focus = Focus::Strength;
                Some(Action::None)
            }
            _ => None,
        }
    }

    fn handle_strength_key(&mut self, app: &mut App, key: KeyCode) -> Option<Action> {
        let step = match key {
            KeyCode::Left => -STRENGTH_STEP,
            KeyCode::Right => STRENGTH_STEP,
            KeyCode::Enter => {
                self.focus = Focus::Actions;
                return Some(Action::None);
            }
            _ => return None,
        };
        let form = &mut app.session.embed_form;
        let next = (form.strength + step).clamp(STRENGTH_MIN, STRENGTH_MAX);
        // Keep one decimal so the display matches the wire value.
        form.strength = (next * 10.0).round() / 10.0;
        Some(Action::None)
    }

    fn handle_action_key(&mut self, app: &mut App, key: KeyCode) -> Option<Action> {
        match key {
            KeyCode::Enter | KeyCode::Char('e') => Some(Action::Submit(Mode::Embed)),
            KeyCode::Char('d') => {
                if app.session.embed_result().is_some() {
                    Some(Action::Download)
                } else {
                    Some(Action::Notify(
                        NotifyLevel::Warning,
                        "Nothing to download yet".into(),
                    ))
                }
            }
            KeyCode::Char('v') => Some(self.cycle_result_view(app)),
            KeyCode::Char('[') => {
                let r = app.session.attack.rotation_degrees - ROTATION_STEP;
                app.session.attack.rotation_degrees = r.clamp(ROTATION_MIN, ROTATION_MAX);
                Some(Action::None)
            }
            KeyCode::Char(']') => {
                let r = app.session.attack.rotation_degrees + ROTATION_STEP;
                app.session.attack.rotation_degrees = r.clamp(ROTATION_MIN, ROTATION_MAX);
                Some(Action::None)
            }
            KeyCode::Char('-') => {
                let s = app.session.attack.scale_factor - SCALE_STEP;
                app.session.attack.scale_factor =
                    ((s.clamp(SCALE_MIN, SCALE_MAX)) * 10.0).round() / 10.0;
                Some(Action::None)
            }
            KeyCode::Char('=') | KeyCode::Char('+') => {
                let s = app.session.attack.scale_factor + SCALE_STEP;
                app.session.attack.scale_factor =
                    ((s.clamp(SCALE_MIN, SCALE_MAX)) * 10.0).round() / 10.0;
                Some(Action::None)
            }
            KeyCode::Char('a') => {
                if app.session.embed_result().is_some() {
                    Some(Action::ExportAttack)
                } else {
                    Some(Action::Notify(
                        NotifyLevel::Warning,
                        "Embed a watermark before simulating an attack".into(),
                    ))
                }
            }
            _ => None,
        }
    }

    fn cycle_result_view(&self, app: &mut App) -> Action {
        let has_signal = match app.session.embed_result() {
            Some(result) => result.signal_map_url.is_some(),
            None => {
                return Action::Notify(NotifyLevel::Warning, "No result to inspect yet".into())
            }
        };
        app.result_view = match app.result_view {
            ResultView::Watermarked => ResultView::Diff,
            // The Signal Map option only exists when the service sent one.
            ResultView::Diff if has_signal => ResultView::Signal,
            ResultView::Diff => ResultView::Watermarked,
            ResultView::Signal => ResultView::Watermarked,
        };
        if app.result_view == ResultView::Diff && app.diff_report.is_none() && !app.diff_in_flight
        {
            return Action::RenderDiff;
        }
        Action::None
    }

    fn render_form(&self, f: &mut Frame, app: &App, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // image path
                Constraint::Length(3), // payload
                Constraint::Length(3), // strength
                Constraint::Min(3),    // submit / hints
            ])
            .split(area);

        let loaded = match app.session.resource(SlotKey::EmbedInput) {
            Some(res) => format!(
                "{} ({})",
                truncate_name(res.name(), 24),
                format_file_size(res.len() as u64)
            ),
            None => "no image loaded".to_string(),
        };
        let path_text = if self.focus == Focus::Path {
            format!("{}_", self.path_input)
        } else {
            self.path_input.clone()
        };
        let path_widget = Paragraph::new(path_text).block(
            Block::default()
                .title(format!(" 1. Image Path — {} ", loaded))
                .borders(Borders::ALL)
                .border_style(self.border(Focus::Path)),
        );
        f.render_widget(path_widget, chunks[0]);

        let form = &app.session.embed_form;
        let chars = form.payload_text.chars().count();
        let payload_text = if self.focus == Focus::Payload {
            format!("{}_", form.payload_text)
        } else {
            form.payload_text.clone()
        };
        let payload_widget = Paragraph::new(payload_text).block(
            Block::default()
                .title(format!(" 2. Watermark Text ({chars}/{MAX_PAYLOAD_CHARS}) "))
                .borders(Borders::ALL)
                .border_style(self.border(Focus::Payload)),
        );
        f.render_widget(payload_widget, chunks[1]);

        let ticks = ((form.strength - STRENGTH_MIN) / (STRENGTH_MAX - STRENGTH_MIN) * 20.0)
            .round() as usize;
        let bar = format!(
            "[{}{}] {:.1}",
            "#".repeat(ticks.min(20)),
            "-".repeat(20usize.saturating_sub(ticks)),
            form.strength
        );
        let strength_widget = Paragraph::new(bar).block(
            Block::default()
                .title(" 3. Strength (alpha) — invisible ←→ robust ")
                .borders(Borders::ALL)
                .border_style(self.border(Focus::Strength)),
        );
        f.render_widget(strength_widget, chunks[2]);

        let submit_line = if app.session.is_busy(Mode::Embed) {
            Line::from(Span::styled(
                " Embedding... ",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ))
        } else {
            Line::from(vec![
                Span::styled(" Enter ", Style::default().fg(Color::Green)),
                Span::raw("embed  "),
                Span::styled("d ", Style::default().fg(Color::Green)),
                Span::raw("download  "),
                Span::styled("v ", Style::default().fg(Color::Green)),
                Span::raw("cycle view  "),
                Span::styled("a ", Style::default().fg(Color::Green)),
                Span::raw("attack"),
            ])
        };
        let error_line = match app.session.last_error(Mode::Embed) {
            Some(err) => Line::from(Span::styled(
                format!(" {err} "),
                Style::default().fg(Color::Red),
            )),
            None => Line::from(""),
        };
        let actions_widget = Paragraph::new(vec![submit_line, error_line])
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title(" 4. Actions ")
                    .borders(Borders::ALL)
                    .border_style(self.border(Focus::Actions)),
            );
        f.render_widget(actions_widget, chunks[3]);
    }

    fn render_result(&self, f: &mut Frame, app: &App, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(6), Constraint::Length(6)])
            .split(area);

        let mut lines: Vec<Line> = Vec::new();
        match app.session.embed_result() {
            None => {
                match app.session.preview_path(SlotKey::EmbedInput) {
                    Some(preview) => {
                        lines.push(Line::from("Preview ready:"));
                        lines.push(Line::from(Span::styled(
                            preview.display().to_string(),
                            Style::default().fg(Color::Cyan),
                        )));
                    }
                    None => lines.push(Line::from("Upload an image to get started.")),
                }
            }
            Some(result) => {
                lines.push(Line::from(vec![
                    Span::raw("View: "),
                    Span::styled(
                        app.result_view.label(),
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    ),
                ]));
                match app.result_view {
                    ResultView::Watermarked => {
                        lines.push(Line::from(format!("Image: {}", result.image_url)));
                    }
                    ResultView::Diff => {
                        if app.diff_in_flight {
                            lines.push(Line::from(Span::styled(
                                "Rendering diff map...",
                                Style::default().fg(Color::Yellow),
                            )));
                        } else if let Some(report) = &app.diff_report {
                            lines.push(Line::from(format!(
                                "Diff map: {}",
                                report.path.display()
                            )));
                            lines.push(Line::from(format!(
                                "{}x{}, {} changed pixels, max amplified delta {}",
                                report.summary.width,
                                report.summary.height,
                                report.summary.changed_pixels,
                                report.summary.max_delta
                            )));
                        } else {
                            lines.push(Line::from("No diff rendered yet."));
                        }
                    }
                    ResultView::Signal => match &result.signal_map_url {
                        Some(url) => lines.push(Line::from(format!("Signal map: {url}"))),
                        None => lines.push(Line::from("Service sent no signal map.")),
                    },
                }
                lines.push(Line::from(""));
                lines.push(Line::from(vec![
                    Span::raw("PSNR: "),
                    Span::styled(
                        format!("{:.2} dB", result.psnr),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::raw("   SSIM: "),
                    Span::styled(
                        format!("{:.4}", result.ssim),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                ]));
                if app.download_in_flight {
                    lines.push(Line::from(Span::styled(
                        "Downloading...",
                        Style::default().fg(Color::Yellow),
                    )));
                }
            }
        }

        let result_widget = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
            Block::default()
                .title(" Result Analysis ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(result_widget, chunks[0]);

        // Attack simulator readout. Keys act from the Actions field.
        let attack = &app.session.attack;
        let status = if app.attack_in_flight {
            Span::styled("exporting...", Style::default().fg(Color::Yellow))
        } else if attack.is_identity() {
            Span::styled(
                "no distortion set; a exports an untouched copy",
                Style::default().fg(Color::DarkGray),
            )
        } else {
            Span::styled(
                "press a to use as suspect image",
                Style::default().fg(Color::DarkGray),
            )
        };
        let attack_lines = vec![
            Line::from(format!(
                "Rotation: {:+.0}°   ([ / ] adjust, range {:.0}..{:.0})",
                attack.rotation_degrees, ROTATION_MIN, ROTATION_MAX
            )),
            Line::from(format!(
                "Scale:    {:.1}x  (- / + adjust, range {:.1}..{:.1})",
                attack.scale_factor, SCALE_MIN, SCALE_MAX
            )),
            Line::from(status),
        ];
        let attack_widget = Paragraph::new(attack_lines).block(
            Block::default()
                .title(" Attack Simulator ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        );
        f.render_widget(attack_widget, chunks[1]);
    }
}

impl Component for EmbedPanel {
    fn render(&mut self, f: &mut Frame, app: &App, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(46), Constraint::Min(30)])
            .split(area);
        self.render_form(f, app, chunks[0]);
        self.render_result(f, app, chunks[1]);
    }
}

impl Handler for EmbedPanel {
    fn handle_key(&mut self, app: &mut App, key: KeyCode) -> Option<Action> {
        match key {
            KeyCode::Tab | KeyCode::Down => {
                self.focus = self.focus.next();
                Some(Action::None)
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focus = self.focus.prev();
                Some(Action::None)
            }
            _ => match self.focus {
                Focus::Path => self.handle_path_key(key),
                Focus::Payload => self.handle_payload_key(app, key),
                Focus::Strength => self.handle_strength_key(app, key),
                Focus::Actions => self.handle_action_key(app, key),
            },
        }
    }
}
