//! Verify panel: blind check of a single image, no original required.

use crate::core::resources::SlotKey;
use crate::core::session::Mode;
use crate::ui::helpers::{format_file_size, format_percent, truncate_name};
use crate::ui::notify::NotifyLevel;
use crate::ui::traits::{Action, Component, Handler};
use crate::workers::app::App;
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
    Actions,
}

pub struct VerifyPanel {
    focus: Focus,
    path_input: String,
}

impl Default for VerifyPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl VerifyPanel {
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

    fn render_form(&self, f: &mut Frame, app: &App, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(4)])
            .split(area);

        let loaded = match app.session.resource(SlotKey::VerifyInput) {
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

        let submit_line = if app.session.is_busy(Mode::BlindVerify) {
            Line::from(Span::styled(
                " Searching for watermark... ",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ))
        } else {
            Line::from(vec![
                Span::styled(" Enter ", Style::default().fg(Color::Green)),
                Span::raw("verify image"),
            ])
        };
        let error_line = match app.session.last_error(Mode::BlindVerify) {
            Some(err) => Line::from(Span::styled(
                format!(" {err} "),
                Style::default().fg(Color::Red),
            )),
            None => Line::from(""),
        };
        let note_line = Line::from(Span::styled(
            " Blind verification searches rotation and scale on its own. ",
            Style::default().fg(Color::DarkGray),
        ));
        let actions_widget = Paragraph::new(vec![submit_line, error_line, note_line])
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title(" 2. Actions ")
                    .borders(Borders::ALL)
                    .border_style(self.border(Focus::Actions)),
            );
        f.render_widget(actions_widget, chunks[1]);
    }

    fn render_result(&self, f: &mut Frame, app: &App, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        match app.session.verify_result() {
            None => lines.push(Line::from(
                "Load a suspect image and run verification to see if it carries a watermark.",
            )),
            Some(result) => {
                let verdict = if result.verified {
                    Span::styled(
                        "WATERMARK VERIFIED",
                        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                    )
                } else {
                    Span::styled(
                        "NO WATERMARK FOUND",
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    )
                };
                lines.push(Line::from(verdict));
                lines.push(Line::from(""));
                if let Some(text) = &result.watermark_text {
                    lines.push(Line::from(vec![
                        Span::raw("Payload: "),
                        Span::styled(
                            format!("\"{text}\""),
                            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                        ),
                    ]));
                }
                if let Some(confidence) = result.confidence {
                    lines.push(Line::from(format!(
                        "Confidence: {}",
                        format_percent(confidence)
                    )));
                }
                if let Some(geometry) = &result.geometry {
                    lines.push(Line::from(""));
                    lines.push(Line::from("Recovered geometry:"));
                    lines.push(Line::from(format!(
                        "  rotation {:+.1}°, scale {:.2}x",
                        geometry.rotation_degrees, geometry.scale_factor
                    )));
                    if let Some(peak) = geometry.peak_quality {
                        lines.push(Line::from(format!("  peak quality {peak:.3}")));
                    }
                }
            }
        }

        let widget = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
            Block::default()
                .title(" Verification Result ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(widget, area);
    }
}

impl Component for VerifyPanel {
    fn render(&mut self, f: &mut Frame, app: &App, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(46), Constraint::Min(30)])
            .split(area);
        self.render_form(f, app, chunks[0]);
        self.render_result(f, app, chunks[1]);
    }
}

impl Handler for VerifyPanel {
    fn handle_key(&mut self, _app: &mut App, key: KeyCode) -> Option<Action> {
        match key {
            KeyCode::Tab | KeyCode::Down | KeyCode::BackTab | KeyCode::Up => {
                self.focus = match self.focus {
                    Focus::Path => Focus::Actions,
                    Focus::Actions => Focus::Path,
                };
                Some(Action::None)
            }
            KeyCode::Enter if self.focus == Focus::Actions => {
                Some(Action::Submit(Mode::BlindVerify))
            }
            KeyCode::Char(c) if self.focus == Focus::Path => {
                self.path_input.push(c);
                Some(Action::None)
            }
            KeyCode::Backspace if self.focus == Focus::Path => {
                self.path_input.pop();
                Some(Action::None)
            }
            KeyCode::Enter if self.focus == Focus::Path => {
                let path = self.path_input.trim();
                if path.is_empty() {
                    Some(Action::Notify(
                        NotifyLevel::Warning,
                        "Enter an image path first".into(),
                    ))
                } else {
                    Some(Action::LoadResource {
                        slot: SlotKey::VerifyInput,
                        path: PathBuf::from(path),
                    })
                }
            }
            _ => None,
        }
    }
}
