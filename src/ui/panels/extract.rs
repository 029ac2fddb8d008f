//! Extract panel: load the original and the suspect image side by side
//! and ask the service to recover the watermark with full alignment.

use crate::core::gateway::AlignmentStatus;
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
    Original,
    Suspect,
    Actions,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Original => Focus::Suspect,
            Focus::Suspect => Focus::Actions,
            Focus::Actions => Focus::Original,
        }
    }

    fn prev(self) -> Self {
        match self {
            Focus::Original => Focus::Actions,
            Focus::Suspect => Focus::Original,
            Focus::Actions => Focus::Suspect,
        }
    }
}

pub struct ExtractPanel {
    focus: Focus,
    original_input: String,
    suspect_input: String,
}

impl Default for ExtractPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractPanel {
    pub fn new() -> Self {
        Self {
            focus: Focus::Original,
            original_input: String::new(),
            suspect_input: String::new(),
        }
    }

    fn border(&self, focus: Focus) -> Style {
        if self.focus == focus {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    }

    fn handle_text_key(&mut self, key: KeyCode) -> Option<Action> {
        let (input, slot) = match self.focus {
            Focus::Original => (&mut self.original_input, SlotKey::ExtractOriginal),
            Focus::Suspect => (&mut self.suspect_input, SlotKey::ExtractSuspect),
            Focus::Actions => return None,
        };
        match key {
            KeyCode::Char(c) => {
                input.push(c);
                Some(Action::None)
            }
            KeyCode::Backspace => {
                input.pop();
                Some(Action::None)
            }
            KeyCode::Enter => {
                let path = input.trim();
                if path.is_empty() {
                    Some(Action::Notify(
                        NotifyLevel::Warning,
                        "Enter an image path first".into(),
                    ))
                } else {
                    Some(Action::LoadResource {
                        slot,
                        path: PathBuf::from(path),
                    })
                }
            }
            _ => None,
        }
    }

    fn slot_line(app: &App, slot: SlotKey) -> String {
        match app.session.resource(slot) {
            Some(res) => format!(
                "{} ({})",
                truncate_name(res.name(), 24),
                format_file_size(res.len() as u64)
            ),
            None => "no image loaded".to_string(),
        }
    }

    fn render_form(&self, f: &mut Frame, app: &App, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(4),
            ])
            .split(area);

        let original_text = if self.focus == Focus::Original {
            format!("{}_", self.original_input)
        } else {
            self.original_input.clone()
        };
        let original_widget = Paragraph::new(original_text).block(
            Block::default()
                .title(format!(
                    " 1. Original — {} ",
                    Self::slot_line(app, SlotKey::ExtractOriginal)
                ))
                .borders(Borders::ALL)
                .border_style(self.border(Focus::Original)),
        );
        f.render_widget(original_widget, chunks[0]);

        let suspect_text = if self.focus == Focus::Suspect {
            format!("{}_", self.suspect_input)
        } else {
            self.suspect_input.clone()
        };
        let suspect_widget = Paragraph::new(suspect_text).block(
            Block::default()
                .title(format!(
                    " 2. Suspect — {} ",
                    Self::slot_line(app, SlotKey::ExtractSuspect)
                ))
                .borders(Borders::ALL)
                .border_style(self.border(Focus::Suspect)),
        );
        f.render_widget(suspect_widget, chunks[1]);

        let submit_line = if app.session.is_busy(Mode::ExtractWithOriginal) {
            Line::from(Span::styled(
                " Extracting... ",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ))
        } else {
            Line::from(vec![
                Span::styled(" Enter ", Style::default().fg(Color::Green)),
                Span::raw("extract watermark"),
            ])
        };
        let error_line = match app.session.last_error(Mode::ExtractWithOriginal) {
            Some(err) => Line::from(Span::styled(
                format!(" {err} "),
                Style::default().fg(Color::Red),
            )),
            None => Line::from(""),
        };
        let note_line = Line::from(Span::styled(
            " With the original available, extraction aligns geometry exactly. ",
            Style::default().fg(Color::DarkGray),
        ));
        let actions_widget = Paragraph::new(vec![submit_line, error_line, note_line])
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title(" 3. Actions ")
                    .borders(Borders::ALL)
                    .border_style(self.border(Focus::Actions)),
            );
        f.render_widget(actions_widget, chunks[2]);
    }

    fn render_result(&self, f: &mut Frame, app: &App, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        match app.session.extract_result() {
            None => lines.push(Line::from(
                "Load both images and run extraction to see what the suspect carries.",
            )),
            Some(result) => {
                let decoded = result
                    .decoded_text
                    .as_deref()
                    .unwrap_or("<no text found>");
                lines.push(Line::from(vec![
                    Span::raw("Decoded: "),
                    Span::styled(
                        format!("\"{decoded}\""),
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    ),
                ]));
                lines.push(Line::from(""));
                let alignment = match result.alignment.status {
                    AlignmentStatus::Aligned => Span::styled(
                        "Aligned",
                        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                    ),
                    AlignmentStatus::Failed => Span::styled(
                        "Alignment Failed",
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    ),
                };
                lines.push(Line::from(vec![Span::raw("Geometry: "), alignment]));
                lines.push(Line::from(format!(
                    "Confidence: {}",
                    format_percent(result.confidence)
                )));
            }
        }

        let widget = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
            Block::default()
                .title(" Extraction Result ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(widget, area);
    }
}

impl Component for ExtractPanel {
    fn render(&mut self, f: &mut Frame, app: &App, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(46), Constraint::Min(30)])
            .split(area);
        self.render_form(f, app, chunks[0]);
        self.render_result(f, app, chunks[1]);
    }
}

impl Handler for ExtractPanel {
    fn handle_key(&mut self, _app: &mut App, key: KeyCode) -> Option<Action> {
        match key {
            KeyCode::Tab | KeyCode::Down => {
                self.focus = self.focus.next();
                Some(Action::None)
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focus = self.focus.prev();
                Some(Action::None)
            }
            KeyCode::Enter if self.focus == Focus::Actions => {
                Some(Action::Submit(Mode::ExtractWithOriginal))
            }
            _ => self.handle_text_key(key),
        }
    }
}
