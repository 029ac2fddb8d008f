//! UI-facing application state: the session plus everything the panels
//! need that is not workflow state proper (notifications, health, view
//! selection, in-flight flags for client-side rendering jobs).

use crate::core::diff::DiffSummary;
use crate::core::session::{Mode, Session};
use crate::ui::notify::NotifyManager;
use std::path::PathBuf;

/// Screens the UI can show: the three workflow modes plus Logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Embed,
    Extract,
    Verify,
    Logs,
}

impl View {
    pub const ALL: [View; 4] = [View::Embed, View::Extract, View::Verify, View::Logs];

    pub fn label(&self) -> &'static str {
        match self {
            View::Embed => "Embed Watermark",
            View::Extract => "Extract (With Original)",
            View::Verify => "Verify (Blind)",
            View::Logs => "Logs",
        }
    }

    /// The workflow mode this view drives, if any.
    pub fn session_mode(&self) -> Option<Mode> {
        match self {
            View::Embed => Some(Mode::Embed),
            View::Extract => Some(Mode::ExtractWithOriginal),
            View::Verify => Some(Mode::BlindVerify),
            View::Logs => None,
        }
    }

    pub fn for_mode(mode: Mode) -> View {
        match mode {
            Mode::Embed => View::Embed,
            Mode::ExtractWithOriginal => View::Extract,
            Mode::BlindVerify => View::Verify,
        }
    }
}

/// Which rendition of the embed result the panel describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultView {
    Watermarked,
    Diff,
    Signal,
}

impl ResultView {
    pub fn label(&self) -> &'static str {
        match self {
            ResultView::Watermarked => "Watermarked",
            ResultView::Diff => "Diff Map",
            ResultView::Signal => "Signal Map",
        }
    }
}

/// A rendered difference map on disk plus its headline numbers.
#[derive(Debug, Clone)]
pub struct DiffReport {
    pub path: PathBuf,
    pub summary: DiffSummary,
}

pub struct App {
    pub session: Session,
    pub notify: NotifyManager,
    pub online: bool,
    pub view: View,
    pub log_scroll: usize,

    pub result_view: ResultView,
    pub diff_report: Option<DiffReport>,
    pub diff_in_flight: bool,
    pub attack_in_flight: bool,
    pub download_in_flight: bool,

    pub output_dir: PathBuf,
}

impl App {
    pub fn new(session: Session, output_dir: PathBuf) -> Self {
        Self {
            session,
            notify: NotifyManager::new(),
            online: false,
            view: View::Embed,
            log_scroll: 0,
            result_view: ResultView::Watermarked,
            diff_report: None,
            diff_in_flight: false,
            attack_in_flight: false,
            download_in_flight: false,
            output_dir,
        }
    }

    /// Select a view, driving the session mode along for workflow views.
    pub fn set_view(&mut self, view: View) {
        self.view = view;
        if let Some(mode) = view.session_mode() {
            self.session.switch_mode(mode);
        }
    }

    /// Re-align the view after the session switched mode on its own
    /// (cross-mode handoff).
    pub fn follow_session_mode(&mut self) {
        self.view = View::for_mode(self.session.mode());
    }

    /// Drop result-derived artifacts that a fresh embed result replaces.
    pub fn reset_result_views(&mut self) {
        self.result_view = ResultView::Watermarked;
        self.diff_report = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resources::ResourceStore;

    fn app() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let store = ResourceStore::new(dir.path().join("previews")).unwrap();
        let session = Session::new(store);
        let output = dir.path().to_path_buf();
        (dir, App::new(session, output))
    }

    #[test]
    fn test_view_drives_session_mode() {
        let (_dir, mut app) = app();
        app.set_view(View::Verify);
        assert_eq!(app.session.mode(), Mode::BlindVerify);

        // Logs is a pure UI view; the workflow mode stays put.
        app.set_view(View::Logs);
        assert_eq!(app.session.mode(), Mode::BlindVerify);
    }

    #[test]
    fn test_follow_session_mode_after_handoff() {
        let (_dir, mut app) = app();
        let attacked =
            crate::core::resources::ImageResource::new(vec![0; 4], "image/png", "attacked.png");
        app.session.accept_attacked(attacked).unwrap();
        app.follow_session_mode();
        assert_eq!(app.view, View::Extract);
    }
}
