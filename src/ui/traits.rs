use crate::core::resources::SlotKey;
use crate::core::session::Mode;
use crate::ui::notify::NotifyLevel;
use crate::workers::app::{App, View};
use crossterm::event::KeyCode;
use ratatui::{layout::Rect, Frame};
use std::path::PathBuf;

/// Core trait for UI components that can be rendered
pub trait Component {
    fn render(&mut self, f: &mut Frame, app: &App, area: Rect);
}

/// Trait for components that handle keyboard input.
///
/// Returning `None` means the key was not consumed and global bindings
/// (view switching, quit) may act on it.
pub trait Handler {
    fn handle_key(&mut self, app: &mut App, key: KeyCode) -> Option<Action>;
}

/// Actions that can be returned from handlers; the executer runs the
/// async side effects.
#[derive(Debug, Clone)]
pub enum Action {
    SwitchView(View),
    Notify(NotifyLevel, String),
    /// Read a file from disk into a resource slot.
    LoadResource { slot: SlotKey, path: PathBuf },
    /// Validate and dispatch the mode's request to the gateway.
    Submit(Mode),
    /// Render the original-vs-watermarked difference map.
    RenderDiff,
    /// Run the attack simulator on the embed result and hand the export
    /// to Extract as the suspect image.
    ExportAttack,
    /// Download the watermarked result to the output directory.
    Download,
    Quit,
    /// Key consumed, nothing further to execute.
    None,
}
