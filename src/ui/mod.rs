//! UI rendering module for todoquery
//!
//! This module contains all the rendering logic for the terminal user interface,
//! using the ratatui library for TUI components.

pub mod help_overlay;
pub mod page;

use ratatui::Frame;

use crate::app::App;

pub use help_overlay::render as render_help_overlay;
pub use page::render as render_page;

/// Renders the current page, with the help overlay on top when open
pub fn render(frame: &mut Frame, app: &App) {
    render_page(frame, app);
    if app.show_help {
        render_help_overlay(frame, app.page);
    }
}
