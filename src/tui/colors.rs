//! Color constants for the terminal user interface.

use ratatui::style::Color;

// These support branded views of the UI,
// one accent per board.

/// Accent for the task board.
pub const GOLD: Color = Color::Rgb(255, 215, 0);
/// Accent for the risk board.
pub const DARK_RED: Color = Color::Rgb(114, 0, 0);
/// Accent for the suggestion review modal.
pub const DARK_GREEN: Color = Color::Rgb(0, 80, 0);
