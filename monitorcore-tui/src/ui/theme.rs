//! Theme configuration for the TUI.
//!
//! Supports light and dark themes with automatic terminal detection.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

/// Usage at or above this percentage is shown as a warning.
const WARNING_PERCENT: f64 = 60.0;
/// Usage at or above this percentage is shown as critical.
const CRITICAL_PERCENT: f64 = 85.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Dark,
    Light,
}

/// Color and style theme for the TUI.
///
/// Use [`Theme::auto_detect()`] to pick one from the terminal background.
#[derive(Debug, Clone)]
pub struct Theme {
    pub mode: ThemeMode,
    /// Accent color for titles and active elements.
    pub highlight: Color,
    pub cpu: Color,
    pub gpu: Color,
    pub memory: Color,
    pub network: Color,
    pub disks: Color,
    pub processes: Color,
    pub healthy: Color,
    pub warning: Color,
    pub critical: Color,
    pub border: Color,
    /// Style for header rows in tables.
    pub header: Style,
    pub border_type: BorderType,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            mode: ThemeMode::Dark,
            highlight: Color::Cyan,
            cpu: Color::Cyan,
            gpu: Color::Magenta,
            memory: Color::Green,
            network: Color::Yellow,
            disks: Color::LightBlue,
            processes: Color::Blue,
            healthy: Color::Green,
            warning: Color::Yellow,
            critical: Color::Red,
            border: Color::Gray,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            border_type: BorderType::Rounded,
        }
    }

    pub fn light() -> Self {
        Self {
            mode: ThemeMode::Light,
            highlight: Color::Blue,
            cpu: Color::Blue,
            gpu: Color::Magenta,
            memory: Color::Green,
            network: Color::Rgb(160, 110, 0),
            disks: Color::DarkGray,
            processes: Color::Blue,
            healthy: Color::Green,
            warning: Color::Rgb(180, 120, 0),
            critical: Color::Red,
            border: Color::DarkGray,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// The other theme.
    pub fn toggled(&self) -> Self {
        match self.mode {
            ThemeMode::Dark => Self::light(),
            ThemeMode::Light => Self::dark(),
        }
    }

    /// Style for a usage percentage.
    pub fn usage_style(&self, percent: f64) -> Style {
        if percent >= CRITICAL_PERCENT {
            Style::default().fg(self.critical).add_modifier(Modifier::BOLD)
        } else if percent >= WARNING_PERCENT {
            Style::default().fg(self.warning)
        } else {
            Style::default().fg(self.healthy)
        }
    }
}
