//! Terminal rendering.
//!
//! ```text
//! ┌ header ─────────────────────────────────────┐
//! │ CPU                  │ GPU                  │
//! │ Memory               │ Network              │
//! │ History              │ Disks                │
//! │ Top Processes                               │
//! └ status bar ─────────────────────────────────┘
//! ```

pub mod common;
pub mod panels;
pub mod theme;

pub use theme::Theme;

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};

use crate::app::App;

/// Minimum terminal size for a usable display.
pub const MIN_WIDTH: u16 = 60;
pub const MIN_HEIGHT: u16 = 24;

/// Draw one full frame.
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = format!(
            "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
            area.width, area.height, MIN_WIDTH, MIN_HEIGHT
        );
        let paragraph = Paragraph::new(msg)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Yellow));
        let top = (area.height / 2).saturating_sub(2);
        let centered = Rect::new(area.x, area.y + top, area.width, 5.min(area.height - top));
        frame.render_widget(paragraph, centered);
        return;
    }

    let [header, top, middle, bottom, processes, status] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(cpu_panel_height(app)),
        Constraint::Length(6),
        Constraint::Length(7),
        Constraint::Min(6),
        Constraint::Length(1),
    ])
    .areas(area);

    let halves = |row: Rect| -> [Rect; 2] {
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(row)
    };

    common::render_header(frame, app, header);

    let [cpu, gpu] = halves(top);
    panels::render_cpu(frame, app, cpu);
    panels::render_gpu(frame, app, gpu);

    let [memory, network] = halves(middle);
    panels::render_memory(frame, app, memory);
    panels::render_network(frame, app, network);

    let [history, disks] = halves(bottom);
    panels::render_history(frame, app, history);
    panels::render_disks(frame, app, disks);

    panels::render_processes(frame, app, processes);
    common::render_status_bar(frame, app, status);

    if app.show_help {
        common::render_help(frame, app, area);
    }
}

/// Borders, three summary lines, and a spacer plus one line per core bar.
fn cpu_panel_height(app: &App) -> u16 {
    let cores = app
        .data
        .as_ref()
        .map(|d| d.cpu.core_usage.len().min(8))
        .unwrap_or(0) as u16;
    if cores == 0 {
        6
    } else {
        6 + 1 + cores
    }
}
