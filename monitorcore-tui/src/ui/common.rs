//! Header bar, status bar, and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::App;

/// Render the header bar: connection state, source and update count.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let (icon_style, state) = if app.load_error.is_some() {
        (Style::default().fg(app.theme.critical), "stopped")
    } else if app.data.is_some() {
        (Style::default().fg(app.theme.healthy), "live")
    } else {
        (Style::default().fg(app.theme.warning), "waiting")
    };

    let line = Line::from(vec![
        Span::styled(" ● ", icon_style),
        Span::styled("MONITORCORE ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(state, icon_style),
        Span::raw(" │ "),
        Span::raw(app.source_description().to_string()),
        Span::raw(format!(" │ {} updates", app.updates)),
    ]);

    frame.render_widget(Paragraph::new(line), area);
}

/// Render the status bar at the bottom.
///
/// A temporary status message wins, then a source error, then the age of
/// the last update with the key hints.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    const CONTROLS: &str = "s:sort t:theme ?:help q:quit";

    let (text, style) = if let Some(err) = &app.load_error {
        (
            format!(" Error: {} | {}", err, CONTROLS),
            Style::default().fg(app.theme.critical),
        )
    } else if let Some(updated) = app.last_updated {
        (
            format!(" Updated {:.1}s ago | {}", updated.elapsed().as_secs_f64(), CONTROLS),
            Style::default().add_modifier(Modifier::DIM),
        )
    } else {
        (
            format!(" Waiting for the producer... | {}", CONTROLS),
            Style::default().add_modifier(Modifier::DIM),
        )
    };

    frame.render_widget(Paragraph::new(text).style(style), area);
}

/// Render the help overlay with keyboard shortcuts.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from("  s         Cycle process sort"),
        Line::from("  t         Toggle light/dark theme"),
        Line::from("  ?         Toggle this help"),
        Line::from("  q / Esc   Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    let help_width = 40u16.min(area.width.saturating_sub(4));
    let help_height = 10u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
