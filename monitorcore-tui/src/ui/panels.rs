//! Metric panels.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Sparkline, Table},
    Frame,
};

use crate::app::{App, ProcessSort};
use crate::data::format::{format_gb, format_mb, format_percent, format_rate, usage_bar};

/// Per-core bars shown in the CPU panel.
const MAX_CORE_BARS: usize = 8;

fn panel<'a>(app: &App, title: &'a str, color: Color) -> Block<'a> {
    Block::default()
        .title(Span::styled(
            format!(" {} ", title),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(color))
}

fn field<'a>(label: &'a str, value: String) -> Line<'a> {
    Line::from(vec![
        Span::styled(label, Style::default().add_modifier(Modifier::DIM)),
        Span::raw(value),
    ])
}

pub fn render_cpu(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel(app, "CPU", app.theme.cpu);
    let inner_width = block.inner(area).width as usize;
    let Some(data) = &app.data else {
        frame.render_widget(Paragraph::new("Waiting for data...").block(block), area);
        return;
    };
    let cpu = &data.cpu;

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Usage:     ", Style::default().add_modifier(Modifier::DIM)),
            Span::styled(format_percent(cpu.usage), app.theme.usage_style(cpu.usage)),
        ]),
        field("Cores:     ", cpu.cores.to_string()),
    ];
    if cpu.frequency > 0.0 {
        lines.push(field("Frequency: ", format!("{:.0} MHz", cpu.frequency)));
    }

    if !cpu.core_usage.is_empty() {
        lines.push(Line::from(""));
        // "Core 0 " + bar + " 100.0%"
        let bar_width = inner_width.saturating_sub(15).max(4);
        for (i, usage) in cpu.core_usage.iter().take(MAX_CORE_BARS).enumerate() {
            lines.push(Line::from(vec![
                Span::raw(format!("Core {} ", i)),
                Span::styled(usage_bar(*usage, bar_width), app.theme.usage_style(*usage)),
                Span::raw(format!(" {:>6}", format_percent(*usage))),
            ]));
        }
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

pub fn render_gpu(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel(app, "GPU", app.theme.gpu);
    let Some(data) = &app.data else {
        frame.render_widget(block, area);
        return;
    };
    let gpu = &data.gpu;

    let name = if gpu.name.is_empty() { "Unknown" } else { gpu.name.as_str() };
    let mut lines = vec![
        field("Name:        ", name.to_string()),
        Line::from(vec![
            Span::styled("Usage:       ", Style::default().add_modifier(Modifier::DIM)),
            Span::styled(format_percent(gpu.usage), app.theme.usage_style(gpu.usage)),
        ]),
    ];
    if gpu.memory_total > 0.0 {
        lines.push(field(
            "Memory:      ",
            format!("{} / {}", format_mb(gpu.memory_used), format_mb(gpu.memory_total)),
        ));
    }
    if gpu.temperature > 0.0 {
        lines.push(field("Temperature: ", format!("{:.1}°C", gpu.temperature)));
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

pub fn render_memory(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel(app, "Memory", app.theme.memory);
    let Some(data) = &app.data else {
        frame.render_widget(block, area);
        return;
    };
    let memory = &data.memory;

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [text_area, gauge_area] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(inner);

    let lines = vec![
        field("Total: ", format_mb(memory.total)),
        field("Used:  ", format_mb(memory.used)),
        field("Free:  ", format_mb(memory.free)),
    ];
    frame.render_widget(Paragraph::new(lines), text_area);

    let percent = if memory.usage_percent.is_finite() { memory.usage_percent } else { 0.0 };
    let gauge = Gauge::default()
        .gauge_style(app.theme.usage_style(percent))
        .ratio((percent / 100.0).clamp(0.0, 1.0))
        .label(format_percent(percent));
    frame.render_widget(gauge, gauge_area);
}

pub fn render_network(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel(app, "Network", app.theme.network);
    let Some(data) = &app.data else {
        frame.render_widget(block, area);
        return;
    };
    let network = &data.network;

    let lines = vec![
        field("Download:    ", format_rate(network.download_speed)),
        field("Upload:      ", format_rate(network.upload_speed)),
        field("Connections: ", network.active_connections.to_string()),
    ];
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

pub fn render_history(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel(app, "History", app.theme.border);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [cpu_label, cpu_area, mem_label, mem_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(1),
        Constraint::Min(1),
    ])
    .areas(inner);

    // Newest samples on the right edge.
    let width = inner.width as usize;
    let cpu = tail(app.history.cpu_sparkline(), width);
    let memory = tail(app.history.memory_sparkline(), width);

    frame.render_widget(
        Paragraph::new(Span::styled("CPU", Style::default().fg(app.theme.cpu))),
        cpu_label,
    );
    frame.render_widget(
        Sparkline::default()
            .data(&cpu)
            .max(100)
            .style(Style::default().fg(app.theme.cpu)),
        cpu_area,
    );
    frame.render_widget(
        Paragraph::new(Span::styled("Memory", Style::default().fg(app.theme.memory))),
        mem_label,
    );
    frame.render_widget(
        Sparkline::default()
            .data(&memory)
            .max(100)
            .style(Style::default().fg(app.theme.memory)),
        mem_area,
    );
}

fn tail(mut values: Vec<u64>, width: usize) -> Vec<u64> {
    if values.len() > width {
        values.drain(..values.len() - width);
    }
    values
}

pub fn render_disks(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel(app, "Disks", app.theme.disks);
    let disks = app.data.as_ref().map(|d| d.disks.as_slice()).unwrap_or_default();

    let header = Row::new(vec!["Drive", "Used", "Total", "Read", "Write"]).style(app.theme.header);
    let rows: Vec<Row> = disks
        .iter()
        .map(|disk| {
            let name = if disk.name.is_empty() { &disk.mount_point } else { &disk.name };
            Row::new(vec![
                Cell::from(name.clone()),
                Cell::from(format_gb(disk.used)).style(app.theme.usage_style(disk.usage_percent())),
                Cell::from(format_gb(disk.total)),
                Cell::from(format_rate(disk.read_speed)),
                Cell::from(format_rate(disk.write_speed)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Min(6),
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(11),
        Constraint::Length(11),
    ];
    frame.render_widget(Table::new(rows, widths).header(header).block(block), area);
}

pub fn render_processes(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!("Top Processes (sort: {})", app.process_sort.label());
    let block = panel(app, &title, app.theme.processes);

    let column = |label: &'static str, sort: ProcessSort| {
        if app.process_sort == sort {
            Cell::from(format!("{} ▼", label))
                .style(app.theme.header.add_modifier(Modifier::UNDERLINED))
        } else {
            Cell::from(label)
        }
    };
    let header = Row::new(vec![
        column("Name", ProcessSort::Name),
        column("PID", ProcessSort::Pid),
        column("CPU %", ProcessSort::Cpu),
        column("Memory", ProcessSort::Memory),
    ])
    .style(app.theme.header);

    let rows: Vec<Row> = app
        .top_processes()
        .into_iter()
        .map(|process| {
            let name = if process.name.is_empty() { "Unknown" } else { process.name.as_str() };
            Row::new(vec![
                Cell::from(name.to_string()),
                Cell::from(process.pid.to_string()),
                Cell::from(format!("{:.1}", process.cpu_usage)),
                Cell::from(format_mb(process.memory_usage)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Min(16),
        Constraint::Length(8),
        Constraint::Length(8),
        Constraint::Length(10),
    ];
    frame.render_widget(Table::new(rows, widths).header(header).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_keeps_newest() {
        assert_eq!(tail(vec![1, 2, 3, 4], 2), vec![3, 4]);
        assert_eq!(tail(vec![1, 2], 5), vec![1, 2]);
    }
}
