//! Application state.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

use crate::data::{History, ProcessMetrics, SystemMetrics};
use crate::source::DataSource;
use crate::ui::Theme;

/// Processes shown in the process table.
pub const TOP_PROCESSES: usize = 10;

/// How long a status message stays visible.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// Column the process table is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessSort {
    /// Order reported by the producer.
    #[default]
    Producer,
    /// Highest CPU usage first.
    Cpu,
    /// Highest memory usage first.
    Memory,
    /// Alphabetical.
    Name,
    Pid,
}

impl ProcessSort {
    pub fn next(self) -> Self {
        match self {
            ProcessSort::Producer => ProcessSort::Cpu,
            ProcessSort::Cpu => ProcessSort::Memory,
            ProcessSort::Memory => ProcessSort::Name,
            ProcessSort::Name => ProcessSort::Pid,
            ProcessSort::Pid => ProcessSort::Producer,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProcessSort::Producer => "default",
            ProcessSort::Cpu => "cpu",
            ProcessSort::Memory => "memory",
            ProcessSort::Name => "name",
            ProcessSort::Pid => "pid",
        }
    }

    fn compare(&self, a: &ProcessMetrics, b: &ProcessMetrics) -> Ordering {
        match self {
            ProcessSort::Producer => Ordering::Equal,
            ProcessSort::Cpu => b.cpu_usage.total_cmp(&a.cpu_usage),
            ProcessSort::Memory => b.memory_usage.total_cmp(&a.memory_usage),
            ProcessSort::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            ProcessSort::Pid => a.pid.cmp(&b.pid),
        }
    }
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub show_help: bool,

    source: Box<dyn DataSource>,
    pub data: Option<SystemMetrics>,
    pub last_updated: Option<Instant>,
    pub updates: u64,
    pub history: History,
    pub load_error: Option<String>,

    pub process_sort: ProcessSort,
    pub theme: Theme,

    pub status_message: Option<(String, Instant)>,
}

impl App {
    pub fn new(source: Box<dyn DataSource>, theme: Theme) -> Self {
        Self {
            running: true,
            show_help: false,
            source,
            data: None,
            last_updated: None,
            updates: 0,
            history: History::new(),
            load_error: None,
            process_sort: ProcessSort::default(),
            theme,
            status_message: None,
        }
    }

    pub fn source_description(&self) -> &str {
        self.source.description()
    }

    /// Poll the source. Returns true if a new snapshot was taken in.
    pub fn reload_data(&mut self) -> bool {
        let updated = match self.source.poll() {
            Some(snapshot) => {
                let metrics = SystemMetrics::from_snapshot(&snapshot);
                self.history.record(&metrics);
                self.data = Some(metrics);
                self.last_updated = Some(Instant::now());
                self.updates += 1;
                true
            }
            None => false,
        };

        self.load_error = self.source.error().map(str::to_string);
        updated
    }

    /// The process rows to display, sorted and truncated.
    pub fn top_processes(&self) -> Vec<&ProcessMetrics> {
        let Some(data) = &self.data else {
            return Vec::new();
        };
        let mut processes: Vec<&ProcessMetrics> = data.processes.iter().collect();
        // Stable, so the producer order breaks ties.
        processes.sort_by(|a, b| self.process_sort.compare(a, b));
        processes.truncate(TOP_PROCESSES);
        processes
    }

    pub fn cycle_sort(&mut self) {
        self.process_sort = self.process_sort.next();
        self.set_status_message(format!("Sorting processes by {}", self.process_sort.label()));
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// The current status message, if it has not expired.
    pub fn get_status_message(&self) -> Option<&str> {
        match &self.status_message {
            Some((msg, time)) if time.elapsed() < STATUS_MESSAGE_TTL => Some(msg),
            _ => None,
        }
    }

    pub fn quit(&mut self) {
        self.running = false;
    }
}
