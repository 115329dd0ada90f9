//! Recent usage for the sparklines.

use std::collections::VecDeque;

use super::metrics::SystemMetrics;

/// Maximum number of samples kept per series.
const MAX_HISTORY_SIZE: usize = 60;

/// Rolling CPU and memory usage.
#[derive(Debug, Clone, Default)]
pub struct History {
    pub cpu: VecDeque<f64>,
    pub memory: VecDeque<f64>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one snapshot's usage figures.
    pub fn record(&mut self, metrics: &SystemMetrics) {
        push_capped(&mut self.cpu, metrics.cpu.usage);
        push_capped(&mut self.memory, metrics.memory.usage_percent);
    }

    pub fn len(&self) -> usize {
        self.cpu.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpu.is_empty()
    }

    /// CPU usage as whole percentages for a sparkline.
    pub fn cpu_sparkline(&self) -> Vec<u64> {
        to_sparkline(&self.cpu)
    }

    /// Memory usage as whole percentages for a sparkline.
    pub fn memory_sparkline(&self) -> Vec<u64> {
        to_sparkline(&self.memory)
    }
}

fn push_capped(series: &mut VecDeque<f64>, value: f64) {
    series.push_back(value);
    if series.len() > MAX_HISTORY_SIZE {
        series.pop_front();
    }
}

/// Clamp to 0..=100 and round. Non-finite samples count as zero.
fn to_sparkline(series: &VecDeque<f64>) -> Vec<u64> {
    series
        .iter()
        .map(|v| if v.is_finite() { v.clamp(0.0, 100.0).round() as u64 } else { 0 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cpu: f64, mem: f64) -> SystemMetrics {
        let mut m = SystemMetrics::default();
        m.cpu.usage = cpu;
        m.memory.usage_percent = mem;
        m
    }

    #[test]
    fn test_history_is_capped() {
        let mut history = History::new();
        for i in 0..100 {
            history.record(&sample(i as f64, 0.0));
        }
        assert_eq!(history.len(), MAX_HISTORY_SIZE);
        assert_eq!(history.cpu.front(), Some(&40.0));
        assert_eq!(history.cpu.back(), Some(&99.0));
    }

    #[test]
    fn test_sparkline_clamps() {
        let mut history = History::new();
        history.record(&sample(-5.0, 150.0));
        history.record(&sample(f64::NAN, 49.6));
        assert_eq!(history.cpu_sparkline(), vec![0, 0]);
        assert_eq!(history.memory_sparkline(), vec![100, 50]);
    }
}
