//! Display formatting for metric values.

/// Format a size given in MB, switching to GB at 1024 MB.
pub fn format_mb(mb: f64) -> String {
    if mb >= 1024.0 {
        format!("{:.1} GB", mb / 1024.0)
    } else {
        format!("{:.0} MB", mb)
    }
}

/// Format a size given in GB, switching to TB at 1024 GB.
pub fn format_gb(gb: f64) -> String {
    if gb >= 1024.0 {
        format!("{:.2} TB", gb / 1024.0)
    } else {
        format!("{:.1} GB", gb)
    }
}

/// Format a transfer rate given in MB/s.
pub fn format_rate(mb_per_sec: f64) -> String {
    format!("{:.2} MB/s", mb_per_sec)
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Text bar for a percentage, `width` cells wide.
pub fn usage_bar(percent: f64, width: usize) -> String {
    let ratio = if percent.is_finite() { percent.clamp(0.0, 100.0) / 100.0 } else { 0.0 };
    let filled = ((ratio * width as f64).round() as usize).min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mb() {
        assert_eq!(format_mb(512.0), "512 MB");
        assert_eq!(format_mb(1536.0), "1.5 GB");
    }

    #[test]
    fn test_format_gb() {
        assert_eq!(format_gb(250.0), "250.0 GB");
        assert_eq!(format_gb(2048.0), "2.00 TB");
    }

    #[test]
    fn test_format_rate_and_percent() {
        assert_eq!(format_rate(1.234), "1.23 MB/s");
        assert_eq!(format_percent(12.345), "12.3%");
    }

    #[test]
    fn test_usage_bar() {
        assert_eq!(usage_bar(50.0, 10), "█████░░░░░");
        assert_eq!(usage_bar(150.0, 4), "████");
        assert_eq!(usage_bar(-1.0, 3), "░░░");
        assert_eq!(usage_bar(f64::NAN, 2), "░░");
    }
}
