//! ANSI color and gauge helpers for window content.

/// Green text.
pub fn green(text: &str) -> String {
    format!("\x1b[32m{text}\x1b[0m")
}

/// Yellow text.
pub fn yellow(text: &str) -> String {
    format!("\x1b[33m{text}\x1b[0m")
}

/// Red text.
pub fn red(text: &str) -> String {
    format!("\x1b[31m{text}\x1b[0m")
}

/// Dimmed text.
pub fn dim(text: &str) -> String {
    format!("\x1b[2m{text}\x1b[0m")
}

/// Colors a percentage by severity: green under 70, yellow under 90,
/// red above.
pub fn severity(percent: f64, text: &str) -> String {
    if percent >= 90.0 {
        red(text)
    } else if percent >= 70.0 {
        yellow(text)
    } else {
        green(text)
    }
}

/// A fixed-width usage bar: `[####......]`.
pub fn gauge(percent: f64, width: usize) -> String {
    let filled =
        ((percent / 100.0) * width as f64).round().clamp(0.0, width as f64)
            as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballast_tui::text::strip_ansi;

    #[test]
    fn test_gauge_bounds() {
        assert_eq!(gauge(0.0, 10), "[..........]");
        assert_eq!(gauge(100.0, 10), "[##########]");
        assert_eq!(gauge(50.0, 10), "[#####.....]");
        assert_eq!(gauge(250.0, 4), "[####]");
    }

    #[test]
    fn test_severity_thresholds() {
        assert_eq!(strip_ansi(&severity(10.0, "x")), "x");
        assert!(severity(95.0, "x").starts_with("\x1b[31m"));
        assert!(severity(75.0, "x").starts_with("\x1b[33m"));
        assert!(severity(10.0, "x").starts_with("\x1b[32m"));
    }
}
