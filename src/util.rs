use std::time::Duration;

const UNITS: [&str; 6] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Formats a byte count using binary units, e.g. `1.5 MiB`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{value:.1} {}", UNITS[unit])
}

/// Signed variant used for deltas. Always carries a sign so `+0 B` never
/// reads like an absolute size.
pub fn format_delta(delta: i64) -> String {
    let sign = if delta < 0 { '-' } else { '+' };
    format!("{sign}{}", format_bytes(delta.unsigned_abs()))
}

pub fn format_count_delta(delta: i64) -> String {
    format!("{delta:+}")
}

/// Coarse "time ago" rendering, rounded to whole seconds.
pub fn format_ago(elapsed: Duration) -> String {
    if elapsed.as_secs() == 0 {
        return "just now".to_string();
    }
    let rounded = Duration::from_secs(elapsed.as_secs());
    format!("{} ago", humantime::format_duration(rounded))
}

pub fn format_millis(elapsed: Duration) -> String {
    format!("{}ms", elapsed.as_millis())
}
