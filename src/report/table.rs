//! Plain text rendering of a run.
//!
//! One row per monitored root (size, dirs, files with deltas, newest
//! modification, walk + save time), then the previous/current start times
//! and the free space row.

use chrono::{DateTime, Local, Utc};

use crate::monitor::{DirectoryReport, FreeSpaceReport, RunReport};
use crate::store::diff::{net_change, ChangeKind};
use crate::util::{format_ago, format_bytes, format_count_delta, format_delta};

const PATH_WIDTH: usize = 40;
const WIDTH: usize = PATH_WIDTH + 20 + 14 + 14 + 20 + 16;

pub fn render(report: &RunReport, now: DateTime<Utc>) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{:<PATH_WIDTH$} {:>19} {:>13} {:>13} {:>19} {:>15}\n",
        "path", "size", "dirs", "files", "last modified", "walk time"
    ));
    output.push_str(&"-".repeat(WIDTH));
    output.push('\n');

    for dir in &report.directories {
        output.push_str(&directory_row(dir));
    }

    output.push_str(&"-".repeat(WIDTH));
    output.push('\n');

    if let Some(previous) = report.previous_generation {
        let elapsed = (now - previous.time()).to_std().unwrap_or_default();
        output.push_str(&format!(
            "{:<PATH_WIDTH$} {:>19} {:>13}\n",
            "prev stime",
            local(previous.time()).format("%d %b %H:%M").to_string(),
            format_ago(elapsed)
        ));
    }

    let (label, shown) = if report.replay {
        ("replayed", report.generation.map(|g| g.time()).unwrap_or(report.started_at))
    } else {
        ("start time", report.started_at)
    };
    output.push_str(&format!(
        "{:<PATH_WIDTH$} {:>19} {:>13}\n",
        label,
        local(shown).format("%d %b %H:%M").to_string(),
        "~ now"
    ));

    output.push_str(&"-".repeat(WIDTH));
    output.push('\n');
    output.push_str(&free_space_row(report.free_space.as_ref(), report.elapsed_ms));

    output
}

/// Added/modified/deleted listing for every root that has changes.
pub fn render_changes(report: &RunReport) -> String {
    let mut output = String::new();

    for dir in report.directories.iter().filter(|d| !d.changes.is_empty()) {
        output.push_str(&format!("\n{}:\n", dir.root.display()));

        for change in &dir.changes {
            let marker = if change.is_dir { "/" } else { "" };
            let line = match change.kind {
                ChangeKind::Added => format!(
                    "  + {}{marker} {}\n",
                    change.path.display(),
                    format_bytes(change.size)
                ),
                ChangeKind::Modified => format!(
                    "  ~ {}{marker} {} ({})\n",
                    change.path.display(),
                    format_bytes(change.size),
                    format_delta(change.delta)
                ),
                ChangeKind::Deleted => format!(
                    "  - {}{marker} {}\n",
                    change.path.display(),
                    format_bytes(change.size)
                ),
            };
            output.push_str(&line);
        }

        output.push_str(&format!("  net change: {}\n", format_delta(net_change(&dir.changes))));
    }

    output
}

fn directory_row(dir: &DirectoryReport) -> String {
    let path = truncate(&dir.root.display().to_string(), PATH_WIDTH);

    let Some(summary) = &dir.summary else {
        let error = dir.error.as_deref().unwrap_or("no data");
        return format!("{path:<PATH_WIDTH$} error: {error}\n");
    };

    let mut size = format_bytes(summary.size);
    let mut dirs = summary.dirs.to_string();
    let mut files = summary.files.to_string();

    if let Some(delta) = dir.delta {
        if delta.size != 0 {
            size.push_str(&format!(" ({})", format_delta(delta.size)));
        }
        if delta.dirs != 0 {
            dirs.push_str(&format!(" ({})", format_count_delta(delta.dirs)));
        }
        if delta.files != 0 {
            files.push_str(&format!(" ({})", format_count_delta(delta.files)));
        }
    }

    let modified = summary
        .mtime
        .map(|t| local(t).format("%d %b %y %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());

    let timing = match (dir.walk_ms, dir.save_ms) {
        (Some(walk), Some(save)) => format!("{walk}ms + {save}ms"),
        (Some(walk), None) => format!("{walk}ms"),
        _ => "saved".to_string(),
    };

    let mut row = format!(
        "{path:<PATH_WIDTH$} {size:>19} {dirs:>13} {files:>13} {modified:>19} {timing:>15}\n"
    );
    if let Some(error) = &dir.error {
        row.push_str(&format!("{:<PATH_WIDTH$} {error}\n", ""));
    }
    row
}

fn free_space_row(free_space: Option<&FreeSpaceReport>, elapsed_ms: u64) -> String {
    let Some(free_space) = free_space else {
        return format!("{:<PATH_WIDTH$} {:>19}\n", "FREE SPACE", "unknown");
    };

    let mut cell = format_bytes(free_space.free_bytes);
    if let Some(delta) = free_space.delta.filter(|d| *d != 0) {
        cell.push_str(&format!(" ({})", format_delta(delta)));
    }

    format!(
        "{:<PATH_WIDTH$} {cell:>19} {:>13} {:>13} {:>19} {:>15}\n",
        "FREE SPACE",
        "",
        "",
        "",
        format!("{elapsed_ms}ms")
    )
}

fn local(t: DateTime<Utc>) -> DateTime<Local> {
    t.with_timezone(&Local)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        // keep the tail, it is the part that tells roots apart
        let tail: String = s.chars().skip(s.chars().count() - (max_len - 3)).collect();
        format!("...{tail}")
    }
}
