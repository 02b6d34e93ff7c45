pub mod json;
pub mod table;
pub mod tee;

use std::io::{self, Write};

use chrono::Utc;

use crate::monitor::RunReport;
use crate::util::format_bytes;

pub fn print(report: &RunReport, json_output: bool, verbose: bool, out: &mut dyn Write) -> io::Result<()> {
    if json_output {
        let text = json::render(report).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        writeln!(out, "{text}")?;
    } else {
        write!(out, "{}", table::render(report, Utc::now()))?;
        if report.detailed {
            write!(out, "{}", table::render_changes(report))?;
        }
        print_run_info(report, verbose, out)?;
    }
    out.flush()
}

fn print_run_info(report: &RunReport, verbose: bool, out: &mut dyn Write) -> io::Result<()> {
    let skipped: u64 = report.directories.iter().map(|d| d.skipped).sum();
    if skipped > 0 {
        writeln!(out, "\n{skipped} unreadable entries skipped, see log for details")?;
    }

    if !verbose {
        return Ok(());
    }

    writeln!(out)?;
    if let Some(generation) = report.generation {
        writeln!(out, "generation: {generation}")?;
    }
    if let Some(previous) = report.previous_generation {
        writeln!(out, "compared with: {previous}")?;
    }
    if !report.pruned.is_empty() {
        writeln!(out, "pruned {} old generation(s)", report.pruned.len())?;
    }
    if let Some(mem) = report.resident_memory_bytes {
        writeln!(out, "resident memory: {}", format_bytes(mem))?;
    }
    writeln!(out, "completed in {:.2}s", report.elapsed_ms as f64 / 1000.0)
}
