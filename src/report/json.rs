//! JSON output for run reports.
//!
//! Serializes RunReport to JSON for scripting and piping.

use crate::error::Result;
use crate::monitor::RunReport;

pub fn render(report: &RunReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
