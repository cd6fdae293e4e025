//! Formatted output helpers for CLI commands.
//!
//! Provides aligned tables, JSON output, and human-readable container
//! status and timestamps.

use chrono::{DateTime, Utc};
use moddock_runtime::ContainerStatus;
use serde::Serialize;

/// Renders rows under a header line, each column padded to its widest cell.
#[must_use]
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = render_line(headers.iter().copied(), &widths);
    for row in rows {
        out.push('\n');
        out.push_str(&render_line(row.iter().map(String::as_str), &widths));
    }
    out
}

fn render_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    padded.join("  ").trim_end().to_string()
}

/// Prints a table, or `empty` when there are no rows.
pub fn print_table(headers: &[&str], rows: &[Vec<String>], empty: &str) {
    if rows.is_empty() {
        println!("{empty}");
    } else {
        println!("{}", render_table(headers, rows));
    }
}

/// Prints `value` as pretty JSON.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Container status, or `absent` when there is no container.
#[must_use]
pub fn format_status(status: Option<ContainerStatus>) -> String {
    status.map_or_else(|| "absent".to_string(), |s| s.to_string())
}

/// UTC timestamp to the minute.
#[must_use]
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}
