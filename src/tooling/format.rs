//! Format command results as text, tables or JSON.

use crate::error::ApiError;
use crate::index::CommitRecord;
use crate::pipeline::StoreReceipt;
use crate::vcs::short_id;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::{OwoColorize, Style};
use std::io::IsTerminal;

/// Colors only when stdout is a terminal and `NO_COLOR` is unset.
pub fn stdout_supports_color() -> bool {
    std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}

fn paint(text: &str, style: Style, color: bool) -> String {
    if color {
        text.style(style).to_string()
    } else {
        text.to_string()
    }
}

/// Commit log in the style of `git log`, newest first.
pub fn format_log_text(records: &[CommitRecord], color: bool) -> String {
    if records.is_empty() {
        return "No stored results.".to_string();
    }
    let mut out = String::new();
    for record in records {
        out.push_str(&format!(
            "{}\n",
            paint(&format!("commit {}", record.id), Style::new().yellow(), color)
        ));
        out.push_str(&format!(
            "Date:   {}\n",
            record.timestamp.format("%a %b %e %H:%M:%S %Y %z")
        ));
        out.push_str(&format!("\n    {}\n", record.subject));
        if let Some(source) = &record.source_commit {
            out.push_str(&format!("    Source commit: {}\n", source));
        }
        if let Some(reproduce) = &record.reproduce_with {
            out.push_str(&format!("    Reproduce with: {}\n", reproduce));
        }
        out.push_str(&format!(
            "\n{}\n",
            paint("Stored files:", Style::new().cyan(), color)
        ));
        let folder = record.subfolder.as_deref().unwrap_or("");
        for file in &record.files {
            out.push_str(&format!("  {}/{}\n", folder, file));
        }
        for script in &record.scripts {
            out.push_str(&format!("  {}/recipes/{}\n", folder, script));
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// One row per commit.
pub fn format_log_table(records: &[CommitRecord]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Commit", "Date", "Folder", "Files", "Timing"]);
    for record in records {
        table.add_row(vec![
            short_id(&record.id),
            record.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            record.subfolder.clone().unwrap_or_default(),
            record.files.join("\n"),
            record.timing.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table.to_string()
}

pub fn format_log_json(records: &[CommitRecord]) -> Result<String, ApiError> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// Summary of one successful store.
pub fn format_store_receipt(receipt: &StoreReceipt, color: bool) -> String {
    let mut out = format!(
        "{} {}/{}",
        paint("Stored", Style::new().green(), color),
        receipt.subfolder,
        receipt.stored_name
    );
    if let Some(patch) = &receipt.patch_name {
        out.push_str(&format!(" with patch {}", patch));
    }
    out.push_str(&format!(
        " (commit {}, timing {})",
        short_id(&receipt.record.id),
        receipt.verdict
    ));
    out
}
