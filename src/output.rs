use std::io::{self, Write};

use serde::Serialize;

use crate::app::{CombineResult, MaterializeResult, ProgressEvent, ProgressSink, RunResult, SearchResult};
use crate::relocate::RelocationReport;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_search(result: &SearchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_materialize(result: &MaterializeResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_combine(result: &CombineResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Plain-text summaries for a terminal.
pub struct TextSummary;

impl TextSummary {
    pub fn print_search(result: &SearchResult) {
        println!(
            "Found {} series for {:?} (list: {})",
            result.accessions.len(),
            result.query,
            result.list_path
        );
        for accession in &result.accessions {
            println!("  {accession}");
        }
    }

    pub fn print_materialize(result: &MaterializeResult) {
        println!(
            "Metadata: {} fetched, {} skipped, {} failed",
            result.count("fetched"),
            result.count("skipped"),
            result.count("failed")
        );
        for item in result.items.iter().filter(|item| item.action == "failed") {
            println!(
                "  {} failed: {}",
                item.accession,
                item.message.as_deref().unwrap_or("unknown error")
            );
        }
    }

    pub fn print_combine(result: &CombineResult) {
        if result.no_data {
            println!("No raw CSV files matched; nothing was combined.");
            return;
        }
        println!(
            "Combined {} files into {} ({} rows, {} columns)",
            result.appended.len(),
            result.combined_path.as_deref().unwrap_or("-"),
            result.rows,
            result.columns
        );
        for skipped in &result.skipped {
            println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
        }
        if let (Some(path), Some(rows)) = (&result.filtered_path, result.filtered_rows) {
            println!("Filtered table: {path} ({rows} rows)");
        }
        if let Some(report) = &result.relocation {
            Self::print_relocation(report);
        }
    }

    pub fn print_relocation(report: &RelocationReport) {
        if let Some(directory) = &report.directory {
            println!("Outputs moved to {}", directory.display());
        }
        for error in &report.errors {
            println!("  relocation: {error}");
        }
    }

    pub fn print_run(result: &RunResult) {
        if let Some(search) = &result.search {
            Self::print_search(search);
        }
        Self::print_materialize(&result.materialize);
        Self::print_combine(&result.combine);
    }
}
