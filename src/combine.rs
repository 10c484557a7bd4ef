use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::contact::normalize_contact_column;
use crate::discovery::find_matching_files;
use crate::error::HarvestError;
use crate::table::{Table, Value, load_csv, write_csv};

pub const LEADING_COLUMNS: &[&str] = &[
    "sample_geo_accession",
    "sample_library_strategy",
    "sample_contact_name",
    "sample_submission_date",
    "sample_name",
    "big_key",
    "genotype",
    "sample_characteristics_ch1_development_stage",
    "development_stage",
    "treatment",
    "sample_treatment_protocol_ch1",
    "antibody",
];

pub const TRAILING_COLUMNS: &[&str] = &["sample_source_name_ch1", "sample_organism_ch1", "organism"];

pub const SEPARATOR_COLUMNS: [&str; 2] = ["|", "||"];

/// Decides the header order of a combined table.
#[derive(Debug, Clone)]
pub struct ColumnPolicy {
    pub leading: Vec<String>,
    pub trailing: Vec<String>,
    pub separator_columns: bool,
}

impl Default for ColumnPolicy {
    fn default() -> Self {
        Self {
            leading: LEADING_COLUMNS.iter().map(|c| c.to_string()).collect(),
            trailing: TRAILING_COLUMNS.iter().map(|c| c.to_string()).collect(),
            separator_columns: false,
        }
    }
}

impl ColumnPolicy {
    pub fn with_separator_columns(mut self, enabled: bool) -> Self {
        self.separator_columns = enabled;
        self
    }

    /// Orders `seen` (every input column, in first-encountered order):
    /// present leading columns, optional separators, the rest as seen, then
    /// present trailing columns. A separator whose name an input already
    /// uses is left out so every header stays unique.
    pub fn order(&self, seen: &[String]) -> Vec<String> {
        let present = seen.iter().map(String::as_str).collect::<HashSet<_>>();
        let pinned = self
            .leading
            .iter()
            .chain(&self.trailing)
            .map(String::as_str)
            .collect::<HashSet<_>>();

        let mut order = self
            .leading
            .iter()
            .filter(|column| present.contains(column.as_str()))
            .cloned()
            .collect::<Vec<_>>();
        if self.separator_columns {
            order.extend(
                SEPARATOR_COLUMNS
                    .iter()
                    .filter(|column| !present.contains(*column))
                    .map(|column| column.to_string()),
            );
        }
        order.extend(
            seen.iter()
                .filter(|column| !pinned.contains(column.as_str()))
                .cloned(),
        );
        order.extend(
            self.trailing
                .iter()
                .filter(|column| present.contains(column.as_str()))
                .cloned(),
        );
        order
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct CombinedTable {
    pub table: Table,
    pub appended: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
}

/// Outcome of [`combine_csvs`]. No matching files is reported explicitly
/// rather than as an empty table.
#[derive(Debug, Clone)]
pub enum Combined {
    NoMatchingFiles,
    Table(CombinedTable),
}

impl Combined {
    pub fn table(&self) -> Option<&Table> {
        match self {
            Combined::NoMatchingFiles => None,
            Combined::Table(combined) => Some(&combined.table),
        }
    }
}

/// Concatenates every file under `root` matching `pattern` into one table.
///
/// Files that fail to load are logged and left out. When `output` is given
/// the table is also written there; nothing is written when no file matched.
pub fn combine_csvs(
    root: &Path,
    pattern: &str,
    output: Option<&Path>,
    policy: &ColumnPolicy,
) -> Result<Combined, HarvestError> {
    let files = find_matching_files(root, pattern)?;
    if files.is_empty() {
        warn!(root = %root.display(), pattern, "no files matched");
        return Ok(Combined::NoMatchingFiles);
    }

    let mut loaded = Vec::new();
    let mut skipped = Vec::new();
    let mut seen = Vec::<String>::new();
    let mut seen_set = HashSet::<String>::new();

    for path in files {
        let mut table = match load_csv(&path) {
            Ok(table) => table,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable file");
                skipped.push(SkippedFile {
                    path,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        normalize_contact_column(&mut table);
        for column in &table.columns {
            if seen_set.insert(column.clone()) {
                seen.push(column.clone());
            }
        }
        info!(path = %path.display(), rows = table.len(), "appended");
        loaded.push((path, table));
    }

    let columns = policy.order(&seen);
    let mut combined = Table::new(columns);
    let mut appended = Vec::with_capacity(loaded.len());
    for (path, table) in loaded {
        project_rows(&table, &mut combined);
        appended.push(path);
    }

    if let Some(output) = output {
        write_csv(output, &combined)?;
        info!(
            path = %output.display(),
            rows = combined.len(),
            columns = combined.columns.len(),
            "wrote combined table"
        );
    }

    Ok(Combined::Table(CombinedTable {
        table: combined,
        appended,
        skipped,
    }))
}

fn project_rows(source: &Table, target: &mut Table) {
    let positions = source
        .columns
        .iter()
        .enumerate()
        .map(|(index, column)| (column.as_str(), index))
        .collect::<HashMap<_, _>>();
    let mapping = target
        .columns
        .iter()
        .map(|column| positions.get(column.as_str()).copied())
        .collect::<Vec<_>>();

    for row in &source.rows {
        let projected = mapping
            .iter()
            .map(|index| {
                index
                    .and_then(|index| row.get(index))
                    .cloned()
                    .unwrap_or(Value::Null)
            })
            .collect();
        target.rows.push(projected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn order_pins_leading_and_trailing() {
        let seen = names(&["sample_name", "organism", "custom_x", "sample_geo_accession"]);
        let order = ColumnPolicy::default().order(&seen);
        assert_eq!(
            order,
            names(&["sample_geo_accession", "sample_name", "custom_x", "organism"])
        );
    }

    #[test]
    fn order_with_separators() {
        let seen = names(&["custom_b", "sample_name", "custom_a"]);
        let order = ColumnPolicy::default()
            .with_separator_columns(true)
            .order(&seen);
        assert_eq!(order, names(&["sample_name", "|", "||", "custom_b", "custom_a"]));
    }

    #[test]
    fn separator_name_taken_by_input_is_not_repeated() {
        let seen = names(&["sample_name", "|", "custom_a"]);
        let order = ColumnPolicy::default()
            .with_separator_columns(true)
            .order(&seen);
        assert_eq!(order, names(&["sample_name", "||", "|", "custom_a"]));
    }

    #[test]
    fn projection_fills_missing_with_null() {
        let mut source = Table::new(names(&["b", "a"]));
        source.rows.push(vec![Value::from("b1"), Value::from("a1")]);
        let mut target = Table::new(names(&["a", "c", "b"]));

        project_rows(&source, &mut target);
        assert_eq!(
            target.rows,
            vec![vec![Value::from("a1"), Value::Null, Value::from("b1")]]
        );
    }
}
