use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::table::{Table, Value};

pub const ORGANISM_COLUMN: &str = "organism";
pub const ASSAY_COLUMN: &str = "sample_library_strategy";
pub const TARGET_COLUMN: &str = "sample_name";

/// Optional row criteria. Blank criteria do not restrict anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default)]
    pub organism: Option<String>,
    #[serde(default)]
    pub assay: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.active().next().is_none()
    }

    /// The trimmed target string, when one was given and is not blank.
    pub fn target(&self) -> Option<&str> {
        non_blank(self.target.as_deref())
    }

    fn active(&self) -> impl Iterator<Item = (&'static str, String)> + '_ {
        [
            (ORGANISM_COLUMN, self.organism.as_deref()),
            (ASSAY_COLUMN, self.assay.as_deref()),
            (TARGET_COLUMN, self.target.as_deref()),
        ]
        .into_iter()
        .filter_map(|(column, needle)| {
            non_blank(needle).map(|needle| (column, needle.to_lowercase()))
        })
    }
}

/// Returns a copy of `table` holding only rows that satisfy every criterion.
///
/// Each criterion is a case-insensitive substring test on its column. A
/// null cell, or a missing column, never satisfies a criterion.
pub fn filter_table(table: &Table, criteria: &FilterCriteria) -> Table {
    let tests = criteria
        .active()
        .map(|(column, needle)| (table.column_index(column), needle))
        .collect::<Vec<_>>();

    let rows = table
        .rows
        .iter()
        .filter(|row| {
            tests.iter().all(|(index, needle)| {
                index
                    .and_then(|index| row.get(index))
                    .is_some_and(|cell| cell_contains(cell, needle))
            })
        })
        .cloned()
        .collect();

    Table {
        columns: table.columns.clone(),
        rows,
    }
}

/// `combined_raw_data.csv` becomes `combined_raw_data_filtered.csv`.
pub fn filtered_output_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_filtered.{}", ext.to_string_lossy()),
        None => format!("{stem}_filtered"),
    };
    path.with_file_name(name)
}

fn cell_contains(cell: &Value, needle: &str) -> bool {
    if cell.is_null() {
        return false;
    }
    cell.to_string().to_lowercase().contains(needle)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criteria_are_trimmed() {
        let table = Table {
            columns: vec![TARGET_COLUMN.to_string()],
            rows: vec![
                vec![Value::from("GV oocyte rep1")],
                vec![Value::from("zygote-oocyte")],
            ],
        };
        let criteria = FilterCriteria {
            target: Some(" oocyte ".to_string()),
            ..FilterCriteria::default()
        };
        assert_eq!(criteria.target(), Some("oocyte"));
        assert_eq!(filter_table(&table, &criteria).len(), 2);
    }

    #[test]
    fn blank_criteria_are_ignored() {
        let criteria = FilterCriteria {
            organism: Some("  ".to_string()),
            assay: None,
            target: Some(String::new()),
        };
        assert!(criteria.is_empty());
        assert_eq!(criteria.target(), None);
    }

    #[test]
    fn filtered_path_keeps_extension() {
        assert_eq!(
            filtered_output_path(Path::new("out/combined_raw_data.csv")),
            PathBuf::from("out/combined_raw_data_filtered.csv")
        );
        assert_eq!(
            filtered_output_path(Path::new("combined")),
            PathBuf::from("combined_filtered")
        );
    }
}
