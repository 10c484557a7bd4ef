use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::combine::ColumnPolicy;
use crate::error::HarvestError;
use crate::filter::FilterCriteria;
use crate::geo::DEFAULT_RETMAX;

pub const DEFAULT_CONFIG_FILE: &str = "geo-harvest.json";

/// On-disk configuration. Every field is optional; absent values fall back
/// to the defaults in [`HarvestConfig::default`].
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub accession_list: Option<Utf8PathBuf>,
    #[serde(default)]
    pub metadata_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub discard_soft: Option<bool>,
    #[serde(default)]
    pub raw_data_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub combined_output: Option<Utf8PathBuf>,
    #[serde(default)]
    pub raw_data_pattern: Option<String>,
    #[serde(default)]
    pub filters: FilterCriteria,
    #[serde(default)]
    pub separator_columns: Option<bool>,
    #[serde(default)]
    pub skip_existing: Option<bool>,
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,
    #[serde(default)]
    pub retmax: Option<u32>,
}

/// Fully resolved settings handed to every pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestConfig {
    pub query: Option<String>,
    pub accession_list: Utf8PathBuf,
    pub metadata_dir: Utf8PathBuf,
    pub discard_soft: bool,
    pub raw_data_dir: Utf8PathBuf,
    pub combined_output: Utf8PathBuf,
    pub raw_data_pattern: String,
    pub filters: FilterCriteria,
    pub separator_columns: bool,
    pub skip_existing: bool,
    pub tool_timeout_secs: Option<u64>,
    pub retmax: u32,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            query: None,
            accession_list: Utf8PathBuf::from("metadata/metadata.txt"),
            metadata_dir: Utf8PathBuf::from("metadata"),
            discard_soft: false,
            raw_data_dir: Utf8PathBuf::from("."),
            combined_output: Utf8PathBuf::from("combined_raw_data.csv"),
            raw_data_pattern: "*_raw.csv".to_string(),
            filters: FilterCriteria::default(),
            separator_columns: false,
            skip_existing: true,
            tool_timeout_secs: Some(1800),
            retmax: DEFAULT_RETMAX,
        }
    }
}

impl HarvestConfig {
    pub fn column_policy(&self) -> ColumnPolicy {
        ColumnPolicy::default().with_separator_columns(self.separator_columns)
    }

    /// `None` or zero disables the timeout.
    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `geo-harvest.json` from the current directory when no
    /// path is given. Only an explicitly named file has to exist.
    pub fn load(path: Option<&str>) -> Result<ConfigFile, HarvestError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if !config_path.exists() {
            return match path {
                Some(_) => Err(HarvestError::MissingConfig(config_path)),
                None => Ok(ConfigFile::default()),
            };
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| HarvestError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| HarvestError::ConfigParse(err.to_string()))
    }

    /// Layers `overrides` (usually the command line) over `file` over the
    /// defaults.
    pub fn resolve(file: ConfigFile, overrides: ConfigFile) -> HarvestConfig {
        let defaults = HarvestConfig::default();
        HarvestConfig {
            query: overrides.query.or(file.query).or(defaults.query),
            accession_list: overrides
                .accession_list
                .or(file.accession_list)
                .unwrap_or(defaults.accession_list),
            metadata_dir: overrides
                .metadata_dir
                .or(file.metadata_dir)
                .unwrap_or(defaults.metadata_dir),
            discard_soft: overrides
                .discard_soft
                .or(file.discard_soft)
                .unwrap_or(defaults.discard_soft),
            raw_data_dir: overrides
                .raw_data_dir
                .or(file.raw_data_dir)
                .unwrap_or(defaults.raw_data_dir),
            combined_output: overrides
                .combined_output
                .or(file.combined_output)
                .unwrap_or(defaults.combined_output),
            raw_data_pattern: overrides
                .raw_data_pattern
                .or(file.raw_data_pattern)
                .unwrap_or(defaults.raw_data_pattern),
            filters: FilterCriteria {
                organism: overrides.filters.organism.or(file.filters.organism),
                assay: overrides.filters.assay.or(file.filters.assay),
                target: overrides.filters.target.or(file.filters.target),
            },
            separator_columns: overrides
                .separator_columns
                .or(file.separator_columns)
                .unwrap_or(defaults.separator_columns),
            skip_existing: overrides
                .skip_existing
                .or(file.skip_existing)
                .unwrap_or(defaults.skip_existing),
            tool_timeout_secs: overrides
                .tool_timeout_secs
                .or(file.tool_timeout_secs)
                .or(defaults.tool_timeout_secs),
            retmax: overrides.retmax.or(file.retmax).unwrap_or(defaults.retmax),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_layers_resolve_to_defaults() {
        let resolved = ConfigLoader::resolve(ConfigFile::default(), ConfigFile::default());
        assert_eq!(resolved, HarvestConfig::default());
        assert_eq!(resolved.tool_timeout(), Some(Duration::from_secs(1800)));
    }

    #[test]
    fn zero_timeout_disables_it() {
        let config = HarvestConfig {
            tool_timeout_secs: Some(0),
            ..HarvestConfig::default()
        };
        assert_eq!(config.tool_timeout(), None);
    }
}
