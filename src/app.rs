use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::combine::{Combined, SkippedFile, combine_csvs};
use crate::config::HarvestConfig;
use crate::domain::GseAccession;
use crate::error::HarvestError;
use crate::filter::{filter_table, filtered_output_path};
use crate::geo::{AccessionLister, write_accession_list};
use crate::geofetch::MetadataMaterializer;
use crate::relocate::{RelocationReport, relocate_outputs};
use crate::table::write_csv;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub query: String,
    pub accessions: Vec<String>,
    pub list_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaterializeResult {
    pub items: Vec<MaterializeItem>,
}

impl MaterializeResult {
    pub fn count(&self, action: &str) -> usize {
        self.items.iter().filter(|item| item.action == action).count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MaterializeItem {
    pub accession: String,
    pub action: String,
    pub path: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CombineResult {
    pub no_data: bool,
    pub combined_path: Option<String>,
    pub rows: usize,
    pub columns: usize,
    pub appended: Vec<String>,
    pub skipped: Vec<SkippedFile>,
    pub filtered_path: Option<String>,
    pub filtered_rows: Option<usize>,
    pub relocation: Option<RelocationReport>,
}

impl CombineResult {
    /// Files written by the combine step, in the order they were produced.
    pub fn outputs(&self) -> Vec<PathBuf> {
        self.combined_path
            .iter()
            .chain(self.filtered_path.iter())
            .map(PathBuf::from)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub started_at: String,
    pub finished_at: String,
    pub search: Option<SearchResult>,
    pub materialize: MaterializeResult,
    pub combine: CombineResult,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Forwards progress events to the `tracing` subscriber.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

#[derive(Clone)]
pub struct App<L: AccessionLister, M: MetadataMaterializer> {
    lister: L,
    materializer: M,
}

impl<L: AccessionLister, M: MetadataMaterializer> App<L, M> {
    pub fn new(lister: L, materializer: M) -> Self {
        Self {
            lister,
            materializer,
        }
    }

    /// Searches for series accessions and records them in the accession list.
    pub fn search(
        &self,
        config: &HarvestConfig,
        sink: &dyn ProgressSink,
    ) -> Result<SearchResult, HarvestError> {
        let query = config
            .query
            .as_deref()
            .map(str::trim)
            .filter(|query| !query.is_empty())
            .ok_or(HarvestError::MissingQuery)?;

        sink.event(ProgressEvent {
            message: format!("phase=Search; query {query:?}"),
            elapsed: None,
        });
        let start = Instant::now();
        let accessions = self.lister.search(query)?;
        sink.event(ProgressEvent {
            message: format!("phase=Search; found {} series", accessions.len()),
            elapsed: Some(start.elapsed()),
        });

        write_accession_list(config.accession_list.as_std_path(), &accessions)?;
        info!(path = %config.accession_list, count = accessions.len(), "wrote accession list");

        Ok(SearchResult {
            query: query.to_string(),
            accessions: accessions.iter().map(|acc| acc.to_string()).collect(),
            list_path: config.accession_list.to_string(),
        })
    }

    /// Materializes metadata for each accession, one at a time.
    ///
    /// A failing accession is logged and recorded; the remaining ones are
    /// still processed. Only a missing tool aborts the loop.
    pub fn materialize_all(
        &self,
        accessions: &[GseAccession],
        config: &HarvestConfig,
        sink: &dyn ProgressSink,
    ) -> Result<MaterializeResult, HarvestError> {
        let metadata_dir = config.metadata_dir.as_std_path();
        let mut items = Vec::with_capacity(accessions.len());

        for accession in accessions {
            let series_dir = metadata_dir.join(accession.as_str());
            let path = series_dir.display().to_string();

            if config.skip_existing && series_dir.is_dir() {
                info!(accession = %accession, path = %path, "metadata directory exists, skipping");
                items.push(MaterializeItem {
                    accession: accession.to_string(),
                    action: "skipped".to_string(),
                    path,
                    message: None,
                });
                continue;
            }

            sink.event(ProgressEvent {
                message: format!("phase=Fetch; {accession}"),
                elapsed: None,
            });
            let start = Instant::now();
            match self.materializer.materialize(accession, metadata_dir) {
                Ok(output) => {
                    if !output.stderr.is_empty() {
                        warn!(accession = %accession, stderr = %output.stderr, "geofetch reported diagnostics");
                    }
                    sink.event(ProgressEvent {
                        message: format!("phase=Fetch; {accession} done"),
                        elapsed: Some(start.elapsed()),
                    });
                    items.push(MaterializeItem {
                        accession: accession.to_string(),
                        action: "fetched".to_string(),
                        path,
                        message: (!output.stderr.is_empty()).then_some(output.stderr),
                    });
                }
                Err(err @ HarvestError::MissingTool(_)) => return Err(err),
                Err(err) => {
                    warn!(accession = %accession, error = %err, "metadata fetch failed");
                    items.push(MaterializeItem {
                        accession: accession.to_string(),
                        action: "failed".to_string(),
                        path,
                        message: Some(err.to_string()),
                    });
                }
            }
        }

        Ok(MaterializeResult { items })
    }

    /// Combines the raw CSV files and, when any filter is set, writes the
    /// filtered table next to the combined one.
    pub fn combine(
        &self,
        config: &HarvestConfig,
        sink: &dyn ProgressSink,
    ) -> Result<CombineResult, HarvestError> {
        sink.event(ProgressEvent {
            message: format!(
                "phase=Combine; {} under {}",
                config.raw_data_pattern, config.raw_data_dir
            ),
            elapsed: None,
        });
        let output = config.combined_output.as_std_path();
        let combined = combine_csvs(
            config.raw_data_dir.as_std_path(),
            &config.raw_data_pattern,
            Some(output),
            &config.column_policy(),
        )?;

        let combined = match combined {
            Combined::NoMatchingFiles => {
                return Ok(CombineResult {
                    no_data: true,
                    ..CombineResult::default()
                });
            }
            Combined::Table(combined) => combined,
        };

        let mut result = CombineResult {
            no_data: false,
            combined_path: Some(output.display().to_string()),
            rows: combined.table.len(),
            columns: combined.table.columns.len(),
            appended: combined
                .appended
                .iter()
                .map(|path| path.display().to_string())
                .collect(),
            skipped: combined.skipped,
            filtered_path: None,
            filtered_rows: None,
            relocation: None,
        };

        if !config.filters.is_empty() {
            sink.event(ProgressEvent {
                message: "phase=Filter; applying filters".to_string(),
                elapsed: None,
            });
            let filtered = filter_table(&combined.table, &config.filters);
            let filtered_path = filtered_output_path(output);
            write_csv(&filtered_path, &filtered)?;
            info!(path = %filtered_path.display(), rows = filtered.len(), "wrote filtered table");
            result.filtered_path = Some(filtered_path.display().to_string());
            result.filtered_rows = Some(filtered.len());
        }

        Ok(result)
    }

    /// Moves the metadata directory and `outputs` under the target name.
    /// Returns `None` when no target filter is configured.
    pub fn relocate(
        &self,
        config: &HarvestConfig,
        outputs: &[PathBuf],
        sink: &dyn ProgressSink,
    ) -> Option<RelocationReport> {
        let target = config.filters.target()?;
        sink.event(ProgressEvent {
            message: format!("phase=Relocate; {target}"),
            elapsed: None,
        });
        Some(relocate_outputs(
            config.metadata_dir.as_std_path(),
            target,
            outputs,
        ))
    }

    /// Search, materialize, combine and relocate, in that order.
    pub fn run(
        &self,
        config: &HarvestConfig,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, HarvestError> {
        let started_at = iso_timestamp();
        let search = self.search(config, sink)?;
        let accessions = search
            .accessions
            .iter()
            .map(|acc| acc.parse())
            .collect::<Result<Vec<GseAccession>, _>>()?;
        let materialize = self.materialize_all(&accessions, config, sink)?;
        let mut combine = self.combine(config, sink)?;
        if !combine.no_data {
            combine.relocation = self.relocate(config, &combine.outputs(), sink);
        }

        Ok(RunResult {
            started_at,
            finished_at: iso_timestamp(),
            search: Some(search),
            materialize,
            combine,
        })
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
