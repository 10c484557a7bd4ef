use std::fs;
use std::path::Path;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use geo_metadata_harvester::app::{App, ProgressEvent, ProgressSink};
use geo_metadata_harvester::config::HarvestConfig;
use geo_metadata_harvester::domain::GseAccession;
use geo_metadata_harvester::error::HarvestError;
use geo_metadata_harvester::filter::FilterCriteria;
use geo_metadata_harvester::geo::AccessionLister;
use geo_metadata_harvester::geofetch::{MaterializeOutput, MetadataMaterializer};
use geo_metadata_harvester::output::JsonOutput;
use geo_metadata_harvester::table::load_csv;

struct MockLister {
    accessions: Vec<&'static str>,
}

impl AccessionLister for MockLister {
    fn search(&self, _query: &str) -> Result<Vec<GseAccession>, HarvestError> {
        self.accessions.iter().map(|acc| acc.parse()).collect()
    }
}

/// Writes a small raw table per accession, failing for the listed ones.
#[derive(Default)]
struct MockGeofetch {
    failing: Vec<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl MetadataMaterializer for MockGeofetch {
    fn materialize(
        &self,
        accession: &GseAccession,
        destination: &Path,
    ) -> Result<MaterializeOutput, HarvestError> {
        self.calls.lock().unwrap().push(accession.to_string());
        if self.failing.contains(&accession.as_str()) {
            return Err(HarvestError::ToolFailed {
                tool: "geofetch".to_string(),
                accession: accession.to_string(),
                message: "HTTP 404".to_string(),
            });
        }
        let dir = destination.join(accession.as_str());
        fs::create_dir_all(&dir).unwrap();
        let content = format!(
            "sample_geo_accession,sample_name,sample_contact_name,organism,sample_library_strategy\n\
             {acc}_1,oocyte_{acc},\"Doe,,Jane\",Mus musculus,ChIP-Seq\n\
             {acc}_2,liver_{acc},\"Roe,,Rick\",Homo sapiens,RNA-Seq\n",
            acc = accession.as_str()
        );
        fs::write(dir.join(format!("{}_raw.csv", accession.as_str())), content).unwrap();
        Ok(MaterializeOutput::default())
    }
}

struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

fn config_in(root: &Path) -> HarvestConfig {
    let root = Utf8PathBuf::from_path_buf(root.to_path_buf()).unwrap();
    HarvestConfig {
        query: Some("h3k4me3 AND mouse".to_string()),
        accession_list: root.join("metadata/metadata.txt"),
        metadata_dir: root.join("metadata"),
        raw_data_dir: root.join("metadata"),
        combined_output: root.join("combined_raw_data.csv"),
        ..HarvestConfig::default()
    }
}

#[test]
fn run_fetches_combines_and_filters() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = config_in(temp.path());
    config.filters = FilterCriteria {
        organism: Some("mus".to_string()),
        assay: None,
        target: None,
    };
    let app = App::new(
        MockLister {
            accessions: vec!["GSE1", "GSE2", "GSE3"],
        },
        MockGeofetch {
            failing: vec!["GSE2"],
            ..MockGeofetch::default()
        },
    );

    let result = app.run(&config, &NoopSink).unwrap();

    let search = result.search.unwrap();
    assert_eq!(search.accessions, vec!["GSE1", "GSE2", "GSE3"]);
    assert_eq!(
        fs::read_to_string(temp.path().join("metadata/metadata.txt")).unwrap(),
        "GSE1\nGSE2\nGSE3\n"
    );
    assert_eq!(result.materialize.count("fetched"), 2);
    assert_eq!(result.materialize.count("failed"), 1);

    assert!(!result.combine.no_data);
    assert_eq!(result.combine.rows, 4);
    assert_eq!(result.combine.filtered_rows, Some(2));
    assert!(result.combine.relocation.is_none());

    let combined = load_csv(&temp.path().join("combined_raw_data.csv")).unwrap();
    assert_eq!(combined.columns[0], "sample_geo_accession");
    assert_eq!(combined.columns.last().unwrap(), "organism");
    assert_eq!(combined.rows[0][2].to_string(), "DoeJ");

    let filtered = load_csv(&temp.path().join("combined_raw_data_filtered.csv")).unwrap();
    assert_eq!(filtered.len(), 2);
}

#[test]
fn existing_series_directories_are_skipped() {
    let temp = tempfile::tempdir().unwrap();
    let config = config_in(temp.path());
    fs::create_dir_all(temp.path().join("metadata/GSE1")).unwrap();
    let geofetch = MockGeofetch::default();
    let app = App::new(MockLister { accessions: vec![] }, geofetch);

    let accessions = ["GSE1", "GSE2"]
        .iter()
        .map(|acc| acc.parse().unwrap())
        .collect::<Vec<GseAccession>>();
    let result = app.materialize_all(&accessions, &config, &JsonOutput).unwrap();

    assert_eq!(result.items[0].action, "skipped");
    assert_eq!(result.items[1].action, "fetched");
}

#[test]
fn missing_tool_aborts_materialization() {
    struct Missing;
    impl MetadataMaterializer for Missing {
        fn materialize(
            &self,
            _accession: &GseAccession,
            _destination: &Path,
        ) -> Result<MaterializeOutput, HarvestError> {
            Err(HarvestError::MissingTool("geofetch".to_string()))
        }
    }

    let temp = tempfile::tempdir().unwrap();
    let config = config_in(temp.path());
    let app = App::new(MockLister { accessions: vec![] }, Missing);
    let accessions = vec!["GSE5".parse::<GseAccession>().unwrap()];
    let err = app.materialize_all(&accessions, &config, &NoopSink).unwrap_err();
    assert_matches!(err, HarvestError::MissingTool(_));
}

#[test]
fn missing_query_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = config_in(temp.path());
    config.query = Some("  ".to_string());
    let app = App::new(MockLister { accessions: vec![] }, MockGeofetch::default());
    assert_matches!(
        app.search(&config, &NoopSink).unwrap_err(),
        HarvestError::MissingQuery
    );
}

#[test]
fn no_matching_files_skips_filter_and_relocation() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = config_in(temp.path());
    config.filters.target = Some("oocyte".to_string());
    let app = App::new(MockLister { accessions: vec![] }, MockGeofetch::default());

    let result = app.run(&config, &NoopSink).unwrap();
    assert!(result.combine.no_data);
    assert!(result.combine.combined_path.is_none());
    assert!(result.combine.relocation.is_none());
    assert!(!temp.path().join("combined_raw_data.csv").exists());
    assert!(!temp.path().join("oocyte").exists());
}

#[test]
fn target_filter_relocates_outputs() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = config_in(temp.path());
    config.filters.target = Some("oocyte".to_string());
    let app = App::new(
        MockLister {
            accessions: vec!["GSE7"],
        },
        MockGeofetch::default(),
    );

    let result = app.run(&config, &NoopSink).unwrap();

    let report = result.combine.relocation.unwrap();
    assert!(report.is_clean(), "{:?}", report.errors);
    let target_dir = temp.path().join("oocyte");
    assert!(!temp.path().join("metadata").exists());
    assert!(target_dir.join("GSE7/GSE7_raw.csv").is_file());
    assert!(target_dir.join("combined_raw_data.csv").is_file());
    assert!(target_dir.join("combined_raw_data_filtered.csv").is_file());
    assert_eq!(report.moved.len(), 2);
}

#[test]
fn relocation_failures_are_reported_not_raised() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = config_in(temp.path());
    config.filters.target = Some("oocyte".to_string());
    fs::create_dir_all(temp.path().join("oocyte")).unwrap();
    fs::write(temp.path().join("oocyte/combined_raw_data.csv"), "old\n").unwrap();
    let app = App::new(
        MockLister {
            accessions: vec!["GSE8"],
        },
        MockGeofetch::default(),
    );

    let result = app.run(&config, &NoopSink).unwrap();
    let report = result.combine.relocation.unwrap();

    assert!(!report.is_clean());
    assert!(temp.path().join("metadata/GSE8").is_dir());
    assert!(temp.path().join("combined_raw_data.csv").is_file());
    assert_eq!(report.moved.len(), 1);
    assert!(temp.path().join("oocyte/combined_raw_data_filtered.csv").is_file());
}
