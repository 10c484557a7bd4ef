use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use geo_metadata_harvester::config::{ConfigFile, ConfigLoader, HarvestConfig};
use geo_metadata_harvester::error::HarvestError;
use geo_metadata_harvester::filter::FilterCriteria;

#[test]
fn file_values_sit_between_defaults_and_overrides() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("geo-harvest.json");
    std::fs::write(
        &path,
        r#"{
            "query": "h3k4me3 AND mouse",
            "raw_data_pattern": "GSE*_raw.csv",
            "discard_soft": true,
            "filters": {"organism": "mus", "target": "oocyte"}
        }"#,
    )
    .unwrap();

    let file = ConfigLoader::load(path.to_str()).unwrap();
    let overrides = ConfigFile {
        raw_data_pattern: Some("*_RAW.csv".to_string()),
        filters: FilterCriteria {
            assay: Some("ChIP".to_string()),
            ..FilterCriteria::default()
        },
        ..ConfigFile::default()
    };
    let resolved = ConfigLoader::resolve(file, overrides);

    assert_eq!(resolved.query.as_deref(), Some("h3k4me3 AND mouse"));
    assert_eq!(resolved.raw_data_pattern, "*_RAW.csv");
    assert!(resolved.discard_soft);
    assert_eq!(resolved.filters.organism.as_deref(), Some("mus"));
    assert_eq!(resolved.filters.assay.as_deref(), Some("ChIP"));
    assert_eq!(resolved.filters.target.as_deref(), Some("oocyte"));
    assert_eq!(resolved.combined_output, Utf8PathBuf::from("combined_raw_data.csv"));
    assert_eq!(resolved.accession_list, HarvestConfig::default().accession_list);
}

#[test]
fn explicit_missing_config_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    let err = ConfigLoader::load(path.to_str()).unwrap_err();
    assert_matches!(err, HarvestError::MissingConfig(_));
}

#[test]
fn malformed_config_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("bad.json");
    std::fs::write(&path, "{ not json").unwrap();
    let err = ConfigLoader::load(path.to_str()).unwrap_err();
    assert_matches!(err, HarvestError::ConfigParse(_));
}
