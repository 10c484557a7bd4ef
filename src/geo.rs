use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::domain::GseAccession;
use crate::error::HarvestError;

pub const DEFAULT_RETMAX: u32 = 5000;

/// Turns a free-text query into GEO series accessions.
pub trait AccessionLister: Send + Sync {
    fn search(&self, query: &str) -> Result<Vec<GseAccession>, HarvestError>;
}

/// Queries the NCBI E-utilities `esearch` endpoint against GEO DataSets.
#[derive(Clone)]
pub struct EutilsHttpClient {
    client: Client,
    base_url: String,
    retmax: u32,
    api_key: Option<String>,
}

impl EutilsHttpClient {
    pub fn new(retmax: u32) -> Result<Self, HarvestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("geo-harvest/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| HarvestError::GeoHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| HarvestError::GeoHttp(err.to_string()))?;

        let api_key = std::env::var("NCBI_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(Self {
            client,
            base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            retmax,
            api_key,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl AccessionLister for EutilsHttpClient {
    fn search(&self, query: &str) -> Result<Vec<GseAccession>, HarvestError> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let term = series_term(query);
        let retmax = self.retmax.to_string();
        let mut request = self.client.get(url).query(&[
            ("db", "gds"),
            ("term", term.as_str()),
            ("retmax", retmax.as_str()),
            ("retmode", "json"),
        ]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("api_key", key.as_str())]);
        }

        let response = request
            .send()
            .map_err(|err| HarvestError::GeoHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "GEO search failed".to_string());
            return Err(HarvestError::GeoStatus { status, message });
        }
        let body = response
            .text()
            .map_err(|err| HarvestError::GeoHttp(err.to_string()))?;
        parse_search_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    esearchresult: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
    #[serde(rename = "ERROR")]
    error: Option<String>,
}

/// Restricts a query to series records, which is what `geofetch` consumes.
pub fn series_term(query: &str) -> String {
    format!("({}) AND gse[ETYP]", query.trim())
}

/// Extracts series accessions from an `esearch` JSON payload, keeping the
/// service's order and dropping duplicates and non-series UIDs.
pub fn parse_search_response(body: &str) -> Result<Vec<GseAccession>, HarvestError> {
    let envelope: SearchEnvelope =
        serde_json::from_str(body).map_err(|err| HarvestError::GeoPayload(err.to_string()))?;
    if let Some(message) = envelope.esearchresult.error {
        return Err(HarvestError::GeoPayload(message));
    }

    let mut seen = HashSet::new();
    let mut accessions = Vec::new();
    for uid in &envelope.esearchresult.idlist {
        if let Some(accession) = GseAccession::from_gds_uid(uid) {
            if seen.insert(accession.clone()) {
                accessions.push(accession);
            }
        }
    }
    Ok(accessions)
}

/// Writes one accession per line, creating parent directories.
pub fn write_accession_list(path: &Path, accessions: &[GseAccession]) -> Result<(), HarvestError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    }
    let content = accessions
        .iter()
        .map(|acc| format!("{acc}\n"))
        .collect::<String>();
    fs::write(path, content)
        .map_err(|err| HarvestError::Filesystem(format!("write {}: {err}", path.display())))
}

pub fn read_accession_list(path: &Path) -> Result<Vec<GseAccession>, HarvestError> {
    let content = fs::read_to_string(path)
        .map_err(|err| HarvestError::Filesystem(format!("read {}: {err}", path.display())))?;
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::parse::<GseAccession>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_payload_keeps_series_in_order() {
        let body = r#"{
            "header": {"type": "esearch", "version": "0.3"},
            "esearchresult": {
                "count": "4",
                "idlist": ["200102902", "100004567", "200000042", "200102902"]
            }
        }"#;
        let accessions = parse_search_response(body).unwrap();
        let ids = accessions.iter().map(GseAccession::as_str).collect::<Vec<_>>();
        assert_eq!(ids, vec!["GSE102902", "GSE42"]);
    }

    #[test]
    fn parse_payload_error() {
        let body = r#"{"esearchresult": {"ERROR": "Invalid query"}}"#;
        assert!(matches!(
            parse_search_response(body),
            Err(HarvestError::GeoPayload(_))
        ));
        assert!(parse_search_response("not json").is_err());
    }

    #[test]
    fn series_term_wraps_query() {
        assert_eq!(
            series_term(" h3k4me3 AND mouse "),
            "(h3k4me3 AND mouse) AND gse[ETYP]"
        );
    }
}
