use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HarvestError {
    #[error("invalid GEO series accession: {0}")]
    InvalidAccession(String),

    #[error("a search query is required")]
    #[diagnostic(help("pass the query as an argument, e.g. `geo-harvest run \"h3k4me3 AND mouse\"`"))]
    MissingQuery,

    #[error("config file not found: {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("GEO search request failed: {0}")]
    GeoHttp(String),

    #[error("GEO search returned status {status}: {message}")]
    GeoStatus { status: u16, message: String },

    #[error("unexpected GEO search response: {0}")]
    GeoPayload(String),

    #[error("required tool not found: {0}")]
    #[diagnostic(help("install it with `pip install geofetch` and make sure it is on PATH"))]
    MissingTool(String),

    #[error("{tool} failed for {accession}: {message}")]
    ToolFailed {
        tool: String,
        accession: String,
        message: String,
    },

    #[error("{tool} timed out after {seconds}s for {accession}")]
    ToolTimeout {
        tool: String,
        accession: String,
        seconds: u64,
    },

    #[error("invalid file name pattern {pattern}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("failed to read CSV {path}: {message}")]
    CsvRead { path: PathBuf, message: String },

    #[error("failed to write CSV {path}: {message}")]
    CsvWrite { path: PathBuf, message: String },

    #[error("invalid target directory name: {0}")]
    InvalidTarget(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
