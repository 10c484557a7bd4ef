use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::HarvestError;

static GSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^GSE[0-9]+$").expect("static GSE pattern"));

// Series records in the `gds` database are numbered `2` + zero padding + series number.
static SERIES_UID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^20+([1-9][0-9]*)$").expect("static UID pattern"));

/// A GEO series accession such as `GSE102902`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GseAccession(String);

impl GseAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Maps a GEO DataSets UID to the series accession it stands for.
    ///
    /// Returns `None` for UIDs of other record classes (datasets, samples,
    /// platforms), which the search may also return.
    pub fn from_gds_uid(uid: &str) -> Option<Self> {
        let captures = SERIES_UID_RE.captures(uid.trim())?;
        let number = captures.get(1)?.as_str();
        Some(Self(format!("GSE{number}")))
    }
}

impl fmt::Display for GseAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GseAccession {
    type Err = HarvestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        if !GSE_RE.is_match(&normalized) {
            return Err(HarvestError::InvalidAccession(value.to_string()));
        }
        Ok(Self(normalized))
    }
}
