use crate::utils::canonical::to_canonical_string;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One row of source data, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Cell rendered as text. Whole numbers lose their fractional part so a
    /// spreadsheet position of `600.0` reads back as `600`.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.data.get(key)? {
            serde_json::Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(i.to_string())
                } else {
                    let f = n.as_f64()?;
                    if f.fract() == 0.0 && f.abs() < 1e15 {
                        Some(format!("{}", f as i64))
                    } else {
                        Some(f.to_string())
                    }
                }
            }
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.data.get(key)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.data.get(key)? {
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Rows read from one sheet or file, with headers in source order.
///
/// Delimited sources keep their rows positional in `records`, lined up with
/// `headers`; sheets that need typed cells use keyed `rows`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Record>,
    pub records: Vec<csv::StringRecord>,
}

impl RawTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len() + self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "Cancer Hotspots")]
    CancerHotspots,
    #[serde(rename = "cBioPortal")]
    CBioPortal,
}

impl Source {
    pub fn label(&self) -> &'static str {
        match self {
            Source::CancerHotspots => "Cancer Hotspots",
            Source::CBioPortal => "cBioPortal",
        }
    }

    /// Directory name used for this source under the data directory and
    /// the object storage prefix.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Source::CancerHotspots => "cancer_hotspots",
            Source::CBioPortal => "cbioportal",
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            Source::CancerHotspots => "2",
            Source::CBioPortal => "msk_impact_2017",
        }
    }

    pub fn meta(&self) -> SourceMeta {
        SourceMeta {
            label: *self,
            version: Some(self.version().to_string()),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceDataType {
    MutationHotspots,
    CaseLists,
    Mutations,
}

impl SourceDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceDataType::MutationHotspots => "mutation_hotspots",
            SourceDataType::CaseLists => "case_lists",
            SourceDataType::Mutations => "mutations",
        }
    }

    pub fn source(&self) -> Source {
        match self {
            SourceDataType::MutationHotspots => Source::CancerHotspots,
            SourceDataType::CaseLists | SourceDataType::Mutations => Source::CBioPortal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceMeta {
    pub label: Source,
    pub version: Option<String>,
}

/// A normalized Cancer Hotspots entry, keyed by VRS id in the output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotRecord {
    pub variation: String,
    pub codon: String,
    pub mutation: String,
    pub q_value: f64,
    pub observations: i64,
    pub total_observations: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TumorTypeSummary {
    pub count: u64,
    pub total: u64,
    pub percent_altered: f64,
}

impl TumorTypeSummary {
    pub fn new(count: u64, total: u64) -> Self {
        let percent_altered = if total == 0 {
            0.0
        } else {
            count as f64 / total as f64 * 100.0
        };
        Self {
            count,
            total,
            percent_altered,
        }
    }
}

pub const EVIDENCE_ID_PREFIX: &str = "normalize.evidence:";

/// Evidence returned for a query against a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceResponse {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub data: serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "source_meta_")]
    pub source_meta: SourceMeta,
}

impl EvidenceResponse {
    /// Builds a response and assigns its content id when `data` is non-empty.
    pub fn new(data: serde_json::Map<String, serde_json::Value>, source_meta: SourceMeta) -> Self {
        let mut resp = Self {
            id: None,
            data,
            source_meta,
        };
        if !resp.data.is_empty() {
            resp.id = Some(resp.content_id());
        }
        resp
    }

    pub fn empty(source_meta: SourceMeta) -> Self {
        Self::new(serde_json::Map::new(), source_meta)
    }

    /// md5 over the canonical JSON of the id-less response.
    pub fn content_id(&self) -> String {
        let blob = serde_json::json!({
            "id": serde_json::Value::Null,
            "data": serde_json::Value::Object(self.data.clone()),
            "source_meta_": {
                "label": self.source_meta.label.label(),
                "version": self.source_meta.version,
            },
        });
        let digest = Md5::digest(to_canonical_string(&blob).as_bytes());
        format!("{}{}", EVIDENCE_ID_PREFIX, hex::encode(digest))
    }
}

/// A file produced by a transform, relative to the data directory.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputArtifact {
    pub path: String,
    pub data_type: SourceDataType,
    pub bytes: Vec<u8>,
}

impl OutputArtifact {
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub source: Source,
    pub records_read: usize,
    pub records_written: usize,
    pub records_skipped: usize,
    pub outputs: Vec<OutputArtifact>,
}

/// Outcome of a persisted transform.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub source: Source,
    pub records_read: usize,
    pub records_written: usize,
    pub records_skipped: usize,
    /// Paths relative to the data directory.
    pub written: Vec<String>,
    /// Human-readable locations of the written files.
    pub locations: Vec<String>,
}
