//! Read side of the transformed data: loads the outputs of the transforms and
//! answers evidence queries against them.

use crate::core::publish::{fetch_published, object_key};
use crate::domain::model::{EvidenceResponse, Source, SourceDataType, SourceMeta, TumorTypeSummary};
use crate::domain::ports::Storage;
use crate::utils::error::{EvidenceError, Result};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;

const HOTSPOTS_FILE_PREFIX: &str = "cancer_hotspots_";
const PUBLISHED_HOTSPOTS_PREFIX: &str = "mutation_hotspots_";

fn unavailable(source: Source, message: impl Into<String>) -> EvidenceError {
    EvidenceError::SourceUnavailableError {
        label: source.label().to_string(),
        message: message.into(),
    }
}

/// Mutation hotspots keyed by VRS id.
#[derive(Debug, Clone)]
pub struct CancerHotspots {
    data: Map<String, Value>,
    source_meta: SourceMeta,
}

impl CancerHotspots {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let data: Map<String, Value> = serde_json::from_slice(bytes)?;
        Ok(Self {
            data,
            source_meta: Source::CancerHotspots.meta(),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            tracing::error!("The supplied path at {} does not exist.", path.display());
            return Err(unavailable(
                Source::CancerHotspots,
                format!("{} does not exist", path.display()),
            ));
        }
        Self::from_bytes(&std::fs::read(path)?)
    }

    /// Loads the newest `cancer_hotspots_<date>.json` in `storage`.
    pub async fn from_storage<S: Storage>(storage: &S) -> Result<Self> {
        let prefix = format!("{}/{}", Source::CancerHotspots.dir_name(), HOTSPOTS_FILE_PREFIX);
        let latest = storage
            .list(&prefix)
            .await?
            .into_iter()
            .filter(|path| path.ends_with(".json"))
            .last()
            .ok_or_else(|| {
                unavailable(
                    Source::CancerHotspots,
                    "no transformed Cancer Hotspots data found",
                )
            })?;

        tracing::debug!("Loading Cancer Hotspots data from {}", storage.location(&latest));
        Self::from_bytes(&storage.read_file(&latest).await?)
    }

    /// Loads the newest published hotspots object, unpacking it into `local`
    /// unless a copy is already there.
    pub async fn fetch_latest<R: Storage, S: Storage>(
        remote: &R,
        prefix: &str,
        local: &S,
    ) -> Result<Self> {
        let dir = Source::CancerHotspots.dir_name();
        let key_prefix = match prefix.trim_matches('/') {
            "" => format!("{}/{}", dir, PUBLISHED_HOTSPOTS_PREFIX),
            p => format!("{}/{}/{}", p, dir, PUBLISHED_HOTSPOTS_PREFIX),
        };

        let Some(key) = remote.list(&key_prefix).await?.pop() else {
            tracing::warn!(
                "Could not find published Cancer Hotspots data at {}",
                remote.location(&key_prefix)
            );
            return Err(unavailable(
                Source::CancerHotspots,
                "no published Cancer Hotspots data found",
            ));
        };

        let zip_name = key.rsplit('/').next().unwrap_or(&key);
        let file_name = zip_name.strip_suffix(".zip").unwrap_or(zip_name);
        let local_path = format!("{}/{}", dir, file_name);
        let bytes = fetch_published(remote, &key, local, &local_path).await?;
        Self::from_bytes(&bytes)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn mutation_hotspots(&self, vrs_variation_id: &str) -> EvidenceResponse {
        let data = match self.data.get(vrs_variation_id) {
            Some(Value::Object(record)) => record.clone(),
            _ => Map::new(),
        };
        EvidenceResponse::new(data, self.source_meta.clone())
    }
}

#[derive(Debug, Clone)]
struct TumorTypeCases {
    tumor_type: String,
    sample_ids: Vec<String>,
}

/// MSK-IMPACT 2017 mutations indexed by gene, plus the tumor type case lists.
#[derive(Debug, Clone)]
pub struct CBioPortal {
    samples_by_gene: HashMap<String, HashSet<String>>,
    case_lists: Vec<TumorTypeCases>,
    source_meta: SourceMeta,
}

fn column(headers: &csv::StringRecord, name: &str, file: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| EvidenceError::ProcessingError {
            message: format!("column {} missing from {}", name, file),
        })
}

impl CBioPortal {
    pub fn from_csv(mutations: &[u8], case_lists: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(mutations);
        let headers = reader.headers()?.clone();
        let gene_idx = column(&headers, "Hugo_Symbol", "mutations")?;
        let sample_idx = column(&headers, "Tumor_Sample_Barcode", "mutations")?;

        let mut samples_by_gene: HashMap<String, HashSet<String>> = HashMap::new();
        for row in reader.records() {
            let row = row?;
            if let (Some(gene), Some(sample)) = (row.get(gene_idx), row.get(sample_idx)) {
                samples_by_gene
                    .entry(gene.to_string())
                    .or_default()
                    .insert(sample.trim().to_string());
            }
        }

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(case_lists);
        let headers = reader.headers()?.clone();
        let name_idx = column(&headers, "case_list_name", "case lists")?;
        let ids_idx = column(&headers, "case_list_ids", "case lists")?;

        let mut lists = Vec::new();
        for row in reader.records() {
            let row = row?;
            let Some(name) = row.get(name_idx) else {
                continue;
            };
            if !name.contains(':') {
                continue;
            }
            let tumor_type = name.rsplit(": ").next().unwrap_or(name).to_string();
            let sample_ids = row
                .get(ids_idx)
                .unwrap_or_default()
                .split('\t')
                .map(|id| id.trim().to_string())
                .collect();
            lists.push(TumorTypeCases {
                tumor_type,
                sample_ids,
            });
        }

        Ok(Self {
            samples_by_gene,
            case_lists: lists,
            source_meta: Source::CBioPortal.meta(),
        })
    }

    pub fn from_files(mutations: &Path, case_lists: &Path) -> Result<Self> {
        for path in [mutations, case_lists] {
            if !path.is_file() {
                tracing::error!("The supplied path at {} does not exist.", path.display());
                return Err(unavailable(
                    Source::CBioPortal,
                    format!("{} does not exist", path.display()),
                ));
            }
        }
        Self::from_csv(&std::fs::read(mutations)?, &std::fs::read(case_lists)?)
    }

    pub fn file_name(data_type: SourceDataType) -> String {
        format!("{}_{}.csv", Source::CBioPortal.version(), data_type.as_str())
    }

    fn local_path(data_type: SourceDataType) -> String {
        format!("{}/{}", Source::CBioPortal.dir_name(), Self::file_name(data_type))
    }

    /// Loads the transformed CSVs from `storage`.
    pub async fn from_storage<S: Storage>(storage: &S) -> Result<Self> {
        let mut loaded = Vec::with_capacity(2);
        for data_type in [SourceDataType::Mutations, SourceDataType::CaseLists] {
            let path = Self::local_path(data_type);
            if !storage.exists(&path).await? {
                return Err(unavailable(
                    Source::CBioPortal,
                    format!("no transformed data at {}", storage.location(&path)),
                ));
            }
            loaded.push(storage.read_file(&path).await?);
        }
        Self::from_csv(&loaded[0], &loaded[1])
    }

    /// Loads the published CSVs, unpacking them into `local` unless copies
    /// are already there.
    pub async fn fetch<R: Storage, S: Storage>(remote: &R, prefix: &str, local: &S) -> Result<Self> {
        let mut loaded = Vec::with_capacity(2);
        for data_type in [SourceDataType::Mutations, SourceDataType::CaseLists] {
            let file_name = Self::file_name(data_type);
            let key = object_key(prefix, Source::CBioPortal, &file_name);
            let bytes = fetch_published(remote, &key, local, &Self::local_path(data_type)).await?;
            tracing::info!(
                "Successfully retrieved published cBioPortal {} data",
                data_type.as_str()
            );
            loaded.push(bytes);
        }
        Self::from_csv(&loaded[0], &loaded[1])
    }

    /// Per tumor type, how many samples carry a mutation in `hgnc_symbol`.
    pub fn cancer_types_summary(&self, hgnc_symbol: &str) -> EvidenceResponse {
        let symbol = hgnc_symbol.trim().to_uppercase();
        let Some(mutated) = self.samples_by_gene.get(&symbol).filter(|s| !s.is_empty()) else {
            return EvidenceResponse::empty(self.source_meta.clone());
        };

        let mut data = Map::new();
        for cases in &self.case_lists {
            let total = cases.sample_ids.len() as u64;
            let count = cases
                .sample_ids
                .iter()
                .filter(|id| mutated.contains(id.as_str()))
                .count() as u64;
            let summary = TumorTypeSummary::new(count, total);
            data.insert(
                cases.tumor_type.clone(),
                json!({
                    "count": summary.count,
                    "total": summary.total,
                    "percent_altered": summary.percent_altered,
                }),
            );
        }

        EvidenceResponse::new(data, self.source_meta.clone())
    }
}
