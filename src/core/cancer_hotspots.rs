//! Cancer Hotspots transform.
//!
//! Downloads the hotspots workbook (<https://www.cancerhotspots.org/#/download>),
//! normalizes every SNV and INDEL hotspot through the variation normalizer and
//! writes `cancer_hotspots/cancer_hotspots_<YYYYMMDD>.json`, an object keyed by
//! VRS id. Run it whenever either Cancer Hotspots or the normalizer releases a
//! new version.

use crate::adapters::http::{build_client, download};
use crate::core::etl::persist_outputs;
use crate::domain::model::{
    HotspotRecord, LoadReport, OutputArtifact, RawTable, Record, Source, SourceDataType,
    TransformResult,
};
use crate::domain::ports::{NormalizedVariation, Pipeline, Storage, VariationNormalizer};
use crate::utils::error::{EvidenceError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::time::Instant;

pub const DEFAULT_DATA_URL: &str = "https://www.cancerhotspots.org/files/hotspots_v2.xls";
pub const SNV_SHEET: &str = "SNV-hotspots";
pub const INDEL_SHEET: &str = "INDEL-hotspots";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotspotKind {
    Snv,
    Indel,
}

impl HotspotKind {
    pub fn from_sheet(name: &str) -> Option<Self> {
        match name {
            SNV_SHEET => Some(HotspotKind::Snv),
            INDEL_SHEET => Some(HotspotKind::Indel),
            _ => None,
        }
    }
}

/// A validated workbook row, ready to be sent to the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct HotspotRow {
    pub kind: HotspotKind,
    pub hugo_symbol: String,
    pub reference: Option<String>,
    pub position: String,
    pub amino_acid: String,
    pub observations: i64,
    pub q_value: f64,
    pub total_observations: i64,
}

impl HotspotRow {
    pub fn from_record(record: &Record, kind: HotspotKind) -> std::result::Result<Self, String> {
        let required = |key: &str| record.text(key).ok_or_else(|| format!("missing {}", key));

        let hugo_symbol = required("Hugo_Symbol")?;
        let position = required("Amino_Acid_Position")?;
        let alt = required("Variant_Amino_Acid")?;
        let reference = match kind {
            HotspotKind::Snv => Some(required("ref")?),
            HotspotKind::Indel => None,
        };

        // Variant_Amino_Acid is "<amino acid change>:<observations>"
        let (amino_acid, observations) = match alt.split(':').collect::<Vec<_>>().as_slice() {
            [aa, count] if !aa.is_empty() => {
                let count = count
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| format!("invalid observation count in '{}'", alt))?;
                (aa.to_string(), count)
            }
            _ => return Err(format!("malformed Variant_Amino_Acid '{}'", alt)),
        };

        let q_value = record
            .number("qvalue")
            .ok_or_else(|| "missing qvalue".to_string())?;
        let total_observations = record
            .integer("Mutation_Count")
            .ok_or_else(|| "missing Mutation_Count".to_string())?;

        Ok(Self {
            kind,
            hugo_symbol,
            reference,
            position,
            amino_acid,
            observations,
            q_value,
            total_observations,
        })
    }

    fn codon(&self) -> String {
        match &self.reference {
            Some(reference) => format!("{}{}", reference, self.position),
            None => self.position.clone(),
        }
    }

    /// Free-text description sent to the normalizer, e.g. `BRAF V600E`.
    pub fn query(&self) -> String {
        match self.kind {
            HotspotKind::Snv => format!("{} {}{}", self.hugo_symbol, self.codon(), self.amino_acid),
            HotspotKind::Indel => format!("{} {}", self.hugo_symbol, self.amino_acid),
        }
    }

    pub fn to_hotspot_record(&self) -> HotspotRecord {
        let mutation = match self.kind {
            HotspotKind::Snv => format!("{}{}", self.codon(), self.amino_acid),
            HotspotKind::Indel => self.amino_acid.clone(),
        };
        HotspotRecord {
            variation: self.query(),
            codon: self.codon(),
            mutation,
            q_value: self.q_value,
            observations: self.observations,
            total_observations: self.total_observations,
        }
    }
}

fn cell_to_value(cell: &Data) -> serde_json::Value {
    match cell {
        Data::Empty | Data::Error(_) => serde_json::Value::Null,
        Data::Int(i) => serde_json::Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Data::String(s) => serde_json::Value::String(s.clone()),
        Data::Bool(b) => serde_json::Value::Bool(*b),
        other => serde_json::Value::String(other.to_string()),
    }
}

/// Reads the SNV and INDEL sheets of the hotspots workbook.
pub fn read_workbook(bytes: Vec<u8>) -> Result<Vec<RawTable>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let mut tables = Vec::new();

    for sheet in [SNV_SHEET, INDEL_SHEET] {
        let range = workbook.worksheet_range(sheet)?;
        let mut rows = range.rows();

        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect(),
            None => {
                return Err(EvidenceError::ProcessingError {
                    message: format!("sheet {} has no header row", sheet),
                })
            }
        };

        let mut table = RawTable::new(sheet);
        for row in rows {
            if row.iter().all(|cell| matches!(cell, Data::Empty)) {
                continue;
            }
            let mut record = Record::new();
            for (header, cell) in headers.iter().zip(row.iter()) {
                if !header.is_empty() {
                    record.insert(header.clone(), cell_to_value(cell));
                }
            }
            table.rows.push(record);
        }
        table.headers = headers;

        tracing::debug!("Read {} rows from sheet {}", table.len(), sheet);
        tables.push(table);
    }

    Ok(tables)
}

#[derive(Debug, Clone)]
pub struct CancerHotspotsSettings {
    pub data_url: String,
    pub concurrent_requests: usize,
    pub download_timeout_secs: u64,
}

impl Default for CancerHotspotsSettings {
    fn default() -> Self {
        Self {
            data_url: DEFAULT_DATA_URL.to_string(),
            concurrent_requests: 5,
            download_timeout_secs: 60,
        }
    }
}

pub struct CancerHotspotsPipeline<S: Storage, N: VariationNormalizer> {
    storage: S,
    normalizer: N,
    settings: CancerHotspotsSettings,
    client: Client,
    run_date: NaiveDate,
}

impl<S: Storage, N: VariationNormalizer> CancerHotspotsPipeline<S, N> {
    pub fn new(storage: S, normalizer: N, settings: CancerHotspotsSettings) -> Result<Self> {
        let client = build_client(settings.download_timeout_secs)?;
        Ok(Self {
            storage,
            normalizer,
            settings,
            client,
            run_date: chrono::Utc::now().date_naive(),
        })
    }

    /// Overrides the date stamped into the output file name.
    pub fn with_run_date(mut self, run_date: NaiveDate) -> Self {
        self.run_date = run_date;
        self
    }

    /// Workbook location relative to the data directory.
    pub fn workbook_path(&self) -> String {
        let file_name = self
            .settings
            .data_url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("hotspots_v2.xls");
        format!("{}/{}", Source::CancerHotspots.dir_name(), file_name)
    }

    pub fn output_path(&self) -> String {
        format!(
            "{}/cancer_hotspots_{}.json",
            Source::CancerHotspots.dir_name(),
            self.run_date.format("%Y%m%d")
        )
    }

    async fn download_data(&self, path: &str) -> Result<()> {
        if self.storage.exists(path).await? {
            tracing::debug!("Cancer Hotspots workbook already present at {}", path);
            return Ok(());
        }

        match download(&self.client, &self.settings.data_url).await {
            Ok(bytes) => self.storage.write_file(path, &bytes).await,
            Err(EvidenceError::DownloadError { status, .. }) => {
                tracing::error!(
                    "Unable to download Cancer Hotspots data. Received status code: {}",
                    status
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, N: VariationNormalizer> Pipeline for CancerHotspotsPipeline<S, N> {
    async fn extract(&self) -> Result<Vec<RawTable>> {
        let path = self.workbook_path();
        self.download_data(&path).await?;

        if !self.storage.exists(&path).await? {
            return Err(EvidenceError::SourceUnavailableError {
                label: Source::CancerHotspots.label().to_string(),
                message: "Downloading Cancer Hotspots data was unsuccessful".to_string(),
            });
        }

        let bytes = self.storage.read_file(&path).await?;
        read_workbook(bytes)
    }

    async fn transform(&self, data: Vec<RawTable>) -> Result<TransformResult> {
        let start = Instant::now();
        let mut records_read = 0;
        let mut records_skipped = 0;
        let mut rows = Vec::new();

        for table in &data {
            let Some(kind) = HotspotKind::from_sheet(&table.name) else {
                tracing::warn!("Ignoring unexpected sheet {}", table.name);
                continue;
            };
            for (index, record) in table.rows.iter().enumerate() {
                records_read += 1;
                match HotspotRow::from_record(record, kind) {
                    Ok(row) => rows.push(row),
                    Err(reason) => {
                        let err = EvidenceError::MalformedRecordError {
                            table: table.name.clone(),
                            row: index + 1,
                            reason,
                        };
                        tracing::warn!("{}", err);
                        records_skipped += 1;
                    }
                }
            }
        }

        tracing::info!("Normalizing Cancer Hotspots data...");
        let normalizer = &self.normalizer;
        let results: Vec<(HotspotRow, Result<Option<NormalizedVariation>>)> = stream::iter(rows)
            .map(|row| async move {
                let result = normalizer.normalize(&row.query()).await;
                (row, result)
            })
            .buffered(self.settings.concurrent_requests.max(1))
            .collect()
            .await;

        let mut transformed: BTreeMap<String, HotspotRecord> = BTreeMap::new();
        for (row, result) in results {
            match result {
                Ok(Some(variation)) => {
                    if transformed.contains_key(&variation.id) {
                        tracing::debug!(
                            "duplicate vrs_id ({}) for variation ({})",
                            variation.id,
                            row.query()
                        );
                    }
                    transformed.insert(variation.id, row.to_hotspot_record());
                }
                Ok(None) => {
                    tracing::warn!("variation-normalizer unable to normalize: {}", row.query());
                    records_skipped += 1;
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    records_skipped += 1;
                }
            }
        }

        tracing::info!(
            "Transformed Cancer Hotspots data in {:.2} s",
            start.elapsed().as_secs_f64()
        );

        let bytes = serde_json::to_vec(&transformed)?;
        Ok(TransformResult {
            source: Source::CancerHotspots,
            records_read,
            records_written: transformed.len(),
            records_skipped,
            outputs: vec![OutputArtifact {
                path: self.output_path(),
                data_type: SourceDataType::MutationHotspots,
                bytes,
            }],
        })
    }

    async fn load(&self, result: TransformResult) -> Result<LoadReport> {
        let report = persist_outputs(&self.storage, result).await?;
        tracing::info!("Successfully transformed Cancer Hotspots data.");
        Ok(report)
    }
}
