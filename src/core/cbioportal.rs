//! cBioPortal transform for the MSK-IMPACT 2017 study.
//!
//! The study archive is downloaded once into the ETL data directory, then its
//! case lists and mutation table are flattened into two CSV files under
//! `cbioportal/` in the data directory.

use crate::adapters::http::{build_client, download};
use crate::core::etl::persist_outputs;
use crate::domain::model::{
    LoadReport, OutputArtifact, RawTable, Record, Source, SourceDataType, TransformResult,
};
use crate::domain::ports::{Pipeline, Storage};
use crate::utils::error::{EvidenceError, Result};
use flate2::read::GzDecoder;
use reqwest::Client;
use std::io::{Cursor, Read};

pub const DEFAULT_DATA_URL: &str =
    "https://cbioportal-datahub.s3.amazonaws.com/msk_impact_2017.tar.gz";
pub const DEFAULT_STUDY_ID: &str = "msk_impact_2017";
pub const CASE_LISTS_TABLE: &str = "case_lists";
pub const MUTATIONS_TABLE: &str = "mutations";

const DROPPED_CASE_LIST_KEYS: &[&str] = &["cancer_study_identifier"];

/// Parses a `key: value` case list file into a single record.
///
/// Returns the keys in file order alongside the record so callers can build
/// a stable header.
pub fn parse_case_list(content: &str) -> (Vec<String>, Record) {
    let mut keys = Vec::new();
    let mut record = Record::new();

    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            tracing::debug!("Skipping case list line without a key: {}", line);
            continue;
        };
        let key = key.trim();
        if key.is_empty() || DROPPED_CASE_LIST_KEYS.contains(&key) {
            continue;
        }
        if !record.data.contains_key(key) {
            keys.push(key.to_string());
        }
        record.insert(key, serde_json::Value::String(value.trim().to_string()));
    }

    (keys, record)
}

/// Builds the case list table from `(file name, content)` pairs. Headers are
/// the union of keys in first-seen order.
pub fn case_lists_table(files: &[(String, String)]) -> RawTable {
    let mut table = RawTable::new(CASE_LISTS_TABLE);
    for (name, content) in files {
        let (keys, record) = parse_case_list(content);
        if record.data.is_empty() {
            tracing::warn!("Case list {} is empty", name);
            continue;
        }
        for key in keys {
            if !table.headers.contains(&key) {
                table.headers.push(key);
            }
        }
        table.rows.push(record);
    }
    table
}

/// Parses the tab-delimited mutation table; `#` metadata lines are skipped.
pub fn parse_mutations(content: &[u8]) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .flexible(true)
        .quoting(false)
        .from_reader(content);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut table = RawTable::new(MUTATIONS_TABLE);
    for row in reader.records() {
        table.records.push(row?);
    }
    table.headers = headers;
    Ok(table)
}

/// Pulls the case lists and mutation table for `study_id` out of a `.tar.gz`.
pub fn read_study_archive(bytes: &[u8], study_id: &str) -> Result<Vec<RawTable>> {
    let mut archive = tar::Archive::new(GzDecoder::new(Cursor::new(bytes)));
    let case_list_dir = format!("{}/case_lists/", study_id);
    let mutations_file = format!("{}/data_mutations.txt", study_id);

    let mut case_list_files = Vec::new();
    let mut mutations: Option<Vec<u8>> = None;

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path()?.to_string_lossy().into_owned();
        let path = path.trim_start_matches("./").to_string();
        let file_name = path.rsplit('/').next().unwrap_or_default();

        if path.starts_with(&case_list_dir) && file_name.starts_with("case_list_") {
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            case_list_files.push((path.clone(), String::from_utf8_lossy(&content).into_owned()));
        } else if path == mutations_file {
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            mutations = Some(content);
        }
    }

    let Some(mutations) = mutations else {
        return Err(EvidenceError::ProcessingError {
            message: format!("{} not found in study archive", mutations_file),
        });
    };
    if case_list_files.is_empty() {
        return Err(EvidenceError::ProcessingError {
            message: format!("no case lists found under {}", case_list_dir),
        });
    }

    case_list_files.sort();
    tracing::debug!(
        "Found {} case lists and {} bytes of mutations",
        case_list_files.len(),
        mutations.len()
    );

    Ok(vec![
        case_lists_table(&case_list_files),
        parse_mutations(&mutations)?,
    ])
}

fn field(record: &Record, header: &str) -> String {
    match record.data.get(header) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

pub fn table_to_csv(table: &RawTable) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.headers)?;
    for record in &table.rows {
        writer.write_record(table.headers.iter().map(|h| field(record, h)))?;
    }
    // Short rows are padded and long rows cut to the header width
    for record in &table.records {
        writer.write_record((0..table.headers.len()).map(|i| record.get(i).unwrap_or("")))?;
    }
    writer.into_inner().map_err(|e| EvidenceError::ProcessingError {
        message: format!("failed to finish CSV output: {}", e),
    })
}

#[derive(Debug, Clone)]
pub struct CBioPortalSettings {
    pub data_url: String,
    pub study_id: String,
    pub download_timeout_secs: u64,
}

impl Default for CBioPortalSettings {
    fn default() -> Self {
        Self {
            data_url: DEFAULT_DATA_URL.to_string(),
            study_id: DEFAULT_STUDY_ID.to_string(),
            download_timeout_secs: 60,
        }
    }
}

pub struct CBioPortalPipeline<S: Storage> {
    data_storage: S,
    etl_storage: S,
    settings: CBioPortalSettings,
    client: Client,
}

impl<S: Storage> CBioPortalPipeline<S> {
    pub fn new(data_storage: S, etl_storage: S, settings: CBioPortalSettings) -> Result<Self> {
        let client = build_client(settings.download_timeout_secs)?;
        Ok(Self {
            data_storage,
            etl_storage,
            settings,
            client,
        })
    }

    /// Archive location relative to the ETL data directory.
    pub fn archive_path(&self) -> String {
        let file_name = self
            .settings
            .data_url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}.tar.gz", self.settings.study_id));
        format!("{}/{}", Source::CBioPortal.dir_name(), file_name)
    }

    pub fn output_path(&self, data_type: SourceDataType) -> String {
        format!(
            "{}/{}_{}.csv",
            Source::CBioPortal.dir_name(),
            self.settings.study_id,
            data_type.as_str()
        )
    }

    async fn download_data(&self, path: &str) -> Result<Vec<u8>> {
        if self.etl_storage.exists(path).await? {
            tracing::debug!("cBioPortal archive already present at {}", path);
            return self.etl_storage.read_file(path).await;
        }

        match download(&self.client, &self.settings.data_url).await {
            Ok(bytes) => {
                self.etl_storage.write_file(path, &bytes).await?;
                Ok(bytes)
            }
            Err(EvidenceError::DownloadError { status, .. }) => {
                tracing::error!(
                    "Unable to download cBioPortal data. Received status code: {}",
                    status
                );
                Err(EvidenceError::SourceUnavailableError {
                    label: Source::CBioPortal.label().to_string(),
                    message: "Downloading cBioPortal data was unsuccessful".to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for CBioPortalPipeline<S> {
    async fn extract(&self) -> Result<Vec<RawTable>> {
        let path = self.archive_path();
        let bytes = self.download_data(&path).await?;
        read_study_archive(&bytes, &self.settings.study_id)
    }

    async fn transform(&self, data: Vec<RawTable>) -> Result<TransformResult> {
        let mut outputs = Vec::new();
        let mut records = 0;

        for table in &data {
            let data_type = match table.name.as_str() {
                CASE_LISTS_TABLE => SourceDataType::CaseLists,
                MUTATIONS_TABLE => SourceDataType::Mutations,
                other => {
                    tracing::warn!("Ignoring unexpected cBioPortal table {}", other);
                    continue;
                }
            };
            records += table.len();
            outputs.push(OutputArtifact {
                path: self.output_path(data_type),
                data_type,
                bytes: table_to_csv(table)?,
            });
        }

        Ok(TransformResult {
            source: Source::CBioPortal,
            records_read: records,
            records_written: records,
            records_skipped: 0,
            outputs,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<LoadReport> {
        let report = persist_outputs(&self.data_storage, result).await?;
        tracing::info!("Successfully transformed cBioPortal data.");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::LocalStorage;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    fn study_archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    const CASE_LIST_COLORECTAL: &str = "cancer_study_identifier: msk_impact_2017\n\
stable_id: msk_impact_2017_colorectal\n\
case_list_name: Tumor Type: Colorectal Cancer\n\
case_list_description: All tumors with cancer type Colorectal Cancer\n\
case_list_ids: P-0000001-T01-IM3\tP-0000002-T01-IM3\tP-0000003-T01-IM3\n";

    const CASE_LIST_ALL: &str = "cancer_study_identifier: msk_impact_2017\n\
stable_id: msk_impact_2017_all\n\
case_list_name: All samples\n\
case_list_description: All samples (3 samples)\n\
case_list_category: all_cases_in_study\n\
case_list_ids: P-0000001-T01-IM3\tP-0000002-T01-IM3\tP-0000004-T01-IM3\n";

    const MUTATIONS: &str = "#version 2.4\n\
Hugo_Symbol\tEntrez_Gene_Id\tTumor_Sample_Barcode\tHGVSp_Short\n\
BRAF\t673\tP-0000001-T01-IM3\tp.V600E\n\
KRAS\t3845\tP-0000002-T01-IM3\tp.G12D\n\
BRAF\t673\tP-0000004-T01-IM3\n";

    #[test]
    fn test_parse_case_list_drops_study_identifier() {
        let (keys, record) = parse_case_list(CASE_LIST_COLORECTAL);

        assert_eq!(
            keys,
            vec![
                "stable_id",
                "case_list_name",
                "case_list_description",
                "case_list_ids"
            ]
        );
        assert!(!record.data.contains_key("cancer_study_identifier"));
        assert_eq!(
            record.text("case_list_name").as_deref(),
            Some("Tumor Type: Colorectal Cancer")
        );
        assert_eq!(
            field(&record, "case_list_ids"),
            "P-0000001-T01-IM3\tP-0000002-T01-IM3\tP-0000003-T01-IM3"
        );
    }

    #[test]
    fn test_case_lists_table_unions_headers() {
        let files = vec![
            ("a".to_string(), CASE_LIST_COLORECTAL.to_string()),
            ("b".to_string(), CASE_LIST_ALL.to_string()),
        ];
        let table = case_lists_table(&files);

        assert_eq!(table.len(), 2);
        assert_eq!(table.headers.last().unwrap(), "case_list_category");
    }

    #[test]
    fn test_parse_mutations_skips_metadata_and_tolerates_short_rows() {
        let table = parse_mutations(MUTATIONS.as_bytes()).unwrap();

        assert_eq!(table.headers[0], "Hugo_Symbol");
        assert_eq!(table.len(), 3);
        assert!(table.rows.is_empty());
        assert_eq!(table.records[1].get(0), Some("KRAS"));
        assert_eq!(table.records[2].len(), 3);
        assert_eq!(table.records[2].get(3), None);
    }

    #[test]
    fn test_read_study_archive_finds_study_files() {
        let archive = study_archive(&[
            ("msk_impact_2017/case_lists/case_list_colorectal.txt", CASE_LIST_COLORECTAL),
            ("msk_impact_2017/case_lists/case_list_all.txt", CASE_LIST_ALL),
            ("msk_impact_2017/data_mutations.txt", MUTATIONS),
            ("msk_impact_2017/meta_study.txt", "type_of_cancer: mixed\n"),
        ]);

        let tables = read_study_archive(&archive, DEFAULT_STUDY_ID).unwrap();
        assert_eq!(tables[0].name, CASE_LISTS_TABLE);
        assert_eq!(tables[0].len(), 2);
        assert_eq!(tables[1].name, MUTATIONS_TABLE);
        assert_eq!(tables[1].len(), 3);
    }

    #[test]
    fn test_read_study_archive_requires_mutations() {
        let archive = study_archive(&[(
            "msk_impact_2017/case_lists/case_list_all.txt",
            CASE_LIST_ALL,
        )]);
        assert!(read_study_archive(&archive, DEFAULT_STUDY_ID).is_err());
    }

    #[test]
    fn test_table_to_csv_fills_missing_fields() {
        let table = parse_mutations(MUTATIONS.as_bytes()).unwrap();
        let csv_text = String::from_utf8(table_to_csv(&table).unwrap()).unwrap();
        let lines: Vec<&str> = csv_text.lines().collect();

        assert_eq!(lines[0], "Hugo_Symbol,Entrez_Gene_Id,Tumor_Sample_Barcode,HGVSp_Short");
        assert_eq!(lines[3], "BRAF,673,P-0000004-T01-IM3,");
    }

    #[test]
    fn test_table_to_csv_cuts_rows_wider_than_header() {
        let content = "Hugo_Symbol\tTumor_Sample_Barcode\n\
TP53\tP-0000007-T01-IM3\tunexpected\textra\n\
EGFR\n";
        let table = parse_mutations(content.as_bytes()).unwrap();
        assert_eq!(table.records[0].len(), 4);

        let csv_text = String::from_utf8(table_to_csv(&table).unwrap()).unwrap();
        assert_eq!(
            csv_text.lines().collect::<Vec<_>>(),
            vec![
                "Hugo_Symbol,Tumor_Sample_Barcode",
                "TP53,P-0000007-T01-IM3",
                "EGFR,",
            ]
        );
    }

    #[tokio::test]
    async fn test_pipeline_downloads_once_and_writes_csvs() {
        let server = MockServer::start();
        let archive = study_archive(&[
            ("msk_impact_2017/case_lists/case_list_colorectal.txt", CASE_LIST_COLORECTAL),
            ("msk_impact_2017/data_mutations.txt", MUTATIONS),
        ]);
        let mock = server.mock(|when, then| {
            when.method(GET).path("/msk_impact_2017.tar.gz");
            then.status(200).body(archive.clone());
        });

        let data_dir = TempDir::new().unwrap();
        let etl_dir = TempDir::new().unwrap();
        let settings = CBioPortalSettings {
            data_url: server.url("/msk_impact_2017.tar.gz"),
            ..CBioPortalSettings::default()
        };
        let pipeline = CBioPortalPipeline::new(
            LocalStorage::new(data_dir.path()),
            LocalStorage::new(etl_dir.path()),
            settings,
        )
        .unwrap();

        for _ in 0..2 {
            let tables = pipeline.extract().await.unwrap();
            let result = pipeline.transform(tables).await.unwrap();
            let report = pipeline.load(result).await.unwrap();
            assert_eq!(report.written.len(), 2);
        }

        mock.assert_hits(1);
        assert!(etl_dir.path().join("cbioportal/msk_impact_2017.tar.gz").exists());
        assert!(data_dir
            .path()
            .join("cbioportal/msk_impact_2017_case_lists.csv")
            .exists());
        assert!(data_dir
            .path()
            .join("cbioportal/msk_impact_2017_mutations.csv")
            .exists());
    }

    #[tokio::test]
    async fn test_pipeline_reports_unsuccessful_download() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/msk_impact_2017.tar.gz");
            then.status(403);
        });

        let data_dir = TempDir::new().unwrap();
        let etl_dir = TempDir::new().unwrap();
        let settings = CBioPortalSettings {
            data_url: server.url("/msk_impact_2017.tar.gz"),
            ..CBioPortalSettings::default()
        };
        let pipeline = CBioPortalPipeline::new(
            LocalStorage::new(data_dir.path()),
            LocalStorage::new(etl_dir.path()),
            settings,
        )
        .unwrap();

        let err = pipeline.extract().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "cBioPortal source unavailable: Downloading cBioPortal data was unsuccessful"
        );
    }
}
