//! Zipped uploads of transformed outputs to object storage, and the reverse
//! fetch used by the evidence readers.

use crate::domain::model::{LoadReport, Source};
use crate::domain::ports::Storage;
use crate::utils::error::{EvidenceError, Result};
use std::io::{Cursor, Read, Write};
use zip::write::{FileOptions, ZipWriter};
use zip::ZipArchive;

pub const DEFAULT_BUCKET: &str = "vicc-normalizers";
pub const DEFAULT_PREFIX: &str = "evidence_normalization";
pub const DEFAULT_REGION: &str = "us-east-2";

pub fn zip_file(entry_name: &str, bytes: &[u8]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file::<_, ()>(entry_name, FileOptions::default())?;
    zip.write_all(bytes)?;
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Returns the first regular file in a zip archive.
pub fn unzip_file(bytes: &[u8]) -> Result<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let mut content = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut content)?;
        return Ok((name, content));
    }
    Err(EvidenceError::ProcessingError {
        message: "zip archive contains no files".to_string(),
    })
}

/// Name a local output is published under. Cancer Hotspots files are
/// published as `mutation_hotspots_<date>.json`.
pub fn published_name(source: Source, file_name: &str) -> String {
    match source {
        Source::CancerHotspots => match file_name.strip_prefix("cancer_hotspots_") {
            Some(rest) => format!("mutation_hotspots_{}", rest),
            None => file_name.to_string(),
        },
        Source::CBioPortal => file_name.to_string(),
    }
}

pub fn object_key(prefix: &str, source: Source, file_name: &str) -> String {
    let name = format!("{}.zip", published_name(source, file_name));
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/{}", source.dir_name(), name)
    } else {
        format!("{}/{}/{}", prefix, source.dir_name(), name)
    }
}

/// Downloads `key` from `remote` and unpacks it to `local_path` unless that
/// file is already present.
pub async fn fetch_published<R: Storage, S: Storage>(
    remote: &R,
    key: &str,
    local: &S,
    local_path: &str,
) -> Result<Vec<u8>> {
    if local.exists(local_path).await? {
        tracing::info!("Latest published data already exists at {}", local_path);
        return local.read_file(local_path).await;
    }

    tracing::info!("Retrieving published data from {}", remote.location(key));
    let archive = remote.read_file(key).await?;
    let (entry, content) = unzip_file(&archive)?;
    tracing::debug!("Unpacked {} ({} bytes) from {}", entry, content.len(), key);
    local.write_file(local_path, &content).await?;
    Ok(content)
}

pub struct Publisher<R: Storage> {
    remote: R,
    prefix: String,
}

impl<R: Storage> Publisher<R> {
    pub fn new(remote: R, prefix: impl Into<String>) -> Self {
        Self {
            remote,
            prefix: prefix.into(),
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Uploads every file in `report`, zipped, and returns the remote
    /// locations.
    pub async fn publish<S: Storage>(&self, local: &S, report: &LoadReport) -> Result<Vec<String>> {
        let mut published = Vec::with_capacity(report.written.len());

        for path in &report.written {
            let file_name = path.rsplit('/').next().unwrap_or(path);
            let bytes = local.read_file(path).await?;
            let archive = zip_file(&published_name(report.source, file_name), &bytes)?;
            let key = object_key(&self.prefix, report.source, file_name);

            self.remote.write_file(&key, &archive).await?;
            let location = self.remote.location(&key);
            tracing::info!("Published {} to {}", path, location);
            published.push(location);
        }

        Ok(published)
    }
}
