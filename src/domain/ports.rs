use crate::domain::model::{LoadReport, RawTable, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
    /// Paths starting with `prefix`, sorted by name.
    fn list(&self, prefix: &str) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
    /// Display form of a path, e.g. a filesystem path or `s3://bucket/key`.
    fn location(&self, path: &str) -> String;
}

/// Run settings, whichever layer they came from.
pub trait ConfigProvider: Send + Sync {
    fn normalizer_url(&self) -> &str;
    fn normalizer_path(&self) -> &str;
    fn normalizer_timeout_secs(&self) -> u64;
    fn retry_attempts(&self) -> u32;
    fn retry_delay_ms(&self) -> u64;
    fn data_dir(&self) -> &str;
    fn etl_data_dir(&self) -> &str;
    fn concurrent_requests(&self) -> usize;
    fn cancer_hotspots_url(&self) -> &str;
    fn cancer_hotspots_timeout_secs(&self) -> u64;
    fn cbioportal_url(&self) -> &str;
    fn cbioportal_study_id(&self) -> &str;
    fn cbioportal_timeout_secs(&self) -> u64;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<RawTable>>;
    async fn transform(&self, data: Vec<RawTable>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<LoadReport>;
}

/// Canonical form of a variant description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedVariation {
    /// VRS identifier, `ga4gh:VA.<digest>`.
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub variation_type: Option<String>,
}

#[async_trait]
pub trait VariationNormalizer: Send + Sync {
    /// `Ok(None)` when the service understood the request but could not
    /// normalize the description.
    async fn normalize(&self, query: &str) -> Result<Option<NormalizedVariation>>;
}
