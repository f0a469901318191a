use crate::core::publish::{DEFAULT_BUCKET, DEFAULT_PREFIX, DEFAULT_REGION};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{EvidenceError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings file for a run. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    pub normalizer: NormalizerConfig,
    pub sources: SourcesConfig,
    pub storage: StorageConfig,
    pub publish: PublishConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub url: String,
    pub path: String,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub concurrent_requests: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            path: crate::adapters::normalizer::DEFAULT_NORMALIZE_PATH.to_string(),
            timeout_seconds: 30,
            retry_attempts: 2,
            retry_delay_ms: 500,
            concurrent_requests: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub cancer_hotspots: CancerHotspotsSourceConfig,
    pub cbioportal: CBioPortalSourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CancerHotspotsSourceConfig {
    pub data_url: String,
    pub download_timeout_seconds: u64,
}

impl Default for CancerHotspotsSourceConfig {
    fn default() -> Self {
        Self {
            data_url: crate::core::cancer_hotspots::DEFAULT_DATA_URL.to_string(),
            download_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CBioPortalSourceConfig {
    pub data_url: String,
    pub study_id: String,
    pub download_timeout_seconds: u64,
}

impl Default for CBioPortalSourceConfig {
    fn default() -> Self {
        Self {
            data_url: crate::core::cbioportal::DEFAULT_DATA_URL.to_string(),
            study_id: crate::core::cbioportal::DEFAULT_STUDY_ID.to_string(),
            download_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    pub etl_data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            etl_data_dir: "./data/etl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub bucket: String,
    pub prefix: String,
    pub region: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            region: DEFAULT_REGION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbose: bool,
    pub json: bool,
    pub file: Option<String>,
    pub monitor: bool,
}

impl EvidenceConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;

        toml::from_str(&processed).map_err(|e| EvidenceError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value. Unset variables are
    /// left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| EvidenceError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("normalizer.url", &self.normalizer.url)?;
        validation::validate_non_empty_string("normalizer.path", &self.normalizer.path)?;
        validation::validate_range(
            "normalizer.concurrent_requests",
            self.normalizer.concurrent_requests,
            1,
            100,
        )?;
        validation::validate_range("normalizer.retry_attempts", self.normalizer.retry_attempts, 0, 10)?;
        validation::validate_range("normalizer.timeout_seconds", self.normalizer.timeout_seconds, 1, 600)?;

        validation::validate_url(
            "sources.cancer_hotspots.data_url",
            &self.sources.cancer_hotspots.data_url,
        )?;
        validation::validate_url("sources.cbioportal.data_url", &self.sources.cbioportal.data_url)?;
        validation::validate_non_empty_string(
            "sources.cbioportal.study_id",
            &self.sources.cbioportal.study_id,
        )?;

        validation::validate_path("storage.data_dir", &self.storage.data_dir)?;
        validation::validate_path("storage.etl_data_dir", &self.storage.etl_data_dir)?;

        validation::validate_s3_bucket_name("publish.bucket", &self.publish.bucket)?;
        validation::validate_aws_region("publish.region", &self.publish.region)?;

        if let Some(file) = &self.logging.file {
            validation::validate_path("logging.file", file)?;
        }

        Ok(())
    }
}

impl ConfigProvider for EvidenceConfig {
    fn normalizer_url(&self) -> &str {
        &self.normalizer.url
    }

    fn normalizer_path(&self) -> &str {
        &self.normalizer.path
    }

    fn normalizer_timeout_secs(&self) -> u64 {
        self.normalizer.timeout_seconds
    }

    fn retry_attempts(&self) -> u32 {
        self.normalizer.retry_attempts
    }

    fn retry_delay_ms(&self) -> u64 {
        self.normalizer.retry_delay_ms
    }

    fn data_dir(&self) -> &str {
        &self.storage.data_dir
    }

    fn etl_data_dir(&self) -> &str {
        &self.storage.etl_data_dir
    }

    fn concurrent_requests(&self) -> usize {
        self.normalizer.concurrent_requests
    }

    fn cancer_hotspots_url(&self) -> &str {
        &self.sources.cancer_hotspots.data_url
    }

    fn cancer_hotspots_timeout_secs(&self) -> u64 {
        self.sources.cancer_hotspots.download_timeout_seconds
    }

    fn cbioportal_url(&self) -> &str {
        &self.sources.cbioportal.data_url
    }

    fn cbioportal_study_id(&self) -> &str {
        &self.sources.cbioportal.study_id
    }

    fn cbioportal_timeout_secs(&self) -> u64 {
        self.sources.cbioportal.download_timeout_seconds
    }
}

impl Validate for EvidenceConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = EvidenceConfig::from_toml_str("").unwrap();

        assert_eq!(config.normalizer.url, "http://localhost:8000");
        assert_eq!(config.concurrent_requests(), 5);
        assert_eq!(config.storage.data_dir, "./data");
        assert_eq!(config.publish.bucket, "vicc-normalizers");
        assert_eq!(config.publish.prefix, "evidence_normalization");
        assert_eq!(config.publish.region, "us-east-2");
        assert_eq!(config.cbioportal_study_id(), "msk_impact_2017");
        assert_eq!(config.cancer_hotspots_timeout_secs(), 60);
        assert_eq!(config.cbioportal_timeout_secs(), 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_sections() {
        let toml_content = r#"
[normalizer]
url = "https://normalize.example.org"
concurrent_requests = 10
retry_attempts = 0

[sources.cancer_hotspots]
data_url = "https://mirror.example.org/hotspots_v2.xls"

[storage]
data_dir = "/srv/evidence"

[logging]
verbose = true
file = "evidence_etl.log"
"#;

        let config = EvidenceConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.normalizer_url(), "https://normalize.example.org");
        assert_eq!(config.concurrent_requests(), 10);
        assert_eq!(config.retry_attempts(), 0);
        assert_eq!(
            config.cancer_hotspots_url(),
            "https://mirror.example.org/hotspots_v2.xls"
        );
        assert_eq!(config.data_dir(), "/srv/evidence");
        assert_eq!(config.etl_data_dir(), "./data/etl");
        assert!(config.logging.verbose);
        assert_eq!(config.logging.file.as_deref(), Some("evidence_etl.log"));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("EVIDENCE_TEST_NORMALIZER", "https://normalizer.test");

        let toml_content = r#"
[normalizer]
url = "${EVIDENCE_TEST_NORMALIZER}"
path = "${EVIDENCE_TEST_UNSET_PATH}"
"#;

        let config = EvidenceConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.normalizer.url, "https://normalizer.test");
        assert_eq!(config.normalizer.path, "${EVIDENCE_TEST_UNSET_PATH}");

        std::env::remove_var("EVIDENCE_TEST_NORMALIZER");
    }

    #[test]
    fn test_config_validation() {
        let config = EvidenceConfig::from_toml_str("[normalizer]\nurl = \"invalid-url\"\n").unwrap();
        assert!(config.validate().is_err());

        let config =
            EvidenceConfig::from_toml_str("[normalizer]\nconcurrent_requests = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config = EvidenceConfig::from_toml_str("[publish]\nbucket = \"Bad_Bucket\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = EvidenceConfig::from_toml_str("[normalizer\nurl = 1").unwrap_err();
        assert!(matches!(err, EvidenceError::ConfigError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[storage]\netl_data_dir = \"/tmp/evidence-etl\"\n")
            .unwrap();

        let config = EvidenceConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.etl_data_dir(), "/tmp/evidence-etl");
    }
}
