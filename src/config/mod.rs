pub mod toml_config;

pub use toml_config::EvidenceConfig;

use crate::adapters::normalizer::NormalizerSettings;
use crate::core::cancer_hotspots::CancerHotspotsSettings;
use crate::core::cbioportal::CBioPortalSettings;
use crate::domain::ports::ConfigProvider;
use std::time::Duration;

pub fn normalizer_settings<C: ConfigProvider + ?Sized>(config: &C) -> NormalizerSettings {
    NormalizerSettings {
        base_url: config.normalizer_url().to_string(),
        path: config.normalizer_path().to_string(),
        timeout_secs: config.normalizer_timeout_secs(),
        retry_attempts: config.retry_attempts(),
        retry_delay: Duration::from_millis(config.retry_delay_ms()),
    }
}

pub fn cancer_hotspots_settings<C: ConfigProvider + ?Sized>(config: &C) -> CancerHotspotsSettings {
    CancerHotspotsSettings {
        data_url: config.cancer_hotspots_url().to_string(),
        concurrent_requests: config.concurrent_requests(),
        download_timeout_secs: config.cancer_hotspots_timeout_secs(),
    }
}

pub fn cbioportal_settings<C: ConfigProvider + ?Sized>(config: &C) -> CBioPortalSettings {
    CBioPortalSettings {
        data_url: config.cbioportal_url().to_string(),
        study_id: config.cbioportal_study_id().to_string(),
        download_timeout_secs: config.cbioportal_timeout_secs(),
    }
}

#[cfg(feature = "cli")]
mod cli {
    use super::EvidenceConfig;
    use crate::core::orchestrator::TransformSelection;
    use crate::utils::error::Result;
    use crate::utils::validation::Validate;
    use clap::Parser;
    use std::path::PathBuf;

    #[derive(Debug, Clone, Parser)]
    #[command(name = "evidence-etl")]
    #[command(about = "Transforms Cancer Hotspots and cBioPortal data into normalized evidence")]
    #[command(version)]
    pub struct CliConfig {
        /// Transform Cancer Hotspots data
        #[arg(long = "transform_cancer_hotspots")]
        pub transform_cancer_hotspots: bool,

        /// Transform cBioPortal data
        #[arg(long = "transform_cbioportal")]
        pub transform_cbioportal: bool,

        /// Transform all source data, currently cBioPortal and Cancer Hotspots
        #[arg(long = "transform_all")]
        pub transform_all: bool,

        /// Print the Cancer Hotspots evidence for a VRS variation id
        #[arg(long = "mutation_hotspots", value_name = "VRS_ID")]
        pub mutation_hotspots: Option<String>,

        /// Print the cBioPortal cancer types summary for a gene
        #[arg(long = "cancer_types_summary", value_name = "HGNC_SYMBOL")]
        pub cancer_types_summary: Option<String>,

        /// TOML settings file
        #[arg(long, value_name = "FILE")]
        pub config: Option<PathBuf>,

        #[arg(long, env = "DATA_DIR_PATH")]
        pub data_dir: Option<String>,

        #[arg(long, env = "ETL_DATA_DIR_PATH")]
        pub etl_data_dir: Option<String>,

        #[arg(long, env = "VARIATION_NORMALIZER_URL")]
        pub normalizer_url: Option<String>,

        #[arg(long)]
        pub concurrent_requests: Option<usize>,

        /// Upload transformed files to object storage
        #[arg(long)]
        pub publish: bool,

        /// Answer lookups from published data instead of the data directory
        #[arg(long)]
        pub from_published: bool,

        #[arg(long)]
        pub s3_bucket: Option<String>,

        #[arg(long)]
        pub s3_prefix: Option<String>,

        #[arg(long)]
        pub s3_region: Option<String>,

        #[arg(long, value_name = "FILE")]
        pub log_file: Option<PathBuf>,

        /// Log to the console as JSON
        #[arg(long)]
        pub json_logs: bool,

        #[arg(short, long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Log CPU and memory usage per phase")]
        pub monitor: bool,
    }

    impl CliConfig {
        pub fn selection(&self) -> TransformSelection {
            TransformSelection::from_flags(
                self.transform_cancer_hotspots,
                self.transform_cbioportal,
                self.transform_all,
            )
        }

        pub fn has_lookup(&self) -> bool {
            self.mutation_hotspots.is_some() || self.cancer_types_summary.is_some()
        }

        /// Settings file (or defaults) with command line overrides applied,
        /// then validated.
        pub fn resolve(&self) -> Result<EvidenceConfig> {
            let mut config = match &self.config {
                Some(path) => EvidenceConfig::from_file(path)?,
                None => EvidenceConfig::default(),
            };

            if let Some(dir) = &self.data_dir {
                config.storage.data_dir = dir.clone();
            }
            if let Some(dir) = &self.etl_data_dir {
                config.storage.etl_data_dir = dir.clone();
            }
            if let Some(url) = &self.normalizer_url {
                config.normalizer.url = url.clone();
            }
            if let Some(n) = self.concurrent_requests {
                config.normalizer.concurrent_requests = n;
            }
            if let Some(bucket) = &self.s3_bucket {
                config.publish.bucket = bucket.clone();
            }
            if let Some(prefix) = &self.s3_prefix {
                config.publish.prefix = prefix.clone();
            }
            if let Some(region) = &self.s3_region {
                config.publish.region = region.clone();
            }
            if let Some(file) = &self.log_file {
                config.logging.file = Some(file.display().to_string());
            }
            config.logging.verbose |= self.verbose;
            config.logging.json |= self.json_logs;
            config.logging.monitor |= self.monitor;

            config.validate()?;
            Ok(config)
        }
    }

}

#[cfg(feature = "cli")]
pub use cli::CliConfig;
