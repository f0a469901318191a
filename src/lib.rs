pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::EvidenceConfig;

pub use adapters::normalizer::{HttpNormalizer, NormalizerSettings};
pub use adapters::storage::LocalStorage;
#[cfg(feature = "s3")]
pub use adapters::s3::S3Storage;

pub use core::etl::EtlEngine;
pub use core::evidence::{CBioPortal, CancerHotspots};
pub use core::orchestrator::{TransformOrchestrator, TransformSelection};
pub use utils::error::{EvidenceError, Result};
