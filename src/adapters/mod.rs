// Adapters layer: concrete implementations for external systems (storage, http, normalizer).

pub mod http;
pub mod normalizer;
#[cfg(feature = "s3")]
pub mod s3;
pub mod storage;
