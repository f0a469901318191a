pub mod cancer_hotspots;
pub mod cbioportal;
pub mod etl;
pub mod evidence;
pub mod orchestrator;
pub mod publish;

pub use crate::domain::model::{LoadReport, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
