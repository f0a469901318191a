use crate::core::cancer_hotspots::{CancerHotspotsPipeline, CancerHotspotsSettings};
use crate::core::cbioportal::{CBioPortalPipeline, CBioPortalSettings};
use crate::core::etl::EtlEngine;
use crate::domain::model::{LoadReport, Source};
use crate::domain::ports::{Storage, VariationNormalizer};
use crate::utils::error::{ErrorSeverity, Result};

/// Which sources a run transforms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformSelection {
    pub cbioportal: bool,
    pub cancer_hotspots: bool,
}

impl TransformSelection {
    pub fn from_flags(cancer_hotspots: bool, cbioportal: bool, all: bool) -> Self {
        Self {
            cbioportal: cbioportal || all,
            cancer_hotspots: cancer_hotspots || all,
        }
    }

    pub fn all() -> Self {
        Self::from_flags(true, true, true)
    }

    pub fn is_empty(&self) -> bool {
        !self.cbioportal && !self.cancer_hotspots
    }

    /// Sources in run order: cBioPortal first, then Cancer Hotspots.
    pub fn sources(&self) -> Vec<Source> {
        let mut sources = Vec::with_capacity(2);
        if self.cbioportal {
            sources.push(Source::CBioPortal);
        }
        if self.cancer_hotspots {
            sources.push(Source::CancerHotspots);
        }
        sources
    }
}

#[derive(Debug)]
pub struct JobOutcome {
    pub source: Source,
    pub result: Result<LoadReport>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Highest severity among failed jobs, if any failed.
pub fn worst_severity(outcomes: &[JobOutcome]) -> Option<ErrorSeverity> {
    outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().err())
        .map(|e| e.severity())
        .max()
}

/// Builds a pipeline per selected source and runs them one after another.
pub struct TransformOrchestrator<S, N>
where
    S: Storage + Clone,
    N: VariationNormalizer + Clone,
{
    data_storage: S,
    etl_storage: S,
    normalizer: N,
    hotspots: CancerHotspotsSettings,
    cbioportal: CBioPortalSettings,
    monitor_enabled: bool,
}

impl<S, N> TransformOrchestrator<S, N>
where
    S: Storage + Clone,
    N: VariationNormalizer + Clone,
{
    pub fn new(data_storage: S, etl_storage: S, normalizer: N) -> Self {
        Self {
            data_storage,
            etl_storage,
            normalizer,
            hotspots: CancerHotspotsSettings::default(),
            cbioportal: CBioPortalSettings::default(),
            monitor_enabled: false,
        }
    }

    pub fn with_hotspots_settings(mut self, settings: CancerHotspotsSettings) -> Self {
        self.hotspots = settings;
        self
    }

    pub fn with_cbioportal_settings(mut self, settings: CBioPortalSettings) -> Self {
        self.cbioportal = settings;
        self
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor_enabled = enabled;
        self
    }

    pub fn data_storage(&self) -> &S {
        &self.data_storage
    }

    pub async fn run_job(&self, source: Source) -> Result<LoadReport> {
        match source {
            Source::CancerHotspots => {
                let pipeline = CancerHotspotsPipeline::new(
                    self.data_storage.clone(),
                    self.normalizer.clone(),
                    self.hotspots.clone(),
                )?;
                EtlEngine::new_with_monitoring(pipeline, source, self.monitor_enabled)
                    .run()
                    .await
            }
            Source::CBioPortal => {
                let pipeline = CBioPortalPipeline::new(
                    self.data_storage.clone(),
                    self.etl_storage.clone(),
                    self.cbioportal.clone(),
                )?;
                EtlEngine::new_with_monitoring(pipeline, source, self.monitor_enabled)
                    .run()
                    .await
            }
        }
    }

    /// Runs every selected job. A failed job is logged and the next one
    /// still runs.
    pub async fn run(&self, selection: TransformSelection) -> Vec<JobOutcome> {
        let mut outcomes = Vec::new();
        for source in selection.sources() {
            let result = self.run_job(source).await;
            match &result {
                Ok(report) => tracing::info!(
                    "{} transform finished: {} read, {} written, {} skipped",
                    source,
                    report.records_read,
                    report.records_written,
                    report.records_skipped
                ),
                Err(e) => {
                    tracing::error!("{} transform failed: {}", source, e);
                    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
                }
            }
            outcomes.push(JobOutcome { source, result });
        }
        outcomes
    }
}
