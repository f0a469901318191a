use crate::domain::model::{LoadReport, Source, TransformResult};
use crate::domain::ports::{Pipeline, Storage};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// Writes every output of a transform and reports where it landed.
pub async fn persist_outputs<S: Storage>(storage: &S, result: TransformResult) -> Result<LoadReport> {
    let mut written = Vec::with_capacity(result.outputs.len());
    let mut locations = Vec::with_capacity(result.outputs.len());

    for output in &result.outputs {
        storage.write_file(&output.path, &output.bytes).await?;
        tracing::debug!("Wrote {} bytes to {}", output.bytes.len(), output.path);
        written.push(output.path.clone());
        locations.push(storage.location(&output.path));
    }

    Ok(LoadReport {
        source: result.source,
        records_read: result.records_read,
        records_written: result.records_written,
        records_skipped: result.records_skipped,
        written,
        locations,
    })
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    source: Source,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P, source: Source) -> Self {
        Self::new_with_monitoring(pipeline, source, false)
    }

    pub fn new_with_monitoring(pipeline: P, source: Source, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            source,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<LoadReport> {
        let label = self.source.label();
        tracing::info!("Starting {} transform", label);
        self.monitor.log_stats(label, "start");

        let raw_data = self.pipeline.extract().await?;
        let rows: usize = raw_data.iter().map(|t| t.len()).sum();
        tracing::info!("Extracted {} rows from {} tables", rows, raw_data.len());
        self.monitor.log_stats(label, "extract");

        let transformed = self.pipeline.transform(raw_data).await?;
        tracing::info!(
            "Transformed {} records ({} skipped)",
            transformed.records_written,
            transformed.records_skipped
        );
        self.monitor.log_stats(label, "transform");

        let report = self.pipeline.load(transformed).await?;
        for location in &report.locations {
            tracing::info!("Output saved to: {}", location);
        }
        self.monitor.log_stats(label, "load");
        self.monitor.log_final_stats(label);

        Ok(report)
    }
}
