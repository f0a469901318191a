use anyhow::Context;
use clap::Parser;
use evidence_etl::config::{cancer_hotspots_settings, cbioportal_settings, normalizer_settings};
use evidence_etl::core::orchestrator::{JobOutcome, TransformSelection};
use evidence_etl::domain::model::EvidenceResponse;
use evidence_etl::domain::ports::ConfigProvider;
use evidence_etl::utils::error::ErrorSeverity;
use evidence_etl::utils::logger;
use evidence_etl::{
    CBioPortal, CancerHotspots, CliConfig, EvidenceConfig, EvidenceError, HttpNormalizer,
    LocalStorage, TransformOrchestrator,
};
use std::path::Path;

fn report_error(e: &EvidenceError) {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
}

fn print_response(resp: &EvidenceResponse) -> evidence_etl::Result<()> {
    println!("{}", serde_json::to_string_pretty(resp)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Configuration validation failed: {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    logger::init_cli_logger(
        config.logging.verbose,
        config.logging.json,
        config.logging.file.as_deref().map(Path::new),
    )
    .context("failed to initialise logging")?;

    tracing::info!("Starting evidence-etl");
    tracing::debug!("Resolved config: {:?}", config);

    let selection = cli.selection();
    if selection.is_empty() && !cli.has_lookup() {
        tracing::warn!(
            "Nothing to do. Pass --transform_cbioportal, --transform_cancer_hotspots or --transform_all"
        );
        return Ok(());
    }

    let mut worst: Option<ErrorSeverity> = None;

    if !selection.is_empty() {
        worst = worst.max(run_transforms(&cli, &config, selection).await?);
    }

    if cli.has_lookup() {
        if let Err(e) = run_lookups(&cli, &config).await {
            report_error(&e);
            worst = worst.max(Some(e.severity()));
        }
    }

    if let Some(severity) = worst {
        let exit_code = severity.exit_code();
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run_transforms(
    cli: &CliConfig,
    config: &EvidenceConfig,
    selection: TransformSelection,
) -> anyhow::Result<Option<ErrorSeverity>> {
    let data_storage = LocalStorage::new(config.data_dir());
    let etl_storage = LocalStorage::new(config.etl_data_dir());
    let normalizer = HttpNormalizer::new(normalizer_settings(config))
        .context("failed to build the variation-normalizer client")?;

    if config.logging.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let orchestrator = TransformOrchestrator::new(data_storage, etl_storage, normalizer)
        .with_hotspots_settings(cancer_hotspots_settings(config))
        .with_cbioportal_settings(cbioportal_settings(config))
        .with_monitoring(config.logging.monitor);

    let outcomes = orchestrator.run(selection).await;

    let mut worst = None;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => {
                for location in &report.locations {
                    println!("✅ {} data saved to: {}", outcome.source, location);
                }
            }
            Err(e) => {
                eprintln!("❌ {}", e.user_friendly_message());
                worst = worst.max(Some(e.severity()));
            }
        }
    }

    if cli.publish {
        worst = worst.max(publish_outcomes(config, orchestrator.data_storage(), &outcomes).await);
    }

    Ok(worst)
}

#[cfg(feature = "s3")]
async fn remote_storage(config: &EvidenceConfig) -> evidence_etl::S3Storage {
    evidence_etl::S3Storage::from_env(config.publish.bucket.clone(), config.publish.region.clone())
        .await
}

#[cfg(feature = "s3")]
async fn publish_outcomes(
    config: &EvidenceConfig,
    local: &LocalStorage,
    outcomes: &[JobOutcome],
) -> Option<ErrorSeverity> {
    use evidence_etl::core::publish::Publisher;

    let publisher = Publisher::new(remote_storage(config).await, config.publish.prefix.clone());
    let mut worst = None;
    for report in outcomes.iter().filter_map(|o| o.result.as_ref().ok()) {
        match publisher.publish(local, report).await {
            Ok(locations) => {
                for location in locations {
                    println!("☁️  Published {}", location);
                }
            }
            Err(e) => {
                report_error(&e);
                worst = worst.max(Some(e.severity()));
            }
        }
    }
    worst
}

#[cfg(not(feature = "s3"))]
async fn publish_outcomes(
    _config: &EvidenceConfig,
    _local: &LocalStorage,
    _outcomes: &[JobOutcome],
) -> Option<ErrorSeverity> {
    let e = EvidenceError::ConfigError {
        message: "--publish requires a build with the `s3` feature".to_string(),
    };
    report_error(&e);
    Some(e.severity())
}

#[cfg(feature = "s3")]
async fn load_hotspots(
    cli: &CliConfig,
    config: &EvidenceConfig,
    local: &LocalStorage,
) -> evidence_etl::Result<CancerHotspots> {
    if cli.from_published {
        let remote = remote_storage(config).await;
        CancerHotspots::fetch_latest(&remote, &config.publish.prefix, local).await
    } else {
        CancerHotspots::from_storage(local).await
    }
}

#[cfg(feature = "s3")]
async fn load_cbioportal(
    cli: &CliConfig,
    config: &EvidenceConfig,
    local: &LocalStorage,
) -> evidence_etl::Result<CBioPortal> {
    if cli.from_published {
        let remote = remote_storage(config).await;
        CBioPortal::fetch(&remote, &config.publish.prefix, local).await
    } else {
        CBioPortal::from_storage(local).await
    }
}

#[cfg(not(feature = "s3"))]
fn published_unsupported(cli: &CliConfig) -> evidence_etl::Result<()> {
    if cli.from_published {
        return Err(EvidenceError::ConfigError {
            message: "--from-published requires a build with the `s3` feature".to_string(),
        });
    }
    Ok(())
}

#[cfg(not(feature = "s3"))]
async fn load_hotspots(
    cli: &CliConfig,
    _config: &EvidenceConfig,
    local: &LocalStorage,
) -> evidence_etl::Result<CancerHotspots> {
    published_unsupported(cli)?;
    CancerHotspots::from_storage(local).await
}

#[cfg(not(feature = "s3"))]
async fn load_cbioportal(
    cli: &CliConfig,
    _config: &EvidenceConfig,
    local: &LocalStorage,
) -> evidence_etl::Result<CBioPortal> {
    published_unsupported(cli)?;
    CBioPortal::from_storage(local).await
}

async fn run_lookups(cli: &CliConfig, config: &EvidenceConfig) -> evidence_etl::Result<()> {
    let local = LocalStorage::new(config.data_dir());

    if let Some(vrs_id) = &cli.mutation_hotspots {
        let hotspots = load_hotspots(cli, config, &local).await?;
        tracing::debug!("Loaded {} Cancer Hotspots records", hotspots.len());
        print_response(&hotspots.mutation_hotspots(vrs_id))?;
    }

    if let Some(symbol) = &cli.cancer_types_summary {
        let cbioportal = load_cbioportal(cli, config, &local).await?;
        print_response(&cbioportal.cancer_types_summary(symbol))?;
    }

    Ok(())
}
