use chrono::NaiveDate;
use evidence_etl::core::cancer_hotspots::{
    CancerHotspotsPipeline, CancerHotspotsSettings, INDEL_SHEET, SNV_SHEET,
};
use evidence_etl::core::cbioportal::CBioPortalSettings;
use evidence_etl::core::orchestrator::worst_severity;
use evidence_etl::core::publish::{Publisher, DEFAULT_PREFIX};
use evidence_etl::domain::model::{RawTable, Record, Source};
use evidence_etl::domain::ports::{Pipeline, Storage};
use evidence_etl::utils::error::ErrorSeverity;
use evidence_etl::{
    CBioPortal, CancerHotspots, HttpNormalizer, LocalStorage, NormalizerSettings,
    TransformOrchestrator, TransformSelection,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

const BRAF_V600E: &str = "ga4gh:VA.j4XnsLZcdzDIYa5pvvXM7t1wn9OITr0L";
const EGFR_DEL: &str = "ga4gh:VA.Wx3xjyXYDFGsIzKK2yXd0TEm8BwCKpVc";

fn study_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn normalizer_for(server: &MockServer) -> HttpNormalizer {
    HttpNormalizer::new(NormalizerSettings {
        base_url: server.base_url(),
        retry_attempts: 1,
        retry_delay: Duration::from_millis(1),
        ..NormalizerSettings::default()
    })
    .unwrap()
}

fn hotspot_tables() -> Vec<RawTable> {
    let mut snv = RawTable::new(SNV_SHEET);
    let mut braf = Record::new();
    braf.insert("Hugo_Symbol", json!("BRAF"));
    braf.insert("ref", json!("V"));
    braf.insert("Amino_Acid_Position", json!(600.0));
    braf.insert("Variant_Amino_Acid", json!("E:833"));
    braf.insert("qvalue", json!(0.0));
    braf.insert("Mutation_Count", json!(897.0));
    snv.rows.push(braf);

    let mut unknown = Record::new();
    unknown.insert("Hugo_Symbol", json!("FAKE1"));
    unknown.insert("ref", json!("A"));
    unknown.insert("Amino_Acid_Position", json!(1.0));
    unknown.insert("Variant_Amino_Acid", json!("B:2"));
    unknown.insert("qvalue", json!(0.5));
    unknown.insert("Mutation_Count", json!(2.0));
    snv.rows.push(unknown);

    let mut indel = RawTable::new(INDEL_SHEET);
    let mut egfr = Record::new();
    egfr.insert("Hugo_Symbol", json!("EGFR"));
    egfr.insert("Amino_Acid_Position", json!("746-750"));
    egfr.insert("Variant_Amino_Acid", json!("E746_A750del:340"));
    egfr.insert("qvalue", json!(1.2e-10));
    egfr.insert("Mutation_Count", json!(400));
    indel.rows.push(egfr);

    vec![snv, indel]
}

#[tokio::test]
async fn test_cancer_hotspots_transform_publish_and_lookup() {
    let server = MockServer::start();
    let braf = server.mock(|when, then| {
        when.method(GET)
            .path("/variation/normalize")
            .query_param("q", "BRAF V600E");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({"variation": {"id": BRAF_V600E, "type": "Allele"}, "warnings": []}));
    });
    let egfr = server.mock(|when, then| {
        when.method(GET)
            .path("/variation/normalize")
            .query_param("q", "EGFR E746_A750del");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({"variation": {"id": EGFR_DEL, "type": "Allele"}, "warnings": []}));
    });
    let unknown = server.mock(|when, then| {
        when.method(GET)
            .path("/variation/normalize")
            .query_param("q", "FAKE1 A1B");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({"variation": null, "warnings": ["Unable to normalize"]}));
    });

    let data_dir = TempDir::new().unwrap();
    let remote_dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(data_dir.path());

    let pipeline = CancerHotspotsPipeline::new(
        storage.clone(),
        normalizer_for(&server),
        CancerHotspotsSettings {
            concurrent_requests: 2,
            ..CancerHotspotsSettings::default()
        },
    )
    .unwrap()
    .with_run_date(NaiveDate::from_ymd_opt(2024, 5, 20).unwrap());

    let result = pipeline.transform(hotspot_tables()).await.unwrap();
    assert_eq!(result.records_read, 3);
    assert_eq!(result.records_written, 2);
    assert_eq!(result.records_skipped, 1);

    let report = pipeline.load(result).await.unwrap();
    braf.assert();
    egfr.assert();
    unknown.assert();
    assert_eq!(
        report.written,
        vec!["cancer_hotspots/cancer_hotspots_20240520.json".to_string()]
    );

    let hotspots = CancerHotspots::from_storage(&storage).await.unwrap();
    let resp = hotspots.mutation_hotspots(BRAF_V600E);
    assert_eq!(
        serde_json::Value::Object(resp.data.clone()),
        json!({
            "variation": "BRAF V600E",
            "codon": "V600",
            "mutation": "V600E",
            "q_value": 0.0,
            "observations": 833,
            "total_observations": 897
        })
    );
    assert!(resp.id.unwrap().starts_with("normalize.evidence:"));

    let indel = hotspots.mutation_hotspots(EGFR_DEL);
    assert_eq!(indel.data["codon"], "746-750");
    assert_eq!(indel.data["mutation"], "E746_A750del");

    // Publish, then read back through a fresh local directory
    let remote = LocalStorage::new(remote_dir.path());
    let publisher = Publisher::new(remote.clone(), DEFAULT_PREFIX);
    publisher.publish(&storage, &report).await.unwrap();
    assert!(remote
        .exists("evidence_normalization/cancer_hotspots/mutation_hotspots_20240520.json.zip")
        .await
        .unwrap());

    let fresh_dir = TempDir::new().unwrap();
    let fetched =
        CancerHotspots::fetch_latest(&remote, DEFAULT_PREFIX, &LocalStorage::new(fresh_dir.path()))
            .await
            .unwrap();
    assert_eq!(fetched.mutation_hotspots(BRAF_V600E).id, hotspots.mutation_hotspots(BRAF_V600E).id);
}

#[tokio::test]
async fn test_cbioportal_transform_and_cancer_types_summary() {
    let server = MockServer::start();
    let archive = study_archive(&[
        (
            "msk_impact_2017/case_lists/case_list_colorectal.txt",
            "cancer_study_identifier: msk_impact_2017\n\
stable_id: msk_impact_2017_colorectal\n\
case_list_name: Tumor Type: Colorectal Cancer\n\
case_list_description: All tumors with cancer type Colorectal Cancer\n\
case_list_ids: P-0000001-T01-IM3\tP-0000002-T01-IM3\tP-0000003-T01-IM3\tP-0000005-T01-IM3\n",
        ),
        (
            "msk_impact_2017/case_lists/case_list_melanoma.txt",
            "cancer_study_identifier: msk_impact_2017\n\
stable_id: msk_impact_2017_melanoma\n\
case_list_name: Tumor Type: Melanoma\n\
case_list_ids: P-0000004-T01-IM3\n",
        ),
        (
            "msk_impact_2017/case_lists/case_list_sequenced.txt",
            "cancer_study_identifier: msk_impact_2017\n\
stable_id: msk_impact_2017_sequenced\n\
case_list_name: Sequenced Tumors\n\
case_list_ids: P-0000001-T01-IM3\tP-0000004-T01-IM3\n",
        ),
        (
            "msk_impact_2017/data_mutations.txt",
            "#version 2.4\n\
Hugo_Symbol\tEntrez_Gene_Id\tTumor_Sample_Barcode\tHGVSp_Short\n\
BRAF\t673\tP-0000001-T01-IM3\tp.V600E\n\
BRAF\t673\tP-0000004-T01-IM3\tp.V600K\n\
KRAS\t3845\tP-0000002-T01-IM3\tp.G12D\n",
        ),
    ]);
    let download = server.mock(|when, then| {
        when.method(GET).path("/msk_impact_2017.tar.gz");
        then.status(200).body(archive.clone());
    });

    let data_dir = TempDir::new().unwrap();
    let etl_dir = TempDir::new().unwrap();
    let orchestrator = TransformOrchestrator::new(
        LocalStorage::new(data_dir.path()),
        LocalStorage::new(etl_dir.path()),
        normalizer_for(&server),
    )
    .with_cbioportal_settings(CBioPortalSettings {
        data_url: server.url("/msk_impact_2017.tar.gz"),
        ..CBioPortalSettings::default()
    });

    let outcomes = orchestrator
        .run(TransformSelection::from_flags(false, true, false))
        .await;
    download.assert();
    assert_eq!(outcomes.len(), 1);
    let report = outcomes[0].result.as_ref().unwrap();
    assert_eq!(report.source, Source::CBioPortal);
    assert_eq!(report.records_read, 6);

    let case_lists =
        std::fs::read_to_string(data_dir.path().join("cbioportal/msk_impact_2017_case_lists.csv"))
            .unwrap();
    assert!(!case_lists.contains("cancer_study_identifier"));

    let cbioportal = CBioPortal::from_storage(orchestrator.data_storage())
        .await
        .unwrap();
    let resp = cbioportal.cancer_types_summary("braf");
    assert_eq!(
        serde_json::Value::Object(resp.data.clone()),
        json!({
            "Colorectal Cancer": {"count": 1, "total": 4, "percent_altered": 25.0},
            "Melanoma": {"count": 1, "total": 1, "percent_altered": 100.0}
        })
    );
    assert!(resp.id.is_some());
    assert!(cbioportal.cancer_types_summary("TP53").id.is_none());
}

#[tokio::test]
async fn test_transform_all_reports_download_failures() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/msk_impact_2017.tar.gz");
        then.status(503);
    });
    server.mock(|when, then| {
        when.method(GET).path("/hotspots_v2.xls");
        then.status(404);
    });

    let data_dir = TempDir::new().unwrap();
    let etl_dir = TempDir::new().unwrap();
    let orchestrator = TransformOrchestrator::new(
        LocalStorage::new(data_dir.path()),
        LocalStorage::new(etl_dir.path()),
        normalizer_for(&server),
    )
    .with_cbioportal_settings(CBioPortalSettings {
        data_url: server.url("/msk_impact_2017.tar.gz"),
        ..CBioPortalSettings::default()
    })
    .with_hotspots_settings(CancerHotspotsSettings {
        data_url: server.url("/hotspots_v2.xls"),
        ..CancerHotspotsSettings::default()
    });

    let outcomes = orchestrator.run(TransformSelection::all()).await;

    let messages: Vec<String> = outcomes
        .iter()
        .map(|o| o.result.as_ref().unwrap_err().to_string())
        .collect();
    assert_eq!(
        messages,
        vec![
            "cBioPortal source unavailable: Downloading cBioPortal data was unsuccessful",
            "Cancer Hotspots source unavailable: Downloading Cancer Hotspots data was unsuccessful",
        ]
    );
    assert_eq!(worst_severity(&outcomes), Some(ErrorSeverity::Medium));
    assert_eq!(ErrorSeverity::Medium.exit_code(), 2);
}
