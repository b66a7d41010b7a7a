//! JSON/CSV出力の統合テスト

use godot_image_validator::cli::ExportFormat;
use godot_image_validator::export::{self, load_results, render_csv, save_results_file};
use godot_image_validator::validator::{AspectPolicy, ManualCorrection, ValidationRecord};
use image_validator_common::{AnalysisResult, ConfidenceModel, ModelConfig, ThresholdUpdate};
use serde_json::Map;
use std::path::Path;
use tempfile::tempdir;

fn create_test_record(name: &str, confidence: f64) -> ValidationRecord {
    let analysis = AnalysisResult::success(
        confidence,
        vec!["ui_elements".into(), "effects".into()],
        vec!["Blurry edges".into(), "Low contrast".into()],
        Map::new(),
    );
    ValidationRecord::from_analysis(
        Path::new(name),
        analysis,
        &ConfidenceModel::default(),
        &AspectPolicy::default(),
    )
}

#[test]
fn test_json_export_and_load() {
    let dir = tempdir().expect("Failed to create temp dir");
    let output_path = dir.path().join("results.json");

    let mut model = ConfidenceModel::default();
    let mut update = ThresholdUpdate::default();
    update.set("auto_accept", 0.9);
    model.update_thresholds(&update).unwrap();

    let records = vec![
        create_test_record("assets/a.png", 1.0),
        create_test_record("assets/b.png", 0.5),
    ];

    let written = export::export_results(&records, &model.export_config(), ExportFormat::Json, &output_path)
        .expect("JSON出力に失敗");
    assert_eq!(written, output_path);

    let loaded = load_results(&output_path).expect("読み込みに失敗");
    assert_eq!(loaded.results.len(), records.len());
    for (loaded, original) in loaded.results.iter().zip(&records) {
        assert_eq!(loaded.image_path, original.image_path);
        assert_eq!(loaded.categories, original.categories);
        assert_eq!(loaded.validation_level, original.validation_level);
        assert!((loaded.confidence - original.confidence).abs() < 1e-12);
    }
    assert_eq!(loaded.config.thresholds.auto_accept, 0.9);
    assert_eq!(loaded.summary.total, 2);
    assert_eq!(loaded.summary.pending_review, 1);

    // 取り込んだ設定でモデルを再構成できる
    let mut restored = ConfidenceModel::default();
    restored.import_config(&loaded.config).unwrap();
    assert_eq!(restored.thresholds().auto_accept, 0.9);
}

#[test]
fn test_json_export_into_directory() {
    let dir = tempdir().expect("Failed to create temp dir");
    let records = vec![create_test_record("a.png", 0.8)];

    let written = export::export_results(&records, &ModelConfig::default(), ExportFormat::Json, dir.path())
        .unwrap();
    assert_eq!(written.parent().unwrap(), dir.path());
    assert!(written.exists());
}

#[test]
fn test_load_legacy_thresholds_key() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("legacy.json");
    std::fs::write(
        &path,
        r#"{"timestamp": "2026-01-18T10:00:00Z", "thresholds": {"thresholds": {"auto_accept": 0.95}}, "results": []}"#,
    )
    .unwrap();

    let loaded = load_results(&path).unwrap();
    assert_eq!(loaded.config.thresholds.auto_accept, 0.95);
    assert!(loaded.results.is_empty());
    assert_eq!(loaded.summary.total, 0);
}

#[test]
fn test_load_missing_and_invalid() {
    let dir = tempdir().expect("Failed to create temp dir");
    assert!(load_results(&dir.path().join("none.json")).is_err());

    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(load_results(&path).is_err());
}

#[test]
fn test_csv_layout() {
    let mut reviewed = create_test_record("assets/b.png", 0.5);
    reviewed.apply_correction(ManualCorrection::new(vec!["tiles".into()], "looks \"fine\""));

    let csv = render_csv(&[create_test_record("assets/a.png", 1.0), reviewed]);
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines[0], "Image Path,Confidence,Categories,Issues,Manual Review,Notes");
    assert_eq!(
        lines[1],
        "assets/a.png,96.00%,\"ui_elements, effects\",Blurry edges; Low contrast,No,"
    );
    assert_eq!(
        lines[2],
        "assets/b.png,100.00%,tiles,Blurry edges; Low contrast,Yes,\"looks \"\"fine\"\"\""
    );
}

#[test]
fn test_save_results_file_updates_summary() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("results.json");
    let records = vec![create_test_record("a.png", 0.5)];
    export::write_json(&records, &ModelConfig::default(), &path).unwrap();

    let mut file = load_results(&path).unwrap();
    assert_eq!(file.summary.pending_review, 1);

    file.results[0].apply_correction(ManualCorrection::new(vec![], "ok"));
    save_results_file(&mut file, &path).unwrap();

    let reloaded = load_results(&path).unwrap();
    assert_eq!(reloaded.summary.pending_review, 0);
    assert_eq!(reloaded.summary.manually_reviewed, 1);
    assert!(reloaded.results[0].manually_reviewed);
}
