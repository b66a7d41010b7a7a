//! 検証結果の保存・読み込み
//!
//! - JSON: タイムスタンプ・モデル設定・集計・全レコード（再読み込み・設定の再取り込み可能）
//! - CSV: 一覧表示用（読み込みは非対応）

use crate::cli::ExportFormat;
use crate::error::{Result, ValidatorError};
use crate::validator::{BatchSummary, ValidationRecord};
use chrono::{DateTime, Local, Utc};
use image_validator_common::ModelConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

const CSV_HEADER: [&str; 6] = [
    "Image Path",
    "Confidence",
    "Categories",
    "Issues",
    "Manual Review",
    "Notes",
];

/// JSON結果ファイルの形式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsFile {
    pub timestamp: DateTime<Utc>,
    /// 判定に使ったモデル設定
    #[serde(alias = "thresholds")]
    pub config: ModelConfig,
    #[serde(default)]
    pub summary: BatchSummary,
    pub results: Vec<ValidationRecord>,
}

impl ResultsFile {
    pub fn new(config: ModelConfig, results: Vec<ValidationRecord>) -> Self {
        Self {
            timestamp: Utc::now(),
            config,
            summary: BatchSummary::from_records(&results),
            results,
        }
    }
}

/// 出力先がディレクトリ（または拡張子なし）の場合は日時入りのファイル名を付ける
pub fn output_path_for_format(output: &Path, format: ExportFormat) -> PathBuf {
    if output.is_dir() || output.extension().is_none() {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        output.join(format!("validation_results_{}.{}", stamp, format.extension()))
    } else {
        output.to_path_buf()
    }
}

pub fn export_results(
    results: &[ValidationRecord],
    config: &ModelConfig,
    format: ExportFormat,
    output: &Path,
) -> Result<PathBuf> {
    let output_path = output_path_for_format(output, format);
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    match format {
        ExportFormat::Json => write_json(results, config, &output_path)?,
        ExportFormat::Csv => write_csv(results, &output_path)?,
    }

    info!(path = %output_path.display(), count = results.len(), "Results exported");
    Ok(output_path)
}

pub fn write_json(results: &[ValidationRecord], config: &ModelConfig, path: &Path) -> Result<()> {
    let file = ResultsFile::new(config.clone(), results.to_vec());
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn write_csv(results: &[ValidationRecord], path: &Path) -> Result<()> {
    std::fs::write(path, render_csv(results))?;
    Ok(())
}

/// CSV文字列を生成（信頼度はパーセント表記）
pub fn render_csv(results: &[ValidationRecord]) -> String {
    let mut csv = String::new();
    push_row(&mut csv, CSV_HEADER.iter().map(|s| s.to_string()));

    for record in results {
        push_row(
            &mut csv,
            [
                record.image_path.display().to_string(),
                format!("{:.2}%", record.confidence * 100.0),
                record.categories.join(", "),
                record.issues.join("; "),
                if record.manually_reviewed { "Yes" } else { "No" }.to_string(),
                record.review_notes.clone(),
            ],
        );
    }
    csv
}

fn push_row(csv: &mut String, fields: impl IntoIterator<Item = String>) {
    let row: Vec<String> = fields.into_iter().map(|f| escape_csv(&f)).collect();
    csv.push_str(&row.join(","));
    csv.push_str("\r\n");
}

/// カンマ・引用符・改行を含むフィールドは引用符で囲む
fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// 集計を更新して結果ファイルを書き戻す
pub fn save_results_file(file: &mut ResultsFile, path: &Path) -> Result<()> {
    file.summary = BatchSummary::from_records(&file.results);
    let json = serde_json::to_string_pretty(file)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// JSON結果ファイルを読み込む
pub fn load_results(path: &Path) -> Result<ResultsFile> {
    if !path.is_file() {
        return Err(ValidatorError::FileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| ValidatorError::Export(format!("{}: {}", path.display(), e)))
}
