//! 決定的なモック解析
//!
//! 実バックエンドが無いときの代替。パス文字列のハッシュから結果を導くので、
//! 同じ入力には常に同じ結果を返す。

use super::tool::AnalysisTool;
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use image_validator_common::{AnalysisResult, FALLBACK_CATEGORY};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;

const LARGE_FILE_BYTES: u64 = 10 * 1024 * 1024;
const SMALL_FILE_BYTES: u64 = 1024;

/// パス文字列から導いたシードとダイジェスト
fn path_seed(path_str: &str) -> (u32, String) {
    let digest = Sha256::digest(path_str.as_bytes());
    let seed = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    (seed, hex::encode(digest))
}

/// モック解析結果を生成（純粋関数）
///
/// * カテゴリ: `seed % categories.len()`（空なら "other"）
/// * 信頼度: `0.5 + (seed % 50) / 100 + confidence_modifier` を[0,1]に収める
/// * 問題点: ファイルサイズとファイル名からのヒューリスティック
pub fn generate_mock_analysis(
    image_path: &Path,
    file_size: u64,
    categories: &[String],
    confidence_modifier: f64,
) -> AnalysisResult {
    let path_str = image_path.to_string_lossy();
    let (seed, digest) = path_seed(&path_str);

    let category = if categories.is_empty() {
        FALLBACK_CATEGORY.to_string()
    } else {
        categories[seed as usize % categories.len()].clone()
    };

    let base = 0.5 + f64::from(seed % 50) / 100.0;
    let confidence = (base + confidence_modifier).clamp(0.0, 1.0);

    let file_name = image_path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let extension = image_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    let mut issues = Vec::new();
    if file_size > LARGE_FILE_BYTES {
        issues.push("Large file size may impact performance".to_string());
    } else if file_size < SMALL_FILE_BYTES {
        issues.push("Very small file size, may be low quality".to_string());
    }
    if file_name.contains("texture") && extension != ".png" {
        issues.push("Texture should use PNG format for better quality".to_string());
    }
    if file_name.contains("ui") && confidence < 0.7 {
        issues.push("UI element may need higher resolution".to_string());
    }

    let mut metadata = Map::new();
    metadata.insert("file_size".into(), Value::from(file_size));
    metadata.insert("file_extension".into(), Value::String(extension));
    metadata.insert("mock_analysis".into(), Value::Bool(true));
    metadata.insert("hash_seed".into(), Value::from(seed));
    metadata.insert("path_digest".into(), Value::String(digest));

    AnalysisResult::success(confidence, vec![category], issues, metadata)
}

/// モック解析ツール
///
/// 応答遅延を模擬したうえで `generate_mock_analysis` を返す。
#[derive(Debug, Clone)]
pub struct MockTool {
    name: String,
    latency: Duration,
    confidence_modifier: f64,
}

impl MockTool {
    pub fn new(name: impl Into<String>, latency: Duration, confidence_modifier: f64) -> Self {
        Self {
            name: name.into(),
            latency,
            confidence_modifier,
        }
    }

    /// プライマリ用（500ms、補正なし）
    pub fn primary() -> Self {
        Self::new("mock", Duration::from_millis(500), 0.0)
    }

    /// フォールバック用（300ms、信頼度 -0.1）
    pub fn fallback() -> Self {
        Self::new("mock-fallback", Duration::from_millis(300), -0.1)
    }
}

#[async_trait]
impl AnalysisTool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(
        &self,
        image_path: &Path,
        categories: &[String],
        _prompt: &str,
    ) -> Result<AnalysisResult> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let file_size = tokio::fs::metadata(image_path).await?.len();
        let mut result =
            generate_mock_analysis(image_path, file_size, categories, self.confidence_modifier);
        result.metadata.insert(
            "analysis_timestamp".into(),
            Value::String(Utc::now().to_rfc3339()),
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image_validator_common::default_categories;

    #[test]
    fn test_mock_is_deterministic() {
        let cats = default_categories();
        let path = Path::new("assets/sprites/hero_walk.png");
        let a = generate_mock_analysis(path, 4096, &cats, 0.0);
        let b = generate_mock_analysis(path, 4096, &cats, 0.0);

        assert_eq!(a.categories, b.categories);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.issues, b.issues);
        assert_eq!(a.metadata, b.metadata);
    }

    #[test]
    fn test_mock_confidence_range_and_category() {
        let cats = default_categories();
        for i in 0..50 {
            let path = format!("assets/img_{}.png", i);
            let result = generate_mock_analysis(Path::new(&path), 4096, &cats, 0.0);
            assert!(result.success);
            assert!((0.5..1.0).contains(&result.confidence));
            assert!(cats.contains(&result.categories[0]));
        }
    }

    #[test]
    fn test_mock_modifier_shifts_and_clamps() {
        let cats = default_categories();
        let path = Path::new("assets/ui_button.png");
        let base = generate_mock_analysis(path, 4096, &cats, 0.0);
        let lowered = generate_mock_analysis(path, 4096, &cats, -0.1);
        assert!((base.confidence - lowered.confidence - 0.1).abs() < 1e-9);

        let high = generate_mock_analysis(path, 4096, &cats, 5.0);
        assert_eq!(high.confidence, 1.0);
        let low = generate_mock_analysis(path, 4096, &cats, -5.0);
        assert_eq!(low.confidence, 0.0);
    }

    #[test]
    fn test_mock_empty_categories() {
        let result = generate_mock_analysis(Path::new("a.png"), 4096, &[], 0.0);
        assert_eq!(result.categories, vec!["other"]);
    }

    #[test]
    fn test_mock_size_issues() {
        let cats = default_categories();
        let big = generate_mock_analysis(Path::new("big.png"), 11 * 1024 * 1024, &cats, 0.0);
        assert!(big
            .issues
            .contains(&"Large file size may impact performance".to_string()));

        let tiny = generate_mock_analysis(Path::new("tiny.png"), 200, &cats, 0.0);
        assert!(tiny
            .issues
            .contains(&"Very small file size, may be low quality".to_string()));
    }

    #[test]
    fn test_mock_name_issues() {
        let cats = default_categories();
        let tex = generate_mock_analysis(Path::new("stone_texture.jpg"), 4096, &cats, 0.0);
        assert!(tex
            .issues
            .contains(&"Texture should use PNG format for better quality".to_string()));

        let tex_png = generate_mock_analysis(Path::new("stone_texture.png"), 4096, &cats, 0.0);
        assert!(!tex_png.issues.iter().any(|i| i.contains("PNG format")));

        // 信頼度を0付近まで下げればUIヒューリスティックが必ず発火する
        let ui = generate_mock_analysis(Path::new("ui_panel.png"), 4096, &cats, -0.5);
        assert!(ui
            .issues
            .contains(&"UI element may need higher resolution".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_tool_reads_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sprite.png");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        let tool = MockTool::primary();
        let result = tool
            .analyze(&path, &default_categories(), "prompt")
            .await
            .unwrap();
        assert_eq!(result.metadata["file_size"], Value::from(2048u64));
        assert!(result.metadata.contains_key("analysis_timestamp"));

        let expected = generate_mock_analysis(&path, 2048, &default_categories(), 0.0);
        assert_eq!(result.confidence, expected.confidence);
    }
}
