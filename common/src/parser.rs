//! 解析ツールのレスポンスパーサー
//!
//! Claude CLIなどのレスポンスからJSONオブジェクトを抽出し、
//! AnalysisResultへ変換する

use crate::error::{Error, Result};
use crate::types::{AnalysisResult, FALLBACK_CATEGORY};
use serde::Deserialize;
use serde_json::{Map, Value};

/// ツールが返すJSON（欠けたキーは既定値）
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolResponse {
    pub success: Option<bool>,
    pub category: Option<String>,
    pub categories: Vec<String>,
    pub confidence: f64,
    pub issues: Vec<String>,
    pub metadata: Map<String, Value>,
    pub error: Option<String>,
}

impl ToolResponse {
    /// AnalysisResultへ変換
    ///
    /// `success: false` や `error` 付きのレスポンスは失敗結果として扱う。
    pub fn into_analysis_result(self) -> AnalysisResult {
        let success = self.success.unwrap_or(self.error.is_none());

        let mut categories = self.categories;
        if categories.is_empty() {
            if let Some(category) = self.category.filter(|c| !c.trim().is_empty()) {
                categories.push(category);
            }
        }
        if categories.is_empty() {
            categories.push(FALLBACK_CATEGORY.to_string());
        }

        if success {
            AnalysisResult::success(self.confidence, categories, self.issues, self.metadata)
        } else {
            AnalysisResult {
                success: false,
                confidence: 0.0,
                categories: vec![FALLBACK_CATEGORY.to_string()],
                issues: self.issues,
                metadata: self.metadata,
                error_message: Some(self.error.unwrap_or_else(|| "tool reported failure".into())),
                processing_time: 0.0,
            }
        }
    }
}

/// レスポンスからJSON部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 最初の `{` から最後の `}` まで
/// 3. エラー
///
/// # Examples
/// ```
/// use image_validator_common::extract_json;
///
/// let response = "result: {\"confidence\": 0.8}";
/// assert_eq!(extract_json(response).unwrap(), "{\"confidence\": 0.8}");
/// ```
pub fn extract_json(response: &str) -> Result<&str> {
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7; // "```json" の長さ
        if let Some(end_offset) = response[start..].find("```") {
            let end = start + end_offset;
            return Ok(response[start..end].trim());
        }
    }

    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            if end >= start {
                return Ok(&response[start..=end]);
            }
        }
    }

    Err(Error::Parse("no JSON object found in response".into()))
}

/// ツールレスポンスをパース
pub fn parse_tool_response(response: &str) -> Result<ToolResponse> {
    let json_str = extract_json(response)?;
    serde_json::from_str(json_str.trim())
        .map_err(|e| Error::Parse(format!("invalid analysis JSON: {}", e)))
}
