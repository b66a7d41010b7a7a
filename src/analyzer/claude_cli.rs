//! Claude CLI連携モジュール
//!
//! `claude -p <prompt> --output-format text` を子プロセスで実行し、
//! レスポンス中のJSONを共通パーサーで AnalysisResult に変換する。

use super::tool::AnalysisTool;
use crate::error::{Result, ValidatorError};
use async_trait::async_trait;
use image_validator_common::{parse_tool_response, AnalysisResult};
use serde_json::Value;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ClaudeCliTool {
    command: String,
}

impl ClaudeCliTool {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for ClaudeCliTool {
    fn default() -> Self {
        Self::new("claude")
    }
}

/// 画像パスを含むプロンプトを組み立てる（改行はスペースに置換）
fn build_cli_prompt(image_path: &Path, prompt: &str) -> String {
    let image = image_path.display().to_string().replace('\\', "/");
    format!("Read the image file {} and analyze it.\n\n{}", image, prompt)
        .replace('\n', " ")
}

#[async_trait]
impl AnalysisTool for ClaudeCliTool {
    fn name(&self) -> &str {
        &self.command
    }

    async fn analyze(
        &self,
        image_path: &Path,
        _categories: &[String],
        prompt: &str,
    ) -> Result<AnalysisResult> {
        let full_prompt = build_cli_prompt(image_path, prompt);
        debug!(tool = %self.command, prompt_len = full_prompt.len(), "Invoking CLI");

        // Windowsではcmd /c経由
        #[cfg(windows)]
        let mut command = {
            let mut c = Command::new("cmd");
            c.args(["/c", self.command.as_str(), "-p", full_prompt.as_str(), "--output-format", "text"]);
            c
        };

        #[cfg(not(windows))]
        let mut command = {
            let mut c = Command::new(&self.command);
            c.args(["-p", full_prompt.as_str(), "--output-format", "text"]);
            c
        };

        // タイムアウトで破棄されたら子プロセスも終了させる
        let output = command
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ValidatorError::Tool(format!("{} 実行エラー: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ValidatorError::Tool(format!(
                "{} failed (code {:?}): {}",
                self.command,
                output.status.code(),
                stderr.trim()
            )));
        }

        let response = String::from_utf8_lossy(&output.stdout);
        let preview: String = response.chars().take(500).collect();
        debug!(tool = %self.command, response_len = response.len(), preview = %preview, "CLI responded");

        let mut result = parse_tool_response(&response)
            .map_err(|e| ValidatorError::ToolParse(e.to_string()))?
            .into_analysis_result();
        result
            .metadata
            .insert("analysis_tool".into(), Value::String(self.command.clone()));

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_cli_prompt_single_line() {
        let prompt = build_cli_prompt(Path::new("assets/hero.png"), "line1\nline2");
        assert!(!prompt.contains('\n'));
        assert!(prompt.starts_with("Read the image file assets/hero.png"));
        assert!(prompt.ends_with("line1 line2"));
    }

    #[tokio::test]
    async fn test_missing_command_is_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, b"png").unwrap();

        let tool = ClaudeCliTool::new("image-validator-nonexistent-cli");
        let result = tool.analyze(&path, &[], "prompt").await;
        assert!(matches!(result, Err(ValidatorError::Tool(_))));
    }
}
