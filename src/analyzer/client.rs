//! リトライ・バックオフ・フォールバック付き解析クライアント
//!
//! 1画像の処理順:
//! 1. 入力チェック（存在・形式）。違反時はリトライせず即フォールバック結果
//! 2. プライマリツールを1回
//! 3. 失敗時は `retry_delay × 2^k` 待ってから最大 `max_retries` 回リトライ
//! 4. 最後のリトライも失敗したらフォールバックツールを1回
//! 5. すべて失敗したら最後のエラーを載せた終端フォールバック結果
//!
//! どの経路でもエラーは呼び出し元に返さず、必ず `AnalysisResult` で終わる。

use super::stats::{ClientStatistics, StatisticsSnapshot};
use super::tool::AnalysisTool;
use crate::error::{Result, ValidatorError};
use crate::scanner::check_image;
use futures::FutureExt;
use image_validator_common::{build_analysis_prompt, default_categories, AnalysisResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// クライアント設定
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// 1試行あたりのタイムアウト秒数（0で無制限）
    pub timeout_seconds: u64,
    pub max_retries: u32,
    /// 初回リトライ前の待機秒数（以降倍々）
    pub retry_delay_seconds: f64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_seconds: 2.0,
        }
    }
}

impl ClientOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.retry_delay_seconds.is_finite() || self.retry_delay_seconds < 0.0 {
            return Err(ValidatorError::Config(format!(
                "retry_delay_seconds must be a non-negative number, got {}",
                self.retry_delay_seconds
            )));
        }
        Ok(())
    }

    /// k回目（0始まり）のリトライ前の待機時間
    pub fn backoff_delay(&self, retry_index: u32) -> Duration {
        if self.retry_delay_seconds <= 0.0 || self.retry_delay_seconds.is_nan() {
            return Duration::ZERO;
        }
        let seconds = self.retry_delay_seconds * 2f64.powf(f64::from(retry_index));
        // 表現できない長さは最大値で飽和させる
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }

    fn attempt_timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }
}

pub struct AnalysisClient {
    primary: Arc<dyn AnalysisTool>,
    fallback: Option<Arc<dyn AnalysisTool>>,
    options: ClientOptions,
    stats: ClientStatistics,
    cancel: CancellationToken,
}

impl AnalysisClient {
    pub fn new(primary: Arc<dyn AnalysisTool>, options: ClientOptions) -> Self {
        Self {
            primary,
            fallback: None,
            options,
            stats: ClientStatistics::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn AnalysisTool>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// 実行中の解析を打ち切るためのトークン
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_statistics(&self) {
        self.stats.reset();
        info!("Client statistics reset");
    }

    /// 画像1枚を解析
    ///
    /// `categories` / `prompt` が `None` のときは既定カテゴリと既定プロンプトを使う。
    pub async fn analyze_image(
        &self,
        image_path: &Path,
        categories: Option<&[String]>,
        prompt: Option<&str>,
    ) -> AnalysisResult {
        let started = Instant::now();
        self.stats.record_request();

        let categories = categories
            .map(<[String]>::to_vec)
            .unwrap_or_else(default_categories);
        let prompt = prompt
            .map(str::to_string)
            .unwrap_or_else(|| build_analysis_prompt(&categories));

        let outcome = AssertUnwindSafe(self.run_attempts(image_path, &categories, &prompt))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(image = %image_path.display(), panic = %message, "Analysis panicked");
                self.stats.record_failure();
                AnalysisResult::fallback_result(image_path, format!("Unexpected error: {}", message))
            }
        };

        result.with_processing_time(started.elapsed().as_secs_f64())
    }

    async fn run_attempts(
        &self,
        image_path: &Path,
        categories: &[String],
        prompt: &str,
    ) -> AnalysisResult {
        if let Err(e) = check_image(image_path) {
            warn!(image = %image_path.display(), error = %e, "Rejected before analysis");
            self.stats.record_failure();
            return rejected_result(image_path, &e);
        }

        let mut last_error = match self
            .attempt(self.primary.as_ref(), image_path, categories, prompt)
            .await
        {
            Ok(result) => {
                self.stats.record_success();
                return result;
            }
            Err(e) => e,
        };

        for retry in 0..self.options.max_retries {
            if matches!(last_error, ValidatorError::Cancelled) {
                break;
            }

            let delay = self.options.backoff_delay(retry);
            warn!(
                image = %image_path.display(),
                tool = self.primary.name(),
                retry = retry + 1,
                max_retries = self.options.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "Analysis failed, will retry after backoff"
            );

            if !self.backoff(delay).await {
                last_error = ValidatorError::Cancelled;
                break;
            }

            self.stats.record_retry();
            match self
                .attempt(self.primary.as_ref(), image_path, categories, prompt)
                .await
            {
                Ok(result) => {
                    debug!(image = %image_path.display(), retry = retry + 1, "Analysis succeeded after retry");
                    self.stats.record_success();
                    return result;
                }
                Err(e) => last_error = e,
            }
        }

        if !matches!(last_error, ValidatorError::Cancelled) {
            if let Some(fallback) = &self.fallback {
                warn!(
                    image = %image_path.display(),
                    tool = fallback.name(),
                    error = %last_error,
                    "Primary analysis exhausted, trying fallback tool"
                );
                match self
                    .attempt(fallback.as_ref(), image_path, categories, prompt)
                    .await
                {
                    Ok(mut result) => {
                        result
                            .metadata
                            .insert("fallback_tool".into(), Value::String(fallback.name().to_string()));
                        self.stats.record_success();
                        self.stats.record_fallback();
                        return result;
                    }
                    Err(e) => last_error = e,
                }
            }
        }

        error!(image = %image_path.display(), error = %last_error, "Analysis failed after all attempts");
        self.stats.record_failure();
        AnalysisResult::fallback_result(image_path, last_error.to_string())
    }

    /// 1回の試行（キャンセル確認 → タイムアウト付き呼び出し）
    async fn attempt(
        &self,
        tool: &dyn AnalysisTool,
        image_path: &Path,
        categories: &[String],
        prompt: &str,
    ) -> Result<AnalysisResult> {
        if self.cancel.is_cancelled() {
            return Err(ValidatorError::Cancelled);
        }

        let call = tool.analyze(image_path, categories, prompt);
        let result = match self.options.attempt_timeout() {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ValidatorError::ToolTimeout(self.options.timeout_seconds))??,
            None => call.await?,
        };

        if result.success {
            Ok(result)
        } else {
            Err(ValidatorError::Tool(
                result
                    .error_message
                    .unwrap_or_else(|| format!("{} reported failure", tool.name())),
            ))
        }
    }

    /// バックオフ待機。キャンセルされたら false
    async fn backoff(&self, delay: Duration) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

/// 入力チェック違反の結果（理由をメタデータに残す）
fn rejected_result(image_path: &Path, reason: &ValidatorError) -> AnalysisResult {
    let error_type = match reason {
        ValidatorError::FileNotFound(_) => "file_not_found",
        ValidatorError::UnsupportedFormat(_) => "unsupported_format",
        _ => "invalid_input",
    };
    let mut result = AnalysisResult::fallback_result(image_path, reason.to_string());
    result
        .metadata
        .insert("error_type".into(), Value::String(error_type.to_string()));
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
