//! 解析ツールの抽象
//!
//! プライマリ・フォールバックの両方がこのトレイトを実装する。

use crate::error::Result;
use async_trait::async_trait;
use image_validator_common::AnalysisResult;
use std::path::Path;

#[async_trait]
pub trait AnalysisTool: Send + Sync {
    /// ログ用のツール名
    fn name(&self) -> &str;

    /// 画像1枚を解析
    ///
    /// `Err` または `success == false` の結果は失敗試行として扱われ、リトライ対象になる。
    async fn analyze(
        &self,
        image_path: &Path,
        categories: &[String],
        prompt: &str,
    ) -> Result<AnalysisResult>;
}
