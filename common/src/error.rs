//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    /// 閾値の順序違反（error <= required <= suggested <= auto_accept <= 1.0）
    #[error("Invalid thresholds: {0}")]
    Thresholds(String),

    /// 重みの合計が1.0にならない、または負の重み
    #[error("Invalid aspect weights: {0}")]
    Weights(String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// カスタムルールの実行失敗（他のルールには影響しない）
    #[error("Custom rule '{name}' failed: {message}")]
    Rule { name: String, message: String },
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
