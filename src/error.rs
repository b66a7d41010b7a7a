use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error(transparent)]
    Common(#[from] image_validator_common::Error),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("画像が見つかりません: {0}")]
    NoImagesFound(String),

    #[error("未対応の画像形式: {0}")]
    UnsupportedFormat(String),

    #[error("解析ツールエラー: {0}")]
    Tool(String),

    #[error("解析ツールがタイムアウトしました ({0}秒)")]
    ToolTimeout(u64),

    #[error("解析レスポンスのパースに失敗: {0}")]
    ToolParse(String),

    #[error("エクスポートエラー: {0}")]
    Export(String),

    #[error("入力操作エラー: {0}")]
    Interaction(String),

    #[error("解析がキャンセルされました")]
    Cancelled,

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ValidatorError>;
