use crate::ai_provider::Backend;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "image-validator")]
#[command(about = "ゲームアセット画像のAI検証・信頼度判定ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 解析バックエンド (claude/mock)。省略時は設定ファイルの値
    #[arg(long, global = true)]
    pub backend: Option<Backend>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// フォルダ内の画像を一括検証して結果を保存
    Validate {
        /// 画像フォルダのパス
        #[arg(required = true)]
        folder: PathBuf,

        /// 出力ファイル/ディレクトリ（デフォルト: 入力フォルダ）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 出力形式 (json/csv)
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,

        /// 同時に解析する画像数（省略時は設定ファイルの値）
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// 分類カテゴリ（カンマ区切り）
        #[arg(long, value_delimiter = ',')]
        categories: Vec<String>,

        /// 解析プロンプトを上書き
        #[arg(long)]
        prompt: Option<String>,

        /// サブフォルダも再帰的にスキャン
        #[arg(short = 'r', long)]
        recursive: bool,
    },

    /// 画像1枚を解析して内訳を表示
    Analyze {
        /// 画像ファイルのパス
        #[arg(required = true)]
        image: PathBuf,

        /// 分類カテゴリ（カンマ区切り）
        #[arg(long, value_delimiter = ',')]
        categories: Vec<String>,
    },

    /// 観点スコアから信頼度を計算
    Score {
        #[arg(long)]
        content_match: f64,

        #[arg(long)]
        quality_assessment: f64,

        #[arg(long)]
        category_confidence: f64,

        #[arg(long)]
        technical_analysis: f64,
    },

    /// 要確認の画像を対話的にレビュー
    Review {
        /// 検証結果JSONファイル
        #[arg(required = true)]
        input: PathBuf,

        /// 出力先（省略時は上書き）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 設定を表示/編集
    Config {
        /// 設定を表示
        #[arg(long)]
        show: bool,

        /// 閾値を設定 (例: auto_accept=0.9)
        #[arg(long, value_parser = parse_key_value)]
        set_threshold: Vec<(String, f64)>,

        /// 重みを設定 (例: content_match=0.5)
        #[arg(long, value_parser = parse_key_value)]
        set_weight: Vec<(String, f64)>,

        /// 既定のバックエンドを設定
        #[arg(long)]
        set_backend: Option<Backend>,

        /// 検証結果JSONのモデル設定を取り込む
        #[arg(long)]
        import: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use json or csv", s)),
        }
    }
}

/// `key=value` 形式の引数を解析
pub fn parse_key_value(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {}", s))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid number: {}", value))?;
    Ok((key.trim().to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("auto_accept=0.9").unwrap(),
            ("auto_accept".to_string(), 0.9)
        );
        assert!(parse_key_value("auto_accept").is_err());
        assert!(parse_key_value("auto_accept=high").is_err());
    }

    #[test]
    fn test_export_format_from_str() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_cli_parses_validate() {
        let cli = Cli::parse_from([
            "image-validator",
            "--backend",
            "mock",
            "validate",
            "assets",
            "--categories",
            "tiles,icons",
            "-f",
            "csv",
        ]);
        assert_eq!(cli.backend, Some(Backend::Mock));
        match cli.command {
            Commands::Validate { folder, categories, format, .. } => {
                assert_eq!(folder, PathBuf::from("assets"));
                assert_eq!(categories, vec!["tiles", "icons"]);
                assert_eq!(format, ExportFormat::Csv);
            }
            _ => panic!("expected validate"),
        }
    }
}
