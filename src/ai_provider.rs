use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// プライマリ解析バックエンド
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Claude,
    #[default]
    Mock,
}

impl Backend {
    pub fn command_name(&self) -> &'static str {
        match self {
            Backend::Claude => "claude",
            Backend::Mock => "mock",
        }
    }

    /// 文字列から解析（大文字小文字を区別しない）
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "claude" => Some(Backend::Claude),
            "mock" => Some(Backend::Mock),
            _ => None,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command_name())
    }
}
