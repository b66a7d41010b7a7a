use crate::ai_provider::Backend;
use crate::analyzer::ClientOptions;
use crate::error::{Result, ValidatorError};
use crate::rules::RulePresets;
use image_validator_common::{default_categories, ConfidenceModel, ModelConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// バックエンドを上書きする環境変数
pub const BACKEND_ENV: &str = "IMAGE_VALIDATOR_BACKEND";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub client: ClientOptions,
    /// 同時に解析する画像数
    pub concurrency: usize,
    pub categories: Vec<String>,
    pub model: ModelConfig,
    pub rules: RulePresets,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    /// 既定パスから読み込み（無ければ既定値）、環境変数を反映
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_backend_override(std::env::var(BACKEND_ENV).ok().as_deref());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default_config());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ValidatorError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home
            .join(".config")
            .join("godot-image-validator")
            .join("config.json"))
    }

    fn default_config() -> Self {
        Self {
            backend: Backend::Mock,
            client: ClientOptions::default(),
            concurrency: 4,
            categories: default_categories(),
            model: ModelConfig::default(),
            rules: RulePresets::default(),
        }
    }

    /// 環境変数の値でバックエンドを上書き（不正値は警告して無視）
    pub fn apply_backend_override(&mut self, value: Option<&str>) {
        let Some(value) = value else { return };
        match Backend::parse(value) {
            Some(backend) => self.backend = backend,
            None => warn!(env = BACKEND_ENV, value, "Unknown backend, keeping configured value"),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.client.validate()?;
        if self.concurrency == 0 {
            return Err(ValidatorError::Config("concurrency must be at least 1".into()));
        }
        Ok(())
    }

    /// 閾値・重み・組み込みルールを反映したモデルを構築
    pub fn build_model(&self) -> Result<ConfidenceModel> {
        let mut model = ConfidenceModel::from_config(&self.model)?;
        self.rules.register(&mut model);
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("none.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.backend, Backend::Mock);
        assert_eq!(config.client.max_retries, 3);
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.backend = Backend::Claude;
        config.model.thresholds.auto_accept = 0.9;
        config.rules.pixel_art_multiple = Some(8);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"backend": "claude", "client": {"max_retries": 1}}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.backend, Backend::Claude);
        assert_eq!(config.client.max_retries, 1);
        assert_eq!(config.client.timeout_seconds, 30);
        assert_eq!(config.categories, default_categories());
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"model": {"thresholds": {"auto_accept": 0.5, "manual_review_suggested": 0.7, "manual_review_required": 0.3, "error": 0.0}}}"#,
        )
        .unwrap();

        let result = Config::load_from(&path);
        assert!(matches!(result, Err(ValidatorError::Common(_))));
    }

    #[test]
    fn test_backend_override() {
        let mut config = Config::default();
        config.apply_backend_override(Some("CLAUDE"));
        assert_eq!(config.backend, Backend::Claude);
        config.apply_backend_override(Some("unknown"));
        assert_eq!(config.backend, Backend::Claude);
        config.apply_backend_override(None);
        assert_eq!(config.backend, Backend::Claude);
    }

    #[test]
    fn test_build_model_registers_rules() {
        let mut config = Config::default();
        config.rules.hd_min_resolution = Some(1024);
        let model = config.build_model().unwrap();
        assert_eq!(model.custom_rules(), vec!["hd_asset"]);
    }
}
