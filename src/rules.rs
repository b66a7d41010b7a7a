//! 組み込みのカスタムルール
//!
//! - PixelArtRule: 幅・高さが指定の倍数か
//! - HdAssetRule: 短辺が最低解像度以上か
//! - FileSizeRule: ファイルサイズ上限
//!
//! 画像を読めない場合は補正0（ルールとしては成功扱い）。

use image_validator_common::{ConfidenceModel, CustomRule, RuleAdjustment, ScoredResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

type CommonResult<T> = image_validator_common::Result<T>;

pub struct PixelArtRule {
    pub multiple: u32,
}

impl CustomRule for PixelArtRule {
    fn evaluate(&self, image_path: &Path, _current: &ScoredResult) -> CommonResult<Option<RuleAdjustment>> {
        let Ok((width, height)) = image::image_dimensions(image_path) else {
            debug!(image = %image_path.display(), "pixel_art: dimensions unavailable");
            return Ok(Some(RuleAdjustment::confidence(0.0)));
        };

        let multiple = self.multiple.max(1);
        if width % multiple != 0 || height % multiple != 0 {
            return Ok(Some(RuleAdjustment::confidence(-0.2).with_issue(format!(
                "Pixel dimensions {}x{} not divisible by {}",
                width, height, multiple
            ))));
        }
        Ok(Some(RuleAdjustment::confidence(0.1)))
    }
}

pub struct HdAssetRule {
    pub min_resolution: u32,
}

impl CustomRule for HdAssetRule {
    fn evaluate(&self, image_path: &Path, _current: &ScoredResult) -> CommonResult<Option<RuleAdjustment>> {
        let Ok((width, height)) = image::image_dimensions(image_path) else {
            debug!(image = %image_path.display(), "hd_asset: dimensions unavailable");
            return Ok(Some(RuleAdjustment::confidence(0.0)));
        };

        let min_dimension = width.min(height);
        if min_dimension < self.min_resolution {
            return Ok(Some(RuleAdjustment::confidence(-0.3).with_issue(format!(
                "Minimum dimension {} below required {}",
                min_dimension, self.min_resolution
            ))));
        }
        Ok(Some(RuleAdjustment::confidence(0.1)))
    }
}

pub struct FileSizeRule {
    pub max_size_mb: f64,
}

impl CustomRule for FileSizeRule {
    fn evaluate(&self, image_path: &Path, _current: &ScoredResult) -> CommonResult<Option<RuleAdjustment>> {
        let Ok(meta) = std::fs::metadata(image_path) else {
            return Ok(Some(RuleAdjustment::confidence(0.0)));
        };

        let size_mb = meta.len() as f64 / (1024.0 * 1024.0);
        if self.max_size_mb > 0.0 && size_mb > self.max_size_mb {
            // 超過率に比例して減点
            let adjustment = -0.1 * (size_mb / self.max_size_mb - 1.0);
            return Ok(Some(RuleAdjustment::confidence(adjustment).with_issue(format!(
                "Large file size: {:.1}MB (recommended < {}MB)",
                size_mb, self.max_size_mb
            ))));
        }
        Ok(Some(RuleAdjustment::confidence(0.0)))
    }
}

/// 設定ファイルから有効化するルール（None は無効）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulePresets {
    pub pixel_art_multiple: Option<u32>,
    pub hd_min_resolution: Option<u32>,
    pub max_file_size_mb: Option<f64>,
}

impl RulePresets {
    /// 有効なルールをモデルへ登録（pixel_art → hd_asset → file_size の順）
    pub fn register(&self, model: &mut ConfidenceModel) {
        if let Some(multiple) = self.pixel_art_multiple {
            model.add_custom_rule("pixel_art", Box::new(PixelArtRule { multiple }));
        }
        if let Some(min_resolution) = self.hd_min_resolution {
            model.add_custom_rule("hd_asset", Box::new(HdAssetRule { min_resolution }));
        }
        if let Some(max_size_mb) = self.max_file_size_mb {
            model.add_custom_rule("file_size", Box::new(FileSizeRule { max_size_mb }));
        }
    }
}
