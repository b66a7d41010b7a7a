//! 信頼度スコアリング
//!
//! 4観点のスコアを重み付き合計して総合信頼度を求め、閾値で判定区分を決める。
//!
//! # 判定区分（閾値は `>=` で比較、境界値は寛容な側へ）
//! - `confidence >= auto_accept` → AutoAccept
//! - `confidence >= manual_review_suggested` → ManualReviewSuggested
//! - `confidence >= manual_review_required` → ManualReviewRequired
//! - それ以外 → Error
//!
//! # 例
//! ```
//! use image_validator_common::{AspectScores, ConfidenceModel, ValidationLevel};
//!
//! let model = ConfidenceModel::default();
//! let scores = AspectScores::new(0.95, 0.9, 0.88, 0.92);
//! let confidence = model.calculate_confidence(&scores);
//! assert!((confidence - 0.918).abs() < 1e-9);
//! assert_eq!(model.validation_level(confidence), ValidationLevel::AutoAccept);
//! ```

use crate::error::{Error, Result};
use crate::rules::{CustomRule, RuleRegistry, ScoredResult};
use crate::types::{clamp_unit, Aspect, AspectScores, ValidationLevel};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 重みの合計に許容する誤差
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// 判定閾値
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// 自動承認の最低信頼度
    pub auto_accept: f64,
    /// レビュー推奨の最低信頼度
    pub manual_review_suggested: f64,
    /// レビュー必須の最低信頼度
    pub manual_review_required: f64,
    pub error: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            auto_accept: 0.85,
            manual_review_suggested: 0.60,
            manual_review_required: 0.30,
            error: 0.0,
        }
    }
}

impl ThresholdConfig {
    /// 生成して検証
    pub fn new(
        auto_accept: f64,
        manual_review_suggested: f64,
        manual_review_required: f64,
        error: f64,
    ) -> Result<Self> {
        let config = Self {
            auto_accept,
            manual_review_suggested,
            manual_review_required,
            error,
        };
        config.validate()?;
        Ok(config)
    }

    /// 0.0 <= error <= required <= suggested <= auto_accept <= 1.0
    pub fn validate(&self) -> Result<()> {
        let ordered = 0.0 <= self.error
            && self.error <= self.manual_review_required
            && self.manual_review_required <= self.manual_review_suggested
            && self.manual_review_suggested <= self.auto_accept
            && self.auto_accept <= 1.0;

        if ordered {
            Ok(())
        } else {
            Err(Error::Thresholds(format!(
                "thresholds must be in ascending order: \
                 error ({}) <= manual_review_required ({}) <= manual_review_suggested ({}) <= auto_accept ({}) <= 1.0",
                self.error,
                self.manual_review_required,
                self.manual_review_suggested,
                self.auto_accept
            )))
        }
    }
}

/// 観点ごとの重み（合計1.0）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AspectWeights {
    pub content_match: f64,
    pub quality_assessment: f64,
    pub category_confidence: f64,
    pub technical_analysis: f64,
}

impl Default for AspectWeights {
    fn default() -> Self {
        Self {
            content_match: 0.4,
            quality_assessment: 0.3,
            category_confidence: 0.2,
            technical_analysis: 0.1,
        }
    }
}

impl AspectWeights {
    pub fn new(
        content_match: f64,
        quality_assessment: f64,
        category_confidence: f64,
        technical_analysis: f64,
    ) -> Result<Self> {
        let weights = Self {
            content_match,
            quality_assessment,
            category_confidence,
            technical_analysis,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn get(&self, aspect: Aspect) -> f64 {
        match aspect {
            Aspect::ContentMatch => self.content_match,
            Aspect::QualityAssessment => self.quality_assessment,
            Aspect::CategoryConfidence => self.category_confidence,
            Aspect::TechnicalAnalysis => self.technical_analysis,
        }
    }

    pub fn total(&self) -> f64 {
        Aspect::ALL.iter().map(|a| self.get(*a)).sum()
    }

    /// 全て非負かつ合計が1.0（誤差0.01未満）
    pub fn validate(&self) -> Result<()> {
        if let Some(aspect) = Aspect::ALL.iter().find(|a| !(self.get(**a) >= 0.0)) {
            return Err(Error::Weights(format!(
                "weight for {} must be non-negative, got {}",
                aspect,
                self.get(*aspect)
            )));
        }

        let total = self.total();
        if (total - 1.0).abs() < WEIGHT_SUM_TOLERANCE {
            Ok(())
        } else {
            Err(Error::Weights(format!("aspect weights must sum to 1.0, got {}", total)))
        }
    }
}

/// 閾値の部分更新
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThresholdUpdate {
    pub auto_accept: Option<f64>,
    pub manual_review_suggested: Option<f64>,
    pub manual_review_required: Option<f64>,
    pub error: Option<f64>,
}

impl ThresholdUpdate {
    /// 名前で値を設定。未知の名前は `false`
    pub fn set(&mut self, key: &str, value: f64) -> bool {
        let slot = match key {
            "auto_accept" => &mut self.auto_accept,
            "manual_review_suggested" => &mut self.manual_review_suggested,
            "manual_review_required" => &mut self.manual_review_required,
            "error" => &mut self.error,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    fn apply_to(&self, target: &mut ThresholdConfig) {
        if let Some(v) = self.auto_accept {
            target.auto_accept = v;
        }
        if let Some(v) = self.manual_review_suggested {
            target.manual_review_suggested = v;
        }
        if let Some(v) = self.manual_review_required {
            target.manual_review_required = v;
        }
        if let Some(v) = self.error {
            target.error = v;
        }
    }
}

/// 重みの部分更新
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightUpdate {
    pub content_match: Option<f64>,
    pub quality_assessment: Option<f64>,
    pub category_confidence: Option<f64>,
    pub technical_analysis: Option<f64>,
}

impl WeightUpdate {
    pub fn set(&mut self, key: &str, value: f64) -> bool {
        let slot = match key {
            "content_match" => &mut self.content_match,
            "quality_assessment" => &mut self.quality_assessment,
            "category_confidence" => &mut self.category_confidence,
            "technical_analysis" => &mut self.technical_analysis,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    fn apply_to(&self, target: &mut AspectWeights) {
        if let Some(v) = self.content_match {
            target.content_match = v;
        }
        if let Some(v) = self.quality_assessment {
            target.quality_assessment = v;
        }
        if let Some(v) = self.category_confidence {
            target.category_confidence = v;
        }
        if let Some(v) = self.technical_analysis {
            target.technical_analysis = v;
        }
    }
}

/// 信頼度計算の内訳（毎回再計算、保存しない）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub overall_confidence: f64,
    pub aspect_scores: AspectScores,
    pub aspect_weights: AspectWeights,
    /// スコア × 重み
    pub weighted_contributions: AspectScores,
    pub validation_level: ValidationLevel,
    pub status_color: String,
    pub recommendations: Vec<String>,
}

/// 設定のエクスポート/インポート形式
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub weights: AspectWeights,
    /// 登録済みルール名（関数そのものは保存できない）
    #[serde(default)]
    pub custom_rules: Vec<String>,
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        self.weights.validate()
    }
}

/// 信頼度モデル（閾値・重み・カスタムルール）
#[derive(Debug, Default)]
pub struct ConfidenceModel {
    thresholds: ThresholdConfig,
    weights: AspectWeights,
    rules: RuleRegistry,
}

impl ConfidenceModel {
    /// 閾値と重みを検証して生成
    pub fn new(thresholds: ThresholdConfig, weights: AspectWeights) -> Result<Self> {
        thresholds.validate()?;
        weights.validate()?;
        Ok(Self {
            thresholds,
            weights,
            rules: RuleRegistry::new(),
        })
    }

    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        Self::new(config.thresholds, config.weights)
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    pub fn weights(&self) -> &AspectWeights {
        &self.weights
    }

    /// 総合信頼度 = Σ(スコア × 重み)、[0,1]に収める
    pub fn calculate_confidence(&self, scores: &AspectScores) -> f64 {
        let scores = sanitize_scores(scores);
        let overall: f64 = Aspect::ALL
            .iter()
            .map(|a| scores.get(*a) * self.weights.get(*a))
            .sum();
        let confidence = clamp_unit(overall);

        tracing::debug!(
            ?scores,
            weights = ?self.weights,
            confidence = format!("{:.3}", confidence),
            "Confidence calculated"
        );

        confidence
    }

    /// 信頼度から判定区分を求める
    pub fn validation_level(&self, confidence: f64) -> ValidationLevel {
        if confidence >= self.thresholds.auto_accept {
            ValidationLevel::AutoAccept
        } else if confidence >= self.thresholds.manual_review_suggested {
            ValidationLevel::ManualReviewSuggested
        } else if confidence >= self.thresholds.manual_review_required {
            ValidationLevel::ManualReviewRequired
        } else {
            ValidationLevel::Error
        }
    }

    /// 自動承認に届かない場合は人の確認が必要
    pub fn requires_manual_review(&self, confidence: f64) -> bool {
        confidence < self.thresholds.auto_accept
    }

    pub fn status_color(&self, level: ValidationLevel) -> &'static str {
        level.color()
    }

    /// 内訳を1回で計算（スコア・寄与・区分・色・推奨文）
    pub fn detailed_breakdown(&self, scores: &AspectScores) -> ConfidenceBreakdown {
        let aspect_scores = sanitize_scores(scores);

        let mut weighted_contributions = AspectScores::default();
        for aspect in Aspect::ALL {
            weighted_contributions.set(aspect, aspect_scores.get(aspect) * self.weights.get(aspect));
        }

        let overall_confidence = clamp_unit(
            Aspect::ALL
                .iter()
                .map(|a| weighted_contributions.get(*a))
                .sum(),
        );
        let validation_level = self.validation_level(overall_confidence);

        ConfidenceBreakdown {
            overall_confidence,
            aspect_scores,
            aspect_weights: self.weights,
            weighted_contributions,
            validation_level,
            status_color: self.status_color(validation_level).to_string(),
            recommendations: generate_recommendations(&aspect_scores, overall_confidence),
        }
    }

    /// カスタムルールを登録順に適用
    pub fn apply_custom_rules(&self, image_path: &Path, result: &ScoredResult) -> ScoredResult {
        self.rules.apply(image_path, result)
    }

    pub fn add_custom_rule(&mut self, name: impl Into<String>, rule: Box<dyn CustomRule>) {
        let name = name.into();
        tracing::info!(rule = %name, "Added custom rule");
        self.rules.insert(name, rule);
    }

    pub fn remove_custom_rule(&mut self, name: &str) -> bool {
        let removed = self.rules.remove(name);
        if removed {
            tracing::info!(rule = %name, "Removed custom rule");
        }
        removed
    }

    pub fn custom_rules(&self) -> Vec<String> {
        self.rules.names()
    }

    /// 閾値を部分更新（検証に失敗した場合は何も変更しない）
    pub fn update_thresholds(&mut self, update: &ThresholdUpdate) -> Result<()> {
        let mut candidate = self.thresholds;
        update.apply_to(&mut candidate);
        candidate.validate()?;

        tracing::info!(thresholds = ?candidate, "Updated thresholds");
        self.thresholds = candidate;
        Ok(())
    }

    /// 重みを部分更新（検証に失敗した場合は何も変更しない）
    pub fn update_weights(&mut self, update: &WeightUpdate) -> Result<()> {
        let mut candidate = self.weights;
        update.apply_to(&mut candidate);
        candidate.validate()?;

        tracing::info!(weights = ?candidate, "Updated weights");
        self.weights = candidate;
        Ok(())
    }

    pub fn export_config(&self) -> ModelConfig {
        ModelConfig {
            thresholds: self.thresholds,
            weights: self.weights,
            custom_rules: self.custom_rules(),
        }
    }

    /// 設定を取り込む。閾値・重みの両方が有効な場合のみ反映
    pub fn import_config(&mut self, config: &ModelConfig) -> Result<()> {
        config.validate()?;

        for name in config.custom_rules.iter().filter(|n| !self.rules.contains(n)) {
            tracing::warn!(rule = %name, "Imported config names a custom rule that is not registered");
        }

        self.thresholds = config.thresholds;
        self.weights = config.weights;
        tracing::info!("Configuration imported successfully");
        Ok(())
    }
}

/// 範囲外のスコアは警告して[0,1]に収める
fn sanitize_scores(scores: &AspectScores) -> AspectScores {
    let mut sanitized = *scores;
    for aspect in Aspect::ALL {
        let score = scores.get(aspect);
        if score.is_nan() {
            tracing::warn!(aspect = %aspect, "Score is not a number, using 0.0");
            sanitized.set(aspect, 0.0);
        } else if !(0.0..=1.0).contains(&score) {
            tracing::warn!(aspect = %aspect, score, "Score out of range, clamping");
            sanitized.set(aspect, clamp_unit(score));
        }
    }
    sanitized
}

/// 観点スコアと総合信頼度から推奨文を生成
///
/// 観点別（content → quality → category → technical）、総合の順。
/// 何も該当しなければ「基準を満たす」の1件。
pub fn generate_recommendations(scores: &AspectScores, overall_confidence: f64) -> Vec<String> {
    let mut recommendations = Vec::new();

    if scores.content_match < 0.7 {
        recommendations.push("Consider improving content clarity or resolution".to_string());
    }
    if scores.quality_assessment < 0.6 {
        recommendations
            .push("Image quality may need improvement (compression, artifacts, etc.)".to_string());
    }
    if scores.category_confidence < 0.5 {
        recommendations
            .push("Image category is unclear, consider manual classification".to_string());
    }
    if scores.technical_analysis < 0.6 {
        recommendations
            .push("Technical aspects may need attention (format, size, etc.)".to_string());
    }

    if overall_confidence < 0.5 {
        recommendations
            .push("Manual review strongly recommended due to low overall confidence".to_string());
    } else if overall_confidence < 0.8 {
        recommendations.push("Consider manual review for quality assurance".to_string());
    }

    if recommendations.is_empty() {
        recommendations.push("Image meets quality standards".to_string());
    }

    recommendations
}
