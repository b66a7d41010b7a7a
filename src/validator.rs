//! 検証オーケストレーション
//!
//! 解析クライアントの結果を観点スコアに写像し、信頼度モデルとカスタムルールで
//! 最終判定を行う。バッチは並列数を制限して処理し、結果は入力順のスロットに格納する。

use crate::analyzer::AnalysisClient;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use image_validator_common::{
    generate_recommendations, AnalysisResult, AspectScores, ConfidenceBreakdown,
    ConfidenceModel, ScoredResult, ValidationLevel, FALLBACK_CATEGORY,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 解析結果の信頼度から4観点スコアへの写像
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AspectPolicy {
    /// quality_assessment = confidence × quality_factor
    pub quality_factor: f64,
    /// technical_analysis の固定値
    pub technical_baseline: f64,
}

impl Default for AspectPolicy {
    fn default() -> Self {
        Self {
            quality_factor: 0.9,
            technical_baseline: 0.9,
        }
    }
}

impl AspectPolicy {
    pub fn scores_for(&self, analysis: &AnalysisResult) -> AspectScores {
        AspectScores::new(
            analysis.confidence,
            analysis.confidence * self.quality_factor,
            analysis.confidence,
            self.technical_baseline,
        )
    }
}

/// 1画像の検証結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub image_path: PathBuf,
    pub success: bool,
    pub confidence: f64,
    pub validation_level: ValidationLevel,
    pub status_color: String,
    pub categories: Vec<String>,
    pub issues: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// 解析失敗時は None
    #[serde(default)]
    pub breakdown: Option<ConfidenceBreakdown>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub manual_review_required: bool,
    #[serde(default)]
    pub manually_reviewed: bool,
    #[serde(default)]
    pub review_notes: String,
    #[serde(default)]
    pub review_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processing_time: f64,
}

/// 手動レビューによる修正
#[derive(Debug, Clone, PartialEq)]
pub struct ManualCorrection {
    pub categories: Vec<String>,
    pub notes: String,
    pub timestamp: DateTime<Utc>,
}

impl ManualCorrection {
    pub fn new(categories: Vec<String>, notes: impl Into<String>) -> Self {
        Self {
            categories,
            notes: notes.into(),
            timestamp: Utc::now(),
        }
    }
}

impl ValidationRecord {
    /// 解析結果から判定を組み立てる
    ///
    /// 成功時: 観点スコア → 総合信頼度 → カスタムルール → 判定区分。
    /// 失敗時: 信頼度0、カテゴリ "other"、エラーメッセージを指摘に載せる。
    pub fn from_analysis(
        image_path: &Path,
        analysis: AnalysisResult,
        model: &ConfidenceModel,
        policy: &AspectPolicy,
    ) -> Self {
        if !analysis.success {
            let level = model.validation_level(0.0);
            let issue = analysis
                .error_message
                .clone()
                .unwrap_or_else(|| "Analysis failed".to_string());
            return Self {
                image_path: image_path.to_path_buf(),
                success: false,
                confidence: 0.0,
                validation_level: level,
                status_color: model.status_color(level).to_string(),
                categories: vec![FALLBACK_CATEGORY.to_string()],
                issues: vec![issue],
                recommendations: Vec::new(),
                breakdown: None,
                metadata: analysis.metadata,
                manual_review_required: model.requires_manual_review(0.0),
                manually_reviewed: false,
                review_notes: String::new(),
                review_timestamp: None,
                processing_time: analysis.processing_time,
            };
        }

        let mut breakdown = model.detailed_breakdown(&policy.scores_for(&analysis));
        let scored = ScoredResult::new(
            breakdown.overall_confidence,
            analysis.categories,
            analysis.issues,
        );
        let adjusted = model.apply_custom_rules(image_path, &scored);

        // 内訳の判定・推奨はルール適用後の信頼度に揃える（overall_confidence は加重合計のまま）
        let level = model.validation_level(adjusted.confidence);
        breakdown.validation_level = level;
        breakdown.status_color = model.status_color(level).to_string();
        breakdown.recommendations =
            generate_recommendations(&breakdown.aspect_scores, adjusted.confidence);

        debug!(
            image = %image_path.display(),
            base = breakdown.overall_confidence,
            adjusted = adjusted.confidence,
            level = %level,
            "Validated image"
        );

        Self {
            image_path: image_path.to_path_buf(),
            success: true,
            confidence: adjusted.confidence,
            validation_level: level,
            status_color: model.status_color(level).to_string(),
            categories: adjusted.categories,
            issues: adjusted.issues,
            recommendations: breakdown.recommendations.clone(),
            breakdown: Some(breakdown),
            metadata: analysis.metadata,
            manual_review_required: model.requires_manual_review(adjusted.confidence),
            manually_reviewed: false,
            review_notes: String::new(),
            review_timestamp: None,
            processing_time: analysis.processing_time,
        }
    }

    /// 手動レビュー結果を反映（信頼度1.0で自動承認扱い）
    pub fn apply_correction(&mut self, correction: ManualCorrection) {
        if !correction.categories.is_empty() {
            self.categories = correction.categories;
        }
        self.confidence = 1.0;
        self.validation_level = ValidationLevel::AutoAccept;
        self.status_color = ValidationLevel::AutoAccept.color().to_string();
        self.manual_review_required = false;
        self.manually_reviewed = true;
        self.review_notes = correction.notes;
        self.review_timestamp = Some(correction.timestamp);
    }

    /// まだ人の確認を待っているか
    pub fn is_pending_review(&self) -> bool {
        self.manual_review_required && !self.manually_reviewed
    }
}

/// バッチの集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub auto_accepted: usize,
    pub pending_review: usize,
    pub manually_reviewed: usize,
    pub average_confidence: f64,
}

impl BatchSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ValidationRecord>) -> Self {
        let mut summary = BatchSummary::default();
        let mut confidence_sum = 0.0;

        for record in records {
            summary.total += 1;
            if record.success {
                summary.successful += 1;
            } else {
                summary.failed += 1;
            }
            if record.validation_level == ValidationLevel::AutoAccept {
                summary.auto_accepted += 1;
            }
            if record.is_pending_review() {
                summary.pending_review += 1;
            }
            if record.manually_reviewed {
                summary.manually_reviewed += 1;
            }
            confidence_sum += record.confidence;
        }

        if summary.total > 0 {
            summary.average_confidence = confidence_sum / summary.total as f64;
        }
        summary
    }
}

pub struct ValidationOrchestrator {
    client: AnalysisClient,
    model: ConfidenceModel,
    policy: AspectPolicy,
    concurrency: usize,
    categories: Option<Vec<String>>,
    prompt: Option<String>,
}

impl ValidationOrchestrator {
    pub fn new(client: AnalysisClient, model: ConfidenceModel) -> Self {
        Self {
            client,
            model,
            policy: AspectPolicy::default(),
            concurrency: 4,
            categories: None,
            prompt: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_policy(mut self, policy: AspectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn client(&self) -> &AnalysisClient {
        &self.client
    }

    pub fn model(&self) -> &ConfidenceModel {
        &self.model
    }

    /// バッチ間でのみ変更すること
    pub fn model_mut(&mut self) -> &mut ConfidenceModel {
        &mut self.model
    }

    pub async fn validate_image(&self, image_path: &Path) -> ValidationRecord {
        let analysis = self
            .client
            .analyze_image(image_path, self.categories.as_deref(), self.prompt.as_deref())
            .await;
        ValidationRecord::from_analysis(image_path, analysis, &self.model, &self.policy)
    }

    /// 複数画像を並列に検証
    ///
    /// 戻り値は入力と同じ順序・同じ長さ。キャンセル後に開始されなかった画像は `None`、
    /// 途中で中断された画像はキャンセルを示す失敗レコード。`on_complete` は完了順に呼ばれる。
    pub async fn validate_batch<F>(
        &self,
        images: &[PathBuf],
        mut on_complete: F,
    ) -> Vec<Option<ValidationRecord>>
    where
        F: FnMut(usize, &ValidationRecord),
    {
        let cancel = self.client.cancellation_token();
        let mut slots: Vec<Option<ValidationRecord>> = vec![None; images.len()];

        info!(count = images.len(), concurrency = self.concurrency, "Starting batch validation");

        let mut completed = stream::iter(images.iter().cloned().enumerate())
            .map(|(index, path)| {
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (index, None);
                    }
                    (index, Some(self.validate_image(&path).await))
                }
            })
            .buffer_unordered(self.concurrency);

        while let Some((index, record)) = completed.next().await {
            if let Some(record) = record {
                on_complete(index, &record);
                slots[index] = Some(record);
            }
        }

        let summary = BatchSummary::from_records(slots.iter().flatten());
        info!(
            total = summary.total,
            auto_accepted = summary.auto_accepted,
            pending_review = summary.pending_review,
            failed = summary.failed,
            "Batch validation finished"
        );

        slots
    }
}
