//! 解析結果の型定義
//!
//! CLI・GUIなど全フロントエンドで共有される型:
//! - AnalysisResult: 1回の解析試行の結果
//! - ValidationLevel: 信頼度から決まる判定区分
//! - AspectScores: 4観点のスコア（信頼度計算の入力）

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

/// 解析失敗時のカテゴリ
pub const FALLBACK_CATEGORY: &str = "other";

/// 画像解析結果
///
/// 1画像・1試行ごとに生成され、生成後は変更しない。
/// `success == false` のとき `confidence == 0.0`、カテゴリは `["other"]`。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,

    pub confidence: f64,

    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default)]
    pub issues: Vec<String>,

    /// 診断用データ（ファイルサイズ、タイムスタンプ、ハッシュシード等）
    #[serde(default)]
    pub metadata: Map<String, Value>,

    #[serde(default)]
    pub error_message: Option<String>,

    /// 呼び出しから返却までの経過秒数
    #[serde(default)]
    pub processing_time: f64,
}

impl AnalysisResult {
    /// 成功結果を生成（confidenceは[0,1]に収める）
    pub fn success(
        confidence: f64,
        categories: Vec<String>,
        issues: Vec<String>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            success: true,
            confidence: clamp_unit(confidence),
            categories,
            issues,
            metadata,
            error_message: None,
            processing_time: 0.0,
        }
    }

    /// 解析失敗時の終端結果
    pub fn fallback_result(image_path: &Path, error_message: impl Into<String>) -> Self {
        let error_message = error_message.into();
        let mut metadata = Map::new();
        metadata.insert("fallback".into(), Value::Bool(true));
        metadata.insert(
            "image_path".into(),
            Value::String(image_path.display().to_string()),
        );
        metadata.insert("error_type".into(), Value::String("fallback".into()));

        Self {
            success: false,
            confidence: 0.0,
            categories: vec![FALLBACK_CATEGORY.to_string()],
            issues: vec![format!("Analysis failed: {}", error_message)],
            metadata,
            error_message: Some(error_message),
            processing_time: 0.0,
        }
    }

    /// 処理時間を設定した結果を返す
    pub fn with_processing_time(mut self, seconds: f64) -> Self {
        self.processing_time = seconds;
        self
    }

    pub fn is_fallback(&self) -> bool {
        self.metadata
            .get("fallback")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn primary_category(&self) -> &str {
        self.categories
            .first()
            .map(String::as_str)
            .unwrap_or(FALLBACK_CATEGORY)
    }
}

/// 判定区分（信頼度から一意に決まる）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    AutoAccept,
    ManualReviewSuggested,
    ManualReviewRequired,
    Error,
}

impl ValidationLevel {
    pub const ALL: [ValidationLevel; 4] = [
        ValidationLevel::AutoAccept,
        ValidationLevel::ManualReviewSuggested,
        ValidationLevel::ManualReviewRequired,
        ValidationLevel::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationLevel::AutoAccept => "auto_accept",
            ValidationLevel::ManualReviewSuggested => "manual_review_suggested",
            ValidationLevel::ManualReviewRequired => "manual_review_required",
            ValidationLevel::Error => "error",
        }
    }

    /// 表示色（16進カラーコード）
    pub fn color(&self) -> &'static str {
        match self {
            ValidationLevel::AutoAccept => "#4CAF50",
            ValidationLevel::ManualReviewSuggested => "#FFC107",
            ValidationLevel::ManualReviewRequired => "#FF9800",
            ValidationLevel::Error => "#F44336",
        }
    }

    /// 厳しさの順位（0が最も寛容）
    pub fn strictness(&self) -> u8 {
        match self {
            ValidationLevel::AutoAccept => 0,
            ValidationLevel::ManualReviewSuggested => 1,
            ValidationLevel::ManualReviewRequired => 2,
            ValidationLevel::Error => 3,
        }
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 信頼度計算の観点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aspect {
    ContentMatch,
    QualityAssessment,
    CategoryConfidence,
    TechnicalAnalysis,
}

impl Aspect {
    /// 推奨文の生成順もこの順序
    pub const ALL: [Aspect; 4] = [
        Aspect::ContentMatch,
        Aspect::QualityAssessment,
        Aspect::CategoryConfidence,
        Aspect::TechnicalAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Aspect::ContentMatch => "content_match",
            Aspect::QualityAssessment => "quality_assessment",
            Aspect::CategoryConfidence => "category_confidence",
            Aspect::TechnicalAnalysis => "technical_analysis",
        }
    }
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 4観点のスコア（欠けている観点は0.0）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AspectScores {
    pub content_match: f64,
    pub quality_assessment: f64,
    pub category_confidence: f64,
    pub technical_analysis: f64,
}

impl AspectScores {
    pub fn new(
        content_match: f64,
        quality_assessment: f64,
        category_confidence: f64,
        technical_analysis: f64,
    ) -> Self {
        Self {
            content_match,
            quality_assessment,
            category_confidence,
            technical_analysis,
        }
    }

    pub fn get(&self, aspect: Aspect) -> f64 {
        match aspect {
            Aspect::ContentMatch => self.content_match,
            Aspect::QualityAssessment => self.quality_assessment,
            Aspect::CategoryConfidence => self.category_confidence,
            Aspect::TechnicalAnalysis => self.technical_analysis,
        }
    }

    pub fn set(&mut self, aspect: Aspect, value: f64) {
        match aspect {
            Aspect::ContentMatch => self.content_match = value,
            Aspect::QualityAssessment => self.quality_assessment = value,
            Aspect::CategoryConfidence => self.category_confidence = value,
            Aspect::TechnicalAnalysis => self.technical_analysis = value,
        }
    }

    /// 観点名→値のマップから生成（数値でない値・未知のキーは無視）
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let mut scores = Self::default();
        for aspect in Aspect::ALL {
            if let Some(value) = map.get(aspect.as_str()) {
                match value.as_f64() {
                    Some(v) => scores.set(aspect, v),
                    None => tracing::warn!(aspect = %aspect, "Invalid score type: {}", value),
                }
            }
        }
        scores
    }
}

/// 値を[0,1]に収める（NaNは0.0）
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
