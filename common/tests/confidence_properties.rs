//! 信頼度モデルのプロパティテスト
//!
//! 範囲・一致・単調性を任意の入力で検証

use image_validator_common::{
    AspectScores, AspectWeights, ConfidenceModel, ThresholdConfig, ValidationLevel,
};
use proptest::prelude::*;

fn unit() -> impl Strategy<Value = f64> {
    0.0f64..=1.0
}

fn scores() -> impl Strategy<Value = AspectScores> {
    (unit(), unit(), unit(), unit()).prop_map(|(c, q, k, t)| AspectScores::new(c, q, k, t))
}

/// 合計1.0の重み（正規化して生成）
fn weights() -> impl Strategy<Value = AspectWeights> {
    (0.01f64..1.0, 0.01f64..1.0, 0.01f64..1.0, 0.01f64..1.0).prop_map(|(a, b, c, d)| {
        let total = a + b + c + d;
        AspectWeights {
            content_match: a / total,
            quality_assessment: b / total,
            category_confidence: c / total,
            technical_analysis: d / total,
        }
    })
}

/// 昇順の閾値
fn thresholds() -> impl Strategy<Value = ThresholdConfig> {
    (unit(), unit(), unit(), unit()).prop_map(|(a, b, c, d)| {
        let mut cuts = [a, b, c, d];
        cuts.sort_by(|x, y| x.partial_cmp(y).unwrap());
        ThresholdConfig {
            error: cuts[0],
            manual_review_required: cuts[1],
            manual_review_suggested: cuts[2],
            auto_accept: cuts[3],
        }
    })
}

proptest! {
    #[test]
    fn confidence_stays_in_unit_range(s in scores(), w in weights(), t in thresholds()) {
        let model = ConfidenceModel::new(t, w).unwrap();
        let confidence = model.calculate_confidence(&s);
        prop_assert!((0.0..=1.0).contains(&confidence));
    }

    #[test]
    fn breakdown_agrees_with_calculation(s in scores(), w in weights()) {
        let model = ConfidenceModel::new(ThresholdConfig::default(), w).unwrap();
        let confidence = model.calculate_confidence(&s);
        let breakdown = model.detailed_breakdown(&s);
        prop_assert!((confidence - breakdown.overall_confidence).abs() < 1e-9);
        prop_assert_eq!(breakdown.validation_level, model.validation_level(confidence));
    }

    #[test]
    fn classification_is_monotonic(a in unit(), b in unit(), t in thresholds()) {
        let model = ConfidenceModel::new(t, AspectWeights::default()).unwrap();
        let (high, low) = if a >= b { (a, b) } else { (b, a) };
        prop_assert!(
            model.validation_level(high).strictness() <= model.validation_level(low).strictness()
        );
    }

    #[test]
    fn threshold_value_maps_to_its_band(t in thresholds()) {
        let model = ConfidenceModel::new(t, AspectWeights::default()).unwrap();
        prop_assert_eq!(model.validation_level(t.auto_accept), ValidationLevel::AutoAccept);
        if t.manual_review_suggested < t.auto_accept {
            prop_assert_eq!(
                model.validation_level(t.manual_review_suggested),
                ValidationLevel::ManualReviewSuggested
            );
        }
    }

    #[test]
    fn out_of_range_scores_never_escape(c in -5.0f64..5.0, q in -5.0f64..5.0) {
        let model = ConfidenceModel::default();
        let confidence = model.calculate_confidence(&AspectScores::new(c, q, 0.5, 0.5));
        prop_assert!((0.0..=1.0).contains(&confidence));
    }
}

#[test]
fn default_model_end_to_end() {
    let model = ConfidenceModel::default();
    let breakdown = model.detailed_breakdown(&AspectScores::new(0.95, 0.9, 0.88, 0.92));
    assert!((breakdown.overall_confidence - 0.918).abs() < 1e-9);
    assert_eq!(breakdown.validation_level, ValidationLevel::AutoAccept);

    let breakdown = model.detailed_breakdown(&AspectScores::default());
    assert_eq!(breakdown.validation_level, ValidationLevel::Error);
    assert!(breakdown
        .recommendations
        .contains(&"Manual review strongly recommended due to low overall confidence".to_string()));
}
