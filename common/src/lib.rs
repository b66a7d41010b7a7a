//! Image Validator Common Library
//!
//! CLIとGUIで共有される型・信頼度モデル・パーサー

pub mod types;
pub mod error;
pub mod confidence;
pub mod rules;
pub mod parser;
pub mod prompts;

pub use types::{clamp_unit, AnalysisResult, Aspect, AspectScores, ValidationLevel, FALLBACK_CATEGORY};
pub use error::{Error, Result};
pub use confidence::{
    generate_recommendations, AspectWeights, ConfidenceBreakdown, ConfidenceModel, ModelConfig,
    ThresholdConfig, ThresholdUpdate, WeightUpdate,
};
pub use rules::{rule_fn, CustomRule, RuleAdjustment, RuleRegistry, ScoredResult};
pub use parser::{extract_json, parse_tool_response, ToolResponse};
pub use prompts::{build_analysis_prompt, default_categories, DEFAULT_CATEGORIES};
