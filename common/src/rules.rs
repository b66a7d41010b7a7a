//! カスタムルール
//!
//! 基本の信頼度計算の後に適用される補正ルール。
//! 登録順に実行され、失敗したルールはログに残してスキップする。

use crate::error::Result;
use crate::types::clamp_unit;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

/// ルールの入出力となる判定途中の結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub confidence: f64,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl ScoredResult {
    pub fn new(confidence: f64, categories: Vec<String>, issues: Vec<String>) -> Self {
        Self {
            confidence,
            categories,
            issues,
        }
    }
}

/// ルール1件分の補正内容
///
/// - `confidence_adjustment`: 現在の信頼度に加算（毎回[0,1]に収める）
/// - `issues`: 既存の指摘に追加
/// - `categories`: カテゴリ一覧を置き換え（後のルールが優先）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleAdjustment {
    #[serde(default)]
    pub confidence_adjustment: Option<f64>,
    #[serde(default)]
    pub issues: Option<Vec<String>>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
}

impl RuleAdjustment {
    pub fn confidence(adjustment: f64) -> Self {
        Self {
            confidence_adjustment: Some(adjustment),
            ..Default::default()
        }
    }

    pub fn with_issue(mut self, issue: impl Into<String>) -> Self {
        self.issues.get_or_insert_with(Vec::new).push(issue.into());
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = Some(categories);
        self
    }
}

/// カスタムルール
///
/// `Ok(None)` は「補正なし」。`Err` はそのルールだけが無効になる。
pub trait CustomRule: Send + Sync {
    fn evaluate(&self, image_path: &Path, current: &ScoredResult) -> Result<Option<RuleAdjustment>>;
}

impl<F> CustomRule for F
where
    F: Fn(&Path, &ScoredResult) -> Result<Option<RuleAdjustment>> + Send + Sync,
{
    fn evaluate(&self, image_path: &Path, current: &ScoredResult) -> Result<Option<RuleAdjustment>> {
        self(image_path, current)
    }
}

/// クロージャをルールとして包む（引数・戻り値の型はここで推論される）
pub fn rule_fn<F>(f: F) -> Box<dyn CustomRule>
where
    F: Fn(&Path, &ScoredResult) -> Result<Option<RuleAdjustment>> + Send + Sync + 'static,
{
    Box::new(f)
}

/// 名前付きルールの登録簿（登録順を保持）
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<(String, Box<dyn CustomRule>)>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// ルールを登録。同名のルールは位置を保ったまま置き換える
    pub fn insert(&mut self, name: impl Into<String>, rule: Box<dyn CustomRule>) {
        let name = name.into();
        match self.rules.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = rule,
            None => self.rules.push((name, rule)),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|(n, _)| n != name);
        self.rules.len() != before
    }

    pub fn names(&self) -> Vec<String> {
        self.rules.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 全ルールを登録順に適用
    pub fn apply(&self, image_path: &Path, input: &ScoredResult) -> ScoredResult {
        let mut current = input.clone();

        for (name, rule) in &self.rules {
            tracing::debug!(rule = %name, image = %image_path.display(), "Applying custom rule");

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                rule.evaluate(image_path, &current)
            }));

            let adjustment = match outcome {
                Ok(Ok(Some(adjustment))) => adjustment,
                Ok(Ok(None)) => continue,
                Ok(Err(e)) => {
                    tracing::error!(rule = %name, error = %e, "Custom rule failed");
                    continue;
                }
                Err(payload) => {
                    tracing::error!(
                        rule = %name,
                        panic = %panic_message(payload.as_ref()),
                        "Custom rule panicked"
                    );
                    continue;
                }
            };

            if let Some(delta) = adjustment.confidence_adjustment {
                if delta.is_finite() {
                    current.confidence = clamp_unit(current.confidence + delta);
                } else {
                    tracing::error!(rule = %name, delta, "Custom rule returned a non-finite adjustment");
                    continue;
                }
            }
            if let Some(issues) = adjustment.issues {
                current.issues.extend(issues);
            }
            if let Some(categories) = adjustment.categories {
                current.categories = categories;
            }

            tracing::debug!(rule = %name, confidence = current.confidence, "Custom rule applied");
        }

        current
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn adjust(delta: f64) -> Box<dyn CustomRule> {
        rule_fn(move |_, _| Ok(Some(RuleAdjustment::confidence(delta))))
    }

    fn input() -> ScoredResult {
        ScoredResult::new(0.5, vec!["effects".into()], vec!["existing".into()])
    }

    #[test]
    fn test_empty_registry_returns_copy() {
        let registry = RuleRegistry::new();
        let original = input();
        assert_eq!(registry.apply(Path::new("a.png"), &original), original);
    }

    #[test]
    fn test_clamps_after_every_rule() {
        let mut registry = RuleRegistry::new();
        registry.insert("up", adjust(0.8));
        registry.insert("down", adjust(-0.3));

        // 0.5 + 0.8 → 1.0（ここで丸める）→ 0.7
        let result = registry.apply(Path::new("a.png"), &input());
        assert!((result.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_issues_accumulate_and_categories_replace() {
        let mut registry = RuleRegistry::new();
        registry.insert(
            "first",
            rule_fn(|_, _| {
                Ok(Some(
                    RuleAdjustment::default()
                        .with_issue("first issue")
                        .with_categories(vec!["ui_elements".into()]),
                ))
            }),
        );
        registry.insert(
            "second",
            rule_fn(|_, _| {
                Ok(Some(
                    RuleAdjustment::default()
                        .with_issue("second issue")
                        .with_categories(vec!["environments".into()]),
                ))
            }),
        );

        let result = registry.apply(Path::new("a.png"), &input());
        assert_eq!(result.issues, vec!["existing", "first issue", "second issue"]);
        assert_eq!(result.categories, vec!["environments"]);
    }

    #[test]
    fn test_failing_rule_is_isolated() {
        let mut registry = RuleRegistry::new();
        registry.insert(
            "broken",
            rule_fn(|_, _| {
                Err(Error::Rule {
                    name: "broken".into(),
                    message: "boom".into(),
                })
            }),
        );
        registry.insert("bonus", adjust(0.1));

        let result = registry.apply(Path::new("a.png"), &input());
        assert!((result.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_panicking_rule_is_isolated() {
        let mut registry = RuleRegistry::new();
        registry.insert(
            "out_of_bounds",
            rule_fn(|_, _| {
                let empty: Vec<f64> = Vec::new();
                let value = empty[3];
                Ok(Some(RuleAdjustment::confidence(value)))
            }),
        );
        registry.insert("explicit", rule_fn(|_, _| panic!("rule bug")));
        registry.insert("bonus", adjust(0.1));

        let result = registry.apply(Path::new("a.png"), &input());
        assert!((result.confidence - 0.6).abs() < 1e-9);
        assert_eq!(result.issues, vec!["existing"]);
    }

    #[test]
    fn test_later_rules_see_adjusted_value() {
        let mut registry = RuleRegistry::new();
        registry.insert("down", adjust(-0.4));
        registry.insert(
            "observer",
            rule_fn(|_, current| {
                if current.confidence < 0.2 {
                    Ok(Some(RuleAdjustment::default().with_issue("low after adjustment")))
                } else {
                    Ok(None)
                }
            }),
        );

        let result = registry.apply(Path::new("a.png"), &input());
        assert!(result.issues.contains(&"low after adjustment".to_string()));
    }

    #[test]
    fn test_non_finite_adjustment_is_skipped() {
        let mut registry = RuleRegistry::new();
        registry.insert("nan", adjust(f64::NAN));
        let result = registry.apply(Path::new("a.png"), &input());
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_insert_same_name_keeps_position() {
        let mut registry = RuleRegistry::new();
        registry.insert("a", adjust(0.1));
        registry.insert("b", adjust(0.1));
        registry.insert("a", adjust(0.2));
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert_eq!(registry.len(), 2);

        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));
        assert_eq!(registry.names(), vec!["b"]);
    }
}
