//! プロンプト生成モジュール
//!
//! - DEFAULT_CATEGORIES: ゲームアセットの既定カテゴリ
//! - build_analysis_prompt: 画像1枚の解析用プロンプト

/// カテゴリ未指定時の分類先
pub const DEFAULT_CATEGORIES: &[&str] = &["animations", "environments", "ui_elements", "effects"];

pub fn default_categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
}

/// 解析プロンプト生成
///
/// # Arguments
/// * `categories` - 分類候補
///
/// # Returns
/// JSONオブジェクト1件での回答を求めるプロンプト
pub fn build_analysis_prompt(categories: &[String]) -> String {
    let categories = categories.join(", ");

    format!(
        r#"Analyze this game asset image and classify it into one of these categories: {categories}.

Provide:
1. Primary category classification
2. Confidence score (0.0-1.0) for the classification
3. Any quality issues or recommendations
4. Technical analysis of the image properties

Focus on game development context and asset quality standards.

Respond with a single JSON object only:
{{"category": "<one of the categories>", "confidence": 0.0, "issues": ["..."]}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_categories() {
        let prompt = build_analysis_prompt(&default_categories());
        assert!(prompt.contains("animations, environments, ui_elements, effects"));
        assert!(prompt.contains("Confidence score (0.0-1.0)"));
        assert!(prompt.contains(r#"{"category""#));
    }

    #[test]
    fn test_prompt_custom_categories() {
        let prompt = build_analysis_prompt(&["tiles".to_string(), "icons".to_string()]);
        assert!(prompt.contains("categories: tiles, icons."));
    }
}
