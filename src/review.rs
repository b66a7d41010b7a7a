//! 対話式の手動レビュー
//!
//! 自動承認に届かなかった画像を1枚ずつ確認し、カテゴリとメモを付けて保存する。

use crate::error::{Result, ValidatorError};
use crate::export::{load_results, save_results_file};
use crate::validator::{ManualCorrection, ValidationRecord};
use dialoguer::{Input, MultiSelect, Select};
use image_validator_common::default_categories;
use std::collections::HashSet;
use std::path::Path;

/// レビュー待ちのレコード番号
pub fn pending_reviews(records: &[ValidationRecord]) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_pending_review())
        .map(|(i, _)| i)
        .collect()
}

/// 既存カテゴリと既定カテゴリを候補に（重複除去、出現順）
pub fn collect_known_categories(records: &[ValidationRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    default_categories()
        .into_iter()
        .chain(records.iter().flat_map(|r| r.categories.iter().cloned()))
        .filter(|c| !c.trim().is_empty())
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

/// レビュー結果を反映
pub fn apply_manual_review(
    record: &mut ValidationRecord,
    categories: Vec<String>,
    notes: impl Into<String>,
) {
    record.apply_correction(ManualCorrection::new(categories, notes));
}

/// 対話アクション
pub enum ReviewAction {
    /// 現在のカテゴリで承認
    Accept,
    /// カテゴリを選び直して承認
    Recategorize,
    /// この画像をスキップ
    Skip,
    /// 保存して終了
    Quit,
}

pub fn run_interactive_review(input_path: &Path, output_path: Option<&Path>) -> Result<()> {
    let mut file = load_results(input_path)?;

    let pending = pending_reviews(&file.results);
    if pending.is_empty() {
        println!("✓ レビュー待ちの画像はありません");
        return Ok(());
    }

    println!("🔍 レビュー待ち: {}枚", pending.len());
    println!("---\n");

    let candidates = collect_known_categories(&file.results);
    let mut reviewed = 0usize;

    for (count, &idx) in pending.iter().enumerate() {
        let record = &file.results[idx];
        println!(
            "[{}/{}] {} (信頼度 {:.1}%, {})",
            count + 1,
            pending.len(),
            record.image_path.display(),
            record.confidence * 100.0,
            record.validation_level
        );
        println!("  カテゴリ: {}", record.categories.join(", "));
        for issue in &record.issues {
            println!("  ⚠ {}", issue);
        }

        match prompt_review_action()? {
            ReviewAction::Accept => {
                let notes = prompt_notes()?;
                apply_manual_review(&mut file.results[idx], Vec::new(), notes);
                reviewed += 1;
                println!("  → 承認\n");
            }
            ReviewAction::Recategorize => {
                let categories = prompt_categories(&candidates, &file.results[idx].categories)?;
                let notes = prompt_notes()?;
                println!("  → {}\n", categories.join(", "));
                apply_manual_review(&mut file.results[idx], categories, notes);
                reviewed += 1;
            }
            ReviewAction::Skip => {
                println!("  → スキップ\n");
            }
            ReviewAction::Quit => {
                println!("保存して終了します...");
                break;
            }
        }
    }

    let output = output_path.unwrap_or(input_path);
    save_results_file(&mut file, output)?;

    println!("\n✓ {}枚をレビューして保存しました: {}", reviewed, output.display());

    Ok(())
}

fn prompt_review_action() -> Result<ReviewAction> {
    let items = ["承認", "カテゴリを変更して承認", "スキップ", "保存して終了"];
    let selection = Select::new()
        .with_prompt("操作")
        .items(&items)
        .default(0)
        .interact()
        .map_err(|e| ValidatorError::Interaction(e.to_string()))?;

    Ok(match selection {
        0 => ReviewAction::Accept,
        1 => ReviewAction::Recategorize,
        2 => ReviewAction::Skip,
        _ => ReviewAction::Quit,
    })
}

fn prompt_categories(candidates: &[String], current: &[String]) -> Result<Vec<String>> {
    let defaults: Vec<bool> = candidates.iter().map(|c| current.contains(c)).collect();
    let selected = MultiSelect::new()
        .with_prompt("カテゴリ (Spaceで選択)")
        .items(candidates)
        .defaults(&defaults)
        .interact()
        .map_err(|e| ValidatorError::Interaction(e.to_string()))?;

    Ok(selected.into_iter().map(|i| candidates[i].clone()).collect())
}

fn prompt_notes() -> Result<String> {
    let notes: String = Input::new()
        .with_prompt("メモ")
        .allow_empty(true)
        .interact_text()
        .map_err(|e| ValidatorError::Interaction(e.to_string()))?;
    Ok(notes.trim().to_string())
}
