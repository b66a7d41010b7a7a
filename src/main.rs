use anyhow::{bail, Context};
use clap::Parser;
use godot_image_validator::{analyzer, cli, config, export, review, scanner, validator};
use godot_image_validator::error::ValidatorError;
use image_validator_common::{AspectScores, ConfidenceBreakdown, ThresholdUpdate, WeightUpdate};
use indicatif::{ProgressBar, ProgressStyle};
use cli::{Cli, Commands};
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use validator::{BatchSummary, ValidationOrchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load().context("設定の読み込みに失敗しました")?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    match cli.command {
        Commands::Validate { folder, output, format, concurrency, categories, prompt, recursive } => {
            println!("🎮 image-validator - 一括検証\n");

            // 1. 画像スキャン
            println!("[1/3] 画像をスキャン中...");
            let images = scanner::scan_folder(&folder, recursive)?;
            if images.is_empty() {
                return Err(ValidatorError::NoImagesFound(folder.display().to_string()).into());
            }
            println!("✔ {}枚の画像を検出\n", images.len());

            // 2. 解析・判定
            println!("[2/3] 解析中... (バックエンド: {})", config.backend);
            let client = analyzer::build_client(config.backend, config.client);
            let cancel = client.cancellation_token();
            let categories = if categories.is_empty() { config.categories.clone() } else { categories };

            let mut orchestrator = ValidationOrchestrator::new(client, config.build_model()?)
                .with_concurrency(concurrency.unwrap_or(config.concurrency))
                .with_categories(categories);
            if let Some(prompt) = prompt {
                orchestrator = orchestrator.with_prompt(prompt);
            }

            // Ctrl+Cで残りを打ち切る
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            });

            let progress = ProgressBar::new(images.len() as u64);
            progress.set_style(
                ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );

            let paths: Vec<PathBuf> = images.iter().map(|i| i.path.clone()).collect();
            let slots = orchestrator
                .validate_batch(&paths, |_, record| {
                    progress.set_message(format!(
                        "{} ({:.1}%)",
                        record.image_path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
                        record.confidence * 100.0
                    ));
                    progress.inc(1);
                })
                .await;
            progress.finish_and_clear();

            let records: Vec<_> = slots.into_iter().flatten().collect();
            if records.len() < paths.len() {
                println!("⚠ キャンセルにより{}枚を未処理のまま終了", paths.len() - records.len());
            }

            let summary = BatchSummary::from_records(&records);
            println!("✔ 解析完了");
            print_summary(&summary);

            let stats = orchestrator.client().statistics();
            println!(
                "  リクエスト: {} (成功 {} / 失敗 {}), リトライ: {}, フォールバック: {}, 成功率: {:.2}%\n",
                stats.total_requests,
                stats.successful_requests,
                stats.failed_requests,
                stats.retry_attempts,
                stats.fallback_used,
                stats.success_rate_percent
            );

            // 3. 保存
            println!("[3/3] 結果を保存中...");
            let output = output.unwrap_or_else(|| folder.clone());
            let path = export::export_results(
                &records,
                &orchestrator.model().export_config(),
                format,
                &output,
            )?;
            println!("✔ 結果を保存: {}", path.display());

            println!("\n✅ 検証完了");
        }

        Commands::Analyze { image, categories } => {
            println!("🔎 image-validator - 画像解析\n");

            let client = analyzer::build_client(config.backend, config.client);
            let orchestrator = ValidationOrchestrator::new(client, config.build_model()?)
                .with_categories(if categories.is_empty() { config.categories.clone() } else { categories });

            let record = orchestrator.validate_image(&image).await;

            println!("画像: {}", record.image_path.display());
            println!("  成功: {}", if record.success { "はい" } else { "いいえ" });
            println!("  信頼度: {:.1}% ({} {})", record.confidence * 100.0, record.validation_level, record.status_color);
            println!("  カテゴリ: {}", record.categories.join(", "));
            for issue in &record.issues {
                println!("  ⚠ {}", issue);
            }
            if let Some(breakdown) = &record.breakdown {
                print_breakdown(breakdown);
            }
            println!("  処理時間: {:.2}秒", record.processing_time);
        }

        Commands::Score { content_match, quality_assessment, category_confidence, technical_analysis } => {
            let model = config.build_model()?;
            let scores = AspectScores::new(content_match, quality_assessment, category_confidence, technical_analysis);
            let breakdown = model.detailed_breakdown(&scores);

            println!("総合信頼度: {:.3} ({} {})", breakdown.overall_confidence, breakdown.validation_level, breakdown.status_color);
            println!("要確認: {}", if model.requires_manual_review(breakdown.overall_confidence) { "はい" } else { "いいえ" });
            print_breakdown(&breakdown);
        }

        Commands::Review { input, output } => {
            println!("📝 image-validator - 手動レビュー\n");
            review::run_interactive_review(&input, output.as_deref())?;
        }

        Commands::Config { show, set_threshold, set_weight, set_backend, import } => {
            let mut changed = false;
            let mut model = config.build_model()?;

            if let Some(path) = import {
                let file = export::load_results(&path)?;
                model.import_config(&file.config)?;
                println!("✔ 設定を取り込みました: {}", path.display());
                changed = true;
            }

            if !set_threshold.is_empty() {
                let mut update = ThresholdUpdate::default();
                for (key, value) in &set_threshold {
                    if !update.set(key, *value) {
                        bail!("未知の閾値: {}", key);
                    }
                }
                model.update_thresholds(&update)?;
                println!("✔ 閾値を更新しました");
                changed = true;
            }

            if !set_weight.is_empty() {
                let mut update = WeightUpdate::default();
                for (key, value) in &set_weight {
                    if !update.set(key, *value) {
                        bail!("未知の重み: {}", key);
                    }
                }
                model.update_weights(&update)?;
                println!("✔ 重みを更新しました");
                changed = true;
            }

            if let Some(backend) = set_backend {
                config.backend = backend;
                println!("✔ バックエンドを設定しました: {}", backend);
                changed = true;
            }

            if changed {
                config.model = model.export_config();
                config.save()?;
            }

            if show || !changed {
                let t = &config.model.thresholds;
                let w = &config.model.weights;
                println!("設定: {}", Config::config_path()?.display());
                println!("  バックエンド: {}", config.backend);
                println!(
                    "  クライアント: タイムアウト {}秒, リトライ {}回, 待機 {}秒",
                    config.client.timeout_seconds, config.client.max_retries, config.client.retry_delay_seconds
                );
                println!("  並列数: {}", config.concurrency);
                println!("  カテゴリ: {}", config.categories.join(", "));
                println!(
                    "  閾値: auto_accept={} manual_review_suggested={} manual_review_required={} error={}",
                    t.auto_accept, t.manual_review_suggested, t.manual_review_required, t.error
                );
                println!(
                    "  重み: content_match={} quality_assessment={} category_confidence={} technical_analysis={}",
                    w.content_match, w.quality_assessment, w.category_confidence, w.technical_analysis
                );
            }
        }
    }

    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    println!(
        "  合計: {}, 自動承認: {}, 要レビュー: {}, 失敗: {}, 平均信頼度: {:.1}%",
        summary.total,
        summary.auto_accepted,
        summary.pending_review,
        summary.failed,
        summary.average_confidence * 100.0
    );
}

fn print_breakdown(breakdown: &ConfidenceBreakdown) {
    use image_validator_common::Aspect;

    println!("  内訳:");
    for aspect in Aspect::ALL {
        println!(
            "    {:<20} スコア {:.2} × 重み {:.2} = {:.3}",
            aspect.as_str(),
            breakdown.aspect_scores.get(aspect),
            breakdown.aspect_weights.get(aspect),
            breakdown.weighted_contributions.get(aspect)
        );
    }
    println!("  推奨:");
    for recommendation in &breakdown.recommendations {
        println!("    - {}", recommendation);
    }
}
