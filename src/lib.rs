//! ゲームアセット画像の検証ライブラリ
//!
//! 解析クライアント（リトライ・バックオフ・フォールバック）と
//! 信頼度モデルを組み合わせて、画像ごとに承認/要確認/エラーを判定する。

pub mod ai_provider;
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod review;
pub mod rules;
pub mod scanner;
pub mod validator;
