mod claude_cli;
mod client;
mod mock;
mod stats;
mod tool;

pub use claude_cli::ClaudeCliTool;
pub use client::{AnalysisClient, ClientOptions};
pub use mock::{generate_mock_analysis, MockTool};
pub use stats::{ClientStatistics, StatisticsSnapshot};
pub use tool::AnalysisTool;

use crate::ai_provider::Backend;
use std::sync::Arc;

/// バックエンドに応じたクライアントを構築
///
/// どのバックエンドでもフォールバックにはモック（信頼度 -0.1）を使う。
pub fn build_client(backend: Backend, options: ClientOptions) -> AnalysisClient {
    let primary: Arc<dyn AnalysisTool> = match backend {
        Backend::Claude => Arc::new(ClaudeCliTool::new(backend.command_name())),
        Backend::Mock => Arc::new(MockTool::primary()),
    };
    AnalysisClient::new(primary, options).with_fallback(Arc::new(MockTool::fallback()))
}
