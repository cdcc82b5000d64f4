//! 试卷文档理解管线
//!
//! 输入：外部抽取好的试卷纯文本与科目；输出：结构化题目列表 +
//! 分节信息 + 模板结构校验结论。持久化与 HTTP 层在本 crate 之外。

pub mod ai_optimizer;
pub mod config;
pub mod format_detector;
pub mod format_rules;
pub mod json_repair;
pub mod llm_client;
pub mod models;
pub mod pipeline;
pub mod reply_validator;
pub mod segmenter;
pub mod structure_extractor;
pub mod structure_validator;
pub mod templates;

pub use config::PipelineConfig;
pub use llm_client::{CompletionClient, OpenAiCompatClient};
pub use models::{ProcessedPaper, Question, StructureStatus};
pub use pipeline::DocumentPipeline;

/// 初始化日志订阅器，按 RUST_LOG 过滤。宿主进程可选调用；
/// 重复初始化静默忽略，便于测试各自调用。
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
