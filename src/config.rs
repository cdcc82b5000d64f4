//! 管线配置
//!
//! TOML 文件（可选）与 `EXAM_PIPELINE_*` 环境变量分层加载，
//! 环境变量覆盖文件，文件覆盖内置默认值。

use crate::models::AppError;
use serde::{Deserialize, Serialize};

/// 默认 AI 优化置信度阈值：低于该值才调用补全模型
pub const DEFAULT_AI_CONFIDENCE_THRESHOLD: f64 = 0.7;
/// 默认模板匹配阈值
pub const DEFAULT_TEMPLATE_MATCH_THRESHOLD: f64 = 0.7;
/// 默认单片段字符预算
pub const DEFAULT_FRAGMENT_CHAR_BUDGET: usize = 8000;
/// 默认单次补全调用超时（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// 默认重试上限（线性退避）
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// OpenAI 兼容接口根地址（不含 /chat/completions）
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_ai_threshold")]
    pub ai_confidence_threshold: f64,
    #[serde(default = "default_template_threshold")]
    pub template_match_threshold: f64,
    #[serde(default = "default_fragment_budget")]
    pub fragment_char_budget: usize,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_ai_threshold() -> f64 {
    DEFAULT_AI_CONFIDENCE_THRESHOLD
}
fn default_template_threshold() -> f64 {
    DEFAULT_TEMPLATE_MATCH_THRESHOLD
}
fn default_fragment_budget() -> usize {
    DEFAULT_FRAGMENT_CHAR_BUDGET
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            ai_confidence_threshold: DEFAULT_AI_CONFIDENCE_THRESHOLD,
            template_match_threshold: DEFAULT_TEMPLATE_MATCH_THRESHOLD,
            fragment_char_budget: DEFAULT_FRAGMENT_CHAR_BUDGET,
        }
    }
}

impl PipelineConfig {
    /// 分层加载：内置默认 ← 可选 TOML 文件 ← EXAM_PIPELINE_* 环境变量
    pub fn load(config_path: Option<&str>) -> Result<Self, AppError> {
        // .env 文件存在则静默加载
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder()
            .set_default("base_url", "https://api.openai.com/v1")
            .map_err(|e| AppError::configuration(e.to_string()))?
            .set_default("api_key", "")
            .map_err(|e| AppError::configuration(e.to_string()))?
            .set_default("model", "gpt-4o-mini")
            .map_err(|e| AppError::configuration(e.to_string()))?;

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("EXAM_PIPELINE").try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| AppError::configuration(format!("配置加载失败: {}", e)))?;
        let config: PipelineConfig = settings
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("配置反序列化失败: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.model.trim().is_empty() {
            return Err(AppError::configuration("model 不能为空"));
        }
        if self.base_url.trim().is_empty() {
            return Err(AppError::configuration("base_url 不能为空"));
        }
        if self.fragment_char_budget == 0 {
            return Err(AppError::configuration("fragment_char_budget 必须为正数"));
        }
        if !(0.0..=1.0).contains(&self.ai_confidence_threshold) {
            return Err(AppError::configuration(
                "ai_confidence_threshold 必须在 [0,1] 内",
            ));
        }
        if !(0.0..=1.0).contains(&self.template_match_threshold) {
            return Err(AppError::configuration(
                "template_match_threshold 必须在 [0,1] 内",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // load() 读取进程环境，相关测试串行执行
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_retries, 3);
        assert!((config.ai_confidence_threshold - 0.7).abs() < 1e-9);
        assert_eq!(config.fragment_char_budget, 8000);
    }

    #[test]
    fn test_validate_rejects_empty_model() {
        let config = PipelineConfig {
            model: "  ".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let config = PipelineConfig {
            ai_confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "base_url = \"http://localhost:9999/v1\"\napi_key = \"test-key\"\nmodel = \"test-model\"\ntimeout_secs = 5"
        )
        .unwrap();

        let config = PipelineConfig::load(path.to_str()).unwrap();
        assert_eq!(config.base_url, "http://localhost:9999/v1");
        assert_eq!(config.model, "test-model");
        assert_eq!(config.timeout_secs, 5);
        // 未出现在文件里的字段取默认
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_env_overrides_file_and_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "api_key = \"file-key\"\nmodel = \"file-model\"").unwrap();

        std::env::set_var("EXAM_PIPELINE_MODEL", "env-model");
        std::env::set_var("EXAM_PIPELINE_MAX_RETRIES", "5");
        let config = PipelineConfig::load(path.to_str()).unwrap();
        std::env::remove_var("EXAM_PIPELINE_MODEL");
        std::env::remove_var("EXAM_PIPELINE_MAX_RETRIES");

        assert_eq!(config.model, "env-model");
        assert_eq!(config.max_retries, 5);
        // 环境变量未覆盖的字段仍取文件值
        assert_eq!(config.api_key, "file-key");
    }
}
