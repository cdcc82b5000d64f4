//! 补全模型客户端
//!
//! 管线视角下模型是不透明的文本补全黑盒：prompt 进、文本出。
//! 默认实现走 OpenAI 兼容的 /chat/completions，带单次超时与
//! 固定上限的线性退避重试；token 用量随应答显式返回。

use crate::config::PipelineConfig;
use crate::models::{AppError, Completion, TokenUsage};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 线性退避基础间隔（第 n 次失败后等 n × BASE）
const RETRY_BASE_DELAY_MS: u64 = 500;

/// 文本补全边界
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Completion, AppError>;
}

/// OpenAI 兼容客户端
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    max_retries: u32,
}

impl OpenAiCompatClient {
    pub fn new(config: &PipelineConfig) -> Self {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries.max(1),
        }
    }

    async fn call_once(&self, prompt: &str) -> Result<Completion, AppError> {
        let request_body = json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "temperature": 0.1,
            "stream": false,
        });

        let request_future = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send();

        let response = match tokio::time::timeout(self.timeout, request_future).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => return Err(AppError::network(format!("补全请求失败: {}", e))),
            Err(_) => {
                return Err(AppError::network(format!(
                    "补全请求超时 ({}s)",
                    self.timeout.as_secs()
                )))
            }
        };

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| AppError::llm(format!("读取补全响应失败: {}", e)))?;

        if !status.is_success() {
            return Err(AppError::with_details(
                crate::models::AppErrorType::LLM,
                format!("补全接口返回错误 {}", status),
                json!({ "status": status.as_u16(), "body": response_text }),
            ));
        }

        let response_json: Value = serde_json::from_str(&response_text)
            .map_err(|e| AppError::llm(format!("解析补全响应 JSON 失败: {}", e)))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AppError::llm("补全模型返回内容为空"))?
            .to_string();

        let usage_value = response_json.get("usage");
        let prompt_tokens = usage_value
            .and_then(|u| u.get("prompt_tokens").or_else(|| u.get("input_tokens")))
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;
        let completion_tokens = usage_value
            .and_then(|u| {
                u.get("completion_tokens")
                    .or_else(|| u.get("output_tokens"))
            })
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;

        Ok(Completion {
            content,
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
            },
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    /// 固定上限重试：超时计作一次失败；退避间隔随失败次数线性增长
    async fn complete(&self, prompt: &str) -> Result<Completion, AppError> {
        let mut last_err: Option<AppError> = None;
        for attempt in 1..=self.max_retries {
            match self.call_once(prompt).await {
                Ok(completion) => {
                    if attempt > 1 {
                        info!("[LlmClient] 第 {} 次尝试成功", attempt);
                    }
                    debug!(
                        "[LlmClient] 补全完成: {} 字符, tokens {}/{}",
                        completion.content.len(),
                        completion.usage.prompt_tokens,
                        completion.usage.completion_tokens
                    );
                    return Ok(completion);
                }
                Err(e) => {
                    warn!(
                        "[LlmClient] 第 {}/{} 次调用失败: {}",
                        attempt, self.max_retries, e
                    );
                    last_err = Some(e);
                    if attempt < self.max_retries {
                        let delay = RETRY_BASE_DELAY_MS * attempt as u64;
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| AppError::llm("补全调用在所有重试后仍失败")))
    }
}
