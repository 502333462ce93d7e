pub mod prompt;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::git::DiffPayload;
use crate::infrastructure::error::PipelineError;
use crate::infrastructure::retry::RetryPolicy;

/// AI 后端产出的 Markdown 审查报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewResult(String);

impl ReviewResult {
    pub fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// 审查后端能力接口
#[async_trait]
pub trait ReviewBackend: Send + Sync {
    async fn review(&self, diff: &DiffPayload) -> Result<ReviewResult, PipelineError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// 基于 chat-completions 协议的审查客户端
///
/// 单次请求/响应交换；可重试错误在内部按指数退避重试，
/// 致命错误立即上抛。
pub struct AiReviewClient {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    max_diff_bytes: usize,
    retry: RetryPolicy,
}

impl AiReviewClient {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            url: config.ai_url.clone(),
            api_key: config.ai_api_key.clone(),
            model: config.ai_model.clone(),
            max_diff_bytes: config.max_diff_bytes,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 单次请求交换，错误按可重试性分类
    async fn request_once(&self, prompt: &str) -> Result<ReviewResult, PipelineError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let res = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            // 传输层失败（连接、超时）可重试
            .map_err(|e| PipelineError::review(format!("请求失败: {}", e), None, true))?;

        let status = res.status();
        if !status.is_success() {
            let retryable = status.is_server_error();
            let body = res.text().await.unwrap_or_default();
            return Err(PipelineError::review(
                format!("响应错误: 状态码 {}, 响应体: {}", status, body),
                Some(status.as_u16()),
                retryable,
            ));
        }

        let response: ChatResponse = res.json().await.map_err(|e| {
            PipelineError::review(format!("响应体解析失败: {}", e), None, false)
        })?;

        let content = response
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        // 空响应按致命错误处理，不当作成功
        if content.is_empty() {
            return Err(PipelineError::review(
                "AI 服务返回了空的审查内容",
                None,
                false,
            ));
        }

        Ok(ReviewResult::new(content))
    }
}

#[async_trait]
impl ReviewBackend for AiReviewClient {
    async fn review(&self, diff: &DiffPayload) -> Result<ReviewResult, PipelineError> {
        let prompt = prompt::build_prompt(diff.as_str(), self.max_diff_bytes);
        debug!(prompt_bytes = prompt.len(), "submitting diff for review");

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.request_once(&prompt).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && self.retry.allows_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "review request failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
