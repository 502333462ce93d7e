use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::config::Config;
use crate::infrastructure::error::PipelineError;
use crate::infrastructure::retry::RetryPolicy;
use crate::notification::token::{AccessToken, TokenCache};
use crate::notification::{validate_target, NotificationChannel, ReviewNotification};

/// 模板消息端点的响应体，errcode 为 0 表示成功
#[derive(Debug, Deserialize)]
struct TemplateSendResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// 一次发送尝试的失败，携带内部重试判定
struct SendAttemptError {
    retryable: bool,
    error: PipelineError,
}

/// 微信模板消息通知通道
///
/// 令牌来自注入的 TokenCache；5xx 与传输层失败按指数退避
/// 重试固定次数，4xx 与业务 errcode 失败立即上抛。
pub struct WeChatChannel {
    client: Client,
    notify_url: String,
    tokens: Arc<TokenCache>,
    retry: RetryPolicy,
}

impl WeChatChannel {
    pub fn new(config: &Config, tokens: Arc<TokenCache>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            notify_url: config.notify_url.clone(),
            tokens,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 构建模板消息载荷，每个字段包装为 {value} 结构
    fn build_payload(message: &ReviewNotification) -> serde_json::Value {
        let mut data = serde_json::Map::new();
        for (name, value) in &message.fields {
            data.insert(name.clone(), json!({ "value": value }));
        }

        json!({
            "touser": message.recipient,
            "template_id": message.template_id,
            "url": message.url,
            "data": data,
        })
    }

    /// 使用给定令牌发送一次模板消息，重试由调用方控制
    pub async fn send_with_token(
        &self,
        token: &AccessToken,
        message: &ReviewNotification,
    ) -> Result<(), PipelineError> {
        validate_target(message)?;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send_once(token, message).await {
                Ok(()) => return Ok(()),
                Err(e) if e.retryable && self.retry.allows_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "notification send failed, retrying: {}",
                        e.error
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.error),
            }
        }
    }

    async fn send_once(
        &self,
        token: &AccessToken,
        message: &ReviewNotification,
    ) -> Result<(), SendAttemptError> {
        let payload = Self::build_payload(message);

        let res = self
            .client
            .post(&self.notify_url)
            .query(&[("access_token", token.value.as_str())])
            .json(&payload)
            .send()
            .await
            .map_err(|e| SendAttemptError {
                retryable: true,
                error: PipelineError::notification(format!("通知请求失败: {}", e), None),
            })?;

        let status = res.status();
        if !status.is_success() {
            // 5xx 可重试；4xx 是请求本身的问题，重试无意义
            let retryable = status.is_server_error();
            let body = res.text().await.unwrap_or_default();
            return Err(SendAttemptError {
                retryable,
                error: PipelineError::notification(
                    format!("通知端点响应错误: 状态码 {}, 响应体: {}", status, body),
                    None,
                ),
            });
        }

        let response: TemplateSendResponse = res.json().await.map_err(|e| SendAttemptError {
            retryable: false,
            error: PipelineError::notification(format!("通知响应体解析失败: {}", e), None),
        })?;

        if response.errcode != 0 {
            return Err(SendAttemptError {
                retryable: false,
                error: PipelineError::notification(
                    format!("通知被拒绝: errcode {}, errmsg {}", response.errcode, response.errmsg),
                    Some(response.errcode),
                ),
            });
        }

        info!(recipient = %message.recipient, "notification delivered");
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for WeChatChannel {
    async fn notify(&self, message: &ReviewNotification) -> Result<(), PipelineError> {
        // 目标校验先于一切网络调用，包括令牌刷新
        validate_target(message)?;

        let token = self.tokens.get_token().await?;
        self.send_with_token(&token, message).await
    }
}
