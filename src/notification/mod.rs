pub mod token;
pub mod wechat;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::infrastructure::error::PipelineError;

pub use token::{AccessToken, Clock, SystemClock, TokenCache};
pub use wechat::WeChatChannel;

/// 模板通知消息
///
/// url 指向已发布的审查报告；fields 按通道的模板变量约定
/// 在发送时包装为 {name: {value}} 结构。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewNotification {
    pub recipient: String,
    pub template_id: String,
    pub url: String,
    pub fields: HashMap<String, String>,
}

impl ReviewNotification {
    pub fn new(
        recipient: impl Into<String>,
        template_id: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            template_id: template_id.into(),
            url: url.into(),
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// 通知通道能力接口
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn notify(&self, message: &ReviewNotification) -> Result<(), PipelineError>;
}

/// 发送前的目标校验：url 必须非空且为合法的绝对引用
///
/// 校验失败时不允许发出任何网络请求（包括令牌刷新）。
pub fn validate_target(message: &ReviewNotification) -> Result<(), PipelineError> {
    if message.url.trim().is_empty() {
        return Err(PipelineError::invalid_target("notification url is empty"));
    }

    Url::parse(&message.url).map_err(|e| {
        PipelineError::invalid_target(format!("notification url is malformed: {}", e))
    })?;

    Ok(())
}
