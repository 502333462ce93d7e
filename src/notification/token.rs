use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::Config;
use crate::infrastructure::error::PipelineError;

/// 默认的过期安全余量
const DEFAULT_SAFETY_MARGIN_SECONDS: i64 = 60;

/// 时钟抽象，令牌过期逻辑可注入测试时钟做确定性验证
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 生产环境时钟
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 带过期时间的访问令牌
///
/// 不变式：now >= expires_at 的令牌绝不使用；expires_at 已经
/// 比签发方声明的 TTL 提前了安全余量。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    #[serde(rename = "appId")]
    app_id: &'a str,
    #[serde(rename = "appSecret")]
    app_secret: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
    #[serde(rename = "expiresInSeconds")]
    expires_in_seconds: i64,
}

/// 进程级令牌缓存
///
/// 按应用 id 缓存；互斥锁跨越整个刷新请求，过期后的并发调用
/// 只会发出一次身份端点请求，所有调用方拿到同一个新令牌
/// （single-flight）。
pub struct TokenCache {
    client: Client,
    identity_url: String,
    app_id: String,
    app_secret: String,
    safety_margin_seconds: i64,
    clock: Arc<dyn Clock>,
    cache: Mutex<HashMap<String, AccessToken>>,
}

impl TokenCache {
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            identity_url: config.identity_url.clone(),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
            safety_margin_seconds: DEFAULT_SAFETY_MARGIN_SECONDS,
            clock,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_safety_margin(mut self, seconds: i64) -> Self {
        self.safety_margin_seconds = seconds;
        self
    }

    /// 获取未过期的访问令牌，过期或首次调用时刷新
    pub async fn get_token(&self) -> Result<AccessToken, PipelineError> {
        // 锁覆盖检查与刷新全程，这就是 single-flight 保证本身
        let mut cache = self.cache.lock().await;

        let now = self.clock.now();
        if let Some(token) = cache.get(&self.app_id) {
            if !token.is_expired(now) {
                debug!("token cache hit for app {}", self.app_id);
                return Ok(token.clone());
            }
            // 过期令牌先丢弃，刷新失败也不会跨过期界复用旧值
            cache.remove(&self.app_id);
        }

        let token = self.refresh(now).await?;
        cache.insert(self.app_id.clone(), token.clone());
        Ok(token)
    }

    /// 向身份端点发起一次刷新请求
    async fn refresh(&self, now: DateTime<Utc>) -> Result<AccessToken, PipelineError> {
        info!("refreshing access token for app {}", self.app_id);

        let request = TokenRequest {
            app_id: &self.app_id,
            app_secret: &self.app_secret,
        };

        let res = self
            .client
            .post(&self.identity_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::token(format!("身份端点请求失败: {}", e)))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(PipelineError::token(format!(
                "身份端点响应错误: 状态码 {}, 响应体: {}",
                status, body
            )));
        }

        let response: TokenResponse = res
            .json()
            .await
            .map_err(|e| PipelineError::token(format!("身份端点响应体解析失败: {}", e)))?;

        if response.token.trim().is_empty() {
            return Err(PipelineError::token("身份端点返回了空令牌"));
        }

        // 有效期提前安全余量，余量吃掉整个 TTL 时立即视为过期
        let effective_seconds = (response.expires_in_seconds - self.safety_margin_seconds).max(0);
        let expires_at = now + chrono::Duration::seconds(effective_seconds);

        Ok(AccessToken {
            value: response.token,
            expires_at,
        })
    }
}
