use std::time::Duration;

use rand::Rng;

/// 指数退避重试策略
///
/// 只描述节奏，不判断错误是否可重试；可重试性由各组件的
/// 错误分类决定。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// 第 attempt 次失败后的等待时长（attempt 从 1 开始计数）
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max_delay);

        if self.jitter {
            // 抖动避免多个 CI 任务同时重试打到同一端点
            let factor = rand::thread_rng().gen_range(0.8..1.2);
            base.mul_f64(factor)
        } else {
            base
        }
    }

    /// attempt 次失败后是否还允许再试一次
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
