use thiserror::Error;

/// 流水线错误类型
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("配置错误: {message}")]
    Config { message: String },

    #[error("没有可审查的提交: {message}")]
    NoCommits { message: String },

    #[error("diff 提取失败: {message}")]
    DiffExtraction {
        message: String,
        exit_code: Option<i32>,
    },

    #[error("AI 审查失败 (可重试): {message}")]
    ReviewRetryable {
        message: String,
        status: Option<u16>,
    },

    #[error("AI 审查失败: {message}")]
    ReviewFatal {
        message: String,
        status: Option<u16>,
    },

    #[error("报告发布失败 ({step}): {message}")]
    Publish { step: String, message: String },

    #[error("访问令牌获取失败: {message}")]
    Token { message: String },

    #[error("通知目标无效: {message}")]
    InvalidTarget { message: String },

    #[error("通知发送失败: {message}")]
    Notification {
        message: String,
        errcode: Option<i64>,
    },

    #[error("超时错误: {operation} 超时 ({timeout_seconds}s)")]
    Timeout {
        operation: String,
        timeout_seconds: u64,
    },
}

/// 失败阶段，用于日志与进程退出码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStage {
    Config,
    Diff,
    Review,
    Publish,
    Notify,
    Timeout,
}

impl FailedStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailedStage::Config => "config",
            FailedStage::Diff => "diff",
            FailedStage::Review => "review",
            FailedStage::Publish => "publish",
            FailedStage::Notify => "notify",
            FailedStage::Timeout => "timeout",
        }
    }
}

impl PipelineError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::ReviewRetryable { .. })
    }

    /// 错误归属的失败阶段
    pub fn stage(&self) -> FailedStage {
        match self {
            PipelineError::Config { .. } => FailedStage::Config,
            PipelineError::NoCommits { .. } => FailedStage::Diff,
            PipelineError::DiffExtraction { .. } => FailedStage::Diff,
            PipelineError::ReviewRetryable { .. } => FailedStage::Review,
            PipelineError::ReviewFatal { .. } => FailedStage::Review,
            PipelineError::Publish { .. } => FailedStage::Publish,
            PipelineError::Token { .. } => FailedStage::Notify,
            PipelineError::InvalidTarget { .. } => FailedStage::Notify,
            PipelineError::Notification { .. } => FailedStage::Notify,
            PipelineError::Timeout { .. } => FailedStage::Timeout,
        }
    }

    /// 失败阶段对应的进程退出码，0 保留给成功
    pub fn exit_code(&self) -> i32 {
        match self.stage() {
            FailedStage::Config => 2,
            FailedStage::Diff => 3,
            FailedStage::Review => 4,
            FailedStage::Publish => 5,
            FailedStage::Notify => 6,
            FailedStage::Timeout => 7,
        }
    }

    /// 创建配置错误
    pub fn config(message: impl Into<String>) -> Self {
        PipelineError::Config {
            message: message.into(),
        }
    }

    pub fn no_commits(message: impl Into<String>) -> Self {
        PipelineError::NoCommits {
            message: message.into(),
        }
    }

    pub fn diff_extraction(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        PipelineError::DiffExtraction {
            message: message.into(),
            exit_code,
        }
    }

    /// 创建 AI 审查错误，按可重试性分类
    pub fn review(message: impl Into<String>, status: Option<u16>, retryable: bool) -> Self {
        if retryable {
            PipelineError::ReviewRetryable {
                message: message.into(),
                status,
            }
        } else {
            PipelineError::ReviewFatal {
                message: message.into(),
                status,
            }
        }
    }

    pub fn publish(step: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Publish {
            step: step.into(),
            message: message.into(),
        }
    }

    pub fn token(message: impl Into<String>) -> Self {
        PipelineError::Token {
            message: message.into(),
        }
    }

    pub fn invalid_target(message: impl Into<String>) -> Self {
        PipelineError::InvalidTarget {
            message: message.into(),
        }
    }

    pub fn notification(message: impl Into<String>, errcode: Option<i64>) -> Self {
        PipelineError::Notification {
            message: message.into(),
            errcode,
        }
    }

    /// 创建超时错误
    pub fn timeout(operation: impl Into<String>, timeout_seconds: u64) -> Self {
        PipelineError::Timeout {
            operation: operation.into(),
            timeout_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(PipelineError::review("502 bad gateway", Some(502), true).is_retryable());
        assert!(!PipelineError::review("400 bad request", Some(400), false).is_retryable());
        assert!(!PipelineError::token("refresh failed").is_retryable());
        assert!(!PipelineError::publish("push", "rejected").is_retryable());
    }

    #[test]
    fn test_exit_codes_are_distinct_per_stage() {
        let errors = vec![
            PipelineError::config("missing"),
            PipelineError::no_commits("initial commit"),
            PipelineError::review("boom", None, false),
            PipelineError::publish("clone", "boom"),
            PipelineError::notification("boom", None),
            PipelineError::timeout("git diff", 30),
        ];

        let mut codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 6, "exit codes should be distinct per stage");
        assert!(codes.iter().all(|c| *c != 0), "0 is reserved for success");
    }

    #[test]
    fn test_no_commits_maps_to_diff_stage() {
        let err = PipelineError::no_commits("no parent commit");
        assert_eq!(err.stage(), FailedStage::Diff);
        assert_eq!(
            err.exit_code(),
            PipelineError::diff_extraction("failed", Some(128)).exit_code()
        );
    }

    #[test]
    fn test_token_and_notification_share_notify_stage() {
        assert_eq!(PipelineError::token("x").stage(), FailedStage::Notify);
        assert_eq!(
            PipelineError::invalid_target("empty url").stage(),
            FailedStage::Notify
        );
        assert_eq!(
            PipelineError::notification("x", Some(40003)).stage(),
            FailedStage::Notify
        );
    }
}
