use std::env;
use std::path::PathBuf;

use crate::infrastructure::error::PipelineError;

/// 一次流水线运行所需的全部配置
///
/// 所有取值在进程启动时一次性读入，业务组件只接收该值对象，
/// 不允许在内部临时读取环境变量。
#[derive(Debug, Clone)]
pub struct Config {
    // 通知通道身份凭据
    pub app_id: String,
    pub app_secret: String,
    pub identity_url: String,
    // 通知接收方与模板
    pub recipient: String,
    pub template_id: String,
    pub notify_url: String,
    // AI 审查后端
    pub ai_url: String,
    pub ai_api_key: String,
    pub ai_model: String,
    // 审查日志仓库
    pub log_repo_url: String,
    pub log_repo_token: String,
    pub log_repo_branch: String,
    // 本次提交元数据
    pub project: String,
    pub branch: String,
    pub author: String,
    pub commit_message: String,
    // 策略参数
    pub max_diff_bytes: usize,
    pub timeout_seconds: u64,
    pub debug: bool,
}

/// 提交元数据，发布与通知阶段共用
#[derive(Debug, Clone)]
pub struct CommitMeta {
    pub project: String,
    pub branch: String,
    pub author: String,
    pub message: String,
}

impl Config {
    pub fn new() -> Self {
        let mut config = Config {
            app_id: String::new(),
            app_secret: String::new(),
            identity_url: String::new(),
            recipient: String::new(),
            template_id: String::new(),
            notify_url: String::new(),
            ai_url: String::new(),
            ai_api_key: String::new(),
            ai_model: "deepseek-chat".to_string(),
            log_repo_url: String::new(),
            log_repo_token: String::new(),
            log_repo_branch: "main".to_string(),
            project: String::new(),
            branch: String::new(),
            author: String::new(),
            commit_message: String::new(),
            max_diff_bytes: 51200,
            timeout_seconds: 30,
            debug: false,
        };

        // 加载配置文件
        #[cfg(not(test))]
        config.load_from_env_file();
        // 加载环境变量（覆盖配置文件）
        config.load_from_env();

        config
    }

    pub fn load_from_env_file(&mut self) {
        // 尝试从用户主目录加载
        if let Ok(home) = env::var("HOME") {
            let user_env_path = PathBuf::from(format!("{}/.ai-review/.env", home));
            if user_env_path.exists() {
                dotenvy::from_path(user_env_path).ok();
            }
        }

        // 尝试从当前目录加载
        dotenvy::dotenv().ok();
    }

    pub fn load_from_env(&mut self) {
        if let Ok(v) = env::var("AI_REVIEW_APP_ID") {
            self.app_id = v;
        }
        if let Ok(v) = env::var("AI_REVIEW_APP_SECRET") {
            self.app_secret = v;
        }
        if let Ok(v) = env::var("AI_REVIEW_IDENTITY_URL") {
            self.identity_url = v;
        }
        if let Ok(v) = env::var("AI_REVIEW_RECIPIENT") {
            self.recipient = v;
        }
        if let Ok(v) = env::var("AI_REVIEW_TEMPLATE_ID") {
            self.template_id = v;
        }
        if let Ok(v) = env::var("AI_REVIEW_NOTIFY_URL") {
            self.notify_url = v;
        }
        if let Ok(v) = env::var("AI_REVIEW_AI_URL") {
            self.ai_url = v;
        }
        if let Ok(v) = env::var("AI_REVIEW_AI_API_KEY") {
            self.ai_api_key = v;
        }
        if let Ok(v) = env::var("AI_REVIEW_AI_MODEL") {
            self.ai_model = v;
        }
        if let Ok(v) = env::var("AI_REVIEW_LOG_REPO_URL") {
            self.log_repo_url = v;
        }
        if let Ok(v) = env::var("AI_REVIEW_LOG_REPO_TOKEN") {
            self.log_repo_token = v;
        }
        if let Ok(v) = env::var("AI_REVIEW_LOG_REPO_BRANCH") {
            self.log_repo_branch = v;
        }
        if let Ok(v) = env::var("AI_REVIEW_PROJECT") {
            self.project = v;
        }
        if let Ok(v) = env::var("AI_REVIEW_BRANCH") {
            self.branch = v;
        }
        if let Ok(v) = env::var("AI_REVIEW_AUTHOR") {
            self.author = v;
        }
        if let Ok(v) = env::var("AI_REVIEW_COMMIT_MESSAGE") {
            self.commit_message = v;
        }
        if let Ok(v) = env::var("AI_REVIEW_MAX_DIFF_BYTES") {
            if let Ok(n) = v.parse() {
                self.max_diff_bytes = n;
            }
        }
        if let Ok(v) = env::var("AI_REVIEW_TIMEOUT_SECONDS") {
            if let Ok(n) = v.parse() {
                self.timeout_seconds = n;
            }
        }
    }

    pub fn update_from_args(&mut self, args: &crate::cli::args::Args) {
        // 命令行参数优先级最高
        if args.debug {
            self.debug = true;
        }
    }

    /// 校验配置完整性，缺失任何必填项都在流水线启动前失败
    pub fn validate(&self) -> Result<(), PipelineError> {
        let required = [
            ("AI_REVIEW_APP_ID", &self.app_id),
            ("AI_REVIEW_APP_SECRET", &self.app_secret),
            ("AI_REVIEW_IDENTITY_URL", &self.identity_url),
            ("AI_REVIEW_RECIPIENT", &self.recipient),
            ("AI_REVIEW_TEMPLATE_ID", &self.template_id),
            ("AI_REVIEW_NOTIFY_URL", &self.notify_url),
            ("AI_REVIEW_AI_URL", &self.ai_url),
            ("AI_REVIEW_AI_API_KEY", &self.ai_api_key),
            ("AI_REVIEW_LOG_REPO_URL", &self.log_repo_url),
            ("AI_REVIEW_LOG_REPO_TOKEN", &self.log_repo_token),
            ("AI_REVIEW_PROJECT", &self.project),
            ("AI_REVIEW_BRANCH", &self.branch),
            ("AI_REVIEW_AUTHOR", &self.author),
            ("AI_REVIEW_COMMIT_MESSAGE", &self.commit_message),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(PipelineError::config(format!(
                    "{} is required but not set. Please set it as an environment variable or in .env file",
                    name
                )));
            }
        }

        if self.max_diff_bytes == 0 {
            return Err(PipelineError::config(
                "AI_REVIEW_MAX_DIFF_BYTES must be greater than zero",
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(PipelineError::config(
                "AI_REVIEW_TIMEOUT_SECONDS must be greater than zero",
            ));
        }

        Ok(())
    }

    pub fn commit_meta(&self) -> CommitMeta {
        CommitMeta {
            project: self.project.clone(),
            branch: self.branch.clone(),
            author: self.author.clone(),
            message: self.commit_message.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
