use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(
    name = "ai-review",
    version,
    about = "CI 自动代码审查 - 提取最新提交的 diff，交给 AI 审查，归档报告并推送通知",
    long_about = "ai-review 在每次 CI 运行中执行一次完整的审查流水线：提取最新提交相对其父提交的 diff，提交给 AI 审查后端，将审查报告持久化到日志仓库，并向相关人员推送带报告链接的通知。所有配置来自环境变量，进程退出码按失败阶段区分。"
)]
pub struct Args {
    /// 输出调试日志
    #[arg(short = 'd', long, default_value_t = false)]
    pub debug: bool,

    /// 指定 .env 配置文件路径（默认读取当前目录及 ~/.ai-review/.env）
    #[arg(long = "env-file", value_name = "PATH")]
    pub env_file: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["ai-review"]);
        assert!(!args.debug);
        assert!(args.env_file.is_none());
    }

    #[test]
    fn test_debug_and_env_file_flags() {
        let args = Args::parse_from(["ai-review", "--debug", "--env-file", "/tmp/ci.env"]);
        assert!(args.debug);
        assert_eq!(args.env_file.as_deref(), Some("/tmp/ci.env"));
    }
}
