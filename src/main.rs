use ai_review::cli::args::Args;
use ai_review::config::Config;
use ai_review::infrastructure::logging;
use ai_review::pipeline::ReviewPipeline;
use clap::Parser;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // --env-file 指定的配置文件优先于默认查找路径
    if let Some(path) = &args.env_file {
        if let Err(e) = dotenvy::from_path(path) {
            eprintln!("无法读取配置文件 {}: {}", path, e);
            std::process::exit(2);
        }
    }

    let mut config = Config::new();
    config.update_from_args(&args);

    logging::init_logging(config.debug);

    // 配置缺失在任何阶段开始前失败
    if let Err(e) = config.validate() {
        error!(stage = e.stage().as_str(), "{}", e);
        std::process::exit(e.exit_code());
    }

    let pipeline = ReviewPipeline::from_config(&config);
    match pipeline.run().await {
        Ok(outcome) => {
            if outcome.notified {
                info!(url = %outcome.artifact.url, "review published and notification sent");
            } else {
                // 报告已持久化，通知失败不影响运行结果，但要明确记录
                warn!(
                    url = %outcome.artifact.url,
                    "review published, but the notification was not delivered"
                );
            }
            std::process::exit(0);
        }
        Err(e) => {
            error!(stage = e.stage().as_str(), "pipeline failed: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}
