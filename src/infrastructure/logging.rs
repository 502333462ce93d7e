use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 初始化全局日志订阅器
///
/// debug 模式下放宽过滤级别并带上代码位置；默认级别可被
/// RUST_LOG 环境变量覆盖。重复初始化时静默忽略（测试场景）。
pub fn init_logging(debug: bool) {
    let default_filter = if debug { "ai_review=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(debug)
        .with_line_number(debug);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
