// ==========================================
// 制造运营雷达 - 日志系统初始化
// ==========================================
// 输出格式: 文本 (终端) / JSON (日志采集)
// 级别: RUST_LOG 优先,缺省本库 info、依赖库 warn
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 缺省过滤指令
pub const DEFAULT_DIRECTIVES: &str = "ops_radar=info,warn";

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// 构建过滤器: RUST_LOG 未设置或无法解析时退回缺省指令
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// 初始化日志系统
///
/// # 示例
/// ```no_run
/// use ops_radar::logging::{self, LogFormat};
/// logging::init(LogFormat::Text);
/// ```
pub fn init(format: LogFormat) {
    let builder = fmt().with_env_filter(env_filter()).with_target(true);
    match format {
        LogFormat::Text => builder.with_thread_ids(false).with_line_number(true).init(),
        LogFormat::Json => builder.json().with_current_span(false).init(),
    }
}

/// 测试环境: debug 级别写入测试输出,可重复调用
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
