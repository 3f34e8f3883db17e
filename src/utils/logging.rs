/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use std::path::Path;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::RunSummary;

/// 初始化 tracing 订阅器
///
/// 设置了 `RUST_LOG` 时以其为准，否则按 `verbose` 选择 debug / info
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // 测试中可能重复初始化，忽略错误
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(listing_url: &str, update_enabled: bool) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 记录批量更新模式");
    info!("🌐 列表页: {}", listing_url);
    info!(
        "✏️ 弹出窗口更新: {}",
        if update_enabled { "启用" } else { "未配置" }
    );
    info!("{}", "=".repeat(60));
}

/// 记录加载信息
pub fn log_records_loaded(total: usize, source: &Path) {
    info!("✓ 从 {} 读取到 {} 条记录", source.display(), total);
    info!("💡 逐条顺序处理\n");
}

/// 记录单条记录开始
pub fn log_record_start(index: usize, total: usize, identifier: &str) {
    info!("\n{}", "─".repeat(60));
    info!("📄 第 {}/{} 条: {}", index + 1, total, truncate_text(identifier, 40));
}

/// 打印最终统计信息
pub fn print_final_stats(summary: &RunSummary, output_dir: &Path) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 找到: {}/{}", summary.found, summary.total);
    info!("⚠️ 未找到: {}", summary.not_found);
    info!("❌ 出错: {}", summary.errors);
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", output_dir.display());
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
