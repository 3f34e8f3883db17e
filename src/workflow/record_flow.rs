//! 记录处理流程 - 流程层
//!
//! 核心职责：定义"一条记录"的完整处理流程
//!
//! 流程顺序：
//! 1. 定位记录 → Found / NotFound / Error
//! 2. Found 且配置了更新 → 弹出窗口更新
//! 3. 得出最终状态与消息

use tracing::{error, info, warn};

use crate::infrastructure::NavigationClient;
use crate::models::{InputRecord, LocateOutcome, OutcomeStatus};
use crate::services::{RecordLocator, SecondaryViewHandler};
use crate::workflow::record_ctx::RecordCtx;

/// 记录处理流程
///
/// - 决定何时定位、何时更新
/// - 不持有任何资源（page）
/// - 不写结果，只返回最终状态
pub struct RecordFlow<'a> {
    locator: &'a RecordLocator,
    updater: Option<&'a SecondaryViewHandler>,
}

impl<'a> RecordFlow<'a> {
    pub fn new(locator: &'a RecordLocator, updater: Option<&'a SecondaryViewHandler>) -> Self {
        Self { locator, updater }
    }

    /// 处理一条记录，返回 (状态, 消息)
    ///
    /// 不会返回错误：所有失败都已折算成 `OutcomeStatus::Error`
    pub async fn run(
        &self,
        client: &dyn NavigationClient,
        record: &InputRecord,
        ctx: &RecordCtx,
    ) -> (OutcomeStatus, String) {
        info!("{} 🔍 正在搜索...", ctx);

        let action = match self.locator.locate(client, record).await {
            LocateOutcome::Found(action) => action,
            LocateOutcome::NotFound => {
                warn!("{} ⚠️ 未找到", ctx);
                return (OutcomeStatus::NotFound, String::new());
            }
            LocateOutcome::Error(detail) => {
                error!("{} ❌ 处理出错: {}", ctx, detail);
                return (OutcomeStatus::Error, detail);
            }
        };

        let Some(updater) = self.updater else {
            info!("{} ✓ 已找到", ctx);
            return (OutcomeStatus::Found, String::new());
        };

        match updater.update(client, &action, record).await {
            Ok(result) if result.is_success() => {
                info!("{} ✅ 更新成功: {}", ctx, result.message);
                (OutcomeStatus::Found, result.message)
            }
            Ok(result) => {
                error!("{} ❌ 更新失败: {}", ctx, result.message);
                (OutcomeStatus::Error, result.message)
            }
            Err(e) => {
                error!("{} ❌ 更新出错: {}", ctx, e);
                (OutcomeStatus::Error, e.to_string())
            }
        }
    }
}
