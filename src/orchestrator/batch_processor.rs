//! 批量记录处理器 - 编排层
//!
//! ## 职责
//!
//! 1. **顺序遍历**：严格按输入顺序逐条处理，不并发
//! 2. **失败隔离**：单条记录的任何失败都只影响该条结果
//! 3. **结果累积**：每条记录恰好产生一个 `ProcessingOutcome`
//! 4. **回到列表**：两条记录之间让浏览器回到列表页
//!
//! 不写任何结果文件，落盘由调用方负责

use tracing::{debug, warn};

use crate::infrastructure::NavigationClient;
use crate::models::{BatchRun, InputRecord};
use crate::services::{RecordLocator, SecondaryViewHandler};
use crate::utils::logging::log_record_start;
use crate::workflow::{RecordCtx, RecordFlow};

/// 批量记录处理器
pub struct BatchProcessor<'a> {
    client: &'a dyn NavigationClient,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(client: &'a dyn NavigationClient) -> Self {
        Self { client }
    }

    /// 处理全部记录
    pub async fn run(
        &self,
        records: &[InputRecord],
        locator: &RecordLocator,
        updater: Option<&SecondaryViewHandler>,
    ) -> BatchRun {
        let mut run = BatchRun::new();
        let flow = RecordFlow::new(locator, updater);
        let total = records.len();

        for (index, record) in records.iter().enumerate() {
            let ctx = RecordCtx::new(index, total, record.identifier());
            log_record_start(index, total, record.identifier());

            let (status, message) = flow.run(self.client, record, &ctx).await;
            let outcome = run.record(record.identifier(), status, message);
            debug!("{} 结果: {:?}", ctx, outcome.status);

            if index + 1 < total {
                if let Err(e) = locator.return_to_listing(self.client).await {
                    warn!("{} ⚠️ 返回列表页失败: {}", ctx, e);
                }
            }
        }

        run
    }
}
