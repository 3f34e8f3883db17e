//! 应用生命周期 - 编排层
//!
//! 持有浏览器资源，负责加载输入、调用批处理器、写出结果。
//! 整个运行过程是一个致命错误边界：任何逃出的错误都会写入致命错误文件

use std::path::Path;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::browser;
use crate::config::{Config, WorkflowConfig};
use crate::error::AppResult;
use crate::infrastructure::CdpNavigationClient;
use crate::models::{load_records, BatchRun};
use crate::orchestrator::batch_processor::BatchProcessor;
use crate::services::{RecordLocator, ResultLog, SecondaryViewHandler};
use crate::utils::logging::{log_records_loaded, log_startup, print_final_stats};

/// 应用主结构
pub struct App {
    config: Config,
    workflow: WorkflowConfig,
    result_log: ResultLog,
    client: CdpNavigationClient,
}

impl App {
    /// 初始化应用：加载流程配置并连接浏览器
    pub async fn initialize(config: Config) -> Result<Self> {
        let result_log = ResultLog::new(config.output_path());
        result_log.clear().await?;

        let workflow = match config.load_workflow().await {
            Ok(workflow) => workflow,
            Err(e) => {
                record_fatal(&result_log, &e.to_string(), &format!("{:?}", e)).await;
                return Err(e.into());
            }
        };

        log_startup(&workflow.listing.url, workflow.update.is_some());

        let session = if config.launch_headless {
            browser::launch_headless_browser(
                &workflow.listing.url,
                config.chrome_executable.as_deref(),
                config.user_data_dir.as_deref(),
            )
            .await
        } else {
            browser::connect_to_browser_and_page(config.browser_debug_port, &workflow.listing.url)
                .await
        };
        let (browser, page) = match session {
            Ok(session) => session,
            Err(e) => {
                record_fatal(&result_log, &e.to_string(), &format!("{:?}", e)).await;
                return Err(e.into());
            }
        };

        let client = match CdpNavigationClient::attach(browser, page, &workflow.timeouts).await {
            Ok(client) => client,
            Err(e) => {
                record_fatal(&result_log, &e.to_string(), &format!("{:?}", e)).await;
                return Err(e.into());
            }
        };

        Ok(Self {
            config,
            workflow,
            result_log,
            client,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        match self.execute().await {
            Ok(run) => {
                print_final_stats(&run.summary(), &self.config.output_path());
                Ok(())
            }
            Err(e) => {
                error!("❌ 运行中止: {}", e);
                record_fatal(&self.result_log, &e.to_string(), &format!("{:?}", e)).await;
                Err(e.into())
            }
        }
    }

    async fn execute(&self) -> AppResult<BatchRun> {
        let records_path = Path::new(&self.config.records_file);
        info!("\n📁 正在读取记录: {}", records_path.display());
        let records = load_records(records_path, &self.workflow.columns).await?;

        if records.is_empty() {
            warn!("⚠️ 没有待处理的记录");
        }
        log_records_loaded(records.len(), records_path);

        let locator = RecordLocator::from_workflow(&self.workflow);
        let updater = SecondaryViewHandler::from_workflow(&self.workflow)?;

        let processor = BatchProcessor::new(&self.client);
        let run = processor.run(&records, &locator, updater.as_ref()).await;

        let open_views = self.client.open_secondary_views().await;
        if open_views > 0 {
            warn!("⚠️ 运行结束时仍有 {} 个弹出窗口未关闭", open_views);
        }

        self.result_log.write_run(&run).await?;
        Ok(run)
    }
}

async fn record_fatal(result_log: &ResultLog, message: &str, context: &str) {
    match result_log.write_fatal(message, context).await {
        Ok(()) => info!("📝 致命错误已写入: {}", result_log.fatal_path().display()),
        Err(e) => error!("写入致命错误文件失败: {}", e),
    }
}
