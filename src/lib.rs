//! # Roster Update
//!
//! 在旧式 Web 管理系统中批量定位并更新人员记录的自动化工具
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有浏览器资源，只暴露导航能力
//! - `NavigationClient` - 导航能力抽象（主视图 + 弹出窗口）
//! - `CdpNavigationClient` - 基于 chromiumoxide 的实现
//! - `browser/` - 连接或启动浏览器
//!
//! ### ② 业务能力层（Services）
//! - `RecordLocator` - 在列表页定位一条记录
//! - `SecondaryViewHandler` - 弹出窗口的打开、填写、提交、关闭
//! - `ErrorClassifier` - 区分"无匹配记录"与处理异常
//! - `ResultLog` - 写出结果文件
//!
//! ### ③ 流程层（Workflow）
//! - `RecordCtx` - 日志上下文
//! - `RecordFlow` - 单条记录的流程（定位 → 更新 → 结论）
//!
//! ### ④ 编排层（Orchestration）
//! - `BatchProcessor` - 顺序处理全部记录
//! - `App` - 应用生命周期与致命错误边界

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, WorkflowConfig};
pub use error::{AppError, AppResult};
pub use infrastructure::{CdpNavigationClient, NavigationClient};
pub use models::{BatchRun, InputRecord, OutcomeStatus, ProcessingOutcome};
pub use orchestrator::{App, BatchProcessor};
