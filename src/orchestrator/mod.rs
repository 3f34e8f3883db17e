//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用生命周期
//! - 加载流程配置，连接或启动浏览器
//! - 读取记录，调用批处理器，写出结果文件
//! - 致命错误边界
//!
//! ### `batch_processor` - 批量记录处理器
//! - 顺序遍历 `&[InputRecord]`
//! - 每条记录委托给 `workflow::RecordFlow`
//! - 累积 `BatchRun`
//!
//! ## 层次关系
//!
//! ```text
//! app (资源与结果文件)
//!     ↓
//! batch_processor (处理 Vec<InputRecord>)
//!     ↓
//! workflow::RecordFlow (处理单条记录)
//!     ↓
//! services (能力层：locate / update / classify)
//!     ↓
//! infrastructure (基础设施：NavigationClient)
//! ```

pub mod app;
pub mod batch_processor;

pub use app::App;
pub use batch_processor::BatchProcessor;
