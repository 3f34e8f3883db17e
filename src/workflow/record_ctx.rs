//! 记录处理上下文
//!
//! 封装"我正在处理第几条记录"这一信息，只用于日志

use std::fmt::Display;

/// 记录处理上下文
#[derive(Debug, Clone)]
pub struct RecordCtx {
    /// 记录索引（从0开始）
    pub record_index: usize,

    /// 记录总数
    pub total: usize,

    /// 记录标识
    pub identifier: String,
}

impl RecordCtx {
    pub fn new(record_index: usize, total: usize, identifier: impl Into<String>) -> Self {
        Self {
            record_index,
            total,
            identifier: identifier.into(),
        }
    }
}

impl Display for RecordCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[记录 {}/{} {}]",
            self.record_index + 1,
            self.total,
            self.identifier
        )
    }
}
