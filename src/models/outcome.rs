//! 处理结果模型
//!
//! `BatchRun` 是一次批处理的唯一结果值，未找到列表与错误列表都从
//! `outcomes` 派生，不单独维护

use serde::Serialize;

use crate::infrastructure::ActionRef;

/// 定位结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateOutcome {
    /// 找到可操作的链接
    Found(ActionRef),
    /// 列表明确提示无匹配记录
    NotFound,
    /// 其他异常，保留原始消息
    Error(String),
}

/// 弹出窗口更新状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    Success,
    Failure,
}

/// 弹出窗口更新结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryViewResult {
    pub status: UpdateStatus,
    pub message: String,
}

impl SecondaryViewResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: UpdateStatus::Success,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: UpdateStatus::Failure,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == UpdateStatus::Success
    }
}

/// 单条记录的最终状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Found,
    NotFound,
    Error,
}

/// 单条记录的处理结果，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingOutcome {
    pub record_index: usize,
    pub identifier: String,
    pub status: OutcomeStatus,
    pub message: String,
}

/// 汇总统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub found: usize,
    pub not_found: usize,
    pub errors: usize,
}

/// 一次批处理的结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchRun {
    outcomes: Vec<ProcessingOutcome>,
}

impl BatchRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加下一条记录的结果
    ///
    /// `record_index` 由追加顺序决定，因此不会重复也不会缺失
    pub fn record(
        &mut self,
        identifier: impl Into<String>,
        status: OutcomeStatus,
        message: impl Into<String>,
    ) -> &ProcessingOutcome {
        let record_index = self.outcomes.len();
        self.outcomes.push(ProcessingOutcome {
            record_index,
            identifier: identifier.into(),
            status,
            message: message.into(),
        });
        &self.outcomes[record_index]
    }

    /// 按输入顺序排列的全部结果
    pub fn outcomes(&self) -> &[ProcessingOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// 未找到的记录标识
    pub fn not_found(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::NotFound)
            .map(|o| o.identifier.as_str())
            .collect()
    }

    /// 出错的记录 (标识, 消息)
    pub fn errors(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Error)
            .map(|o| (o.identifier.as_str(), o.message.as_str()))
            .collect()
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.outcomes.len(),
            ..Default::default()
        };
        for outcome in &self.outcomes {
            match outcome.status {
                OutcomeStatus::Found => summary.found += 1,
                OutcomeStatus::NotFound => summary.not_found += 1,
                OutcomeStatus::Error => summary.errors += 1,
            }
        }
        summary
    }
}
