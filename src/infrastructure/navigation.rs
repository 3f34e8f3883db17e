//! 导航能力 - 基础设施层
//!
//! 对单个交互会话的抽象，核心流程只依赖这个 trait

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

/// 视图标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewId {
    /// 主会话页面
    Primary,
    /// 由操作触发打开的弹出窗口
    Secondary(u64),
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewId::Primary => write!(f, "主视图"),
            ViewId::Secondary(id) => write!(f, "弹出窗口#{}", id),
        }
    }
}

/// 已定位的操作链接
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRef {
    /// 写入目标元素的标记，用于之后再次找到它
    pub token: String,
    /// 链接描述（href 或文本），仅用于日志
    pub description: String,
}

/// 行内字段匹配条件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMatch {
    /// 行内承载该字段的元素
    pub field_selector: String,
    /// 元素还需包含的标签文本
    pub label: Option<String>,
    /// 元素需包含的值
    pub value: String,
}

/// "查找满足条件的行"查询
///
/// 所有取值都作为数据传递，实现方不得把它们拼接进选择器表达式
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowQuery {
    pub row_selector: String,
    /// 行文本需包含的主关键字
    pub primary: String,
    pub secondary: Option<FieldMatch>,
    pub action_selector: String,
    pub action_text: Option<String>,
}

/// 行查询结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowMatch {
    None,
    Unique(ActionRef),
    Ambiguous(usize),
}

/// 导航客户端
///
/// 所有操作都可能挂起，超时由参数给出
#[async_trait]
pub trait NavigationClient: Send + Sync {
    /// 主视图导航到指定地址
    async fn navigate(&self, url: &str) -> AppResult<()>;

    /// 主视图后退一页
    async fn go_back(&self) -> AppResult<()>;

    async fn click(&self, view: ViewId, selector: &str, timeout: Duration) -> AppResult<()>;

    /// 点击主视图中的链接，并等待由此引起的导航完成
    async fn follow(&self, selector: &str, timeout: Duration) -> AppResult<()>;

    async fn fill(&self, view: ViewId, selector: &str, value: &str) -> AppResult<()>;

    async fn wait_for_selector(
        &self,
        view: ViewId,
        selector: &str,
        timeout: Duration,
    ) -> AppResult<()>;

    /// 等待页面加载完成且网络空闲
    async fn wait_for_settled(&self, view: ViewId, timeout: Duration) -> AppResult<()>;

    async fn is_visible(&self, view: ViewId, selector: &str) -> AppResult<bool>;

    /// 读取元素文本，元素不存在时返回 None
    async fn read_text(&self, view: ViewId, selector: &str) -> AppResult<Option<String>>;

    /// 在主视图中查找满足条件的行及其操作链接（单次探测，不等待）
    async fn find_row_action(&self, query: &RowQuery) -> AppResult<RowMatch>;

    /// 在主视图中触发已定位的操作
    async fn trigger(&self, action: &ActionRef) -> AppResult<()>;

    /// 等待新的弹出窗口出现
    async fn wait_for_secondary_view(&self, timeout: Duration) -> AppResult<ViewId>;

    /// 关闭弹出窗口
    async fn close_view(&self, view: ViewId) -> AppResult<()>;

    /// 关闭上次等待开始后出现、但没有被接管的窗口，返回关闭的数量
    ///
    /// 同时以当前窗口集合作为下一次 `wait_for_secondary_view` 的基准
    async fn close_stray_views(&self) -> AppResult<usize>;
}
