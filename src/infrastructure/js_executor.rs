//! JS 执行器 - 基础设施层
//!
//! 持有一个 page 资源，只暴露"执行 JS"的能力

use std::time::Duration;

use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::time::{sleep, Instant};

use crate::error::{AppError, AppResult};

/// JS 执行器
///
/// 职责：
/// - 持有一个 Page（主页面或弹出窗口）
/// - 暴露 eval() / wait_until() 能力
/// - 不认识记录与流程
#[derive(Clone)]
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 取出 page
    pub fn into_page(self) -> Page {
        self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    ///
    /// 脚本不能返回 null / undefined，否则无法取值
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 以 JSON 参数调用一个函数表达式
    ///
    /// 参数经 serde_json 编码后作为字面量传入，不与脚本文本拼接成选择器
    pub async fn call_as<A: Serialize, T: DeserializeOwned>(
        &self,
        function: &str,
        args: &A,
    ) -> AppResult<T> {
        self.eval_as(call_expression(function, args)?).await
    }

    /// 轮询布尔表达式直到为真或超时
    pub async fn wait_until(
        &self,
        predicate: &str,
        what: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> AppResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.eval_as::<bool>(predicate).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AppError::timeout(what, timeout));
            }
            sleep(poll_interval).await;
        }
    }
}

/// 生成 `(function)(args)` 形式的调用表达式
pub fn call_expression<A: Serialize>(function: &str, args: &A) -> AppResult<String> {
    Ok(format!("({})({})", function, serde_json::to_string(args)?))
}
