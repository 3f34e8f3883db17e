//! 基于 chromiumoxide 的导航客户端
//!
//! 主页面与弹出窗口各由一个 `JsExecutor` 持有，并各自挂一个网络监听器；
//! 页面脚本的参数一律经 `serde_json` 编码传入

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::{Browser, Page};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::config::TimeoutConfig;
use crate::error::{AppError, AppResult, BrowserError};
use crate::infrastructure::js_executor::JsExecutor;
use crate::infrastructure::navigation::{
    ActionRef, NavigationClient, RowMatch, RowQuery, ViewId,
};
use crate::infrastructure::network_monitor::NetworkMonitor;

/// 没有未完成请求持续多久视为网络空闲
const QUIET_WINDOW: Duration = Duration::from_millis(500);

/// 标记已定位操作链接的属性名
const ACTION_ATTRIBUTE: &str = "data-roster-action";

const EXISTS_SCRIPT: &str = "(args) => document.querySelector(args.selector) !== null";

const VISIBLE_SCRIPT: &str = r#"(args) => {
    const el = document.querySelector(args.selector);
    if (!el) return false;
    const style = window.getComputedStyle(el);
    return style.display !== 'none' && style.visibility !== 'hidden' && el.getClientRects().length > 0;
}"#;

const READ_TEXT_SCRIPT: &str = r#"(args) => {
    const el = document.querySelector(args.selector);
    if (!el) return { found: false, text: '' };
    return { found: true, text: (el.innerText || el.textContent || '').trim() };
}"#;

const FILL_SCRIPT: &str = r#"(args) => {
    const el = document.querySelector(args.selector);
    if (!el) return false;
    el.focus();
    el.value = args.value;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    el.dispatchEvent(new KeyboardEvent('keyup', { bubbles: true }));
    return true;
}"#;

const SETTLE_SCRIPT: &str = "(() => ({ ready: document.readyState === 'complete' }))()";

const GO_BACK_SCRIPT: &str = "(() => { history.back(); return true; })()";

/// 行探测脚本：返回 none / unique / ambiguous
const ROW_PROBE_SCRIPT: &str = r#"(q) => {
    const textOf = (el) => el.innerText || el.textContent || '';
    const contains = (el, needle) => textOf(el).includes(needle);
    const hits = [];
    for (const row of document.querySelectorAll(q.row_selector)) {
        if (!contains(row, q.primary)) continue;
        if (q.secondary) {
            const fields = Array.from(row.querySelectorAll(q.secondary.field_selector));
            const matched = fields.some((f) =>
                (q.secondary.label === null || contains(f, q.secondary.label)) &&
                contains(f, q.secondary.value));
            if (!matched) continue;
        }
        const actions = Array.from(row.querySelectorAll(q.action_selector))
            .filter((a) => q.action_text === null || contains(a, q.action_text));
        if (actions.length > 0) hits.push(actions[0]);
    }
    if (hits.length === 0) return { kind: 'none' };
    if (hits.length > 1) return { kind: 'ambiguous', count: hits.length };
    document.querySelectorAll('[' + q.attribute + ']').forEach((el) => el.removeAttribute(q.attribute));
    hits[0].setAttribute(q.attribute, q.token);
    return {
        kind: 'unique',
        token: q.token,
        description: hits[0].getAttribute('href') || textOf(hits[0]).trim()
    };
}"#;

#[derive(Serialize)]
struct RowProbeArgs<'a> {
    #[serde(flatten)]
    query: &'a RowQuery,
    token: &'a str,
    attribute: &'a str,
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RowProbe {
    #[serde(rename = "none")]
    Missing,
    Unique { token: String, description: String },
    Ambiguous { count: usize },
}

#[derive(Deserialize)]
struct TextProbe {
    found: bool,
    text: String,
}

#[derive(Deserialize)]
struct SettleProbe {
    ready: bool,
}

/// 一个视图：执行器 + 网络监听器
#[derive(Clone)]
struct ViewHandle {
    executor: JsExecutor,
    network: Arc<NetworkMonitor>,
}

impl ViewHandle {
    async fn attach(page: Page) -> AppResult<Self> {
        let network = NetworkMonitor::attach(&page).await?;
        Ok(Self {
            executor: JsExecutor::new(page),
            network: Arc::new(network),
        })
    }
}

/// CDP 导航客户端
pub struct CdpNavigationClient {
    browser: Browser,
    primary: ViewHandle,
    secondary: Mutex<HashMap<u64, ViewHandle>>,
    /// 等待新窗口时的页面基准，等待超时后保留，供 close_stray_views 使用
    baseline: Mutex<Option<HashSet<TargetId>>>,
    next_view: AtomicU64,
    next_token: AtomicU64,
    navigation_timeout: Duration,
    poll_interval: Duration,
}

impl CdpNavigationClient {
    /// 接管主页面并开始监听其网络活动
    pub async fn attach(browser: Browser, page: Page, timeouts: &TimeoutConfig) -> AppResult<Self> {
        let primary = ViewHandle::attach(page).await?;
        Ok(Self {
            browser,
            primary,
            secondary: Mutex::new(HashMap::new()),
            baseline: Mutex::new(None),
            next_view: AtomicU64::new(1),
            next_token: AtomicU64::new(1),
            navigation_timeout: timeouts.navigation(),
            poll_interval: timeouts.poll_interval(),
        })
    }

    /// 当前打开的弹出窗口数量
    pub async fn open_secondary_views(&self) -> usize {
        self.secondary.lock().await.len()
    }

    async fn view(&self, view: ViewId) -> AppResult<ViewHandle> {
        match view {
            ViewId::Primary => Ok(self.primary.clone()),
            ViewId::Secondary(id) => self
                .secondary
                .lock()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| {
                    BrowserError::ViewClosed {
                        view: view.to_string(),
                    }
                    .into()
                }),
        }
    }

    async fn executor(&self, view: ViewId) -> AppResult<JsExecutor> {
        Ok(self.view(view).await?.executor)
    }

    async fn page_targets(&self) -> AppResult<Vec<Page>> {
        Ok(self.browser.pages().await?)
    }

    /// 主视图与已接管弹出窗口的 target
    async fn adopted_targets(&self) -> HashSet<TargetId> {
        let mut targets: HashSet<TargetId> = self
            .secondary
            .lock()
            .await
            .values()
            .map(|v| v.executor.page().target_id().clone())
            .collect();
        targets.insert(self.primary.executor.page().target_id().clone());
        targets
    }

    async fn wait_for_page_navigation(&self) -> AppResult<()> {
        match timeout(
            self.navigation_timeout,
            self.primary.executor.page().wait_for_navigation(),
        )
        .await
        {
            Ok(result) => {
                result?;
                Ok(())
            }
            Err(_) => Err(AppError::timeout("页面导航", self.navigation_timeout)),
        }
    }
}

#[async_trait]
impl NavigationClient for CdpNavigationClient {
    async fn navigate(&self, url: &str) -> AppResult<()> {
        debug!("导航到: {}", url);
        let navigation_failed = |message: String| BrowserError::NavigationFailed {
            url: url.to_string(),
            message,
        };
        match timeout(self.navigation_timeout, self.primary.executor.page().goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(navigation_failed(e.to_string()).into()),
            Err(_) => Err(AppError::timeout(format!("页面 {}", url), self.navigation_timeout)),
        }
    }

    async fn go_back(&self) -> AppResult<()> {
        debug!("主视图后退");
        self.primary.executor.eval(GO_BACK_SCRIPT).await?;
        self.wait_for_page_navigation().await
    }

    async fn click(&self, view: ViewId, selector: &str, timeout: Duration) -> AppResult<()> {
        self.wait_for_selector(view, selector, timeout).await?;
        let executor = self.executor(view).await?;
        let element = executor.page().find_element(selector).await?;
        element.click().await?;
        debug!("{} 点击: {}", view, selector);
        Ok(())
    }

    async fn follow(&self, selector: &str, timeout: Duration) -> AppResult<()> {
        self.wait_for_selector(ViewId::Primary, selector, timeout)
            .await?;
        let element = self.primary.executor.page().find_element(selector).await?;
        element.click().await?;
        debug!("跟随链接: {}", selector);
        self.wait_for_page_navigation().await
    }

    async fn fill(&self, view: ViewId, selector: &str, value: &str) -> AppResult<()> {
        let executor = self.executor(view).await?;
        let filled: bool = executor
            .call_as(FILL_SCRIPT, &json!({ "selector": selector, "value": value }))
            .await?;
        if !filled {
            return Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
            }
            .into());
        }
        debug!("{} 填写: {}", view, selector);
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        view: ViewId,
        selector: &str,
        timeout: Duration,
    ) -> AppResult<()> {
        let executor = self.executor(view).await?;
        let predicate = crate::infrastructure::js_executor::call_expression(
            EXISTS_SCRIPT,
            &json!({ "selector": selector }),
        )?;
        executor
            .wait_until(&predicate, selector, timeout, self.poll_interval)
            .await
    }

    async fn wait_for_settled(&self, view: ViewId, timeout: Duration) -> AppResult<()> {
        let handle = self.view(view).await?;
        let deadline = Instant::now() + timeout;

        loop {
            let ready = match handle.executor.eval_as::<SettleProbe>(SETTLE_SCRIPT).await {
                Ok(probe) => probe.ready,
                // 页面切换期间执行上下文可能已销毁
                Err(e) => {
                    debug!("{} 加载状态暂不可读: {}", view, e);
                    false
                }
            };
            let quiet = handle
                .network
                .idle_for()
                .await
                .is_some_and(|idle| idle >= QUIET_WINDOW);
            if ready && quiet {
                return Ok(());
            }
            if Instant::now() >= deadline {
                debug!(
                    "{} 仍有 {} 个请求未完成",
                    view,
                    handle.network.in_flight().await
                );
                return Err(AppError::timeout(format!("{} 加载完成", view), timeout));
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn is_visible(&self, view: ViewId, selector: &str) -> AppResult<bool> {
        let executor = self.executor(view).await?;
        executor
            .call_as(VISIBLE_SCRIPT, &json!({ "selector": selector }))
            .await
    }

    async fn read_text(&self, view: ViewId, selector: &str) -> AppResult<Option<String>> {
        let executor = self.executor(view).await?;
        let probe: TextProbe = executor
            .call_as(READ_TEXT_SCRIPT, &json!({ "selector": selector }))
            .await?;
        Ok(probe.found.then_some(probe.text))
    }

    async fn find_row_action(&self, query: &RowQuery) -> AppResult<RowMatch> {
        let token = format!("r{}", self.next_token.fetch_add(1, Ordering::SeqCst));
        let args = RowProbeArgs {
            query,
            token: &token,
            attribute: ACTION_ATTRIBUTE,
        };
        let probe: RowProbe = self.primary.executor.call_as(ROW_PROBE_SCRIPT, &args).await?;
        Ok(match probe {
            RowProbe::Missing => RowMatch::None,
            RowProbe::Unique { token, description } => {
                RowMatch::Unique(ActionRef { token, description })
            }
            RowProbe::Ambiguous { count } => RowMatch::Ambiguous(count),
        })
    }

    async fn trigger(&self, action: &ActionRef) -> AppResult<()> {
        let selector = format!(r#"[{}="{}"]"#, ACTION_ATTRIBUTE, action.token);
        let element = self
            .primary
            .executor
            .page()
            .find_element(selector.as_str())
            .await?;
        element.click().await?;
        debug!("已触发操作: {}", action.description);
        Ok(())
    }

    async fn wait_for_secondary_view(&self, timeout: Duration) -> AppResult<ViewId> {
        let known = {
            let mut baseline = self.baseline.lock().await;
            match baseline.as_ref() {
                Some(known) => known.clone(),
                None => {
                    let known: HashSet<TargetId> = self
                        .page_targets()
                        .await?
                        .iter()
                        .map(|p| p.target_id().clone())
                        .collect();
                    *baseline = Some(known.clone());
                    known
                }
            }
        };
        let deadline = Instant::now() + timeout;

        loop {
            let opened = self
                .page_targets()
                .await?
                .into_iter()
                .find(|p| !known.contains(p.target_id()));
            if let Some(page) = opened {
                let handle = ViewHandle::attach(page).await?;
                let id = self.next_view.fetch_add(1, Ordering::SeqCst);
                self.secondary.lock().await.insert(id, handle);
                *self.baseline.lock().await = None;
                let view = ViewId::Secondary(id);
                debug!("{} 已打开", view);
                return Ok(view);
            }
            if Instant::now() >= deadline {
                return Err(AppError::timeout("新窗口打开", timeout));
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn close_view(&self, view: ViewId) -> AppResult<()> {
        let ViewId::Secondary(id) = view else {
            return Err(AppError::Other("不能关闭主视图".to_string()));
        };
        let handle = self.secondary.lock().await.remove(&id).ok_or_else(|| {
            AppError::from(BrowserError::ViewClosed {
                view: view.to_string(),
            })
        })?;
        handle.executor.into_page().close().await?;
        debug!("{} 已关闭", view);
        Ok(())
    }

    async fn close_stray_views(&self) -> AppResult<usize> {
        let previous = self.baseline.lock().await.take();
        let adopted = self.adopted_targets().await;
        let mut remaining = HashSet::new();
        let mut closed = 0;

        for page in self.page_targets().await? {
            let target = page.target_id().clone();
            let stray = previous
                .as_ref()
                .is_some_and(|known| !known.contains(&target) && !adopted.contains(&target));
            if stray {
                warn!("⚠️ 关闭未接管的窗口: {:?}", target);
                page.close().await?;
                closed += 1;
            } else {
                remaining.insert(target);
            }
        }

        *self.baseline.lock().await = Some(remaining);
        Ok(closed)
    }
}
