//! 测试用的脚本化导航客户端
//!
//! 按记录名称预先设定列表页的行为，并记录每次调用时的视图状态

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use roster_update::config::{
    FeedbackConfig, FeedbackLocation, FieldValue, ListingConfig, MatchStrategy, ReturnMode,
    TimeoutConfig, UpdateConfig, UpdateStep, WorkflowConfig,
};
use roster_update::error::{AppError, AppResult, BrowserError};
use roster_update::infrastructure::{ActionRef, NavigationClient, RowMatch, RowQuery, ViewId};

pub const LISTING_URL: &str = "https://roster.test/listing";
pub const SEARCH_INPUT: &str = "#search";
pub const NO_MATCH: &str = "td.dataTables_empty";
pub const NO_MATCH_TEXT: &str = "No matching records found";
pub const FEEDBACK: &str = "div.howl-message-inner";
pub const SUBMIT: &str = "#salvar";
pub const CPF_INPUT: &str = "#cpf";
pub const SHORTCUT: &str = "a.btn-danger";

/// 列表页对某个名称的反应
#[derive(Debug, Clone)]
pub enum RowScript {
    /// 有唯一匹配行
    Match,
    /// 无匹配行，出现"无匹配"提示
    Empty,
    /// 无匹配行，也没有提示
    Silent,
    /// 多行匹配
    Ambiguous(usize),
    /// 前若干次查询多行匹配（过滤尚未生效），之后唯一匹配
    AmbiguousThen(usize),
    /// 查询本身报错
    LookupError(String),
}

/// 弹出窗口的反应
#[derive(Debug, Clone)]
pub struct PopupScript {
    pub opens: bool,
    /// 触发后多久出现
    pub delay: Duration,
    /// 触发操作直到窗口被接管后才完成
    pub trigger_waits_for_view: bool,
    pub fill_error: Option<String>,
    pub feedback: Option<String>,
}

impl Default for PopupScript {
    fn default() -> Self {
        Self {
            opens: true,
            delay: Duration::ZERO,
            trigger_waits_for_view: false,
            fill_error: None,
            feedback: Some("Dados salvos com Sucesso!".to_string()),
        }
    }
}

#[derive(Default)]
struct State {
    rows: HashMap<String, RowScript>,
    popup: PopupScript,
    filter: Option<String>,
    /// 已触发、尚未被接管的窗口出现的时间
    popup_at: Option<Instant>,
    adopted: usize,
    missing: HashSet<String>,
    lookup_counts: HashMap<String, usize>,
    open_views: HashSet<u64>,
    next_view: u64,
    max_open_views: usize,
    open_views_at_lookup: Vec<usize>,
    open_views_at_listing: Vec<usize>,
    lookups: Vec<String>,
    fills: Vec<(ViewId, String, String)>,
    triggered: Vec<String>,
    submitted: usize,
    navigations: usize,
    follows: usize,
    go_backs: usize,
    closed: usize,
    strays_closed: usize,
    fail_go_back: bool,
}

impl State {
    /// 已出现的窗口数，包括尚未被接管的
    fn visible_views(&self) -> usize {
        let stray = self.popup_at.is_some_and(|at| Instant::now() >= at);
        self.open_views.len() + usize::from(stray)
    }
}

/// 脚本化的导航客户端
pub struct ScriptedClient {
    state: Mutex<State>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_row(self, name: &str, script: RowScript) -> Self {
        self.state.lock().unwrap().rows.insert(name.to_string(), script);
        self
    }

    pub fn with_popup(self, popup: PopupScript) -> Self {
        self.state.lock().unwrap().popup = popup;
        self
    }

    /// 页面上不存在该元素
    pub fn without_element(self, selector: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .missing
            .insert(selector.to_string());
        self
    }

    pub fn failing_go_back(self) -> Self {
        self.state.lock().unwrap().fail_go_back = true;
        self
    }

    pub fn open_views(&self) -> usize {
        self.state.lock().unwrap().visible_views()
    }

    pub fn max_open_views(&self) -> usize {
        self.state.lock().unwrap().max_open_views
    }

    pub fn open_views_at_lookup(&self) -> Vec<usize> {
        self.state.lock().unwrap().open_views_at_lookup.clone()
    }

    pub fn open_views_at_listing(&self) -> Vec<usize> {
        self.state.lock().unwrap().open_views_at_listing.clone()
    }

    pub fn lookups(&self) -> Vec<String> {
        self.state.lock().unwrap().lookups.clone()
    }

    pub fn fills(&self) -> Vec<(ViewId, String, String)> {
        self.state.lock().unwrap().fills.clone()
    }

    pub fn triggered(&self) -> Vec<String> {
        self.state.lock().unwrap().triggered.clone()
    }

    pub fn submitted(&self) -> usize {
        self.state.lock().unwrap().submitted
    }

    pub fn navigations(&self) -> usize {
        self.state.lock().unwrap().navigations
    }

    pub fn follows(&self) -> usize {
        self.state.lock().unwrap().follows
    }

    pub fn strays_closed(&self) -> usize {
        self.state.lock().unwrap().strays_closed
    }

    pub fn go_backs(&self) -> usize {
        self.state.lock().unwrap().go_backs
    }

    pub fn closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    fn current_script(&self) -> Option<RowScript> {
        let state = self.state.lock().unwrap();
        state
            .filter
            .as_ref()
            .and_then(|name| state.rows.get(name))
            .cloned()
    }

    fn ensure_open(&self, view: ViewId) -> AppResult<()> {
        match view {
            ViewId::Primary => Ok(()),
            ViewId::Secondary(id) => {
                if self.state.lock().unwrap().open_views.contains(&id) {
                    Ok(())
                } else {
                    Err(BrowserError::ViewClosed {
                        view: view.to_string(),
                    }
                    .into())
                }
            }
        }
    }
}

#[async_trait]
impl NavigationClient for ScriptedClient {
    async fn navigate(&self, _url: &str) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.navigations += 1;
        state.filter = None;
        let open = state.visible_views();
        state.open_views_at_listing.push(open);
        Ok(())
    }

    async fn go_back(&self) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.go_backs += 1;
        if state.fail_go_back {
            return Err(AppError::Other("history is empty".to_string()));
        }
        Ok(())
    }

    async fn click(&self, view: ViewId, selector: &str, timeout: Duration) -> AppResult<()> {
        self.ensure_open(view)?;
        if self.state.lock().unwrap().missing.contains(selector) {
            sleep(timeout).await;
            return Err(AppError::timeout(selector, timeout));
        }
        if selector == SUBMIT {
            self.state.lock().unwrap().submitted += 1;
        }
        Ok(())
    }

    async fn follow(&self, selector: &str, timeout: Duration) -> AppResult<()> {
        if self.state.lock().unwrap().missing.contains(selector) {
            sleep(timeout).await;
            return Err(AppError::timeout(selector, timeout));
        }
        let mut state = self.state.lock().unwrap();
        state.follows += 1;
        state.filter = None;
        let open = state.visible_views();
        state.open_views_at_listing.push(open);
        Ok(())
    }

    async fn fill(&self, view: ViewId, selector: &str, value: &str) -> AppResult<()> {
        self.ensure_open(view)?;
        let mut state = self.state.lock().unwrap();
        match view {
            ViewId::Primary => state.filter = Some(value.to_string()),
            ViewId::Secondary(_) => {
                if let Some(message) = state.popup.fill_error.clone() {
                    return Err(AppError::Other(message));
                }
            }
        }
        state
            .fills
            .push((view, selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        view: ViewId,
        selector: &str,
        timeout: Duration,
    ) -> AppResult<()> {
        self.ensure_open(view)?;
        let feedback_missing =
            selector == FEEDBACK && self.state.lock().unwrap().popup.feedback.is_none();
        if feedback_missing {
            sleep(timeout).await;
            return Err(AppError::timeout(selector, timeout));
        }
        Ok(())
    }

    async fn wait_for_settled(&self, view: ViewId, _timeout: Duration) -> AppResult<()> {
        self.ensure_open(view)
    }

    async fn is_visible(&self, _view: ViewId, selector: &str) -> AppResult<bool> {
        Ok(selector == NO_MATCH && matches!(self.current_script(), Some(RowScript::Empty)))
    }

    async fn read_text(&self, view: ViewId, selector: &str) -> AppResult<Option<String>> {
        self.ensure_open(view)?;
        if selector == NO_MATCH {
            return Ok(match self.current_script() {
                Some(RowScript::Empty) => Some(NO_MATCH_TEXT.to_string()),
                _ => None,
            });
        }
        if selector == FEEDBACK {
            return Ok(self.state.lock().unwrap().popup.feedback.clone());
        }
        Ok(None)
    }

    async fn find_row_action(&self, query: &RowQuery) -> AppResult<RowMatch> {
        let (script, seen) = {
            let mut state = self.state.lock().unwrap();
            let open = state.visible_views();
            state.open_views_at_lookup.push(open);
            state.lookups.push(query.primary.clone());
            let seen = state.lookup_counts.entry(query.primary.clone()).or_insert(0);
            *seen += 1;
            let seen = *seen;
            (state.rows.get(&query.primary).cloned(), seen)
        };
        match script {
            Some(RowScript::Match) => Ok(RowMatch::Unique(ActionRef {
                token: query.primary.clone(),
                description: format!("INFORMAR {}", query.primary),
            })),
            Some(RowScript::Ambiguous(count)) => Ok(RowMatch::Ambiguous(count)),
            Some(RowScript::AmbiguousThen(times)) if seen <= times => Ok(RowMatch::Ambiguous(2)),
            Some(RowScript::AmbiguousThen(_)) => Ok(RowMatch::Unique(ActionRef {
                token: query.primary.clone(),
                description: format!("INFORMAR {}", query.primary),
            })),
            Some(RowScript::LookupError(message)) => Err(AppError::Other(message)),
            Some(RowScript::Empty) | Some(RowScript::Silent) | None => Ok(RowMatch::None),
        }
    }

    async fn trigger(&self, action: &ActionRef) -> AppResult<()> {
        let (waits, adopted_before) = {
            let mut state = self.state.lock().unwrap();
            state.triggered.push(action.token.clone());
            if state.popup.opens {
                state.popup_at = Some(Instant::now() + state.popup.delay);
            }
            (state.popup.trigger_waits_for_view, state.adopted)
        };
        if !waits {
            return Ok(());
        }

        // 新窗口被接管之前点击不会完成
        let deadline = Instant::now() + Duration::from_millis(200);
        loop {
            if self.state.lock().unwrap().adopted > adopted_before {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AppError::Other("点击未完成: 新窗口没有被接管".to_string()));
            }
            sleep(Duration::from_millis(1)).await;
        }
    }

    async fn wait_for_secondary_view(&self, timeout: Duration) -> AppResult<ViewId> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut state = self.state.lock().unwrap();
                if state.popup_at.is_some_and(|at| Instant::now() >= at) {
                    state.popup_at = None;
                    state.adopted += 1;
                    state.next_view += 1;
                    let id = state.next_view;
                    state.open_views.insert(id);
                    state.max_open_views = state.max_open_views.max(state.open_views.len());
                    return Ok(ViewId::Secondary(id));
                }
            }
            if Instant::now() >= deadline {
                return Err(AppError::timeout("新窗口打开", timeout));
            }
            sleep(Duration::from_millis(1)).await;
        }
    }

    async fn close_view(&self, view: ViewId) -> AppResult<()> {
        let ViewId::Secondary(id) = view else {
            return Err(AppError::Other("不能关闭主视图".to_string()));
        };
        let mut state = self.state.lock().unwrap();
        if !state.open_views.remove(&id) {
            return Err(BrowserError::ViewClosed {
                view: view.to_string(),
            }
            .into());
        }
        state.closed += 1;
        Ok(())
    }

    async fn close_stray_views(&self) -> AppResult<usize> {
        let mut state = self.state.lock().unwrap();
        if state.popup_at.is_some_and(|at| Instant::now() >= at) {
            state.popup_at = None;
            state.strays_closed += 1;
            return Ok(1);
        }
        Ok(0)
    }
}

pub fn test_timeouts() -> TimeoutConfig {
    TimeoutConfig {
        navigation_ms: 100,
        shortcut_ms: 20,
        element_ms: 50,
        settle_ms: 50,
        match_ms: 30,
        secondary_view_ms: 50,
        feedback_ms: 30,
        poll_interval_ms: 5,
    }
}

pub fn test_listing() -> ListingConfig {
    ListingConfig {
        url: LISTING_URL.to_string(),
        shortcut_selector: None,
        ready_selector: "#DataTables_Table_0".to_string(),
        search_input_selector: Some(SEARCH_INPUT.to_string()),
        row_selector: "tbody tr".to_string(),
        action_selector: "a.btn-info".to_string(),
        action_text: Some("INFORMAR".to_string()),
        no_match_selector: NO_MATCH.to_string(),
        no_match_text: Some(NO_MATCH_TEXT.to_string()),
        return_mode: ReturnMode::GoBack,
    }
}

pub fn test_update() -> UpdateConfig {
    UpdateConfig {
        steps: vec![UpdateStep::Fill {
            selector: CPF_INPUT.to_string(),
            value: FieldValue::Column {
                name: "CPF".to_string(),
                digits: Some(11),
            },
            optional: true,
        }],
        submit_selector: SUBMIT.to_string(),
        feedback: Some(FeedbackConfig {
            selector: FEEDBACK.to_string(),
            location: FeedbackLocation::Secondary,
            success_marker: "sucesso".to_string(),
        }),
    }
}

/// 按主名称匹配、带弹出窗口更新的测试流程
pub fn test_workflow() -> WorkflowConfig {
    WorkflowConfig {
        listing: test_listing(),
        matching: MatchStrategy::PrimaryName,
        update: Some(test_update()),
        timeouts: test_timeouts(),
        ..Default::default()
    }
}
