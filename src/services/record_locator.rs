//! 记录定位服务 - 业务能力层
//!
//! 在列表页中搜索一条记录并给出 Found / NotFound / Error，不关心后续更新

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::config::{ListingConfig, MatchStrategy, ReturnMode, TimeoutConfig, WorkflowConfig};
use crate::error::{AppError, AppResult, BusinessError};
use crate::infrastructure::{ActionRef, FieldMatch, NavigationClient, RowMatch, RowQuery, ViewId};
use crate::models::{InputRecord, LocateOutcome, SearchKey};
use crate::services::error_classifier::{Classification, ErrorClassifier};

/// 匹配窗口结束时的结论
enum MatchWait {
    Unique(ActionRef),
    /// 直到窗口结束仍有多行匹配
    Ambiguous(usize),
}

/// 记录定位服务
///
/// 流程：
/// 1. 打开列表页（优先点击快捷按钮，不存在时直接导航）
/// 2. 输入过滤条件并等待列表稳定
/// 3. 在限定时间内查找满足匹配策略的行
/// 4. 超时后检查"无匹配"提示，交给 ErrorClassifier 判定
pub struct RecordLocator {
    listing: ListingConfig,
    strategy: MatchStrategy,
    timeouts: TimeoutConfig,
    classifier: ErrorClassifier,
}

impl RecordLocator {
    pub fn new(listing: ListingConfig, strategy: MatchStrategy, timeouts: TimeoutConfig) -> Self {
        Self {
            listing,
            strategy,
            timeouts,
            classifier: ErrorClassifier::new(),
        }
    }

    pub fn from_workflow(workflow: &WorkflowConfig) -> Self {
        Self::new(
            workflow.listing.clone(),
            workflow.matching.clone(),
            workflow.timeouts.clone(),
        )
    }

    /// 按匹配策略把记录转换为行查询
    pub fn build_query(&self, record: &InputRecord) -> AppResult<RowQuery> {
        let primary = SearchKey::parse("primary_name", &record.primary_name)?;

        let secondary = match &self.strategy {
            MatchStrategy::PrimaryName => None,
            MatchStrategy::PrimaryWithSecondary {
                field_selector,
                field_label,
            } => {
                let raw = record
                    .secondary_match_key
                    .as_deref()
                    .filter(|v| !v.trim().is_empty())
                    .ok_or_else(|| BusinessError::MissingSecondaryKey {
                        identifier: record.identifier().to_string(),
                    })?;
                let key = SearchKey::parse("secondary_match_key", raw)?;
                Some(FieldMatch {
                    field_selector: field_selector.clone(),
                    label: field_label.clone(),
                    value: key.as_str().to_string(),
                })
            }
        };

        Ok(RowQuery {
            row_selector: self.listing.row_selector.clone(),
            primary: primary.as_str().to_string(),
            secondary,
            action_selector: self.listing.action_selector.clone(),
            action_text: self.listing.action_text.clone(),
        })
    }

    /// 定位一条记录
    ///
    /// 所有失败都转换为 `LocateOutcome::Error`，消息原样保留
    pub async fn locate(&self, client: &dyn NavigationClient, record: &InputRecord) -> LocateOutcome {
        match self.try_locate(client, record).await {
            Ok(outcome) => outcome,
            Err(e) => LocateOutcome::Error(e.to_string()),
        }
    }

    async fn try_locate(
        &self,
        client: &dyn NavigationClient,
        record: &InputRecord,
    ) -> AppResult<LocateOutcome> {
        let query = self.build_query(record)?;

        self.open_listing(client).await?;
        self.apply_filter(client, &query.primary).await?;

        let outcome = match self.await_match(client, &query).await {
            Ok(MatchWait::Unique(action)) => {
                debug!("→ 找到操作链接: {}", action.description);
                LocateOutcome::Found(action)
            }
            Ok(MatchWait::Ambiguous(count)) => {
                LocateOutcome::Error(AppError::from(BusinessError::AmbiguousMatch { count }).to_string())
            }
            Err(raw) => self.resolve_miss(client, raw).await,
        };
        Ok(outcome)
    }

    /// 打开列表页
    ///
    /// 快捷按钮会引起整页导航，等导航完成后再检查列表，避免读到旧页面
    pub async fn open_listing(&self, client: &dyn NavigationClient) -> AppResult<()> {
        let mut opened = false;
        if let Some(shortcut) = &self.listing.shortcut_selector {
            match client.follow(shortcut, self.timeouts.shortcut()).await {
                Ok(()) => {
                    debug!("✅ 已点击列表快捷按钮");
                    opened = true;
                }
                Err(e) => warn!("⚠️ 列表快捷按钮不可用 ({}), 直接导航到列表页", e),
            }
        }
        if !opened {
            client.navigate(&self.listing.url).await?;
        }

        client
            .wait_for_selector(ViewId::Primary, &self.listing.ready_selector, self.timeouts.element())
            .await?;
        client
            .wait_for_settled(ViewId::Primary, self.timeouts.settle())
            .await
    }

    /// 输入过滤条件，读取结果前等待列表稳定
    async fn apply_filter(&self, client: &dyn NavigationClient, key: &str) -> AppResult<()> {
        let Some(input) = &self.listing.search_input_selector else {
            return Ok(());
        };
        client
            .wait_for_selector(ViewId::Primary, input, self.timeouts.element())
            .await?;
        client.fill(ViewId::Primary, input, key).await?;
        client
            .wait_for_settled(ViewId::Primary, self.timeouts.settle())
            .await
    }

    /// 在限定时间内轮询匹配行
    ///
    /// 过滤可能尚未生效，多行匹配时继续轮询，窗口结束时仍多行才作为结论
    async fn await_match(&self, client: &dyn NavigationClient, query: &RowQuery) -> AppResult<MatchWait> {
        let wait = self.timeouts.match_wait();
        let poll_interval = self.timeouts.poll_interval();
        let deadline = Instant::now() + wait;
        let mut ambiguous = None;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, client.find_row_action(query)).await {
                Ok(Ok(RowMatch::Unique(action))) => return Ok(MatchWait::Unique(action)),
                Ok(Ok(RowMatch::Ambiguous(count))) => {
                    debug!("匹配到 {} 行，继续等待过滤生效", count);
                    ambiguous = Some(count);
                }
                Ok(Ok(RowMatch::None)) => ambiguous = None,
                Ok(Err(e)) => return Err(e),
                Err(_) => break,
            }
            if Instant::now() + poll_interval >= deadline {
                break;
            }
            sleep(poll_interval).await;
        }

        match ambiguous {
            Some(count) => Ok(MatchWait::Ambiguous(count)),
            None => Err(AppError::timeout("匹配行", wait)),
        }
    }

    async fn resolve_miss(&self, client: &dyn NavigationClient, raw: AppError) -> LocateOutcome {
        let indicator_present = match self.no_match_indicator_present(client).await {
            Ok(present) => present,
            Err(e) => {
                warn!("⚠️ 无法读取无匹配提示: {}", e);
                false
            }
        };
        match self.classifier.classify(&raw, indicator_present) {
            Classification::NotFound => LocateOutcome::NotFound,
            Classification::Error(message) => LocateOutcome::Error(message),
        }
    }

    async fn no_match_indicator_present(&self, client: &dyn NavigationClient) -> AppResult<bool> {
        let selector = &self.listing.no_match_selector;
        match &self.listing.no_match_text {
            Some(text) => Ok(client
                .read_text(ViewId::Primary, selector)
                .await?
                .is_some_and(|t| t.contains(text.as_str()))),
            None => client.is_visible(ViewId::Primary, selector).await,
        }
    }

    /// 回到列表页，供下一条记录使用
    pub async fn return_to_listing(&self, client: &dyn NavigationClient) -> AppResult<()> {
        match self.listing.return_mode {
            ReturnMode::GoBack => client.go_back().await,
            ReturnMode::Navigate => client.navigate(&self.listing.url).await,
        }
    }
}
