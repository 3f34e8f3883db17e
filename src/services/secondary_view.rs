//! 弹出窗口更新服务 - 业务能力层
//!
//! 打开 → 填写 → 提交 → 校验反馈 → 关闭。无论中间步骤成功与否，
//! 返回之前弹出窗口一定已经关闭

use regex::Regex;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{
    FeedbackConfig, FeedbackLocation, FieldValue, TimeoutConfig, UpdateConfig, UpdateStep,
    WorkflowConfig,
};
use crate::error::{AppError, AppResult};
use crate::infrastructure::{ActionRef, NavigationClient, ViewId};
use crate::models::{InputRecord, SecondaryViewResult};

/// 弹出窗口更新服务
///
/// 职责：
/// - 触发操作并同时等待新窗口出现
/// - 在新窗口中执行配置好的步骤并提交
/// - 根据反馈提示判断成功或失败
/// - 保证同一时间最多只有一个弹出窗口
pub struct SecondaryViewHandler {
    config: UpdateConfig,
    timeouts: TimeoutConfig,
    gate: Mutex<()>,
    non_digit: Regex,
}

/// 填写值解析结果
#[derive(Debug, PartialEq, Eq)]
enum Resolved {
    Value(String),
    Skip,
    Invalid(String),
}

impl SecondaryViewHandler {
    pub fn new(config: UpdateConfig, timeouts: TimeoutConfig) -> AppResult<Self> {
        let non_digit =
            Regex::new(r"\D").map_err(|e| AppError::invalid_config("digits", e.to_string()))?;
        Ok(Self {
            config,
            timeouts,
            gate: Mutex::new(()),
            non_digit,
        })
    }

    /// 流程配置中没有 update 时返回 None
    pub fn from_workflow(workflow: &WorkflowConfig) -> AppResult<Option<Self>> {
        workflow
            .update
            .clone()
            .map(|config| Self::new(config, workflow.timeouts.clone()))
            .transpose()
    }

    /// 执行一次更新
    ///
    /// 业务层面的失败返回 `Failure`；基础设施错误向上返回，
    /// 两种情况下弹出窗口都已关闭
    pub async fn update(
        &self,
        client: &dyn NavigationClient,
        action: &ActionRef,
        record: &InputRecord,
    ) -> AppResult<SecondaryViewResult> {
        let _gate = self.gate.lock().await;

        let view = self.open(client, action).await?;
        let interaction = self.interact(client, view, record).await;
        let closed = client.close_view(view).await;

        match (interaction, closed) {
            (Ok(result), Ok(())) => Ok(result),
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!("⚠️ 关闭 {} 失败: {}", view, close_err);
                Err(e)
            }
        }
    }

    /// 触发操作，同时等待新窗口
    ///
    /// 两个事件谁先完成都可能，必须并发等待二者
    async fn open(&self, client: &dyn NavigationClient, action: &ActionRef) -> AppResult<ViewId> {
        self.close_strays(client).await;

        debug!("触发操作并等待新窗口: {}", action.description);
        let (opened, triggered) = tokio::join!(
            client.wait_for_secondary_view(self.timeouts.secondary_view()),
            client.trigger(action),
        );

        match (opened, triggered) {
            (Ok(view), Ok(())) => {
                info!("✔️ {} 已打开", view);
                Ok(view)
            }
            (Ok(view), Err(e)) => {
                if let Err(close_err) = client.close_view(view).await {
                    warn!("⚠️ 关闭 {} 失败: {}", view, close_err);
                }
                Err(e)
            }
            (Err(e), Ok(())) => {
                self.discard_late_view(client).await;
                Err(e)
            }
            (Err(_), Err(e)) => Err(e),
        }
    }

    /// 操作已触发但窗口超时未出现：再等一个窗口超时，出现即关闭
    async fn discard_late_view(&self, client: &dyn NavigationClient) {
        if let Ok(view) = client
            .wait_for_secondary_view(self.timeouts.secondary_view())
            .await
        {
            warn!("⚠️ {} 超时后才出现，直接关闭", view);
            if let Err(e) = client.close_view(view).await {
                warn!("⚠️ 关闭 {} 失败: {}", view, e);
            }
        }
        self.close_strays(client).await;
    }

    async fn close_strays(&self, client: &dyn NavigationClient) {
        match client.close_stray_views().await {
            Ok(0) => {}
            Ok(closed) => warn!("⚠️ 已关闭 {} 个未接管的窗口", closed),
            Err(e) => warn!("⚠️ 清理未接管的窗口失败: {}", e),
        }
    }

    async fn interact(
        &self,
        client: &dyn NavigationClient,
        view: ViewId,
        record: &InputRecord,
    ) -> AppResult<SecondaryViewResult> {
        client
            .wait_for_settled(view, self.timeouts.settle())
            .await?;

        for step in &self.config.steps {
            match step {
                UpdateStep::Click { selector } => {
                    client.click(view, selector, self.timeouts.element()).await?;
                    client.wait_for_settled(view, self.timeouts.settle()).await?;
                }
                UpdateStep::WaitFor { selector } => {
                    client
                        .wait_for_selector(view, selector, self.timeouts.element())
                        .await?;
                }
                UpdateStep::Fill {
                    selector,
                    value,
                    optional,
                } => match self.resolve(value, *optional, record) {
                    Resolved::Value(text) => {
                        client
                            .wait_for_selector(view, selector, self.timeouts.element())
                            .await?;
                        client.fill(view, selector, &text).await?;
                    }
                    Resolved::Skip => {
                        info!("字段 {} 无取值，跳过", selector);
                    }
                    Resolved::Invalid(message) => {
                        warn!("⚠️ {}", message);
                        return Ok(SecondaryViewResult::failure(message));
                    }
                },
            }
        }

        client
            .click(view, &self.config.submit_selector, self.timeouts.element())
            .await?;
        debug!("已点击提交: {}", self.config.submit_selector);

        match &self.config.feedback {
            Some(feedback) => self.verify_feedback(client, view, feedback).await,
            None => Ok(SecondaryViewResult::success("submitted")),
        }
    }

    fn resolve(&self, value: &FieldValue, optional: bool, record: &InputRecord) -> Resolved {
        match value {
            FieldValue::Literal { value } => Resolved::Value(value.clone()),
            FieldValue::Column { name, digits } => {
                let Some(raw) = record.field(name) else {
                    return if optional {
                        Resolved::Skip
                    } else {
                        Resolved::Invalid(format!("字段 {} 缺少取值", name))
                    };
                };
                match digits {
                    None => Resolved::Value(raw.to_string()),
                    Some(length) => {
                        let cleaned: String = self
                            .non_digit
                            .replace_all(raw, "")
                            .chars()
                            .take(*length)
                            .collect();
                        if cleaned.chars().count() == *length {
                            Resolved::Value(cleaned)
                        } else {
                            Resolved::Invalid(format!(
                                "字段 {} 的值无效: {:?} → {:?}",
                                name, raw, cleaned
                            ))
                        }
                    }
                }
            }
        }
    }

    async fn verify_feedback(
        &self,
        client: &dyn NavigationClient,
        view: ViewId,
        feedback: &FeedbackConfig,
    ) -> AppResult<SecondaryViewResult> {
        let target = match feedback.location {
            FeedbackLocation::Secondary => view,
            FeedbackLocation::Primary => ViewId::Primary,
        };

        if let Err(e) = client
            .wait_for_selector(target, &feedback.selector, self.timeouts.feedback())
            .await
        {
            if e.is_timeout() {
                return Ok(SecondaryViewResult::failure(e.to_string()));
            }
            return Err(e);
        }

        let text = client
            .read_text(target, &feedback.selector)
            .await?
            .unwrap_or_default();
        debug!("反馈提示: {:?}", text);

        if text
            .to_lowercase()
            .contains(&feedback.success_marker.to_lowercase())
        {
            info!("[✅] 保存成功");
            Ok(SecondaryViewResult::success(text))
        } else {
            warn!("[⚠️] 保存后的提示不符合预期: {:?}", text);
            Ok(SecondaryViewResult::failure(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> SecondaryViewHandler {
        SecondaryViewHandler::new(
            UpdateConfig {
                steps: Vec::new(),
                submit_selector: "button[type=submit]".to_string(),
                feedback: None,
            },
            TimeoutConfig::default(),
        )
        .unwrap()
    }

    fn column(name: &str, digits: Option<usize>) -> FieldValue {
        FieldValue::Column {
            name: name.to_string(),
            digits,
        }
    }

    #[test]
    fn test_resolve_digits_strips_punctuation() {
        let record = InputRecord::new("ANA").with_field("CPF", "123.456.789-01");
        assert_eq!(
            handler().resolve(&column("CPF", Some(11)), false, &record),
            Resolved::Value("12345678901".to_string())
        );
    }

    #[test]
    fn test_resolve_digits_too_short_is_invalid() {
        let record = InputRecord::new("ANA").with_field("CPF", "123.456");
        assert!(matches!(
            handler().resolve(&column("CPF", Some(11)), false, &record),
            Resolved::Invalid(_)
        ));
    }

    #[test]
    fn test_resolve_digits_truncates_long_value() {
        let record = InputRecord::new("ANA").with_field("NIS", "1234567890123");
        assert_eq!(
            handler().resolve(&column("NIS", Some(11)), false, &record),
            Resolved::Value("12345678901".to_string())
        );
    }

    #[test]
    fn test_resolve_missing_column() {
        let record = InputRecord::new("ANA");
        assert_eq!(
            handler().resolve(&column("INEP", None), true, &record),
            Resolved::Skip
        );
        assert!(matches!(
            handler().resolve(&column("INEP", None), false, &record),
            Resolved::Invalid(_)
        ));
    }

    #[test]
    fn test_resolve_literal() {
        let record = InputRecord::new("ANA");
        let value = FieldValue::Literal {
            value: "SIM".to_string(),
        };
        assert_eq!(
            handler().resolve(&value, false, &record),
            Resolved::Value("SIM".to_string())
        );
    }
}
