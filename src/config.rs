use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, AppResult, FileError};

/// 程序配置（运行环境）
#[derive(Clone, Debug)]
pub struct Config {
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 是否自行启动无头浏览器（否则连接已登录的浏览器）
    pub launch_headless: bool,
    /// 浏览器可执行文件路径（仅启动模式）
    pub chrome_executable: Option<String>,
    /// 浏览器用户数据目录，用于复用已登录的会话（仅启动模式）
    pub user_data_dir: Option<String>,
    /// 流程配置文件（TOML）
    pub workflow_file: String,
    /// 待处理记录文件（CSV）
    pub records_file: String,
    /// 结果文件输出目录
    pub output_dir: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 9222,
            launch_headless: false,
            chrome_executable: None,
            user_data_dir: None,
            workflow_file: "workflow.toml".to_string(),
            records_file: "alunos.csv".to_string(),
            output_dir: ".".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.browser_debug_port),
            launch_headless: std::env::var("LAUNCH_HEADLESS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.launch_headless),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(default.chrome_executable),
            user_data_dir: std::env::var("USER_DATA_DIR").ok().or(default.user_data_dir),
            workflow_file: std::env::var("WORKFLOW_FILE").unwrap_or(default.workflow_file),
            records_file: std::env::var("RECORDS_FILE").unwrap_or(default.records_file),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or(default.output_dir),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }

    /// 结果文件输出目录
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }

    /// 加载流程配置
    ///
    /// 文件不存在时使用内置默认值
    pub async fn load_workflow(&self) -> AppResult<WorkflowConfig> {
        let path = Path::new(&self.workflow_file);
        let workflow = if tokio::fs::try_exists(path).await.unwrap_or(false) {
            info!("正在加载流程配置: {}", path.display());
            WorkflowConfig::load(path).await?
        } else {
            warn!("⚠️ 流程配置 {} 不存在，使用默认配置", path.display());
            WorkflowConfig::default()
        };
        workflow.validate()?;
        Ok(workflow)
    }
}

/// 流程配置：列表页、匹配策略、更新步骤与超时
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub listing: ListingConfig,
    pub matching: MatchStrategy,
    pub update: Option<UpdateConfig>,
    pub timeouts: TimeoutConfig,
    pub columns: ColumnConfig,
}

impl WorkflowConfig {
    /// 从 TOML 文件加载
    pub async fn load(path: &Path) -> AppResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| FileError::ReadFailed {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            AppError::File(FileError::TomlParseFailed { message, .. }) => {
                FileError::TomlParseFailed {
                    path: path.display().to_string(),
                    message,
                }
                .into()
            }
            other => other,
        })
    }

    /// 从 TOML 文本解析
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| {
            FileError::TomlParseFailed {
                path: String::new(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// 校验配置的一致性
    pub fn validate(&self) -> AppResult<()> {
        let listing = &self.listing;
        require_non_empty("listing.url", &listing.url)?;
        require_non_empty("listing.ready_selector", &listing.ready_selector)?;
        require_non_empty("listing.row_selector", &listing.row_selector)?;
        require_non_empty("listing.action_selector", &listing.action_selector)?;
        require_non_empty("listing.no_match_selector", &listing.no_match_selector)?;
        require_non_empty("columns.primary", &self.columns.primary)?;

        if let MatchStrategy::PrimaryWithSecondary { field_selector, .. } = &self.matching {
            require_non_empty("matching.field_selector", field_selector)?;
            if self.columns.secondary.is_none() {
                return Err(AppError::invalid_config(
                    "columns.secondary",
                    "primary_with_secondary 策略需要配置次要匹配列",
                ));
            }
        }

        if let Some(update) = &self.update {
            require_non_empty("update.submit_selector", &update.submit_selector)?;
            if let Some(feedback) = &update.feedback {
                require_non_empty("update.feedback.selector", &feedback.selector)?;
                require_non_empty("update.feedback.success_marker", &feedback.success_marker)?;
            }
        }

        self.timeouts.validate()
    }
}

fn require_non_empty(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::invalid_config(field, "不能为空"));
    }
    Ok(())
}

/// 列表页配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListingConfig {
    /// 列表页地址
    pub url: String,
    /// "查看列表"快捷按钮，存在时优先点击
    #[serde(default)]
    pub shortcut_selector: Option<String>,
    /// 列表加载完成的标志元素
    pub ready_selector: String,
    /// 过滤输入框，未配置时不输入过滤条件
    #[serde(default)]
    pub search_input_selector: Option<String>,
    /// 数据行
    pub row_selector: String,
    /// 行内的操作链接
    pub action_selector: String,
    /// 操作链接需包含的文本
    #[serde(default)]
    pub action_text: Option<String>,
    /// "无匹配记录"提示元素
    pub no_match_selector: String,
    /// "无匹配记录"提示需包含的文本
    #[serde(default)]
    pub no_match_text: Option<String>,
    /// 两条记录之间如何回到列表页
    #[serde(default)]
    pub return_mode: ReturnMode,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            url: "https://web02.sipf.com.br/sipfalpha/Escolav3/Index/0/107".to_string(),
            shortcut_selector: Some(
                r#"a.btn.btn-danger.btn-block[href="https://web02.sipf.com.br/sipfalpha/Escolav3/Index/0/107"]"#
                    .to_string(),
            ),
            ready_selector: "#DataTables_Table_0".to_string(),
            search_input_selector: Some(r#"div.dataTables_filter input[type="search"]"#.to_string()),
            row_selector: "#DataTables_Table_0 tbody tr".to_string(),
            action_selector: "a.btn-info".to_string(),
            action_text: Some("INFORMAR".to_string()),
            no_match_selector: "td.dataTables_empty".to_string(),
            no_match_text: Some("No matching records found".to_string()),
            return_mode: ReturnMode::GoBack,
        }
    }
}

/// 回到列表页的方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnMode {
    /// 浏览器后退
    #[default]
    GoBack,
    /// 直接导航到列表页地址
    Navigate,
}

/// 记录匹配策略
///
/// 同名记录的消歧规则由调用方显式选择
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchStrategy {
    /// 行文本包含主名称即可
    PrimaryName,
    /// 行文本包含主名称，且行内某个字段包含次要关键字
    PrimaryWithSecondary {
        /// 行内承载次要关键字的元素
        field_selector: String,
        /// 该元素还需包含的标签文本（例如 "Nome da mãe:"）
        #[serde(default)]
        field_label: Option<String>,
    },
}

impl Default for MatchStrategy {
    fn default() -> Self {
        MatchStrategy::PrimaryWithSecondary {
            field_selector: "td".to_string(),
            field_label: Some("Nome da mãe:".to_string()),
        }
    }
}

/// 弹出窗口中的更新配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// 提交前依次执行的步骤
    #[serde(default)]
    pub steps: Vec<UpdateStep>,
    /// 提交按钮
    pub submit_selector: String,
    /// 提交后的反馈提示
    #[serde(default)]
    pub feedback: Option<FeedbackConfig>,
}

/// 更新步骤
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UpdateStep {
    Click {
        selector: String,
    },
    WaitFor {
        selector: String,
    },
    Fill {
        selector: String,
        value: FieldValue,
        /// 取值为空时跳过该步骤
        #[serde(default)]
        optional: bool,
    },
}

/// 填写值来源
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum FieldValue {
    /// 固定值
    Literal { value: String },
    /// 取记录中的某一列
    Column {
        name: String,
        /// 只保留数字并截取到指定长度，结果必须恰好为该长度
        #[serde(default)]
        digits: Option<usize>,
    },
}

/// 反馈提示配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    pub selector: String,
    #[serde(default)]
    pub location: FeedbackLocation,
    /// 成功标志文本（不区分大小写）
    pub success_marker: String,
}

/// 反馈提示所在的视图
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackLocation {
    #[default]
    Secondary,
    Primary,
}

/// 各步骤的超时（毫秒）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub navigation_ms: u64,
    pub shortcut_ms: u64,
    pub element_ms: u64,
    pub settle_ms: u64,
    pub match_ms: u64,
    pub secondary_view_ms: u64,
    pub feedback_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation_ms: 30_000,
            shortcut_ms: 5_000,
            element_ms: 10_000,
            settle_ms: 10_000,
            match_ms: 10_000,
            secondary_view_ms: 10_000,
            feedback_ms: 5_000,
            poll_interval_ms: 250,
        }
    }
}

impl TimeoutConfig {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn shortcut(&self) -> Duration {
        Duration::from_millis(self.shortcut_ms)
    }

    pub fn element(&self) -> Duration {
        Duration::from_millis(self.element_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn match_wait(&self) -> Duration {
        Duration::from_millis(self.match_ms)
    }

    pub fn secondary_view(&self) -> Duration {
        Duration::from_millis(self.secondary_view_ms)
    }

    pub fn feedback(&self) -> Duration {
        Duration::from_millis(self.feedback_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn validate(&self) -> AppResult<()> {
        let fields = [
            ("timeouts.navigation_ms", self.navigation_ms),
            ("timeouts.shortcut_ms", self.shortcut_ms),
            ("timeouts.element_ms", self.element_ms),
            ("timeouts.settle_ms", self.settle_ms),
            ("timeouts.match_ms", self.match_ms),
            ("timeouts.secondary_view_ms", self.secondary_view_ms),
            ("timeouts.feedback_ms", self.feedback_ms),
            ("timeouts.poll_interval_ms", self.poll_interval_ms),
        ];
        for (field, value) in fields {
            if value == 0 {
                return Err(AppError::invalid_config(field, "超时必须大于 0"));
            }
        }
        Ok(())
    }
}

/// 记录文件的列映射
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// 主名称列
    pub primary: String,
    /// 次要匹配列
    #[serde(default)]
    pub secondary: Option<String>,
    /// 分隔符
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_delimiter() -> char {
    ','
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            primary: "NomeDoAluno".to_string(),
            secondary: Some("MAE".to_string()),
            delimiter: default_delimiter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_workflow_is_valid() {
        assert!(WorkflowConfig::default().validate().is_ok());
    }

    #[test]
    fn test_parse_workflow_toml() {
        let content = r##"
            [listing]
            url = "https://example.test/alunos"
            ready_selector = "#tabela"
            search_input_selector = "input[type=search]"
            row_selector = "#tabela tbody tr"
            action_selector = "a.gerenciar"
            no_match_selector = "td.vazio"
            return_mode = "navigate"

            [matching]
            kind = "primary_name"

            [update]
            submit_selector = "button[type=submit]"

            [[update.steps]]
            action = "click"
            selector = "a.documentos"

            [[update.steps]]
            action = "fill"
            selector = "input[name=cpf_cpf]"
            value = { source = "column", name = "CPF", digits = 11 }

            [update.feedback]
            selector = "div.howl-message-inner"
            success_marker = "sucesso"

            [timeouts]
            match_ms = 5000

            [columns]
            primary = "Nome"
            delimiter = ";"
        "##;

        let workflow = WorkflowConfig::from_toml_str(content).unwrap();
        assert_eq!(workflow.matching, MatchStrategy::PrimaryName);
        assert_eq!(workflow.listing.return_mode, ReturnMode::Navigate);
        assert_eq!(workflow.listing.shortcut_selector, None);
        assert_eq!(workflow.timeouts.match_ms, 5000);
        // 未填写的超时沿用默认值
        assert_eq!(workflow.timeouts.element_ms, 10_000);
        assert_eq!(workflow.columns.delimiter, ';');
        assert_eq!(workflow.columns.secondary, None);

        let update = workflow.update.as_ref().unwrap();
        assert_eq!(update.steps.len(), 2);
        assert_eq!(
            update.steps[1],
            UpdateStep::Fill {
                selector: "input[name=cpf_cpf]".to_string(),
                value: FieldValue::Column {
                    name: "CPF".to_string(),
                    digits: Some(11),
                },
                optional: false,
            }
        );
        let feedback = update.feedback.as_ref().unwrap();
        assert_eq!(feedback.location, FeedbackLocation::Secondary);
        assert!(workflow.validate().is_ok());
    }

    #[test]
    fn test_secondary_strategy_requires_secondary_column() {
        let mut workflow = WorkflowConfig::default();
        workflow.columns.secondary = None;
        let err = workflow.validate().unwrap_err();
        assert!(err.to_string().contains("columns.secondary"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut workflow = WorkflowConfig::default();
        workflow.timeouts.match_ms = 0;
        let err = workflow.validate().unwrap_err();
        assert!(err.to_string().contains("timeouts.match_ms"));
    }

    #[test]
    fn test_invalid_toml_reports_parse_error() {
        let err = WorkflowConfig::from_toml_str("[listing\nurl = 1").unwrap_err();
        assert!(matches!(err, AppError::File(FileError::TomlParseFailed { .. })));
    }
}
