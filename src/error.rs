use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 业务逻辑错误
    #[error("业务错误: {0}")]
    Business(#[from] BusinessError),
    /// 其他错误（原样保留消息）
    #[error("{0}")]
    Other(String),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {message}")]
    ConnectionFailed { port: u16, message: String },
    /// 启动浏览器失败
    #[error("启动浏览器失败: {message}")]
    LaunchFailed { message: String },
    /// 导航失败
    #[error("导航到 {url} 失败: {message}")]
    NavigationFailed { url: String, message: String },
    /// 等待超时
    #[error("等待 {what} 超时 ({timeout_ms}ms)")]
    Timeout { what: String, timeout_ms: u64 },
    /// 元素不存在
    #[error("元素不存在: {selector}")]
    ElementNotFound { selector: String },
    /// 执行脚本失败
    #[error("执行脚本失败: {message}")]
    ScriptExecutionFailed { message: String },
    /// 视图不存在或已关闭
    #[error("视图不存在或已关闭: {view}")]
    ViewClosed { view: String },
    /// 底层 CDP 错误
    #[error("CDP错误: {0}")]
    Cdp(String),
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// CSV 解析失败
    #[error("CSV解析失败 ({path}): {message}")]
    CsvParseFailed { path: String, message: String },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {message}")]
    TomlParseFailed { path: String, message: String },
    /// 缺少必需的列
    #[error("文件 {path} 缺少列: {column}")]
    MissingColumn { path: String, column: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置项取值无效
    #[error("配置项 {field} 无效: {reason}")]
    Invalid { field: String, reason: String },
}

/// 业务逻辑错误
#[derive(Debug, Error)]
pub enum BusinessError {
    /// 搜索关键字为空
    #[error("字段 {field} 的搜索关键字为空")]
    EmptySearchKey { field: String },
    /// 搜索关键字包含控制字符
    #[error("字段 {field} 的搜索关键字包含非法字符: {value:?}")]
    UnsafeSearchKey { field: String, value: String },
    /// 匹配策略需要次要关键字，但记录中没有
    #[error("记录 {identifier} 缺少次要匹配关键字")]
    MissingSecondaryKey { identifier: String },
    /// 多行同时匹配
    #[error("匹配到 {count} 行，无法确定目标记录")]
    AmbiguousMatch { count: usize },
    /// 既没有匹配行，也没有"无匹配"提示
    #[error("意外状态: 既未找到匹配行，也未出现无匹配提示 ({cause})")]
    NeitherMatchNorEmpty { cause: String },
}

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::Cdp(err.to_string()))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed {
            message: err.to_string(),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建超时错误
    pub fn timeout(what: impl Into<String>, timeout: std::time::Duration) -> Self {
        AppError::Browser(BrowserError::Timeout {
            what: what.into(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    /// 创建配置项无效错误
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Config(ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        })
    }

    /// 是否为等待超时
    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::Browser(BrowserError::Timeout { .. }))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
