//! 结果文件写入 - 边界层
//!
//! 只负责把 `BatchRun` 落盘，不参与批处理本身

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{AppResult, FileError};
use crate::models::{BatchRun, ProcessingOutcome, RunSummary};

pub const NOT_FOUND_FILE: &str = "not_found.log";
pub const ERRORS_FILE: &str = "processing_errors.log";
pub const FATAL_FILE: &str = "fatal_error.log";
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Serialize)]
struct SummaryDocument<'a> {
    finished_at: String,
    #[serde(flatten)]
    summary: RunSummary,
    outcomes: &'a [ProcessingOutcome],
}

/// 结果文件写入器
///
/// 职责：
/// - 未找到列表：每行一个标识，列表为空时不写
/// - 错误列表：`[标识] - 消息`，列表为空时不写
/// - 汇总 JSON：每次运行结束都写
/// - 致命错误：仅在运行中止时写
pub struct ResultLog {
    dir: PathBuf,
}

impl ResultLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn not_found_path(&self) -> PathBuf {
        self.dir.join(NOT_FOUND_FILE)
    }

    pub fn errors_path(&self) -> PathBuf {
        self.dir.join(ERRORS_FILE)
    }

    pub fn fatal_path(&self) -> PathBuf {
        self.dir.join(FATAL_FILE)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(SUMMARY_FILE)
    }

    /// 删除上一次运行留下的结果文件
    pub async fn clear(&self) -> AppResult<()> {
        for path in [
            self.not_found_path(),
            self.errors_path(),
            self.fatal_path(),
            self.summary_path(),
        ] {
            remove_file(&path).await?;
        }
        Ok(())
    }

    /// 写入一次完整运行的结果
    ///
    /// 先清除旧文件，目录中只留下本次运行的结果
    pub async fn write_run(&self, run: &BatchRun) -> AppResult<()> {
        self.clear().await?;

        let not_found = run.not_found();
        if !not_found.is_empty() {
            write_file(&self.not_found_path(), &not_found.join("\n")).await?;
            info!("📝 未找到记录已写入: {}", self.not_found_path().display());
        }

        let errors = run.errors();
        if !errors.is_empty() {
            let content = errors
                .iter()
                .map(|(identifier, message)| format!("[{}] - {}", identifier, message))
                .collect::<Vec<_>>()
                .join("\n");
            write_file(&self.errors_path(), &content).await?;
            info!("📝 错误记录已写入: {}", self.errors_path().display());
        }

        let document = SummaryDocument {
            finished_at: chrono::Local::now().to_rfc3339(),
            summary: run.summary(),
            outcomes: run.outcomes(),
        };
        let json = serde_json::to_string_pretty(&document)?;
        write_file(&self.summary_path(), &json).await?;
        debug!("汇总已写入: {}", self.summary_path().display());

        Ok(())
    }

    /// 写入致命错误
    pub async fn write_fatal(&self, message: &str, context: &str) -> AppResult<()> {
        let content = format!(
            "{}\n致命错误 - {}\n{}\n\nErro fatal: {}\n{}\n",
            "=".repeat(60),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            "=".repeat(60),
            message,
            context
        );
        write_file(&self.fatal_path(), &content).await
    }
}

async fn remove_file(path: &Path) -> AppResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!("已删除旧的结果文件: {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(FileError::WriteFailed {
            path: path.display().to_string(),
            source,
        }
        .into()),
    }
}

async fn write_file(path: &Path, content: &str) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| FileError::WriteFailed {
                path: parent.display().to_string(),
                source,
            })?;
    }
    fs::write(path, content)
        .await
        .map_err(|source| FileError::WriteFailed {
            path: path.display().to_string(),
            source,
        })?;
    Ok(())
}
