use std::path::Path;

use tokio::fs;

use crate::config::ColumnConfig;
use crate::error::{AppError, AppResult, FileError};
use crate::models::record::InputRecord;

/// 从 CSV 文件加载全部记录（保持文件中的顺序）
pub async fn load_records(path: &Path, columns: &ColumnConfig) -> AppResult<Vec<InputRecord>> {
    let label = path.display().to_string();
    if !fs::try_exists(path).await.unwrap_or(false) {
        return Err(FileError::NotFound { path: label }.into());
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|source| FileError::ReadFailed {
            path: label.clone(),
            source,
        })?;

    let records = parse_records(&content, columns, &label)?;
    tracing::info!("📄 从 {} 读取到 {} 条记录", label, records.len());
    Ok(records)
}

/// 解析带表头的分隔文本
///
/// 主名称列之外的每一列都作为辅助字段保留
pub fn parse_records(
    content: &str,
    columns: &ColumnConfig,
    label: &str,
) -> AppResult<Vec<InputRecord>> {
    if !columns.delimiter.is_ascii() {
        return Err(AppError::invalid_config(
            "columns.delimiter",
            format!("分隔符必须是 ASCII 字符: {:?}", columns.delimiter),
        ));
    }

    let content = content.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(columns.delimiter as u8)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let parse_error = |e: csv::Error| FileError::CsvParseFailed {
        path: label.to_string(),
        message: e.to_string(),
    };

    let headers = reader.headers().map_err(parse_error)?.clone();
    let column_index = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| FileError::MissingColumn {
                path: label.to_string(),
                column: name.to_string(),
            })
    };

    let primary_idx = column_index(&columns.primary)?;
    let secondary_idx = match &columns.secondary {
        Some(name) => Some(column_index(name)?),
        None => None,
    };

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(parse_error)?;

        let mut record = InputRecord::new(row.get(primary_idx).unwrap_or_default());
        if let Some(idx) = secondary_idx {
            if let Some(value) = row.get(idx).filter(|v| !v.is_empty()) {
                record = record.with_secondary(value);
            }
        }
        for (idx, (name, value)) in headers.iter().zip(row.iter()).enumerate() {
            if idx != primary_idx && Some(idx) != secondary_idx {
                record = record.with_field(name, value);
            }
        }
        records.push(record);
    }

    Ok(records)
}
