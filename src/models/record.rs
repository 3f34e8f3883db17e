use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{AppResult, BusinessError};

/// 一条待处理记录（例如一名学生）
///
/// 读取后不再修改，批处理过程中只借用
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputRecord {
    /// 主名称，同时用作日志与结果文件中的标识
    pub primary_name: String,
    /// 次要匹配关键字（例如母亲姓名）
    pub secondary_match_key: Option<String>,
    /// 其余列（出生日期、证件号等）
    pub auxiliary_fields: BTreeMap<String, String>,
}

impl InputRecord {
    pub fn new(primary_name: impl Into<String>) -> Self {
        Self {
            primary_name: primary_name.into(),
            secondary_match_key: None,
            auxiliary_fields: BTreeMap::new(),
        }
    }

    pub fn with_secondary(mut self, key: impl Into<String>) -> Self {
        self.secondary_match_key = Some(key.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.auxiliary_fields.insert(name.into(), value.into());
        self
    }

    /// 记录标识
    pub fn identifier(&self) -> &str {
        &self.primary_name
    }

    /// 按列名取值，忽略空白值
    pub fn field(&self, name: &str) -> Option<&str> {
        self.auxiliary_fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// 经过校验的搜索关键字
///
/// 关键字只作为"包含"匹配的数据使用，不会拼接进选择器表达式
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SearchKey(String);

impl SearchKey {
    /// 校验并构造搜索关键字
    ///
    /// 空关键字会匹配所有行，控制字符不可能出现在单元格文本中，二者都拒绝
    pub fn parse(field: &str, raw: &str) -> AppResult<Self> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(BusinessError::EmptySearchKey {
                field: field.to_string(),
            }
            .into());
        }
        if value.chars().any(char::is_control) {
            return Err(BusinessError::UnsafeSearchKey {
                field: field.to_string(),
                value: value.to_string(),
            }
            .into());
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_search_key_trims_value() {
        let key = SearchKey::parse("primary", "  MARIA LORENA  ").unwrap();
        assert_eq!(key.as_str(), "MARIA LORENA");
    }

    #[test]
    fn test_search_key_rejects_blank() {
        let err = SearchKey::parse("primary", "   ").unwrap_err();
        assert!(matches!(
            err,
            AppError::Business(BusinessError::EmptySearchKey { .. })
        ));
    }

    #[test]
    fn test_search_key_rejects_control_characters() {
        let err = SearchKey::parse("secondary", "ANA\nMARIA").unwrap_err();
        assert!(matches!(
            err,
            AppError::Business(BusinessError::UnsafeSearchKey { .. })
        ));
    }

    #[test]
    fn test_search_key_keeps_quotes_as_data() {
        // 引号、括号之类的字符只是普通文本
        let key = SearchKey::parse("primary", r#"JOÃO "JUNIOR") or (1=1"#).unwrap();
        assert_eq!(key.as_str(), r#"JOÃO "JUNIOR") or (1=1"#);
    }

    #[test]
    fn test_field_ignores_blank_values() {
        let record = InputRecord::new("ANA")
            .with_field("CPF", "  ")
            .with_field("NASC", "2010-01-01");
        assert_eq!(record.field("CPF"), None);
        assert_eq!(record.field("NASC"), Some("2010-01-01"));
        assert_eq!(record.field("INEP"), None);
    }
}
