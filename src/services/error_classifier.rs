//! 错误分类 - 业务能力层
//!
//! 判断一次失败是"无匹配记录"这一预期结果，还是需要上报的处理异常

use crate::error::{AppError, BusinessError};

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    NotFound,
    /// 携带原始错误消息
    Error(String),
}

/// 错误分类器
///
/// 规则：
/// - "无匹配"提示是唯一依据，仅凭超时不能判定为未找到
/// - 其余失败一律为 Error，消息原样保留
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, raw: &AppError, not_found_indicator_present: bool) -> Classification {
        if not_found_indicator_present {
            return Classification::NotFound;
        }
        if raw.is_timeout() {
            return Classification::Error(
                AppError::from(BusinessError::NeitherMatchNorEmpty {
                    cause: raw.to_string(),
                })
                .to_string(),
            );
        }
        Classification::Error(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_indicator_is_authoritative() {
        let classifier = ErrorClassifier::new();
        let raw = AppError::timeout("匹配行", Duration::from_millis(5000));
        assert_eq!(classifier.classify(&raw, true), Classification::NotFound);
    }

    #[test]
    fn test_timeout_without_indicator_is_error() {
        let classifier = ErrorClassifier::new();
        let raw = AppError::timeout("匹配行", Duration::from_millis(5000));
        let Classification::Error(message) = classifier.classify(&raw, false) else {
            panic!("超时且无提示时应判定为错误");
        };
        assert!(message.contains("既未找到匹配行"));
        // 原始超时消息完整保留
        assert!(message.contains(&raw.to_string()));
    }

    #[test]
    fn test_other_failures_keep_message_verbatim() {
        let classifier = ErrorClassifier::new();
        let raw = AppError::Other("Execution context was destroyed".to_string());
        assert_eq!(
            classifier.classify(&raw, false),
            Classification::Error("Execution context was destroyed".to_string())
        );
    }
}
