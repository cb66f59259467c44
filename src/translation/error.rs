//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::dom::SelectorError;

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 规则正则编译失败
    #[error("规则编译失败 `{pattern}`: {reason}")]
    RuleCompile { pattern: String, reason: String },

    /// 选择器语法错误
    #[error("无效选择器: {0}")]
    InvalidSelector(String),

    /// 选择器语法合法但不受支持
    #[error("不支持的选择器: {0}")]
    UnsupportedSelector(String),

    /// 规则获取失败
    #[error("规则获取失败: {0}")]
    Fetch(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    Timeout(String),

    /// 规则文档解码失败
    #[error("规则文档解码失败: {0}")]
    Decode(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 域名没有对应配置
    #[error("域名未配置: {0}")]
    DomainNotConfigured(String),

    /// 域名已被禁用
    #[error("域名已禁用: {0}")]
    DomainDisabled(String),

    /// 变更刷新次数超过上限
    #[error("变更观察器刷新次数超过上限 ({flushes})，已停止观察")]
    ObserverOverflow { flushes: u64 },

    /// IO 错误
    #[error("IO错误: {0}")]
    Io(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::Fetch(_) => true,
            TranslationError::Timeout(_) => true,
            TranslationError::Decode(_) => true,
            TranslationError::Io(_) => true,
            TranslationError::RuleCompile { .. } => false,
            TranslationError::InvalidSelector(_) => false,
            TranslationError::UnsupportedSelector(_) => false,
            TranslationError::Config(_) => false,
            TranslationError::DomainNotConfigured(_) => false,
            TranslationError::DomainDisabled(_) => false,
            TranslationError::ObserverOverflow { .. } => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::RuleCompile { .. } => ErrorSeverity::Warning,
            TranslationError::InvalidSelector(_) => ErrorSeverity::Warning,
            TranslationError::UnsupportedSelector(_) => ErrorSeverity::Info,
            TranslationError::Fetch(_) => ErrorSeverity::Warning,
            TranslationError::Timeout(_) => ErrorSeverity::Warning,
            TranslationError::Decode(_) => ErrorSeverity::Error,
            TranslationError::Config(_) => ErrorSeverity::Critical,
            TranslationError::DomainNotConfigured(_) => ErrorSeverity::Info,
            TranslationError::DomainDisabled(_) => ErrorSeverity::Info,
            TranslationError::ObserverOverflow { .. } => ErrorSeverity::Error,
            TranslationError::Io(_) => ErrorSeverity::Error,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::RuleCompile { .. } => ErrorCategory::Rules,
            TranslationError::InvalidSelector(_) => ErrorCategory::Selector,
            TranslationError::UnsupportedSelector(_) => ErrorCategory::Selector,
            TranslationError::Fetch(_) => ErrorCategory::Network,
            TranslationError::Timeout(_) => ErrorCategory::Timeout,
            TranslationError::Decode(_) => ErrorCategory::Parsing,
            TranslationError::Config(_) => ErrorCategory::Configuration,
            TranslationError::DomainNotConfigured(_) => ErrorCategory::Configuration,
            TranslationError::DomainDisabled(_) => ErrorCategory::Configuration,
            TranslationError::ObserverOverflow { .. } => ErrorCategory::Resource,
            TranslationError::Io(_) => ErrorCategory::Io,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        let suffix = format!(" (上下文: {})", context);

        match &mut self {
            TranslationError::RuleCompile { reason: msg, .. }
            | TranslationError::InvalidSelector(msg)
            | TranslationError::UnsupportedSelector(msg)
            | TranslationError::Fetch(msg)
            | TranslationError::Timeout(msg)
            | TranslationError::Decode(msg)
            | TranslationError::Config(msg)
            | TranslationError::DomainNotConfigured(msg)
            | TranslationError::DomainDisabled(msg)
            | TranslationError::Io(msg) => msg.push_str(&suffix),
            TranslationError::ObserverOverflow { .. } => {}
        }

        self
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Rules,
    Selector,
    Network,
    Timeout,
    Parsing,
    Configuration,
    Resource,
    Io,
}

impl From<SelectorError> for TranslationError {
    fn from(error: SelectorError) -> Self {
        match error {
            SelectorError::Syntax { .. } => TranslationError::InvalidSelector(error.to_string()),
            SelectorError::Unsupported { .. } => {
                TranslationError::UnsupportedSelector(error.to_string())
            }
        }
    }
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::Decode(format!("JSON解析错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::Decode(format!("TOML解析错误: {}", error))
    }
}

impl From<config::ConfigError> for TranslationError {
    fn from(error: config::ConfigError) -> Self {
        TranslationError::Config(error.to_string())
    }
}

impl From<crate::env::EnvError> for TranslationError {
    fn from(error: crate::env::EnvError) -> Self {
        TranslationError::Config(error.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::Timeout(format!("异步操作超时: {}", error))
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::Timeout(error.to_string())
        } else {
            TranslationError::Fetch(error.to_string())
        }
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorStats {
    pub total_errors: usize,
    pub by_category: HashMap<ErrorCategory, usize>,
    pub by_severity: HashMap<ErrorSeverity, usize>,
    pub retryable_errors: usize,
    pub critical_errors: usize,
}

impl ErrorStats {
    /// 记录错误
    pub fn record_error(&mut self, error: &TranslationError) {
        self.total_errors += 1;

        let category = error.category();
        *self.by_category.entry(category).or_insert(0) += 1;

        let severity = error.severity();
        *self.by_severity.entry(severity).or_insert(0) += 1;

        if error.is_retryable() {
            self.retryable_errors += 1;
        }

        if severity == ErrorSeverity::Critical {
            self.critical_errors += 1;
        }
    }

    /// 某一类别的错误数
    pub fn count(&self, category: ErrorCategory) -> usize {
        self.by_category.get(&category).copied().unwrap_or(0)
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Default::default();
    }
}

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误（不返回）
    pub fn log_error(error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }
    }

    /// 创建超时错误
    pub fn timeout_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::Timeout(msg.to_string())
    }
}
