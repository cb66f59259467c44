//! # Page Translator Library
//!
//! 基于规则文档的网页原地翻译：按页面区域（上下文）匹配译文，替换文本与无障碍属性，
//! 并持续跟踪页面的动态变化。
//!
//! ## 模块组织
//!
//! - `dom` - DOM 节点操作、选择器匹配与序列化
//! - `env` - 环境变量
//! - `translation` - 规则、分类、翻译引擎、变更协调与会话

pub mod dom;
pub mod env;
pub mod translation;

// Re-export commonly used items for convenience
pub use translation::{
    ContextMappingDocument, RuleDocument, SessionController, TranslationEngine, TranslationError,
    TranslationResult, TranslatorConfig,
};
