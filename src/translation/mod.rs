//! 翻译模块
//!
//! 基于规则文档的页面原地翻译，采用清晰的模块化架构：
//! - **rules / index**: 规则与上下文映射文档的解码、翻译索引构建
//! - **context**: 把元素归入命名上下文
//! - **engine / augment**: 子树遍历与替换，以及站点专用的补充遍历
//! - **observer / session**: 变更协调与会话生命周期
//! - **config / error**: 配置管理与错误处理
//!
//! # 基本用法
//!
//! ```rust
//! use page_translator::dom::{html_to_dom, text_content};
//! use page_translator::translation::{
//!     ContextMappingDocument, RuleDocument, TranslationEngine, TranslationEntry,
//! };
//!
//! let rules = RuleDocument::new(vec![TranslationEntry::new("Issues", "課題")]);
//! let mut engine = TranslationEngine::from_documents(&rules, &ContextMappingDocument::default());
//!
//! let dom = html_to_dom(b"<p> Issues </p>", "utf-8");
//! assert_eq!(engine.apply_translations(&dom.document), 1);
//! assert!(text_content(&dom.document).contains(" 課題 "));
//! ```

/// 站点专用增强
pub mod augment;

/// 配置管理模块
pub mod config;

/// 上下文分类
pub mod context;

/// 翻译引擎
pub mod engine;

/// 错误处理模块 - 统一的错误类型和处理机制
pub mod error;

/// 翻译索引
pub mod index;

/// 替换日志
pub mod journal;

/// DOM 变更协调
pub mod observer;

/// 规则文档
pub mod rules;

/// 翻译会话
pub mod session;

/// 规则来源与域名配置
pub mod source;

// ============================================================================
// 重新导出主要类型
// ============================================================================

pub use augment::{AugmentorRegistry, GithubAugmentor, SiteAugmentor};
pub use config::{ConfigManager, TranslatorConfig};
pub use context::{ClassifyCache, ContextClassifier};
pub use engine::{EngineStats, KeywordTable, PassReport, TranslationEngine, TranslationPass};
pub use error::{ErrorCategory, ErrorSeverity, ErrorStats, TranslationError, TranslationResult};
pub use index::{IndexStats, RegexRule, TranslationIndex};
pub use journal::TranslationJournal;
pub use observer::{
    CoordinatorSettings, CoordinatorState, CoordinatorStats, FlushReport, MutationCoordinator,
    MutationRecord, NavigationEvent,
};
pub use rules::{
    ContextConfig, ContextMappingDocument, DocumentFormat, EmptyContextPolicy, MappingSettings,
    RegexContext, RuleDocument, TranslationEntry, UnknownContextPolicy,
};
pub use session::{
    CommandAck, PageHost, SessionCommand, SessionController, SessionStats, SessionStatus,
};
#[cfg(feature = "http")]
pub use source::HttpRuleSource;
pub use source::{
    domain_from_url, DomainAlias, DomainConfig, DomainRegistry, FileRuleSource, RuleSource,
    StaticRuleSource,
};
