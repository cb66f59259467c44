//! 规则文档模型
//!
//! 规则文档（翻译条目）与上下文映射文档（上下文定义）的类型化结构。
//! 外部文档在边界处解码：结构错误直接报错，单个条目的缺陷只会让该条目被丢弃并记录到
//! [`ValidationReport`]。

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};

use super::config::constants;
use super::error::{TranslationError, TranslationResult};

/// 文档编码格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    #[default]
    Json,
    Toml,
}

impl DocumentFormat {
    /// 根据地址或路径的扩展名推断格式，默认 JSON
    pub fn from_location(location: &str) -> Self {
        let path = location
            .split(['?', '#'])
            .next()
            .unwrap_or(location)
            .to_ascii_lowercase();
        if path.ends_with(".toml") {
            DocumentFormat::Toml
        } else {
            DocumentFormat::Json
        }
    }
}

fn decode_text(bytes: &[u8]) -> TranslationResult<&str> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| TranslationError::Decode(format!("文档不是有效的 UTF-8: {}", e)))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

fn decode_as<T: for<'de> Deserialize<'de>>(bytes: &[u8], format: DocumentFormat) -> TranslationResult<T> {
    let text = decode_text(bytes)?;
    match format {
        DocumentFormat::Json => Ok(serde_json::from_str(text)?),
        DocumentFormat::Toml => Ok(toml::from_str(text)?),
    }
}

// ============================================================================
// 翻译条目
// ============================================================================

/// 单条替换规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationEntry {
    pub original: String,
    pub translated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<bool>,
}

impl TranslationEntry {
    pub fn new(original: impl Into<String>, translated: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            translated: translated.into(),
            context: None,
            regex: None,
        }
    }

    pub fn in_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn as_regex(mut self) -> Self {
        self.regex = Some(true);
        self
    }

    pub fn is_regex(&self) -> bool {
        self.regex.unwrap_or(false)
    }

    /// 规则所属上下文；缺失或空白表示全局
    pub fn context_name(&self) -> Option<&str> {
        self.context
            .as_deref()
            .map(str::trim)
            .filter(|context| !context.is_empty())
    }
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(default)]
    original: Option<String>,
    #[serde(default)]
    translated: Option<String>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    regex: Option<bool>,
}

/// 条目逐个转换，单条类型错误只丢弃该条
#[derive(Deserialize)]
struct RawRuleDocument {
    translations: Vec<serde_json::Value>,
    #[serde(flatten)]
    metadata: BTreeMap<String, serde_json::Value>,
}

/// 被丢弃的条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedEntry {
    pub index: usize,
    pub reason: String,
}

/// 解码校验报告
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub total: usize,
    pub accepted: usize,
    pub dropped: Vec<DroppedEntry>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty()
    }
}

/// 规则文档
#[derive(Debug, Clone, Default)]
pub struct RuleDocument {
    pub translations: Vec<TranslationEntry>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub report: ValidationReport,
}

impl RuleDocument {
    pub fn new(translations: Vec<TranslationEntry>) -> Self {
        let count = translations.len();
        Self {
            translations,
            metadata: BTreeMap::new(),
            report: ValidationReport {
                total: count,
                accepted: count,
                dropped: Vec::new(),
            },
        }
    }

    /// 从字节流解码规则文档
    pub fn decode(bytes: &[u8], format: DocumentFormat) -> TranslationResult<Self> {
        let raw: RawRuleDocument = decode_as(bytes, format)?;

        let mut report = ValidationReport {
            total: raw.translations.len(),
            ..Default::default()
        };
        let mut translations = Vec::with_capacity(raw.translations.len());

        for (index, value) in raw.translations.into_iter().enumerate() {
            let entry = match serde_json::from_value::<RawEntry>(value) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("丢弃第 {} 条翻译规则: {}", index, e);
                    report.dropped.push(DroppedEntry {
                        index,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            let original = entry.original.unwrap_or_default();
            let translated = entry.translated.unwrap_or_default();

            let reason = if original.trim().is_empty() {
                Some("original 为空")
            } else if translated.is_empty() {
                Some("translated 为空")
            } else {
                None
            };

            if let Some(reason) = reason {
                tracing::warn!("丢弃第 {} 条翻译规则: {}", index, reason);
                report.dropped.push(DroppedEntry {
                    index,
                    reason: reason.to_string(),
                });
                continue;
            }

            translations.push(TranslationEntry {
                original,
                translated,
                context: entry.context,
                regex: entry.regex,
            });
        }

        report.accepted = translations.len();
        tracing::debug!(
            "规则文档解码完成: {}/{} 条有效",
            report.accepted,
            report.total
        );

        Ok(Self {
            translations,
            metadata: raw.metadata,
            report,
        })
    }

    pub fn len(&self) -> usize {
        self.translations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.translations.is_empty()
    }
}

// ============================================================================
// 上下文映射
// ============================================================================

/// 未定义上下文的正则规则处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownContextPolicy {
    #[default]
    Ignore,
    Apply,
}

/// 无上下文规则是否作为全局回退
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyContextPolicy {
    #[default]
    Global,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MappingSettings {
    #[serde(default)]
    pub unknown_context: UnknownContextPolicy,
    #[serde(default)]
    pub empty_context: EmptyContextPolicy,
}

/// 上下文定义
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default, deserialize_with = "string_or_seq")]
    pub selectors: Vec<String>,
    #[serde(default, deserialize_with = "string_or_seq")]
    pub exclude_selectors: Vec<String>,
    #[serde(default)]
    pub parent_context: Option<String>,
}

impl ContextConfig {
    pub fn new<S: Into<String>>(selectors: impl IntoIterator<Item = S>) -> Self {
        Self {
            selectors: selectors.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn excluding<S: Into<String>>(mut self, selectors: impl IntoIterator<Item = S>) -> Self {
        self.exclude_selectors = selectors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_context = Some(parent.into());
        self
    }
}

/// 正则规则的适用范围
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexContext {
    #[serde(default, deserialize_with = "string_or_seq")]
    pub apply_to: Vec<String>,
    #[serde(default, deserialize_with = "string_or_seq")]
    pub exclude: Vec<String>,
}

/// 保持文档顺序的上下文表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextMap(Vec<(String, ContextConfig)>);

impl ContextMap {
    /// 插入或替换；替换时保留原位置
    pub fn insert(&mut self, name: impl Into<String>, config: ContextConfig) {
        let name = name.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = config,
            None => self.0.push((name, config)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ContextConfig> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, config)| config)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContextConfig)> {
        self.0.iter().map(|(name, config)| (name.as_str(), config))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for ContextMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ContextMapVisitor;

        impl<'de> Visitor<'de> for ContextMapVisitor {
            type Value = ContextMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of context definitions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ContextMap, A::Error> {
                let mut map = ContextMap::default();
                while let Some((name, config)) = access.next_entry::<String, ContextConfig>()? {
                    map.insert(name, config);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(ContextMapVisitor)
    }
}

impl Serialize for ContextMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, config) in &self.0 {
            map.serialize_entry(name, config)?;
        }
        map.end()
    }
}

/// 上下文映射文档
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMappingDocument {
    #[serde(default)]
    pub settings: MappingSettings,
    #[serde(default)]
    pub contexts: ContextMap,
    #[serde(default)]
    pub regex_contexts: HashMap<String, RegexContext>,
}

impl ContextMappingDocument {
    /// 从字节流解码上下文映射文档
    pub fn decode(bytes: &[u8], format: DocumentFormat) -> TranslationResult<Self> {
        let document: Self = decode_as(bytes, format)?;

        for (name, config) in document.contexts.iter() {
            if let Some(parent) = &config.parent_context {
                if !document.contexts.contains(parent) {
                    tracing::warn!("上下文 {} 的父上下文 {} 未定义", name, parent);
                }
            }
        }

        Ok(document)
    }

    pub fn with_settings(mut self, settings: MappingSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_context(mut self, name: impl Into<String>, config: ContextConfig) -> Self {
        self.contexts.insert(name, config);
        self
    }

    pub fn with_regex_context(mut self, name: impl Into<String>, regex_context: RegexContext) -> Self {
        self.regex_contexts.insert(name.into(), regex_context);
        self
    }

    /// 内置的 GitHub 上下文映射，在未配置映射地址时使用
    pub fn github_default() -> Self {
        Self::default()
            .with_context(
                constants::MAIN_NAV_CONTEXT,
                ContextConfig::new([
                    "nav[aria-label='Global']",
                    ".AppHeader-globalBar",
                    ".header-nav",
                ]),
            )
            .with_context(
                constants::REPO_TAB_CONTEXT,
                ContextConfig::new([
                    "nav[aria-label='Repository']",
                    ".UnderlineNav",
                    "[data-tab-item]",
                ])
                .excluding(["[href*='?tab=']"]),
            )
            .with_context(
                constants::FOOTER_CONTEXT,
                ContextConfig::new(["footer", ".footer", "[role='contentinfo']"]),
            )
            .with_context(
                constants::HEADER_CONTEXT,
                ContextConfig::new(["header", ".AppHeader", ".Header"]),
            )
            .with_regex_context(
                constants::REPO_TAB_CONTEXT,
                RegexContext {
                    apply_to: vec![".UnderlineNav-item".into(), "[data-tab-item]".into()],
                    exclude: vec![".Counter".into()],
                },
            )
    }
}

fn string_or_seq<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    struct StringOrSeq;

    impl<'de> Visitor<'de> for StringOrSeq {
        type Value = Vec<String>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a selector string or a list of selector strings")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Vec<String>, E> {
            Ok(vec![value.to_string()])
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<String>, A::Error> {
            let mut out = Vec::new();
            while let Some(value) = seq.next_element::<String>()? {
                out.push(value);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_any(StringOrSeq)
}
