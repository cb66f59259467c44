//! 翻译索引
//!
//! 把规则条目编译为按上下文分组的精确匹配表、全局精确匹配表和有序的正则规则列表。
//! 构建永远不会失败：无法编译的正则只会被记录并跳过。

use std::collections::HashMap;

use regex::Regex;

use super::error::{helpers, TranslationError};
use super::rules::TranslationEntry;
use crate::dom::collapse_whitespace;

/// 编译后的正则规则
#[derive(Debug, Clone)]
pub struct RegexRule {
    pattern: Regex,
    replacement: String,
    context: Option<String>,
}

impl RegexRule {
    /// 编译规则；`template` 使用 `$1`、`$&`、`$$` 形式的捕获组引用
    pub fn compile(source: &str, template: &str, context: Option<&str>) -> Result<Self, TranslationError> {
        let pattern = Regex::new(source).map_err(|e| TranslationError::RuleCompile {
            pattern: source.to_string(),
            reason: e.to_string(),
        })?;
        let replacement = convert_template(template, pattern.captures_len() - 1);

        Ok(Self {
            pattern,
            replacement,
            context: context.map(str::to_string),
        })
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// 规则上下文，`None` 表示全局
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// 替换所有匹配；不匹配时返回 `None`
    pub fn apply(&self, text: &str) -> Option<String> {
        if !self.pattern.is_match(text) {
            return None;
        }
        Some(
            self.pattern
                .replace_all(text, self.replacement.as_str())
                .into_owned(),
        )
    }
}

/// 将 `$1` / `$&` / `$$` 形式的替换模板转换为 regex 的 `${1}` 形式
///
/// 超出捕获组数量的 `$n` 以及其它 `$` 序列按字面量保留。
fn convert_template(template: &str, group_count: usize) -> String {
    let mut out = String::with_capacity(template.len() + 8);
    let chars: Vec<char> = template.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '$' {
            out.push(c);
            i += 1;
            continue;
        }

        match chars.get(i + 1) {
            Some('$') => {
                out.push_str("$$");
                i += 2;
            }
            Some('&') => {
                out.push_str("${0}");
                i += 2;
            }
            Some(d) if d.is_ascii_digit() => {
                let first = d.to_digit(10).unwrap_or(0) as usize;
                let two_digit = chars
                    .get(i + 2)
                    .and_then(|next| next.to_digit(10))
                    .map(|second| first * 10 + second as usize)
                    .filter(|n| *n >= 1 && *n <= group_count);

                if let Some(n) = two_digit {
                    out.push_str(&format!("${{{}}}", n));
                    i += 3;
                } else if first >= 1 && first <= group_count {
                    out.push_str(&format!("${{{}}}", first));
                    i += 2;
                } else {
                    out.push_str("$$");
                    i += 1;
                }
            }
            _ => {
                out.push_str("$$");
                i += 1;
            }
        }
    }

    out
}

/// 索引构建统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub context_entries: usize,
    pub global_entries: usize,
    pub contexts: usize,
    pub regex_rules: usize,
    pub dropped: usize,
}

/// 翻译索引
#[derive(Debug, Clone, Default)]
pub struct TranslationIndex {
    by_context: HashMap<String, HashMap<String, String>>,
    global: HashMap<String, String>,
    regex_patterns: Vec<RegexRule>,
    stats: IndexStats,
}

impl TranslationIndex {
    /// 由规则条目构建索引
    pub fn build(entries: &[TranslationEntry]) -> Self {
        let mut index = Self::default();

        for entry in entries {
            if entry.is_regex() {
                match RegexRule::compile(&entry.original, &entry.translated, entry.context_name()) {
                    Ok(rule) => index.regex_patterns.push(rule),
                    Err(err) => {
                        helpers::log_error(&err);
                        index.stats.dropped += 1;
                    }
                }
                continue;
            }

            let key = entry.original.trim();
            if key.is_empty() {
                index.stats.dropped += 1;
                continue;
            }

            let table = match entry.context_name() {
                Some(context) => {
                    index.stats.context_entries += 1;
                    index.by_context.entry(context.to_string()).or_default()
                }
                None => {
                    index.stats.global_entries += 1;
                    &mut index.global
                }
            };
            insert_key(table, key, &entry.translated);
        }

        index.stats.contexts = index.by_context.len();
        index.stats.regex_rules = index.regex_patterns.len();
        tracing::debug!("翻译索引构建完成: {:?}", index.stats);

        index
    }

    /// 上下文内精确匹配
    pub fn lookup_context(&self, context: &str, text: &str) -> Option<&str> {
        self.by_context
            .get(context)
            .and_then(|table| lookup_key(table, text))
    }

    /// 全局精确匹配
    pub fn lookup_global(&self, text: &str) -> Option<&str> {
        lookup_key(&self.global, text)
    }

    /// 有序正则规则
    pub fn regex_patterns(&self) -> &[RegexRule] {
        &self.regex_patterns
    }

    pub fn has_context(&self, context: &str) -> bool {
        self.by_context.contains_key(context)
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    pub fn is_empty(&self) -> bool {
        self.by_context.is_empty() && self.global.is_empty() && self.regex_patterns.is_empty()
    }
}

fn insert_key(table: &mut HashMap<String, String>, key: &str, translated: &str) {
    table.insert(key.to_string(), translated.to_string());

    let collapsed = collapse_whitespace(key);
    if collapsed != key {
        table.entry(collapsed).or_insert_with(|| translated.to_string());
    }
}

fn lookup_key<'a>(table: &'a HashMap<String, String>, text: &str) -> Option<&'a str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    table
        .get(trimmed)
        .or_else(|| table.get(&collapse_whitespace(trimmed)))
        .map(String::as_str)
}
