//! 上下文分类器
//!
//! 根据上下文映射文档把元素归入某个命名上下文（页面区域）。选择器在构建时一次性编译，
//! 无效或不支持的选择器记录日志后跳过，不会影响分类。
//!
//! 分类顺序：
//! 1. 带页脚标记属性的元素直接归入页脚上下文
//! 2. 按文档顺序逐个上下文匹配选择器；命中后若同时命中该上下文的排除选择器，
//!    则整个上下文作废，直接尝试下一个上下文
//! 3. 仍未命中时，声明了 `parent_context` 的上下文通过祖先继承：
//!    最近的 `max_ancestor_depth` 层祖先中存在归入父上下文的元素即可
//! 4. 仍未命中时取同一窗口内最近的、自身直接命中某上下文的祖先（类似 `closest()`），
//!    元素命中该上下文的排除选择器时跳过这个祖先继续向上
//! 5. 否则无上下文
//!
//! 容器选择器（如 `nav[aria-label='Repository']`、`footer`）因此覆盖其中的链接和文本。

use std::collections::HashMap;

use markup5ever_rcdom::Handle;

use super::config::constants;
use super::rules::{ContextMappingDocument, MappingSettings, UnknownContextPolicy};
use crate::dom::{
    ancestors, compile_selectors, get_node_attr, get_parent_element, has_node_attr, is_element,
    node_key, NodeKey, Selector,
};

struct CompiledContext {
    name: String,
    selectors: Vec<Selector>,
    exclude: Vec<Selector>,
    parent: Option<String>,
}

struct CompiledRegexContext {
    apply_to: Vec<Selector>,
    exclude: Vec<Selector>,
}

/// 单次遍历内的分类缓存
///
/// 分类结果只取决于元素自身及其祖先，缓存应当只在一次遍历内复用。
#[derive(Default)]
pub struct ClassifyCache<'a> {
    entries: HashMap<NodeKey, (Handle, Classified<'a>)>,
}

/// 节点自身的直接命中结果与最终分类
#[derive(Debug, Clone, Copy)]
struct Classified<'a> {
    direct: Option<&'a str>,
    class: Option<&'a str>,
}

impl<'a> ClassifyCache<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, node: &Handle) -> Option<Classified<'a>> {
        self.entries.get(&node_key(node)).map(|(_, classified)| *classified)
    }

    fn insert(&mut self, node: &Handle, classified: Classified<'a>) {
        self.entries.insert(node_key(node), (node.clone(), classified));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 上下文分类器
pub struct ContextClassifier {
    contexts: Vec<CompiledContext>,
    regex_contexts: HashMap<String, CompiledRegexContext>,
    settings: MappingSettings,
    max_ancestor_depth: usize,
    has_parent_rules: bool,
}

impl ContextClassifier {
    pub fn new(mapping: &ContextMappingDocument) -> Self {
        let contexts: Vec<CompiledContext> = mapping
            .contexts
            .iter()
            .map(|(name, config)| CompiledContext {
                name: name.to_string(),
                selectors: compile_selectors(&config.selectors, name),
                exclude: compile_selectors(&config.exclude_selectors, name),
                parent: config
                    .parent_context
                    .as_deref()
                    .map(str::trim)
                    .filter(|parent| !parent.is_empty())
                    .map(str::to_string),
            })
            .collect();

        let regex_contexts = mapping
            .regex_contexts
            .iter()
            .map(|(name, regex_context)| {
                (
                    name.clone(),
                    CompiledRegexContext {
                        apply_to: compile_selectors(&regex_context.apply_to, name),
                        exclude: compile_selectors(&regex_context.exclude, name),
                    },
                )
            })
            .collect();

        let has_parent_rules = contexts.iter().any(|context| context.parent.is_some());

        tracing::debug!(
            "上下文分类器就绪: {} 个上下文, {} 个正则范围",
            contexts.len(),
            mapping.regex_contexts.len()
        );

        Self {
            contexts,
            regex_contexts,
            settings: mapping.settings,
            max_ancestor_depth: constants::MAX_ANCESTOR_DEPTH,
            has_parent_rules,
        }
    }

    /// 设置祖先继承的最大遍历深度（至少为 1）
    pub fn with_max_ancestor_depth(mut self, depth: usize) -> Self {
        self.max_ancestor_depth = depth.max(1);
        self
    }

    pub fn settings(&self) -> MappingSettings {
        self.settings
    }

    pub fn is_defined(&self, context: &str) -> bool {
        self.contexts.iter().any(|compiled| compiled.name == context)
    }

    /// 正则规则上下文既未定义也没有适用范围时，按策略决定是否视为全局
    pub fn treats_unknown_as_global(&self, context: &str) -> bool {
        self.settings.unknown_context == UnknownContextPolicy::Apply
            && !self.is_defined(context)
            && !self.regex_contexts.contains_key(context)
    }

    /// 对元素分类
    pub fn classify(&self, element: &Handle) -> Option<&str> {
        let mut cache = ClassifyCache::new();
        self.classify_cached(element, &mut cache)
    }

    /// 使用遍历级缓存对元素分类
    pub fn classify_cached<'a>(
        &'a self,
        element: &Handle,
        cache: &mut ClassifyCache<'a>,
    ) -> Option<&'a str> {
        if !is_element(element) {
            return None;
        }
        if let Some(hit) = cache.get(element) {
            return hit.class;
        }

        // 祖先链：元素自身在前，根在后；自顶向下计算，每个节点只看自己的窗口
        let mut chain = vec![element.clone()];
        let mut current = get_parent_element(element);
        while let Some(node) = current {
            current = get_parent_element(&node);
            chain.push(node);
        }

        let mut results: Vec<Classified<'a>> = vec![Classified { direct: None, class: None }; chain.len()];
        for i in (0..chain.len()).rev() {
            let node = &chain[i];
            let classified = match cache.get(node) {
                Some(hit) => hit,
                None => {
                    let window = &results[i + 1..(i + 1 + self.max_ancestor_depth).min(chain.len())];
                    let direct = self.direct_match(node);
                    let class = direct
                        .or_else(|| self.inherited(window))
                        .or_else(|| self.contained(node, window));
                    let computed = Classified { direct, class };
                    cache.insert(node, computed);
                    computed
                }
            };
            results[i] = classified;
        }

        results[0].class
    }

    fn direct_match(&self, element: &Handle) -> Option<&str> {
        if is_footer_marked(element) {
            return Some(constants::FOOTER_CONTEXT);
        }

        for context in &self.contexts {
            if !context.selectors.iter().any(|selector| selector.matches(element)) {
                continue;
            }
            if context.exclude.iter().any(|selector| selector.matches(element)) {
                tracing::trace!("元素被上下文 {} 排除", context.name);
                continue;
            }
            return Some(&context.name);
        }

        None
    }

    /// `window` 为最近的若干层祖先的分类结果，由近及远
    fn inherited(&self, window: &[Classified<'_>]) -> Option<&str> {
        if !self.has_parent_rules {
            return None;
        }
        self.contexts
            .iter()
            .filter_map(|context| context.parent.as_deref().map(|parent| (context, parent)))
            .find(|(_, parent)| window.iter().any(|ancestor| ancestor.class == Some(*parent)))
            .map(|(context, _)| context.name.as_str())
    }

    /// 最近的直接命中某上下文、且该上下文不排除 `element` 的祖先
    fn contained<'a>(&'a self, element: &Handle, window: &[Classified<'a>]) -> Option<&'a str> {
        window
            .iter()
            .filter_map(|ancestor| ancestor.direct)
            .find(|name| !self.excludes(name, element))
    }

    fn excludes(&self, context: &str, element: &Handle) -> bool {
        self.contexts
            .iter()
            .filter(|compiled| compiled.name == context)
            .any(|compiled| compiled.exclude.iter().any(|selector| selector.matches(element)))
    }

    /// 元素或其任一祖先命中 `regex_contexts[context].apply_to` 且该节点不命中 `exclude`
    pub fn is_regex_applicable(&self, element: &Handle, context: &str) -> bool {
        let Some(regex_context) = self.regex_contexts.get(context) else {
            return false;
        };
        if regex_context.apply_to.is_empty() {
            return false;
        }

        std::iter::once(element.clone())
            .chain(ancestors(element))
            .any(|node| {
                regex_context.apply_to.iter().any(|s| s.matches(&node))
                    && !regex_context.exclude.iter().any(|s| s.matches(&node))
            })
    }
}

/// 页脚标记：`data-analytics-event` 提到 Footer，或带 `data-footer` 属性
fn is_footer_marked(element: &Handle) -> bool {
    has_node_attr(element, "data-footer")
        || get_node_attr(element, "data-analytics-event")
            .is_some_and(|value| value.contains("Footer"))
}
