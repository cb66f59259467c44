//! 翻译引擎
//!
//! 自顶向下深度优先遍历子树，对文本节点和可翻译属性执行三步查找并原地替换：
//!
//! 1. 上下文精确匹配
//! 2. 全局精确匹配（仅当 `empty_context = global`）
//! 3. 正则回退：按顺序取第一个适用且匹配的规则，替换其所有匹配
//!
//! 替换只作用于去掉首尾空白后的主体，首尾空白原样保留。已处理节点集合只阻止同一节点被
//! 重复处理，不会阻止访问其后代。

use std::rc::Rc;

use markup5ever_rcdom::{Handle, NodeData};

use super::augment::AugmentorRegistry;
use super::config::constants;
use super::context::{ClassifyCache, ContextClassifier};
use super::index::TranslationIndex;
use super::journal::TranslationJournal;
use super::rules::{ContextMappingDocument, EmptyContextPolicy, RuleDocument};
use crate::dom::{
    ancestors, collapse_whitespace, get_node_attr, get_node_name, get_parent_element, get_text,
    has_node_attr, set_node_attr, set_text, split_padding, text_content, ProcessedNodes,
};

/// 固定的界面关键词，独立于规则文档，在上下文驱动的遍历之前执行
pub const GITHUB_KEYWORDS: &[(&str, &str)] = &[
    ("Sign in", "サインイン"),
    ("Sign up", "サインアップ"),
    ("Sign out", "サインアウト"),
    ("Skip to content", "コンテンツへスキップ"),
    ("Search or jump to...", "検索またはジャンプ..."),
    ("Dashboard", "ダッシュボード"),
    ("Notifications", "通知"),
    ("Explore", "探索"),
    ("Marketplace", "マーケットプレイス"),
    ("Your profile", "あなたのプロフィール"),
    ("Your repositories", "あなたのリポジトリ"),
];

/// 关键词表
#[derive(Debug, Clone, Default)]
pub struct KeywordTable {
    entries: Vec<(String, String)>,
}

impl KeywordTable {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }

    pub fn github() -> Self {
        Self::new(GITHUB_KEYWORDS)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    fn lookup(&self, text: &str) -> Option<&str> {
        let collapsed = collapse_whitespace(text);
        self.entries
            .iter()
            .find(|(from, _)| *from == collapsed)
            .map(|(_, to)| to.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 引擎统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub passes: usize,
    pub nodes_visited: usize,
    pub skipped_subtrees: usize,
    pub text_substitutions: usize,
    pub attribute_substitutions: usize,
    pub mirrored_substitutions: usize,
    pub keyword_substitutions: usize,
}

impl EngineStats {
    pub fn reset(&mut self) {
        *self = Default::default();
    }

    /// 总替换次数
    pub fn total_substitutions(&self) -> usize {
        self.text_substitutions
            + self.attribute_substitutions
            + self.mirrored_substitutions
            + self.keyword_substitutions
    }
}

/// 一次完整遍历的结果
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub keyword_substitutions: usize,
    pub substitutions: usize,
    pub augmented: usize,
}

impl PassReport {
    pub fn total(&self) -> usize {
        self.keyword_substitutions + self.substitutions + self.augmented
    }
}

/// 翻译引擎
pub struct TranslationEngine {
    index: TranslationIndex,
    classifier: ContextClassifier,
    keywords: KeywordTable,
    processed: ProcessedNodes,
    journal: TranslationJournal,
    stats: EngineStats,
}

impl TranslationEngine {
    pub fn new(index: TranslationIndex, classifier: ContextClassifier) -> Self {
        Self {
            index,
            classifier,
            keywords: KeywordTable::github(),
            processed: ProcessedNodes::new(),
            journal: TranslationJournal::new(),
            stats: EngineStats::default(),
        }
    }

    /// 由规则文档和上下文映射构建
    pub fn from_documents(rules: &RuleDocument, mapping: &ContextMappingDocument) -> Self {
        Self::new(
            TranslationIndex::build(&rules.translations),
            ContextClassifier::new(mapping),
        )
    }

    pub fn with_keywords(mut self, keywords: KeywordTable) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn index(&self) -> &TranslationIndex {
        &self.index
    }

    pub fn classifier(&self) -> &ContextClassifier {
        &self.classifier
    }

    /// 开始一次遍历，借出引擎内部状态
    pub fn begin_pass(&mut self) -> TranslationPass<'_> {
        TranslationPass {
            index: &self.index,
            classifier: &self.classifier,
            keywords: &self.keywords,
            processed: &mut self.processed,
            journal: &mut self.journal,
            stats: &mut self.stats,
            cache: ClassifyCache::new(),
        }
    }

    /// 对子树执行上下文驱动的翻译，返回替换次数
    pub fn apply_translations(&mut self, root: &Handle) -> usize {
        self.begin_pass().apply_translations(root)
    }

    /// 对子树执行关键词替换
    pub fn apply_keywords(&mut self, root: &Handle) -> usize {
        self.begin_pass().apply_keywords(root)
    }

    /// 完整遍历：关键词、通用翻译、站点增强
    pub fn run_pass(
        &mut self,
        root: &Handle,
        augmentors: &AugmentorRegistry,
        host: Option<&str>,
    ) -> PassReport {
        let mut pass = self.begin_pass();
        let keyword_substitutions = pass.apply_keywords(root);
        let substitutions = pass.apply_translations(root);
        let augmented = match host {
            Some(host) => augmentors.run(host, root, &mut pass),
            None => 0,
        };
        drop(pass);

        self.stats.passes += 1;
        let report = PassReport {
            keyword_substitutions,
            substitutions,
            augmented,
        };

        tracing::debug!(
            "翻译遍历完成: 关键词 {}, 通用 {}, 站点增强 {}",
            report.keyword_substitutions,
            report.substitutions,
            report.augmented
        );

        report
    }

    /// 节点内容被外部改写后，允许重新处理
    pub fn forget(&mut self, node: &Handle) -> bool {
        self.processed.remove(node)
    }

    pub fn processed(&self) -> &ProcessedNodes {
        &self.processed
    }

    pub fn clear_processed(&mut self) {
        self.processed.clear();
    }

    pub fn journal(&self) -> &TranslationJournal {
        &self.journal
    }

    /// 写回所有原始内容并清空已处理集合
    pub fn restore(&mut self) -> usize {
        self.processed.clear();
        self.journal.restore()
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }
}

/// 一次遍历中借出的引擎状态
pub struct TranslationPass<'a> {
    index: &'a TranslationIndex,
    classifier: &'a ContextClassifier,
    keywords: &'a KeywordTable,
    processed: &'a mut ProcessedNodes,
    journal: &'a mut TranslationJournal,
    stats: &'a mut EngineStats,
    cache: ClassifyCache<'a>,
}

impl<'a> TranslationPass<'a> {
    /// 元素所属上下文
    pub fn classify(&mut self, element: &Handle) -> Option<&'a str> {
        self.classifier.classify_cached(element, &mut self.cache)
    }

    /// 三步查找
    pub fn resolve(&self, text: &str, element: Option<&Handle>, context: Option<&str>) -> Option<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some(context) = context {
            if let Some(translated) = self.index.lookup_context(context, trimmed) {
                return Some(translated.to_string());
            }
        }

        if self.classifier.settings().empty_context == EmptyContextPolicy::Global {
            if let Some(translated) = self.index.lookup_global(trimmed) {
                return Some(translated.to_string());
            }
        }

        for rule in self.index.regex_patterns() {
            let eligible = match rule.context() {
                None => true,
                Some(rule_context) => {
                    context == Some(rule_context)
                        || element.is_some_and(|e| self.classifier.is_regex_applicable(e, rule_context))
                        || self.classifier.treats_unknown_as_global(rule_context)
                }
            };
            if !eligible {
                continue;
            }
            if let Some(replaced) = rule.apply(trimmed) {
                if replaced == trimmed {
                    return None;
                }
                return Some(replaced);
            }
        }

        None
    }

    /// 上下文驱动的翻译
    pub fn apply_translations(&mut self, root: &Handle) -> usize {
        if is_inside_skipped(root) {
            self.stats.skipped_subtrees += 1;
            return 0;
        }
        let mut count = 0;
        self.walk(root, &mut count);
        count
    }

    fn walk(&mut self, node: &Handle, count: &mut usize) {
        self.stats.nodes_visited += 1;

        match node.data {
            NodeData::Text { .. } => {
                if self.processed.contains(node) {
                    return;
                }
                let element = get_parent_element(node);
                let context = element.as_ref().and_then(|e| self.classify(e));
                if self.translate_text(node, element.as_ref(), context) {
                    self.stats.text_substitutions += 1;
                    *count += 1;
                }
                self.processed.insert(node);
            }
            NodeData::Element { .. } => {
                if should_skip(node) {
                    self.stats.skipped_subtrees += 1;
                    return;
                }

                if !self.processed.contains(node) {
                    let context = self.classify(node);
                    *count += self.translate_attributes(node, context);
                    self.processed.insert(node);
                }

                let children: Vec<Handle> = node.children.borrow().clone();
                for child in &children {
                    self.walk(child, count);
                }
            }
            NodeData::Document => {
                let children: Vec<Handle> = node.children.borrow().clone();
                for child in &children {
                    self.walk(child, count);
                }
            }
            _ => {}
        }
    }

    /// 关键词替换，跳过规则与上下文驱动遍历相同
    pub fn apply_keywords(&mut self, root: &Handle) -> usize {
        if self.keywords.is_empty() || is_inside_skipped(root) {
            return 0;
        }
        let mut count = 0;
        self.keyword_walk(root, &mut count);
        count
    }

    fn keyword_walk(&mut self, node: &Handle, count: &mut usize) {
        match node.data {
            NodeData::Text { .. } => {
                if self.processed.contains(node) {
                    return;
                }
                let Some(current) = get_text(node) else {
                    return;
                };
                let (lead, body, trail) = split_padding(&current);
                if body.is_empty() {
                    return;
                }
                if let Some(translated) = self.keywords.lookup(body) {
                    let replacement = format!("{}{}{}", lead, translated, trail);
                    self.journal.record_text(node, current.clone(), &replacement);
                    set_text(node, &replacement);
                    self.processed.insert(node);
                    self.stats.keyword_substitutions += 1;
                    *count += 1;
                }
            }
            NodeData::Element { .. } | NodeData::Document => {
                if should_skip(node) {
                    return;
                }
                let children: Vec<Handle> = node.children.borrow().clone();
                for child in &children {
                    self.keyword_walk(child, count);
                }
            }
            _ => {}
        }
    }

    /// 站点增强使用：以分类结果（缺省为 `fallback`）翻译候选元素及其文本
    ///
    /// 不受已处理集合限制；仍保持本引擎写入值的文本和属性不会再次翻译，
    /// 因此输出仍能命中自身规则的正则也不会叠加。
    pub fn translate_candidate(&mut self, element: &Handle, fallback: &str) -> usize {
        if is_inside_skipped(element) {
            return 0;
        }

        let context = self.classify(element).unwrap_or(fallback);
        let mut count = self.translate_attributes(element, Some(context));
        self.processed.insert(element);

        let mut text_nodes = Vec::new();
        collect_text_nodes(element, &mut text_nodes);
        for node in &text_nodes {
            let owner = get_parent_element(node);
            if self.translate_text(node, owner.as_ref(), Some(context)) {
                self.stats.text_substitutions += 1;
                count += 1;
            }
            self.processed.insert(node);
        }

        count
    }

    fn translate_text(&mut self, node: &Handle, element: Option<&Handle>, context: Option<&str>) -> bool {
        if self.journal.is_own_text(node) {
            return false;
        }
        let Some(current) = get_text(node) else {
            return false;
        };
        let (lead, body, trail) = split_padding(&current);
        if body.is_empty() {
            return false;
        }
        let Some(translated) = self.resolve(body, element, context) else {
            return false;
        };

        let replacement = format!("{}{}{}", lead, translated, trail);
        self.journal.record_text(node, current.clone(), &replacement);
        set_text(node, &replacement);
        true
    }

    fn translate_attributes(&mut self, element: &Handle, context: Option<&str>) -> usize {
        let mut count = 0;

        for attr in constants::TRANSLATABLE_ATTRS {
            if self.journal.is_own_attr(element, attr) {
                continue;
            }
            let Some(value) = get_node_attr(element, attr) else {
                continue;
            };
            let (lead, body, trail) = split_padding(&value);
            if body.is_empty() {
                continue;
            }
            let Some(translated) = self.resolve(body, Some(element), context) else {
                continue;
            };

            let mirrors = text_content(element).trim() == body;
            let replacement = format!("{}{}{}", lead, translated, trail);
            self.journal.record_attr(element, attr, value.clone(), &replacement);
            set_node_attr(element, attr, Some(replacement));
            self.stats.attribute_substitutions += 1;
            count += 1;

            if mirrors {
                count += self.mirror_text(element, body, &translated);
            }
        }

        count
    }

    /// 把属性译文同步到元素文本
    fn mirror_text(&mut self, element: &Handle, original: &str, translated: &str) -> usize {
        let mut text_nodes = Vec::new();
        collect_text_nodes(element, &mut text_nodes);

        let non_blank: Vec<&Handle> = text_nodes
            .iter()
            .filter(|node| get_text(node).is_some_and(|t| !t.trim().is_empty()))
            .collect();

        let targets: Vec<Handle> = if non_blank.len() == 1 {
            vec![non_blank[0].clone()]
        } else {
            non_blank
                .into_iter()
                .filter(|node| get_text(node).is_some_and(|t| t.trim() == original))
                .cloned()
                .collect()
        };

        let mut count = 0;
        for node in &targets {
            let Some(current) = get_text(node) else {
                continue;
            };
            let (lead, body, trail) = split_padding(&current);
            if body == translated {
                continue;
            }
            let replacement = format!("{}{}{}", lead, translated, trail);
            self.journal.record_text(node, current.clone(), &replacement);
            set_text(node, &replacement);
            self.processed.insert(node);
            self.stats.mirrored_substitutions += 1;
            count += 1;
        }
        count
    }
}

/// 不进入的元素：不可翻译的标签、可编辑区域、显式跳过标记
pub fn should_skip(node: &Handle) -> bool {
    let Some(name) = get_node_name(node) else {
        return false;
    };

    if constants::SKIP_ELEMENTS
        .iter()
        .any(|tag| name.eq_ignore_ascii_case(tag))
    {
        return true;
    }

    if get_node_attr(node, "contenteditable")
        .is_some_and(|value| !value.trim().eq_ignore_ascii_case("false"))
    {
        return true;
    }

    if has_node_attr(node, constants::SKIP_MARKER_ATTR) {
        return true;
    }

    if get_node_attr(node, "translate").is_some_and(|value| value.trim().eq_ignore_ascii_case("no")) {
        return true;
    }

    get_node_attr(node, "class").is_some_and(|class| {
        class
            .split_whitespace()
            .any(|c| c == constants::SKIP_MARKER_CLASS)
    })
}

/// 节点自身或任一祖先元素需要跳过
pub fn is_inside_skipped(node: &Handle) -> bool {
    should_skip(node) || ancestors(node).any(|ancestor| should_skip(&ancestor))
}

fn collect_text_nodes(node: &Handle, out: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        match child.data {
            NodeData::Text { .. } => out.push(Rc::clone(child)),
            NodeData::Element { .. } => {
                if !should_skip(child) {
                    collect_text_nodes(child, out);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{find_nodes, html_to_dom, RcDom};
    use crate::translation::rules::{ContextConfig, MappingSettings, TranslationEntry};

    fn engine(entries: Vec<TranslationEntry>, mapping: ContextMappingDocument) -> TranslationEngine {
        TranslationEngine::from_documents(&RuleDocument::new(entries), &mapping)
            .with_keywords(KeywordTable::empty())
    }

    fn body(dom: &RcDom) -> Handle {
        find_nodes(&dom.document, &["html", "body"]).pop().unwrap()
    }

    fn dom(html: &str) -> RcDom {
        html_to_dom(html.as_bytes(), "utf-8")
    }

    #[test]
    fn text_keeps_padding() {
        let mut engine = engine(vec![TranslationEntry::new("Issues", "課題")], Default::default());
        let dom = dom("<span>  Issues  </span>");
        let root = body(&dom);

        assert_eq!(engine.apply_translations(&root), 1);
        assert_eq!(text_content(&root), "  課題  ");
    }

    #[test]
    fn attributes_translate_and_mirror() {
        let mut engine = engine(
            vec![
                TranslationEntry::new("Star", "スター"),
                TranslationEntry::new("Search", "検索"),
            ],
            Default::default(),
        );
        let dom = dom(r#"<button aria-label="Star"> Star </button><input placeholder="Search">"#);
        let root = body(&dom);

        // aria-label + mirrored text; input is never entered
        assert_eq!(engine.apply_translations(&root), 2);
        let button = find_nodes(&root, &["button"]).pop().unwrap();
        assert_eq!(get_node_attr(&button, "aria-label").as_deref(), Some("スター"));
        assert_eq!(text_content(&button), " スター ");

        let input = find_nodes(&root, &["input"]).pop().unwrap();
        assert_eq!(get_node_attr(&input, "placeholder").as_deref(), Some("Search"));
        assert_eq!(engine.stats().mirrored_substitutions, 1);
    }

    #[test]
    fn second_pass_counts_zero() {
        let mut engine = engine(
            vec![
                TranslationEntry::new("Issues", "課題"),
                TranslationEntry::new("(\\d+) open", "$1 件未解決").as_regex(),
            ],
            Default::default(),
        );
        let dom = dom(r#"<div title="Issues"><p>Issues</p><p>3 open</p></div>"#);
        let root = body(&dom);

        assert_eq!(engine.apply_translations(&root), 3);
        let after_first = text_content(&root);
        assert_eq!(engine.apply_translations(&root), 0);
        assert_eq!(text_content(&root), after_first);
    }

    #[test]
    fn context_beats_global() {
        let mapping = ContextMappingDocument::default()
            .with_context("リポジトリタブ", ContextConfig::new([".UnderlineNav-item"]));
        let mut engine = engine(
            vec![
                TranslationEntry::new("Code", "コード").in_context("リポジトリタブ"),
                TranslationEntry::new("Code", "ソースコード"),
            ],
            mapping,
        );
        let dom = dom(r#"<nav><a class="UnderlineNav-item">Code</a><span>Code</span></nav><p>Code</p>"#);
        let root = body(&dom);
        assert_eq!(engine.apply_translations(&root), 3);

        let a = find_nodes(&root, &["nav", "a"]).pop().unwrap();
        let span = find_nodes(&root, &["nav", "span"]).pop().unwrap();
        let p = find_nodes(&root, &["p"]).pop().unwrap();
        assert_eq!(text_content(&a), "コード");
        // classification is per element; the sibling span falls back to global
        assert_eq!(text_content(&span), "ソースコード");
        assert_eq!(text_content(&p), "ソースコード");
    }

    #[test]
    fn global_fallback_can_be_disabled() {
        let mapping = ContextMappingDocument::default().with_settings(MappingSettings {
            empty_context: EmptyContextPolicy::Ignore,
            ..Default::default()
        });
        let mut engine = engine(vec![TranslationEntry::new("Settings", "設定")], mapping);
        let dom = dom("<span>Settings</span>");
        let root = body(&dom);

        assert_eq!(engine.apply_translations(&root), 0);
        assert_eq!(text_content(&root), "Settings");
    }

    #[test]
    fn regex_first_match_wins() {
        let mut engine = engine(
            vec![
                TranslationEntry::new("^(\\d+) commits$", "$1 件のコミット").as_regex(),
                TranslationEntry::new("(\\d+)", "<$1>").as_regex(),
            ],
            Default::default(),
        );
        let dom = dom("<span>12 commits</span>");
        let root = body(&dom);

        assert_eq!(engine.apply_translations(&root), 1);
        assert_eq!(text_content(&root), "12 件のコミット");
    }

    #[test]
    fn candidate_rewrites_do_not_compound() {
        let mut engine = engine(vec![TranslationEntry::new("(\\d+)", "[$1]").as_regex()], Default::default());
        let dom = dom(r#"<span title="3 stars">3 stars</span>"#);
        let root = body(&dom);
        let span = find_nodes(&root, &["span"]).pop().unwrap();

        let mut pass = engine.begin_pass();
        // title + mirrored text
        assert_eq!(pass.translate_candidate(&span, "tabs"), 2);
        assert_eq!(pass.translate_candidate(&span, "tabs"), 0);
        drop(pass);

        assert_eq!(get_node_attr(&span, "title").as_deref(), Some("[3] stars"));
        assert_eq!(text_content(&span), "[3] stars");

        // an external rewrite is translated again
        let text = span.children.borrow()[0].clone();
        set_text(&text, "4 stars");
        let mut pass = engine.begin_pass();
        assert_eq!(pass.translate_candidate(&span, "tabs"), 1);
        drop(pass);
        assert_eq!(text_content(&span), "[4] stars");
    }

    #[test]
    fn context_scoped_regex_requires_eligibility() {
        let mapping = ContextMappingDocument::default()
            .with_context("tabs", ContextConfig::new([".tabs"]))
            .with_regex_context(
                "counters",
                crate::translation::rules::RegexContext {
                    apply_to: vec![".Counter".into()],
                    exclude: vec![],
                },
            );
        let mut engine = engine(
            vec![
                TranslationEntry::new("^(\\d+) open$", "未解決 $1").as_regex().in_context("tabs"),
                TranslationEntry::new("^(\\d+) closed$", "完了 $1").as_regex().in_context("counters"),
            ],
            mapping,
        );
        let dom = dom(
            r#"<span class="tabs">1 open</span><span>2 open</span>
               <span class="Counter">3 closed</span><span>4 closed</span>"#,
        );
        let root = body(&dom);

        assert_eq!(engine.apply_translations(&root), 2);
        let text = text_content(&root);
        assert!(text.contains("未解決 1"));
        assert!(text.contains("2 open"));
        assert!(text.contains("完了 3"));
        assert!(text.contains("4 closed"));
    }

    #[test]
    fn skipped_subtrees_are_untouched() {
        let mut engine = engine(vec![TranslationEntry::new("Issues", "課題")], Default::default());
        let dom = dom(
            r#"<script>var a = "Issues";</script><style>.Issues{}</style>
               <code>Issues</code><pre>Issues</pre><textarea>Issues</textarea>
               <div data-no-translate><span>Issues</span></div>
               <div translate="no">Issues</div><div class="x notranslate">Issues</div>
               <div contenteditable="true">Issues</div><div contenteditable="false">Issues</div>"#,
        );
        let html = find_nodes(&dom.document, &["html"]).pop().unwrap();

        assert_eq!(engine.apply_translations(&html), 1);
        assert!(engine.stats().skipped_subtrees >= 9);
    }

    #[test]
    fn mutation_root_inside_skipped_ancestor_is_ignored() {
        let mut engine = engine(vec![TranslationEntry::new("Issues", "課題")], Default::default());
        let dom = dom(r#"<pre><span id="x">Issues</span></pre>"#);
        let span = find_nodes(&dom.document, &["span"]).pop().unwrap();

        assert_eq!(engine.apply_translations(&span), 0);
        assert_eq!(text_content(&span), "Issues");
    }

    #[test]
    fn keyword_pass_runs_first_and_is_idempotent() {
        let mut engine = TranslationEngine::from_documents(&RuleDocument::default(), &Default::default());
        let dom = dom("<a> Sign in </a><script>Sign in</script>");
        let root = find_nodes(&dom.document, &["html"]).pop().unwrap();

        assert_eq!(engine.apply_keywords(&root), 1);
        assert_eq!(engine.apply_keywords(&root), 0);
        let a = find_nodes(&root, &["a"]).pop().unwrap();
        assert_eq!(text_content(&a), " サインイン ");
    }

    #[test]
    fn restore_undoes_every_substitution() {
        let mut engine = engine(vec![TranslationEntry::new("Star", "スター")], Default::default());
        let dom = dom(r#"<button title="Star">Star</button>"#);
        let root = body(&dom);
        let before = crate::dom::inner_html(&root);

        assert_eq!(engine.apply_translations(&root), 2);
        assert_ne!(crate::dom::inner_html(&root), before);
        assert_eq!(engine.restore(), 2);
        assert_eq!(crate::dom::inner_html(&root), before);
        assert!(engine.processed().is_empty());
    }

    #[test]
    fn run_pass_reports_each_stage() {
        let mut engine = TranslationEngine::from_documents(
            &RuleDocument::new(vec![TranslationEntry::new("Issues", "課題")]),
            &Default::default(),
        );
        let dom = dom("<span>Issues</span><a>Sign up</a><b>Other</b>");
        let root = body(&dom);

        let report = engine.run_pass(&root, &AugmentorRegistry::new(), None);
        assert_eq!(report.keyword_substitutions, 1);
        assert_eq!(report.substitutions, 1);
        assert_eq!(report.total(), 2);
        assert_eq!(engine.journal().len(), 2);
        assert_eq!(engine.stats().passes, 1);
    }
}
