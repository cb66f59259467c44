//! 变更协调器
//!
//! 收集 DOM 变更记录，按节流窗口批量重新翻译受影响的子树。
//!
//! 状态流转：`Idle` →（收到记录）→ `Collecting` →（距上次刷新超过节流间隔）→
//! `Processing` → `Idle`，若处理期间又有记录到达则回到 `Collecting`。
//!
//! 协调器本身不持有计时器，由会话层根据 [`MutationCoordinator::next_flush_at`]
//! 安排刷新，这样同一套逻辑既能在 tokio 本地任务中运行，也能在测试中直接驱动。

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use markup5ever_rcdom::{Handle, NodeData};
use tokio::time::Instant;

use super::augment::AugmentorRegistry;
use super::config::{constants, TranslatorConfig};
use super::engine::TranslationEngine;
use super::error::{helpers, TranslationError, TranslationResult};
use crate::dom::{contains, get_parent_element, is_connected, node_key};

/// DOM 变更记录
#[derive(Debug, Clone)]
pub enum MutationRecord {
    /// 子节点插入（移除不需要处理，`added` 为空时忽略）
    ChildList { target: Handle, added: Vec<Handle> },
    /// 属性变化
    Attributes { target: Handle, name: String },
    /// 文本内容变化，`target` 为文本节点
    CharacterData { target: Handle },
}

/// 单页应用导航事件，携带新地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    Push(String),
    Replace(String),
    Pop(String),
}

impl NavigationEvent {
    pub fn url(&self) -> &str {
        match self {
            NavigationEvent::Push(url) | NavigationEvent::Replace(url) | NavigationEvent::Pop(url) => url,
        }
    }
}

/// 协调器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Collecting,
    Processing,
    Disabled,
}

/// 协调器设置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub throttle: Duration,
    pub max_batch: usize,
    pub flush_ceiling: u64,
    pub navigation_settle: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            throttle: constants::DEFAULT_THROTTLE,
            max_batch: constants::DEFAULT_MAX_BATCH,
            flush_ceiling: constants::DEFAULT_FLUSH_CEILING,
            navigation_settle: constants::DEFAULT_NAVIGATION_SETTLE,
        }
    }
}

impl From<&TranslatorConfig> for CoordinatorSettings {
    fn from(config: &TranslatorConfig) -> Self {
        Self {
            throttle: config.throttle(),
            max_batch: config.max_batch.max(1),
            flush_ceiling: config.flush_ceiling,
            navigation_settle: config.navigation_settle(),
        }
    }
}

/// 协调器统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub records: usize,
    pub ignored_records: usize,
    pub self_caused: usize,
    pub flushes: u64,
    pub roots_processed: usize,
    pub deferred_roots: usize,
    pub substitutions: usize,
    pub navigations: usize,
}

impl CoordinatorStats {
    pub fn reset(&mut self) {
        *self = Default::default();
    }
}

/// 一次刷新的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub roots: usize,
    pub deferred: usize,
    pub substitutions: usize,
}

/// 变更协调器
pub struct MutationCoordinator {
    settings: CoordinatorSettings,
    state: CoordinatorState,
    pending: VecDeque<MutationRecord>,
    /// 超出批量上限、留到下一窗口的根节点
    carry: Vec<Handle>,
    last_flush: Option<Instant>,
    seen_urls: HashSet<String>,
    stats: CoordinatorStats,
}

impl MutationCoordinator {
    pub fn new(settings: CoordinatorSettings) -> Self {
        Self {
            settings,
            state: CoordinatorState::Idle,
            pending: VecDeque::new(),
            carry: Vec::new(),
            last_flush: None,
            seen_urls: HashSet::new(),
            stats: CoordinatorStats::default(),
        }
    }

    pub fn settings(&self) -> CoordinatorSettings {
        self.settings
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state != CoordinatorState::Disabled
    }

    pub fn stats(&self) -> &CoordinatorStats {
        &self.stats
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len() + self.carry.len()
    }

    /// 接收一条变更记录
    pub fn record(&mut self, record: MutationRecord) {
        if !self.is_enabled() {
            return;
        }

        if let MutationRecord::Attributes { name, .. } = &record {
            if !constants::OBSERVED_ATTRS.contains(&name.as_str()) {
                self.stats.ignored_records += 1;
                return;
            }
        }

        self.stats.records += 1;
        self.pending.push_back(record);
        if self.state == CoordinatorState::Idle {
            self.state = CoordinatorState::Collecting;
        }
    }

    /// 下一次可以刷新的时间；没有待处理内容时为 `None`
    pub fn next_flush_at(&self, now: Instant) -> Option<Instant> {
        if !self.is_enabled() || self.pending_len() == 0 {
            return None;
        }
        match self.last_flush {
            Some(last) => Some((last + self.settings.throttle).max(now)),
            None => Some(now),
        }
    }

    pub fn should_flush(&self, now: Instant) -> bool {
        self.state != CoordinatorState::Processing
            && self.next_flush_at(now).is_some_and(|at| at <= now)
    }

    /// 刷新一个窗口：解析根节点、去重、按批量上限截断并重新翻译
    pub fn flush(
        &mut self,
        engine: &mut TranslationEngine,
        augmentors: &AugmentorRegistry,
        host: Option<&str>,
        now: Instant,
    ) -> TranslationResult<FlushReport> {
        if !self.is_enabled() || self.state == CoordinatorState::Processing {
            return Ok(FlushReport::default());
        }

        self.stats.flushes += 1;
        if self.stats.flushes > self.settings.flush_ceiling {
            let error = TranslationError::ObserverOverflow {
                flushes: self.stats.flushes,
            };
            helpers::log_error(&error);
            self.disable();
            return Err(error);
        }

        let mut roots = std::mem::take(&mut self.carry);
        while let Some(record) = self.pending.pop_front() {
            self.resolve_roots(record, engine, &mut roots);
        }
        let mut roots = dedup_roots(roots);

        let deferred = roots.len().saturating_sub(self.settings.max_batch);
        if deferred > 0 {
            self.carry = roots.split_off(self.settings.max_batch);
            self.stats.deferred_roots += deferred;
            tracing::debug!("批量上限 {}，{} 个根节点留到下一窗口", self.settings.max_batch, deferred);
        }

        self.state = CoordinatorState::Processing;
        let mut substitutions = 0;
        for root in &roots {
            substitutions += engine.run_pass(root, augmentors, host).total();
        }
        self.last_flush = Some(now);
        self.state = if self.pending_len() > 0 {
            CoordinatorState::Collecting
        } else {
            CoordinatorState::Idle
        };

        self.stats.roots_processed += roots.len();
        self.stats.substitutions += substitutions;
        tracing::debug!("变更刷新: {} 个根节点, {} 处替换", roots.len(), substitutions);

        Ok(FlushReport {
            roots: roots.len(),
            deferred,
            substitutions,
        })
    }

    fn resolve_roots(&mut self, record: MutationRecord, engine: &mut TranslationEngine, roots: &mut Vec<Handle>) {
        match record {
            MutationRecord::ChildList { added, .. } => {
                roots.extend(added.into_iter().filter(|node| {
                    matches!(node.data, NodeData::Element { .. } | NodeData::Text { .. })
                }));
            }
            MutationRecord::Attributes { target, name } => {
                // 当前值仍是引擎写下的值才算自身变更
                if engine.journal().is_own_attr(&target, &name) {
                    self.stats.self_caused += 1;
                    return;
                }
                engine.forget(&target);
                roots.push(target);
            }
            MutationRecord::CharacterData { target } => {
                if engine.journal().is_own_text(&target) {
                    self.stats.self_caused += 1;
                    return;
                }
                engine.forget(&target);
                if let Some(parent) = get_parent_element(&target) {
                    roots.push(parent);
                }
            }
        }
    }

    /// 记录导航；新地址返回 `true`，调用方应在 `navigation_settle` 后执行完整遍历
    pub fn navigate(&mut self, event: &NavigationEvent) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let is_new = self.seen_urls.insert(event.url().to_string());
        if is_new {
            self.stats.navigations += 1;
            tracing::debug!("导航到新地址: {}", event.url());
        }
        is_new
    }

    /// 标记一个地址为已访问（初始页面）
    pub fn mark_seen(&mut self, url: &str) {
        self.seen_urls.insert(url.to_string());
    }

    /// 停止观察，丢弃待处理状态；会话本身不受影响
    pub fn disable(&mut self) {
        self.pending.clear();
        self.carry.clear();
        self.state = CoordinatorState::Disabled;
        tracing::info!("变更观察已停用");
    }

    /// 重新启用（下一次会话开始时）
    pub fn reset(&mut self) {
        self.pending.clear();
        self.carry.clear();
        self.last_flush = None;
        self.seen_urls.clear();
        self.stats.reset();
        self.state = CoordinatorState::Idle;
    }
}

/// 去掉重复的根以及被其它根包含的根，保持原有顺序，跳过已脱离文档的节点
fn dedup_roots(roots: Vec<Handle>) -> Vec<Handle> {
    let mut seen = HashSet::new();
    let unique: Vec<Handle> = roots
        .into_iter()
        .filter(|root| is_connected(root) && seen.insert(node_key(root)))
        .collect();

    unique
        .iter()
        .enumerate()
        .filter(|(i, root)| {
            !unique
                .iter()
                .enumerate()
                .any(|(j, other)| *i != j && contains(other, root))
        })
        .map(|(_, root)| root.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{
        append_child, find_nodes, get_node_attr, html_to_dom, parse_fragment_nodes, set_node_attr, set_text,
        text_content, RcDom,
    };
    use crate::translation::engine::KeywordTable;
    use crate::translation::rules::{RuleDocument, TranslationEntry};

    fn engine() -> TranslationEngine {
        TranslationEngine::from_documents(
            &RuleDocument::new(vec![
                TranslationEntry::new("Issues", "課題"),
                TranslationEntry::new("Star", "スター"),
            ]),
            &Default::default(),
        )
        .with_keywords(KeywordTable::empty())
    }

    fn body(dom: &RcDom) -> Handle {
        find_nodes(&dom.document, &["html", "body"]).pop().unwrap()
    }

    fn insert(parent: &Handle, html: &str) -> Vec<Handle> {
        let nodes = parse_fragment_nodes(html);
        for node in &nodes {
            append_child(parent, node.clone());
        }
        nodes
    }

    #[test]
    fn contained_roots_are_dropped() {
        let dom = html_to_dom(b"<div><section><p>a</p></section></div>", "utf-8");
        let div = find_nodes(&dom.document, &["div"]).pop().unwrap();
        let p = find_nodes(&dom.document, &["p"]).pop().unwrap();

        let roots = dedup_roots(vec![p.clone(), div.clone(), p.clone()]);
        assert_eq!(roots.len(), 1);
        assert!(std::rc::Rc::ptr_eq(&roots[0], &div));
    }

    #[tokio::test(start_paused = true)]
    async fn inserted_nodes_are_translated_once() {
        let dom = html_to_dom(b"<main></main>", "utf-8");
        let main = find_nodes(&dom.document, &["main"]).pop().unwrap();
        let mut engine = engine();
        let augmentors = AugmentorRegistry::empty();
        let mut coordinator = MutationCoordinator::new(CoordinatorSettings::default());

        let added = insert(&main, "<p>Issues</p><span>Issues</span>");
        coordinator.record(MutationRecord::ChildList { target: main.clone(), added: added.clone() });
        coordinator.record(MutationRecord::ChildList { target: main.clone(), added });
        assert_eq!(coordinator.state(), CoordinatorState::Collecting);

        let now = Instant::now();
        assert!(coordinator.should_flush(now));
        let report = coordinator.flush(&mut engine, &augmentors, None, now).unwrap();
        assert_eq!(report.roots, 2);
        assert_eq!(report.substitutions, 2);
        assert_eq!(text_content(&main), "課題課題");
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn flushes_are_throttled() {
        let dom = html_to_dom(b"<main></main>", "utf-8");
        let main = find_nodes(&dom.document, &["main"]).pop().unwrap();
        let mut engine = engine();
        let augmentors = AugmentorRegistry::empty();
        let mut coordinator = MutationCoordinator::new(CoordinatorSettings::default());

        let start = Instant::now();
        let added = insert(&main, "<p>Issues</p>");
        coordinator.record(MutationRecord::ChildList { target: main.clone(), added });
        coordinator.flush(&mut engine, &augmentors, None, start).unwrap();

        let added = insert(&main, "<p>Star</p>");
        coordinator.record(MutationRecord::ChildList { target: main.clone(), added });
        let later = start + Duration::from_millis(100);
        assert!(!coordinator.should_flush(later));
        assert_eq!(coordinator.next_flush_at(later), Some(start + Duration::from_millis(300)));
        assert!(coordinator.should_flush(start + Duration::from_millis(300)));
    }

    #[tokio::test(start_paused = true)]
    async fn batch_cap_defers_overflow() {
        let dom = html_to_dom(b"<main></main>", "utf-8");
        let main = find_nodes(&dom.document, &["main"]).pop().unwrap();
        let mut engine = engine();
        let augmentors = AugmentorRegistry::empty();
        let mut coordinator = MutationCoordinator::new(CoordinatorSettings {
            max_batch: 2,
            ..Default::default()
        });

        let added = insert(&main, "<p>Issues</p><p>Issues</p><p>Issues</p>");
        coordinator.record(MutationRecord::ChildList { target: main.clone(), added });

        let now = Instant::now();
        let first = coordinator.flush(&mut engine, &augmentors, None, now).unwrap();
        assert_eq!((first.roots, first.deferred), (2, 1));
        assert_eq!(coordinator.pending_len(), 1);
        assert_eq!(coordinator.state(), CoordinatorState::Collecting);

        let second = coordinator
            .flush(&mut engine, &augmentors, None, now + Duration::from_millis(300))
            .unwrap();
        assert_eq!((second.roots, second.deferred), (1, 0));
        assert_eq!(text_content(&main), "課題課題課題");
    }

    #[tokio::test(start_paused = true)]
    async fn self_caused_records_are_dropped() {
        let dom = html_to_dom(br#"<main><button title="Star">x</button></main>"#, "utf-8");
        let main = find_nodes(&dom.document, &["main"]).pop().unwrap();
        let button = find_nodes(&dom.document, &["button"]).pop().unwrap();
        let mut engine = engine();
        let augmentors = AugmentorRegistry::empty();
        let mut coordinator = MutationCoordinator::new(CoordinatorSettings::default());

        coordinator.record(MutationRecord::ChildList { target: main.clone(), added: vec![button.clone()] });
        let now = Instant::now();
        coordinator.flush(&mut engine, &augmentors, None, now).unwrap();

        // the title write shows up as an attribute record
        coordinator.record(MutationRecord::Attributes { target: button.clone(), name: "title".into() });
        let report = coordinator
            .flush(&mut engine, &augmentors, None, now + Duration::from_secs(1))
            .unwrap();
        assert_eq!(report.roots, 0);
        assert_eq!(coordinator.stats().self_caused, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn external_rewrite_after_a_flush_is_retranslated() {
        let dom = html_to_dom(br#"<main><button title="Star">x</button></main>"#, "utf-8");
        let main = find_nodes(&dom.document, &["main"]).pop().unwrap();
        let button = find_nodes(&dom.document, &["button"]).pop().unwrap();
        let mut engine = engine();
        let augmentors = AugmentorRegistry::empty();
        let mut coordinator = MutationCoordinator::new(CoordinatorSettings::default());

        coordinator.record(MutationRecord::ChildList { target: main.clone(), added: vec![button.clone()] });
        let now = Instant::now();
        coordinator.flush(&mut engine, &augmentors, None, now).unwrap();
        assert_eq!(get_node_attr(&button, "title").as_deref(), Some("スター"));

        // the page puts the source text back before the next window
        set_node_attr(&button, "title", Some("Star".into()));
        coordinator.record(MutationRecord::Attributes { target: button.clone(), name: "title".into() });
        let report = coordinator
            .flush(&mut engine, &augmentors, None, now + Duration::from_secs(1))
            .unwrap();
        assert_eq!(report.substitutions, 1);
        assert_eq!(get_node_attr(&button, "title").as_deref(), Some("スター"));
        assert_eq!(coordinator.stats().self_caused, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn text_changes_retranslate_the_parent() {
        let dom = html_to_dom(b"<main><p>Issues</p></main>", "utf-8");
        let p = find_nodes(&dom.document, &["p"]).pop().unwrap();
        let mut engine = engine();
        let augmentors = AugmentorRegistry::empty();
        engine.apply_translations(&body(&dom));

        let mut coordinator = MutationCoordinator::new(CoordinatorSettings::default());
        let text = p.children.borrow()[0].clone();
        set_text(&text, "Star");
        coordinator.record(MutationRecord::CharacterData { target: text });

        let report = coordinator.flush(&mut engine, &augmentors, None, Instant::now()).unwrap();
        assert_eq!(report.substitutions, 1);
        assert_eq!(text_content(&p), "スター");
    }

    #[test]
    fn unobserved_attributes_are_ignored() {
        let dom = html_to_dom(b"<p>x</p>", "utf-8");
        let p = find_nodes(&dom.document, &["p"]).pop().unwrap();
        let mut coordinator = MutationCoordinator::new(CoordinatorSettings::default());

        coordinator.record(MutationRecord::Attributes { target: p.clone(), name: "href".into() });
        coordinator.record(MutationRecord::Attributes { target: p, name: "aria-label".into() });
        assert_eq!(coordinator.pending_len(), 1);
        assert_eq!(coordinator.stats().ignored_records, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_ceiling_disables_observation() {
        let dom = html_to_dom(b"<main></main>", "utf-8");
        let main = find_nodes(&dom.document, &["main"]).pop().unwrap();
        let mut engine = engine();
        let augmentors = AugmentorRegistry::empty();
        let mut coordinator = MutationCoordinator::new(CoordinatorSettings {
            flush_ceiling: 1,
            ..Default::default()
        });

        let now = Instant::now();
        coordinator.flush(&mut engine, &augmentors, None, now).unwrap();
        let added = insert(&main, "<p>Issues</p>");
        coordinator.record(MutationRecord::ChildList { target: main.clone(), added });

        let err = coordinator
            .flush(&mut engine, &augmentors, None, now + Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, TranslationError::ObserverOverflow { flushes: 2 }));
        assert_eq!(coordinator.state(), CoordinatorState::Disabled);
        assert_eq!(coordinator.pending_len(), 0);
        assert_eq!(text_content(&main), "Issues");

        coordinator.record(MutationRecord::ChildList { target: main.clone(), added: vec![] });
        assert_eq!(coordinator.pending_len(), 0);
    }

    #[test]
    fn navigation_dedups_seen_urls() {
        let mut coordinator = MutationCoordinator::new(CoordinatorSettings::default());
        coordinator.mark_seen("https://github.com/o/r");

        assert!(!coordinator.navigate(&NavigationEvent::Push("https://github.com/o/r".into())));
        assert!(coordinator.navigate(&NavigationEvent::Push("https://github.com/o/r/issues".into())));
        assert!(!coordinator.navigate(&NavigationEvent::Pop("https://github.com/o/r/issues".into())));
        assert_eq!(coordinator.stats().navigations, 1);
    }
}
