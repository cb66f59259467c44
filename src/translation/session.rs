//! 翻译会话
//!
//! 会话控制器负责一次页面翻译的完整生命周期：按域名获取规则、构建索引、执行首次遍历、
//! 启动变更观察、安排延迟补充遍历，以及停止时的撤销或刷新。
//!
//! 所有任务都运行在 tokio 的 `LocalSet` 上（DOM 句柄不是 `Send`），会话状态放在
//! `Rc<RefCell<..>>` 中，任何借用都不会跨越 `.await`。`start` 等方法必须在
//! `LocalSet` 上下文中调用。

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use markup5ever_rcdom::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::augment::AugmentorRegistry;
use super::config::TranslatorConfig;
use super::context::ContextClassifier;
use super::engine::TranslationEngine;
use super::error::{helpers, ErrorStats, TranslationResult};
use super::index::TranslationIndex;
use super::observer::{CoordinatorSettings, MutationCoordinator, MutationRecord, NavigationEvent};
use super::rules::{ContextMappingDocument, DocumentFormat, RuleDocument};
use super::source::{domain_from_url, DomainRegistry, RuleSource};

/// 宿主页面
pub trait PageHost {
    /// 当前文档根节点
    fn document(&self) -> Handle;

    /// 当前页面地址
    fn url(&self) -> String;

    /// 刷新页面
    fn reload(&self);
}

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Starting,
    Active,
    Failed,
}

/// 会话统计快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub total_substitutions: usize,
    pub passes: usize,
    pub flushes: u64,
    pub retries: u32,
    pub failed_starts: usize,
    /// 启动失败与观察溢出
    pub errors: ErrorStats,
}

/// 外部消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    StartTranslation(String),
    StopTranslation,
    DisableObservers,
}

/// 消息应答
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandAck {
    pub ok: bool,
    pub message: String,
}

impl CommandAck {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

struct SessionState {
    domain: Option<String>,
    status: SessionStatus,
    /// 每次开始或停止都会递增，过期任务据此放弃执行
    generation: u64,
    engine: Option<TranslationEngine>,
    coordinator: MutationCoordinator,
    tasks: Vec<JoinHandle<()>>,
    flush_task: Option<JoinHandle<()>>,
    ready: bool,
    stats: SessionStats,
}

struct SessionInner {
    config: TranslatorConfig,
    domains: DomainRegistry,
    source: Rc<dyn RuleSource>,
    augmentors: AugmentorRegistry,
    host: Rc<dyn PageHost>,
    state: RefCell<SessionState>,
}

/// 会话控制器，克隆得到的是同一会话的句柄
#[derive(Clone)]
pub struct SessionController {
    inner: Rc<SessionInner>,
}

impl SessionController {
    pub fn new(config: TranslatorConfig, source: Rc<dyn RuleSource>, host: Rc<dyn PageHost>) -> Self {
        Self::with_augmentors(config, source, host, AugmentorRegistry::new())
    }

    pub fn with_augmentors(
        config: TranslatorConfig,
        source: Rc<dyn RuleSource>,
        host: Rc<dyn PageHost>,
        augmentors: AugmentorRegistry,
    ) -> Self {
        let coordinator = MutationCoordinator::new(CoordinatorSettings::from(&config));
        let state = SessionState {
            domain: None,
            status: SessionStatus::Idle,
            generation: 0,
            engine: None,
            coordinator,
            tasks: Vec::new(),
            flush_task: None,
            ready: false,
            stats: SessionStats::default(),
        };

        Self {
            inner: Rc::new(SessionInner {
                domains: DomainRegistry::from_config(&config),
                config,
                source,
                augmentors,
                host,
                state: RefCell::new(state),
            }),
        }
    }

    /// 开始翻译（立即返回，加载在本地任务中进行）
    ///
    /// 同一域名正在翻译或启动中时不做任何事并返回 `false`。
    pub fn start(&self, domain: &str) -> bool {
        let domain = self.inner.domains.canonical(domain);

        let running_other = {
            let state = self.inner.state.borrow();
            let running = matches!(state.status, SessionStatus::Starting | SessionStatus::Active);
            if running && state.domain.as_deref() == Some(domain.as_str()) {
                tracing::debug!("域名 {} 已在翻译中，忽略重复的开始请求", domain);
                return false;
            }
            running
        };
        if running_other {
            self.stop(false);
        }

        let generation = {
            let mut state = self.inner.state.borrow_mut();
            state.generation += 1;
            state.domain = Some(domain.clone());
            state.status = SessionStatus::Starting;
            state.ready = false;
            state.generation
        };

        tracing::info!("开始翻译: {}", domain);
        let controller = self.clone();
        let handle = tokio::task::spawn_local(async move {
            controller.run_start(domain, generation).await;
        });
        self.push_task(handle);
        true
    }

    async fn run_start(self, domain: String, generation: u64) {
        let max_retries = self.inner.config.max_retries;
        let backoff = self.inner.config.retry_backoff();
        let mut attempt: u32 = 0;

        loop {
            let result = self.load(&domain).await;
            if !self.is_current(generation) {
                return;
            }

            let error = match result {
                Ok((rules, mapping)) => {
                    self.activate(&rules, &mapping, generation);
                    return;
                }
                Err(error) => error,
            };

            helpers::log_error(&error);
            self.inner.state.borrow_mut().stats.errors.record_error(&error);
            if !error.is_retryable() || attempt >= max_retries {
                tracing::error!("域名 {} 的翻译启动失败，已放弃（重试 {} 次）: {}", domain, attempt, error);
                let mut state = self.inner.state.borrow_mut();
                state.status = SessionStatus::Failed;
                state.stats.failed_starts += 1;
                return;
            }

            attempt += 1;
            let delay = backoff * attempt;
            self.inner.state.borrow_mut().stats.retries += 1;
            tracing::warn!("{:?} 后重试 ({}/{})", delay, attempt, max_retries);
            tokio::time::sleep(delay).await;

            if !self.is_current(generation) {
                return;
            }
        }
    }

    /// 并行获取规则文档与上下文映射并解码
    async fn load(&self, domain: &str) -> TranslationResult<(RuleDocument, ContextMappingDocument)> {
        let config = self.inner.domains.require(domain)?.clone();
        let limit = self.inner.config.fetch_timeout();
        let source = &*self.inner.source;

        let rules_fetch = fetch_with_timeout(source, &config.repository_url, limit);
        let mapping_fetch = async {
            match &config.context_mapping_url {
                Some(location) => fetch_with_timeout(source, location, limit).await.map(Some),
                None => Ok(None),
            }
        };
        let (rules_bytes, mapping_bytes) = futures::join!(rules_fetch, mapping_fetch);

        let rules = RuleDocument::decode(
            &rules_bytes?,
            DocumentFormat::from_location(&config.repository_url),
        )
        .map_err(|e| e.with_context(&config.repository_url))?;
        let mapping = match (mapping_bytes?, &config.context_mapping_url) {
            (Some(bytes), Some(location)) => {
                ContextMappingDocument::decode(&bytes, DocumentFormat::from_location(location))
                    .map_err(|e| e.with_context(location))?
            }
            _ => ContextMappingDocument::github_default(),
        };

        tracing::debug!(
            "规则加载完成: {} 条翻译, {} 个上下文",
            rules.len(),
            mapping.contexts.len()
        );
        Ok((rules, mapping))
    }

    fn activate(&self, rules: &RuleDocument, mapping: &ContextMappingDocument, generation: u64) {
        let config = &self.inner.config;
        let engine = TranslationEngine::new(
            TranslationIndex::build(&rules.translations),
            ContextClassifier::new(mapping).with_max_ancestor_depth(config.max_ancestor_depth),
        );
        let url = self.inner.host.url();

        {
            let mut state = self.inner.state.borrow_mut();
            let mut coordinator = MutationCoordinator::new(CoordinatorSettings::from(config));
            coordinator.mark_seen(&url);
            state.coordinator = coordinator;
            state.engine = Some(engine);
            state.status = SessionStatus::Active;
        }

        let count = self.full_pass(generation);
        tracing::info!("首次翻译完成: {} 处替换", count);

        for delay in config.repass_delays() {
            self.schedule_pass(delay, generation);
        }
    }

    fn schedule_pass(&self, delay: Duration, generation: u64) {
        let controller = self.clone();
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            let count = controller.full_pass(generation);
            tracing::debug!("延迟遍历 ({:?}): {} 处替换", delay, count);
        });
        self.push_task(handle);
    }

    /// 从文档根执行一次完整遍历
    fn full_pass(&self, generation: u64) -> usize {
        let document = self.inner.host.document();
        let host = domain_from_url(&self.inner.host.url());

        let mut guard = self.inner.state.borrow_mut();
        let state = &mut *guard;
        if state.generation != generation || state.status != SessionStatus::Active {
            return 0;
        }
        let Some(engine) = state.engine.as_mut() else {
            return 0;
        };

        let report = engine.run_pass(&document, &self.inner.augmentors, host.as_deref());
        state.stats.passes += 1;
        state.stats.total_substitutions += report.total();
        state.ready = true;
        report.total()
    }

    /// 接收一条 DOM 变更记录
    pub fn notify(&self, record: MutationRecord) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.status != SessionStatus::Active {
                return;
            }
            state.coordinator.record(record);
        }
        self.schedule_flush();
    }

    fn schedule_flush(&self) {
        let mut state = self.inner.state.borrow_mut();
        if state.flush_task.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let Some(at) = state.coordinator.next_flush_at(Instant::now()) else {
            return;
        };

        let generation = state.generation;
        let controller = self.clone();
        state.flush_task = Some(tokio::task::spawn_local(async move {
            tokio::time::sleep_until(at).await;
            controller.flush(generation);
        }));
    }

    fn flush(&self, generation: u64) {
        let host = domain_from_url(&self.inner.host.url());

        let result = {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            state.flush_task = None;
            if state.generation != generation || state.status != SessionStatus::Active {
                return;
            }
            let Some(engine) = state.engine.as_mut() else {
                return;
            };
            let result = state.coordinator.flush(
                engine,
                &self.inner.augmentors,
                host.as_deref(),
                Instant::now(),
            );
            match &result {
                Ok(report) => {
                    state.stats.flushes += 1;
                    state.stats.total_substitutions += report.substitutions;
                }
                Err(error) => state.stats.errors.record_error(error),
            }
            result
        };

        // 溢出时协调器已记录错误并停用
        if result.is_ok() {
            self.schedule_flush();
        }
    }

    /// 单页导航；新地址在稳定延迟后触发完整遍历
    pub fn navigate(&self, event: NavigationEvent) -> bool {
        let (settle, generation) = {
            let mut state = self.inner.state.borrow_mut();
            if state.status != SessionStatus::Active || !state.coordinator.navigate(&event) {
                return false;
            }
            (state.coordinator.settings().navigation_settle, state.generation)
        };
        self.schedule_pass(settle, generation);
        true
    }

    /// 停止翻译
    ///
    /// `reload` 为 `true` 时刷新页面，否则写回所有原始内容。
    pub fn stop(&self, reload: bool) {
        let (tasks, flush_task, engine) = {
            let mut state = self.inner.state.borrow_mut();
            state.generation += 1;
            state.status = SessionStatus::Idle;
            state.domain = None;
            state.ready = false;
            state.coordinator.disable();
            (
                std::mem::take(&mut state.tasks),
                state.flush_task.take(),
                state.engine.take(),
            )
        };

        for task in tasks.iter().chain(flush_task.iter()) {
            task.abort();
        }

        if let Some(mut engine) = engine {
            if reload {
                engine.clear_processed();
            } else {
                let restored = engine.restore();
                tracing::info!("已恢复 {} 处原始内容", restored);
            }
        }

        if reload {
            self.inner.host.reload();
        }
        tracing::info!("翻译已停止");
    }

    /// 停止变更观察，保留已完成的翻译与会话
    pub fn disable_observers(&self) {
        let flush_task = {
            let mut state = self.inner.state.borrow_mut();
            state.coordinator.disable();
            state.flush_task.take()
        };
        if let Some(task) = flush_task {
            task.abort();
        }
    }

    /// 处理外部消息
    pub fn handle_command(&self, command: SessionCommand) -> CommandAck {
        match command {
            SessionCommand::StartTranslation(domain) => {
                if domain.trim().is_empty() {
                    return CommandAck::rejected("缺少域名");
                }
                if self.start(&domain) {
                    CommandAck::ok(format!("开始翻译 {}", domain))
                } else {
                    CommandAck::ok(format!("{} 已在翻译中", domain))
                }
            }
            SessionCommand::StopTranslation => {
                self.stop(true);
                CommandAck::ok("已停止翻译")
            }
            SessionCommand::DisableObservers => {
                self.disable_observers();
                CommandAck::ok("已停止变更观察")
            }
        }
    }

    /// 是否至少完成了一次遍历
    pub fn is_ready(&self) -> bool {
        self.inner.state.borrow().ready
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.state.borrow().status
    }

    pub fn domain(&self) -> Option<String> {
        self.inner.state.borrow().domain.clone()
    }

    pub fn observing(&self) -> bool {
        let state = self.inner.state.borrow();
        state.status == SessionStatus::Active && state.coordinator.is_enabled()
    }

    pub fn stats(&self) -> SessionStats {
        self.inner.state.borrow().stats.clone()
    }

    /// 只读访问当前引擎
    pub fn with_engine<R>(&self, f: impl FnOnce(&TranslationEngine) -> R) -> Option<R> {
        self.inner.state.borrow().engine.as_ref().map(f)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.state.borrow().generation == generation
    }

    fn push_task(&self, handle: JoinHandle<()>) {
        let mut state = self.inner.state.borrow_mut();
        state.tasks.retain(|task| !task.is_finished());
        state.tasks.push(handle);
    }
}

async fn fetch_with_timeout(
    source: &dyn RuleSource,
    location: &str,
    limit: Duration,
) -> TranslationResult<Vec<u8>> {
    match tokio::time::timeout(limit, source.fetch(location)).await {
        Ok(result) => result,
        Err(_) => Err(helpers::timeout_error(format!(
            "获取 {} 超过 {:?}",
            location, limit
        ))),
    }
}
