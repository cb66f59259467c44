//! 规则来源与域名配置
//!
//! 会话通过 [`RuleSource`] 获取规则文档的原始字节，通过 [`DomainRegistry`] 查找域名对应的
//! 规则地址。内置 HTTP、本地文件、内存三种来源。

use std::cell::Cell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::config::{constants, TranslatorConfig};
use super::error::{TranslationError, TranslationResult};

/// 规则文档来源
#[async_trait(?Send)]
pub trait RuleSource {
    /// 获取 `location` 处文档的原始字节
    async fn fetch(&self, location: &str) -> TranslationResult<Vec<u8>>;

    /// 来源名称，用于日志
    fn name(&self) -> &str;
}

/// 基于 reqwest 的 HTTP 来源
#[cfg(feature = "http")]
pub struct HttpRuleSource {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpRuleSource {
    pub fn new() -> TranslationResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("page-translator/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "http")]
#[async_trait(?Send)]
impl RuleSource for HttpRuleSource {
    async fn fetch(&self, location: &str) -> TranslationResult<Vec<u8>> {
        let url = url::Url::parse(location)
            .map_err(|e| TranslationError::Fetch(format!("无效的地址 {}: {}", location, e)))?;

        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        tracing::debug!("已获取 {} ({} 字节)", location, bytes.len());
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// 本地文件来源，相对路径基于 `base_dir` 解析
#[derive(Debug, Clone, Default)]
pub struct FileRuleSource {
    base_dir: Option<PathBuf>,
}

impl FileRuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, location: &str) -> PathBuf {
        let path = PathBuf::from(location.strip_prefix("file://").unwrap_or(location));
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }
}

#[async_trait(?Send)]
impl RuleSource for FileRuleSource {
    async fn fetch(&self, location: &str) -> TranslationResult<Vec<u8>> {
        let path = self.resolve(location);
        tokio::fs::read(&path)
            .await
            .map_err(|e| TranslationError::Fetch(format!("读取 {} 失败: {}", path.display(), e)))
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// 内存来源，可模拟延迟与前若干次失败
#[derive(Debug, Default)]
pub struct StaticRuleSource {
    documents: HashMap<String, Vec<u8>>,
    delay: Option<Duration>,
    failures_remaining: Cell<u32>,
    fetch_count: Cell<usize>,
}

impl StaticRuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, location: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.documents.insert(location.into(), body.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 前 `times` 次获取返回错误
    pub fn failing_first(self, times: u32) -> Self {
        self.failures_remaining.set(times);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.get()
    }
}

#[async_trait(?Send)]
impl RuleSource for StaticRuleSource {
    async fn fetch(&self, location: &str) -> TranslationResult<Vec<u8>> {
        self.fetch_count.set(self.fetch_count.get() + 1);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let remaining = self.failures_remaining.get();
        if remaining > 0 {
            self.failures_remaining.set(remaining - 1);
            return Err(TranslationError::Fetch(format!("模拟获取失败: {}", location)));
        }

        self.documents
            .get(location)
            .cloned()
            .ok_or_else(|| TranslationError::Fetch(format!("文档不存在: {}", location)))
    }

    fn name(&self) -> &str {
        "static"
    }
}

fn default_enabled() -> bool {
    true
}

/// 单个域名的规则配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DomainConfig {
    pub domain: String,
    pub repository_url: String,
    #[serde(default)]
    pub context_mapping_url: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl DomainConfig {
    pub fn new(domain: impl Into<String>, repository_url: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            repository_url: repository_url.into(),
            context_mapping_url: None,
            enabled: true,
        }
    }

    pub fn with_context_mapping(mut self, url: impl Into<String>) -> Self {
        self.context_mapping_url = Some(url.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// 域名别名（镜像域名共享主域名的规则）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DomainAlias {
    pub alias: String,
    pub target: String,
}

/// 域名配置注册表
#[derive(Debug, Clone)]
pub struct DomainRegistry {
    domains: HashMap<String, DomainConfig>,
    aliases: HashMap<String, String>,
}

impl Default for DomainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainRegistry {
    /// 创建带默认别名的空注册表
    pub fn new() -> Self {
        let aliases = constants::DEFAULT_DOMAIN_ALIASES
            .iter()
            .map(|(alias, target)| (alias.to_string(), target.to_string()))
            .collect();

        Self {
            domains: HashMap::new(),
            aliases,
        }
    }

    pub fn from_config(config: &TranslatorConfig) -> Self {
        let mut registry = Self {
            domains: HashMap::new(),
            aliases: HashMap::new(),
        };
        for alias in &config.aliases {
            registry.add_alias(&alias.alias, &alias.target);
        }
        for domain in &config.domains {
            registry.insert(domain.clone());
        }
        registry
    }

    pub fn insert(&mut self, config: DomainConfig) {
        self.domains.insert(normalize_domain(&config.domain), config);
    }

    pub fn add_alias(&mut self, alias: &str, target: &str) {
        self.aliases
            .insert(normalize_domain(alias), normalize_domain(target));
    }

    /// 应用别名后的规范域名
    pub fn canonical(&self, domain: &str) -> String {
        let domain = normalize_domain(domain);
        match self.aliases.get(&domain) {
            Some(target) => target.clone(),
            None => domain,
        }
    }

    pub fn lookup(&self, domain: &str) -> Option<&DomainConfig> {
        self.domains.get(&self.canonical(domain))
    }

    /// 查找已启用的域名配置
    pub fn require(&self, domain: &str) -> TranslationResult<&DomainConfig> {
        match self.lookup(domain) {
            Some(config) if config.enabled => Ok(config),
            Some(_) => Err(TranslationError::DomainDisabled(domain.to_string())),
            None => Err(TranslationError::DomainNotConfigured(domain.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// 从页面地址中提取主机名
pub fn domain_from_url(page_url: &str) -> Option<String> {
    url::Url::parse(page_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
}
