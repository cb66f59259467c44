//! 配置管理器
//!
//! 按 默认值 → 配置文件 → 环境变量 的顺序组装 [`TranslatorConfig`]

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, File};
use serde::{Deserialize, Serialize};

use super::constants;
use crate::env::EnvConfig;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::source::{DomainAlias, DomainConfig};

/// 翻译器配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslatorConfig {
    // 观察器配置
    pub throttle_ms: u64,
    pub max_batch: usize,
    pub flush_ceiling: u64,
    pub navigation_settle_ms: u64,

    // 会话配置
    pub repass_delays_ms: Vec<u64>,
    pub fetch_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,

    // 分类配置
    pub max_ancestor_depth: usize,

    pub log_level: String,

    // 域名配置
    pub domains: Vec<DomainConfig>,
    pub aliases: Vec<DomainAlias>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            throttle_ms: constants::DEFAULT_THROTTLE.as_millis() as u64,
            max_batch: constants::DEFAULT_MAX_BATCH,
            flush_ceiling: constants::DEFAULT_FLUSH_CEILING,
            navigation_settle_ms: constants::DEFAULT_NAVIGATION_SETTLE.as_millis() as u64,

            repass_delays_ms: constants::DEFAULT_REPASS_DELAYS_MS.to_vec(),
            fetch_timeout_secs: constants::DEFAULT_FETCH_TIMEOUT.as_secs(),
            max_retries: constants::DEFAULT_MAX_RETRIES,
            retry_backoff_ms: constants::DEFAULT_RETRY_BACKOFF.as_millis() as u64,

            max_ancestor_depth: constants::MAX_ANCESTOR_DEPTH,

            log_level: "info".to_string(),

            domains: Vec::new(),
            aliases: constants::DEFAULT_DOMAIN_ALIASES
                .iter()
                .map(|(alias, target)| DomainAlias {
                    alias: alias.to_string(),
                    target: target.to_string(),
                })
                .collect(),
        }
    }
}

impl TranslatorConfig {
    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.max_batch == 0 {
            return Err(TranslationError::Config("批次大小不能为0".to_string()));
        }

        if self.flush_ceiling == 0 {
            return Err(TranslationError::Config("刷新上限不能为0".to_string()));
        }

        if self.fetch_timeout_secs == 0 {
            return Err(TranslationError::Config("获取超时不能为0".to_string()));
        }

        if self.max_ancestor_depth == 0 {
            return Err(TranslationError::Config("祖先遍历深度不能为0".to_string()));
        }

        if let Some(domain) = self.domains.iter().find(|d| d.domain.trim().is_empty()) {
            return Err(TranslationError::Config(format!(
                "域名配置缺少域名: {}",
                domain.repository_url
            )));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self, env: &EnvConfig) {
        if let Some(throttle) = env.throttle {
            self.throttle_ms = throttle.as_millis() as u64;
        }

        if let Some(max_batch) = env.max_batch {
            self.max_batch = max_batch;
        }

        if let Some(max_retries) = env.max_retries {
            self.max_retries = max_retries;
        }

        if let Some(fetch_timeout) = env.fetch_timeout {
            self.fetch_timeout_secs = fetch_timeout.as_secs();
            tracing::info!("环境变量覆盖获取超时: {}s", self.fetch_timeout_secs);
        }

        if let Some(level) = &env.log_level {
            self.log_level = level.clone();
        }
    }

    /// 转换为Duration类型
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn navigation_settle(&self) -> Duration {
        Duration::from_millis(self.navigation_settle_ms)
    }

    pub fn repass_delays(&self) -> Vec<Duration> {
        self.repass_delays_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: TranslatorConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// 从默认搜索路径和进程环境变量创建
    pub fn new() -> TranslationResult<Self> {
        let env = EnvConfig::from_env()?;
        let path = match &env.config_path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::find_config_file(),
        };
        Self::from_sources(path.as_deref(), &env)
    }

    /// 从指定文件创建（仍然应用环境变量覆盖）
    pub fn from_file(path: &Path) -> TranslationResult<Self> {
        let env = EnvConfig::from_env()?;
        Self::from_sources(Some(path), &env)
    }

    /// 由显式来源组装配置
    pub fn from_sources(path: Option<&Path>, env: &EnvConfig) -> TranslationResult<Self> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&TranslatorConfig::default())
                .map_err(|e| TranslationError::Config(format!("默认配置错误: {}", e)))?,
        );

        if let Some(path) = path {
            if !path.exists() {
                return Err(TranslationError::Config(format!(
                    "配置文件不存在: {}",
                    path.display()
                )));
            }
            tracing::info!("加载配置文件: {}", path.display());
            builder = builder.add_source(File::from(path));
        } else {
            tracing::debug!("未找到配置文件，使用默认配置");
        }

        let mut config: TranslatorConfig = builder
            .build()
            .map_err(|e| TranslationError::Config(format!("构建配置失败: {}", e)))?
            .try_deserialize()
            .map_err(|e| TranslationError::Config(format!("反序列化配置失败: {}", e)))?;

        config.apply_env_overrides(env);
        config.validate()?;

        Ok(Self {
            config,
            config_path: path.map(Path::to_path_buf),
        })
    }

    fn find_config_file() -> Option<PathBuf> {
        constants::CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// 获取配置
    pub fn get_config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub fn into_config(self) -> TranslatorConfig {
        self.config
    }

    /// 实际加载的配置文件
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &Path) -> TranslationResult<()> {
        let config = TranslatorConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| TranslationError::Config(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::Config(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
