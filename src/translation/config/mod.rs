//! 翻译配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, TranslatorConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 变更观察相关
    pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(300);
    pub const DEFAULT_MAX_BATCH: usize = 100;
    pub const DEFAULT_FLUSH_CEILING: u64 = 100_000;
    pub const DEFAULT_NAVIGATION_SETTLE: Duration = Duration::from_millis(500);

    // 会话相关
    pub const DEFAULT_REPASS_DELAYS_MS: &[u64] = &[1000, 3000];
    pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

    // 上下文分类
    pub const MAX_ANCESTOR_DEPTH: usize = 32;

    // 预设上下文名称
    pub const FOOTER_CONTEXT: &str = "フッター";
    pub const HEADER_CONTEXT: &str = "ヘッダー";
    pub const MAIN_NAV_CONTEXT: &str = "メインナビゲーション";
    pub const REPO_TAB_CONTEXT: &str = "リポジトリタブ";
    pub const PROFILE_TAB_CONTEXT: &str = "プロフィールタブ";
    pub const PROFILE_CONTEXT: &str = "プロフィール";
    pub const ACTION_LIST_CONTEXT: &str = "アクションリスト";

    // 可翻译属性
    pub const TRANSLATABLE_ATTRS: &[&str] = &["aria-label", "alt", "placeholder", "title", "data-content"];

    // 跳过的元素
    pub const SKIP_ELEMENTS: &[&str] = &["script", "style", "textarea", "input", "code", "pre", "noscript"];

    // 跳过标记
    pub const SKIP_MARKER_ATTR: &str = "data-no-translate";
    pub const SKIP_MARKER_CLASS: &str = "notranslate";

    // 会触发重新翻译的属性
    pub const OBSERVED_ATTRS: &[&str] = &[
        "class",
        "style",
        "aria-label",
        "data-content",
        "title",
        "data-view-component",
    ];

    // 镜像域名别名
    pub const DEFAULT_DOMAIN_ALIASES: &[(&str, &str)] = &[("raw.githubusercontent.com", "github.com")];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "page-translator.toml",
        ".page-translator.toml",
        "/etc/page-translator/config.toml",
    ];
}

/// 便利函数
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| std::path::Path::new(path).exists())
}

/// 加载配置，失败时退回默认配置
pub fn load_translator_config() -> TranslatorConfig {
    match ConfigManager::new() {
        Ok(manager) => manager.into_config(),
        Err(e) => {
            tracing::warn!("配置加载失败，使用默认配置: {}", e);
            TranslatorConfig::default()
        }
    }
}
