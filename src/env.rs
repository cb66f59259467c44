//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量读取，供配置管理器覆盖文件配置

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => Self::DEFAULT.ok_or_else(|| EnvError {
                variable: Self::NAME.to_string(),
                message: "Required environment variable not set".to_string(),
            }),
        }
    }

    /// 仅在变量被设置时返回值，用于覆盖文件配置
    fn get_optional() -> EnvResult<Option<T>> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value).map(Some),
            Err(_) => Ok(None),
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "PAGE_TRANSLATOR_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 配置文件路径（优先于默认搜索路径）
    pub struct ConfigPath;
    impl EnvVar<String> for ConfigPath {
        const NAME: &'static str = "PAGE_TRANSLATOR_CONFIG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Path to a TOML configuration file";

        fn parse(value: &str) -> EnvResult<String> {
            if value.trim().is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Path must not be empty".to_string(),
                });
            }
            Ok(value.trim().to_string())
        }
    }
}

/// 变更观察相关环境变量
pub mod observer {
    use super::*;

    /// 节流间隔（毫秒）
    pub struct ThrottleMs;
    impl EnvVar<Duration> for ThrottleMs {
        const NAME: &'static str = "PAGE_TRANSLATOR_THROTTLE_MS";
        const DEFAULT: Option<Duration> = Some(Duration::from_millis(300));
        const DESCRIPTION: &'static str = "Minimum interval between mutation flushes in milliseconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let millis = parse_bounded(value, Self::NAME, 0, 60_000)?;
            Ok(Duration::from_millis(millis as u64))
        }
    }

    /// 单次刷新处理的最大根节点数
    pub struct MaxBatch;
    impl EnvVar<usize> for MaxBatch {
        const NAME: &'static str = "PAGE_TRANSLATOR_MAX_BATCH";
        const DEFAULT: Option<usize> = Some(100);
        const DESCRIPTION: &'static str = "Maximum distinct subtree roots processed per flush";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_bounded(value, Self::NAME, 1, 10_000)
        }
    }
}

/// 会话相关环境变量
pub mod session {
    use super::*;

    /// 启动失败后的最大重试次数
    pub struct MaxRetries;
    impl EnvVar<u32> for MaxRetries {
        const NAME: &'static str = "PAGE_TRANSLATOR_MAX_RETRIES";
        const DEFAULT: Option<u32> = Some(3);
        const DESCRIPTION: &'static str = "Maximum retries of a failed session start";

        fn parse(value: &str) -> EnvResult<u32> {
            parse_bounded(value, Self::NAME, 0, 20).map(|n| n as u32)
        }
    }

    /// 规则获取超时（秒）
    pub struct FetchTimeout;
    impl EnvVar<Duration> for FetchTimeout {
        const NAME: &'static str = "PAGE_TRANSLATOR_FETCH_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(10));
        const DESCRIPTION: &'static str = "Rule document fetch timeout in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds = parse_bounded(value, Self::NAME, 1, 300)?;
            Ok(Duration::from_secs(seconds as u64))
        }
    }
}

/// 辅助函数
fn parse_bounded(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid non-negative number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

/// 环境变量配置汇总，未设置的变量为 `None`
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub log_level: Option<String>,
    pub config_path: Option<String>,
    pub throttle: Option<Duration>,
    pub max_batch: Option<usize>,
    pub max_retries: Option<u32>,
    pub fetch_timeout: Option<Duration>,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> EnvResult<Self> {
        Ok(Self {
            log_level: core::LogLevel::get_optional()?,
            config_path: core::ConfigPath::get_optional()?,
            throttle: observer::ThrottleMs::get_optional()?,
            max_batch: observer::MaxBatch::get_optional()?,
            max_retries: session::MaxRetries::get_optional()?,
            fetch_timeout: session::FetchTimeout::get_optional()?,
        })
    }
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    fn line<T: fmt::Debug, V: EnvVar<T>>(docs: &mut String) {
        docs.push_str(&format!(
            "- `{}`: {} (default: {:?})\n",
            V::NAME,
            V::DESCRIPTION,
            V::DEFAULT
        ));
    }

    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");
    line::<String, core::LogLevel>(&mut docs);
    line::<String, core::ConfigPath>(&mut docs);
    line::<Duration, observer::ThrottleMs>(&mut docs);
    line::<usize, observer::MaxBatch>(&mut docs);
    line::<u32, session::MaxRetries>(&mut docs);
    line::<Duration, session::FetchTimeout>(&mut docs);
    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(core::LogLevel::parse("DEBUG").unwrap(), "debug");
        assert_eq!(core::LogLevel::parse("warn").unwrap(), "warn");
        assert!(core::LogLevel::parse("verbose").is_err());
    }

    #[test]
    fn test_numeric_validation() {
        assert_eq!(
            observer::ThrottleMs::parse("250").unwrap(),
            Duration::from_millis(250)
        );
        assert_eq!(observer::MaxBatch::parse("50").unwrap(), 50);
        assert!(observer::MaxBatch::parse("0").is_err());
        assert!(observer::MaxBatch::parse("abc").is_err());
        assert_eq!(session::MaxRetries::parse("0").unwrap(), 0);
        assert!(session::MaxRetries::parse("100").is_err());
        assert_eq!(
            session::FetchTimeout::parse("5").unwrap(),
            Duration::from_secs(5)
        );
        assert!(session::FetchTimeout::parse("0").is_err());
    }

    #[test]
    fn test_config_path_rejects_blank() {
        assert!(core::ConfigPath::parse("  ").is_err());
        assert_eq!(core::ConfigPath::parse(" a.toml ").unwrap(), "a.toml");
    }

    #[test]
    fn test_env_docs_lists_every_variable() {
        let docs = generate_env_docs();
        for name in [
            "PAGE_TRANSLATOR_LOG_LEVEL",
            "PAGE_TRANSLATOR_CONFIG",
            "PAGE_TRANSLATOR_THROTTLE_MS",
            "PAGE_TRANSLATOR_MAX_BATCH",
            "PAGE_TRANSLATOR_MAX_RETRIES",
            "PAGE_TRANSLATOR_FETCH_TIMEOUT",
        ] {
            assert!(docs.contains(name), "missing {}", name);
        }
    }
}
