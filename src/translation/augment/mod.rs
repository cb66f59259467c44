//! 站点增强
//!
//! 通用遍历之后按页面主机运行的专用处理器。每个处理器用固定的选择器挑选候选元素，
//! 按分类结果（缺省为该子遍历自己的上下文）执行同样的三步查找与替换。
//!
//! 采用注册表模式：
//! - `SiteAugmentor` trait 定义统一接口
//! - `AugmentorRegistry` 管理所有处理器，只运行与主机匹配的那些

mod github;

pub use github::GithubAugmentor;

use markup5ever_rcdom::Handle;

use super::engine::TranslationPass;
use crate::dom::{is_element, node_key, Selector};

/// 站点增强处理器
pub trait SiteAugmentor {
    /// 处理器名称，用于日志
    fn name(&self) -> &str;

    /// 是否适用于该主机
    fn matches_origin(&self, host: &str) -> bool;

    /// 在子树上执行增强，返回替换次数
    fn augment(&self, root: &Handle, pass: &mut TranslationPass<'_>) -> usize;
}

/// 站点增强处理器注册表
pub struct AugmentorRegistry {
    augmentors: Vec<Box<dyn SiteAugmentor>>,
}

impl AugmentorRegistry {
    /// 创建注册表并注册内置处理器
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(GithubAugmentor::new()));
        registry
    }

    pub fn empty() -> Self {
        Self {
            augmentors: Vec::new(),
        }
    }

    pub fn register(&mut self, augmentor: Box<dyn SiteAugmentor>) {
        self.augmentors.push(augmentor);
    }

    pub fn len(&self) -> usize {
        self.augmentors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.augmentors.is_empty()
    }

    /// 运行所有匹配主机的处理器，返回替换总数
    pub fn run(&self, host: &str, root: &Handle, pass: &mut TranslationPass<'_>) -> usize {
        let mut total = 0;
        for augmentor in self.augmentors.iter().filter(|a| a.matches_origin(host)) {
            let count = augmentor.augment(root, pass);
            tracing::debug!("站点增强 {} 完成: {} 处替换", augmentor.name(), count);
            total += count;
        }
        total
    }
}

impl Default for AugmentorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 子树内（含根）匹配任一选择器的元素，按选择器顺序收集并去重
pub(crate) fn select_candidates(root: &Handle, selectors: &[Selector]) -> Vec<Handle> {
    let mut seen = std::collections::HashSet::new();
    let mut candidates = Vec::new();

    for selector in selectors {
        if is_element(root) && selector.matches(root) && seen.insert(node_key(root)) {
            candidates.push(root.clone());
        }
        for element in selector.select_all(root) {
            if seen.insert(node_key(&element)) {
                candidates.push(element);
            }
        }
    }

    candidates
}
