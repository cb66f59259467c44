//! GitHub 专用增强
//!
//! 标签栏、页头、徽章等区域里常常有上下文映射覆盖不到的元素，例如个人主页标签
//! 带 `?tab=` 查询而被仓库标签上下文排除。这里按区域挑选候选元素，并在分类失败时使用
//! 该区域对应的上下文。

use markup5ever_rcdom::Handle;

use super::{select_candidates, SiteAugmentor};
use crate::dom::{compile_selectors, get_node_attr, Selector};
use crate::translation::config::constants;
use crate::translation::engine::TranslationPass;

const TAB_SELECTORS: &[&str] = &[
    ".UnderlineNav-item",
    "[data-tab-item]",
    "nav[aria-label='Repository'] a",
    "nav[aria-label='User profile'] a",
];

const HEADER_SELECTORS: &[&str] = &[
    ".AppHeader-context-item",
    ".AppHeader a",
    ".AppHeader button",
    ".Header-link",
];

const BADGE_SELECTORS: &[&str] = &["[data-content]"];

const PROFILE_SELECTORS: &[&str] = &[
    ".vcard-names .p-nickname",
    ".js-profile-editable-area h2",
    ".js-pinned-items-reorder-container h2",
    ".achievement-card h3",
    "h2.h4",
];

const FOOTER_SELECTORS: &[&str] = &[
    "footer a",
    ".footer a",
    "[data-analytics-event*='Footer']",
];

const ACTION_LIST_SELECTORS: &[&str] = &[
    ".ActionListItem-label",
    "action-list .ActionListContent",
    "[role='menuitem']",
];

/// 一个子遍历：候选选择器与缺省上下文
struct SubPass {
    name: &'static str,
    selectors: Vec<Selector>,
    fallback: Fallback,
}

fn sub_pass(name: &'static str, selectors: &[&str], fallback: Fallback) -> SubPass {
    SubPass {
        name,
        selectors: compile_selectors(selectors, name),
        fallback,
    }
}

enum Fallback {
    Fixed(&'static str),
    /// 标签栏：由链接的查询参数决定
    TabBar,
}

impl Fallback {
    fn context_for(&self, element: &Handle) -> &'static str {
        match self {
            Fallback::Fixed(context) => *context,
            Fallback::TabBar => tab_context(element),
        }
    }
}

/// `?tab=...` 形式的链接属于个人主页标签，其余属于仓库标签
fn tab_context(element: &Handle) -> &'static str {
    let has_tab_query = get_node_attr(element, "href")
        .and_then(|href| {
            let (_, query) = href.split_once('?')?;
            let query = query.split('#').next().unwrap_or(query);
            Some(url::form_urlencoded::parse(query.as_bytes()).any(|(key, _)| key == "tab"))
        })
        .unwrap_or(false);

    if has_tab_query {
        constants::PROFILE_TAB_CONTEXT
    } else {
        constants::REPO_TAB_CONTEXT
    }
}

/// GitHub 站点增强处理器
pub struct GithubAugmentor {
    passes: Vec<SubPass>,
}

impl GithubAugmentor {
    pub fn new() -> Self {
        Self {
            passes: vec![
                sub_pass("tab-bar", TAB_SELECTORS, Fallback::TabBar),
                sub_pass(
                    "header",
                    HEADER_SELECTORS,
                    Fallback::Fixed(constants::HEADER_CONTEXT),
                ),
                sub_pass(
                    "badges",
                    BADGE_SELECTORS,
                    Fallback::Fixed(constants::REPO_TAB_CONTEXT),
                ),
                sub_pass(
                    "profile",
                    PROFILE_SELECTORS,
                    Fallback::Fixed(constants::PROFILE_CONTEXT),
                ),
                sub_pass(
                    "footer",
                    FOOTER_SELECTORS,
                    Fallback::Fixed(constants::FOOTER_CONTEXT),
                ),
                sub_pass(
                    "action-list",
                    ACTION_LIST_SELECTORS,
                    Fallback::Fixed(constants::ACTION_LIST_CONTEXT),
                ),
            ],
        }
    }
}

impl Default for GithubAugmentor {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteAugmentor for GithubAugmentor {
    fn name(&self) -> &str {
        "github"
    }

    fn matches_origin(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        host == "github.com"
            || host.ends_with(".github.com")
            || host == "raw.githubusercontent.com"
    }

    fn augment(&self, root: &Handle, pass: &mut TranslationPass<'_>) -> usize {
        let mut total = 0;

        for sub_pass in &self.passes {
            let mut count = 0;
            for element in select_candidates(root, &sub_pass.selectors) {
                let fallback = sub_pass.fallback.context_for(&element);
                count += pass.translate_candidate(&element, fallback);
            }
            if count > 0 {
                tracing::trace!("子遍历 {}: {} 处替换", sub_pass.name, count);
            }
            total += count;
        }

        total
    }
}
