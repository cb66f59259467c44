// 集成测试公共模块
//
// 提供测试页面、规则文档夹具和 DOM 辅助函数

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use markup5ever_rcdom::{Handle, RcDom};

use page_translator::dom::{find_nodes, html_to_dom, text_content};
use page_translator::translation::{
    ContextMappingDocument, KeywordTable, PageHost, RuleDocument, TranslationEngine,
    TranslationEntry,
};

/// 规则文档夹具
pub const GITHUB_RULES_JSON: &str = r#"{
    "version": "1.2.0",
    "translations": [
        { "original": "Issues", "translated": "課題" },
        { "original": "Code", "translated": "コード", "context": "リポジトリタブ" },
        { "original": "Code", "translated": "ソースコード" },
        { "original": "Pull  requests", "translated": "プルリクエスト" },
        { "original": "Overview", "translated": "概要", "context": "プロフィールタブ" },
        { "original": "^Show (\\d+) results$", "translated": "$1件の結果を表示", "regex": true },
        { "original": "", "translated": "空" }
    ]
}"#;

/// 上下文映射夹具
pub const GITHUB_MAPPING_JSON: &str = r#"{
    "settings": { "unknown_context": "ignore", "empty_context": "global" },
    "contexts": {
        "リポジトリタブ": {
            "selectors": [".UnderlineNav-item", "[data-tab-item]"],
            "exclude_selectors": "[href*='?tab=']"
        },
        "フッター": { "selectors": "footer" }
    },
    "regex_contexts": {}
}"#;

/// 测试页面
pub struct TestPage {
    dom: RcDom,
    url: RefCell<String>,
    reloads: Cell<usize>,
}

impl TestPage {
    pub fn new(html: &str, url: &str) -> Rc<Self> {
        Rc::new(Self {
            dom: html_to_dom(html.as_bytes(), "utf-8"),
            url: RefCell::new(url.to_string()),
            reloads: Cell::new(0),
        })
    }

    pub fn set_url(&self, url: &str) {
        *self.url.borrow_mut() = url.to_string();
    }

    pub fn reloads(&self) -> usize {
        self.reloads.get()
    }

    pub fn body(&self) -> Handle {
        body(&self.dom)
    }

    pub fn text(&self) -> String {
        text_content(&self.body())
    }
}

impl PageHost for TestPage {
    fn document(&self) -> Handle {
        self.dom.document.clone()
    }

    fn url(&self) -> String {
        self.url.borrow().clone()
    }

    fn reload(&self) {
        self.reloads.set(self.reloads.get() + 1);
    }
}

/// DOM 辅助函数
pub fn dom(html: &str) -> RcDom {
    html_to_dom(html.as_bytes(), "utf-8")
}

pub fn body(dom: &RcDom) -> Handle {
    find_nodes(&dom.document, &["html", "body"])
        .pop()
        .expect("parsed document has a body")
}

pub fn first(root: &Handle, name: &str) -> Handle {
    find_nodes(root, &[name])
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("no <{}> element", name))
}

/// 不带关键词表的引擎
pub fn engine(entries: Vec<TranslationEntry>, mapping: ContextMappingDocument) -> TranslationEngine {
    TranslationEngine::from_documents(&RuleDocument::new(entries), &mapping)
        .with_keywords(KeywordTable::empty())
}
