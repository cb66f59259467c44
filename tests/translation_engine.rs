//! 翻译引擎集成测试
//!
//! 覆盖端到端场景、幂等性、上下文优先级与跳过规则

use page_translator::dom::{get_node_attr, inner_html, text_content};
use page_translator::translation::{
    AugmentorRegistry, ContextConfig, ContextMappingDocument, DocumentFormat, EmptyContextPolicy,
    MappingSettings, RuleDocument, TranslationEngine, TranslationEntry,
};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{body, dom, engine, first, GITHUB_MAPPING_JSON, GITHUB_RULES_JSON};

/// 场景 A：无上下文时使用全局翻译
#[test]
fn test_scenario_a_global_exact_match() {
    let mut engine = engine(vec![TranslationEntry::new("Issues", "課題")], Default::default());
    let dom = dom("<span>Issues</span>");
    let root = body(&dom);

    let count = engine.apply_translations(&root);
    assert_eq!(count, 1, "exactly one substitution expected");
    assert_eq!(inner_html(&root), "<span>課題</span>");
}

/// 场景 B：正则规则与捕获组替换
#[test]
fn test_scenario_b_regex_capture() {
    let mut engine = engine(
        vec![TranslationEntry::new(r"^Show (\d+) results$", "$1件の結果を表示").as_regex()],
        Default::default(),
    );
    let dom = dom("<p>Show 42 results</p>");
    let root = body(&dom);

    assert_eq!(engine.apply_translations(&root), 1);
    assert_eq!(text_content(&root), "42件の結果を表示");
}

/// 场景 C：关闭全局回退
#[test]
fn test_scenario_c_global_fallback_disabled() {
    let mapping = ContextMappingDocument::default().with_settings(MappingSettings {
        empty_context: EmptyContextPolicy::Ignore,
        ..Default::default()
    });
    let mut engine = engine(vec![TranslationEntry::new("Settings", "設定")], mapping);
    let dom = dom("<div><span>Settings</span></div>");
    let root = body(&dom);

    assert_eq!(engine.apply_translations(&root), 0);
    assert_eq!(text_content(&root), "Settings");
}

/// 测试幂等性
#[test]
fn test_second_pass_is_a_no_op() {
    let rules = RuleDocument::decode(GITHUB_RULES_JSON.as_bytes(), DocumentFormat::Json).unwrap();
    let mapping = ContextMappingDocument::decode(GITHUB_MAPPING_JSON.as_bytes(), DocumentFormat::Json).unwrap();
    let mut engine = TranslationEngine::from_documents(&rules, &mapping);

    let dom = dom(
        r#"<nav><a class="UnderlineNav-item" href="/o/r">Code</a><a href="/o/r/issues" title="Issues">Issues</a></nav>
           <p>Show 7 results</p><button>Sign in</button>"#,
    );
    let root = body(&dom);

    let augmentors = AugmentorRegistry::empty();
    let first_count = engine.run_pass(&root, &augmentors, None).total();
    let after_first = inner_html(&root);
    assert!(first_count >= 5, "expected several substitutions, got {}", first_count);

    let second_count = engine.run_pass(&root, &augmentors, None).total();
    assert_eq!(second_count, 0, "second pass must not substitute anything");
    assert_eq!(inner_html(&root), after_first);
}

/// 测试上下文优先于全局
#[test]
fn test_context_translation_wins_over_global() {
    let rules = RuleDocument::decode(GITHUB_RULES_JSON.as_bytes(), DocumentFormat::Json).unwrap();
    let mapping = ContextMappingDocument::decode(GITHUB_MAPPING_JSON.as_bytes(), DocumentFormat::Json).unwrap();
    let mut engine = TranslationEngine::from_documents(&rules, &mapping);

    let dom = dom(
        r#"<a class="UnderlineNav-item" href="/o/r">Code</a>
           <a class="UnderlineNav-item" href="/u?tab=repositories">Code</a>
           <div>Code</div>"#,
    );
    let root = body(&dom);
    engine.apply_translations(&root);

    let texts: Vec<String> = page_translator::dom::find_nodes(&root, &["a"])
        .iter()
        .map(text_content)
        .collect();
    assert_eq!(texts, vec!["コード", "ソースコード"], "excluded tab falls back to global");
    assert_eq!(text_content(&first(&root, "div")), "ソースコード");
}

/// 测试首尾空白保留
#[test]
fn test_whitespace_padding_is_preserved() {
    let mut engine = engine(vec![TranslationEntry::new("Issues", "課題")], Default::default());
    let dom = dom("<span>  Issues  </span><span>\n\tIssues\n</span>");
    let root = body(&dom);

    assert_eq!(engine.apply_translations(&root), 2);
    assert_eq!(inner_html(&root), "<span>  課題  </span><span>\n\t課題\n</span>");
}

/// 测试正则规则按顺序只应用第一个
#[test]
fn test_regex_first_match_wins() {
    let mut engine = engine(
        vec![
            TranslationEntry::new(r"(\d+) stars", "$1 スター").as_regex(),
            TranslationEntry::new(r"スター", "星").as_regex(),
            TranslationEntry::new(r"\d+", "N").as_regex(),
        ],
        Default::default(),
    );
    let dom = dom("<span>12 stars</span>");
    let root = body(&dom);

    assert_eq!(engine.apply_translations(&root), 1);
    assert_eq!(text_content(&root), "12 スター");
}

/// 测试空白折叠键
#[test]
fn test_collapsed_whitespace_keys_match_both_ways() {
    let mut engine = engine(
        vec![
            TranslationEntry::new("Pull  requests", "プルリクエスト"),
            TranslationEntry::new("New issue", "新しい課題"),
        ],
        Default::default(),
    );
    let dom = dom("<span>Pull requests</span><span>New   issue</span>");
    let root = body(&dom);

    assert_eq!(engine.apply_translations(&root), 2);
    assert_eq!(text_content(&root), "プルリクエスト新しい課題");
}

/// 测试跳过的元素不会被修改
#[test]
fn test_skip_tags_are_never_altered() {
    let mut engine = engine(vec![TranslationEntry::new("Issues", "課題")], Default::default());
    let dom = dom(
        r#"<div><script>Issues</script><style>Issues</style>
           <span data-no-translate>Issues</span><span class="notranslate">Issues</span>
           <span>Issues</span></div>"#,
    );
    let root = body(&dom);

    assert_eq!(engine.apply_translations(&root), 1);
    let html = inner_html(&root);
    assert_eq!(html.matches("Issues").count(), 4, "skipped nodes keep the source text: {}", html);
}

/// 测试属性翻译与文本镜像
#[test]
fn test_attributes_are_translated_and_mirrored() {
    let mapping = ContextMappingDocument::default()
        .with_context("リポジトリタブ", ContextConfig::new(["[data-tab-item]"]));
    let mut engine = engine(
        vec![
            TranslationEntry::new("Code", "コード").in_context("リポジトリタブ"),
            TranslationEntry::new("Avatar", "アバター"),
        ],
        mapping,
    );
    let dom = dom(
        r#"<a data-tab-item="code" aria-label="Code" data-content="Code"><span>Code</span></a>
           <img alt="Avatar">"#,
    );
    let root = body(&dom);
    engine.apply_translations(&root);

    let a = first(&root, "a");
    assert_eq!(get_node_attr(&a, "aria-label").as_deref(), Some("コード"));
    assert_eq!(get_node_attr(&a, "data-content").as_deref(), Some("コード"));
    assert_eq!(text_content(&a), "コード");
    assert_eq!(get_node_attr(&first(&root, "img"), "alt").as_deref(), Some("アバター"));
}

/// 测试内置映射下仓库标签栏里的链接取上下文译文，其它位置取全局译文
#[test]
fn test_builtin_mapping_gives_repository_tabs_their_context() {
    let mut engine = engine(
        vec![
            TranslationEntry::new("Code", "コード").in_context("リポジトリタブ"),
            TranslationEntry::new("Code", "ソースコード"),
        ],
        ContextMappingDocument::github_default(),
    );
    let dom = dom(
        r#"<nav aria-label="Repository" class="UnderlineNav"><ul>
             <li><a class="UnderlineNav-item" href="/o/r">Code</a></li>
           </ul></nav>
           <p>Code</p>"#,
    );
    let root = body(&dom);

    let report = engine.run_pass(&root, &AugmentorRegistry::new(), Some("github.com"));
    assert_eq!(report.substitutions, 2);
    assert_eq!(report.augmented, 0, "the tab pass leaves finished text alone");
    assert_eq!(text_content(&first(&root, "a")), "コード");
    assert_eq!(text_content(&first(&root, "p")), "ソースコード");
}

/// 测试不刷新页面的复位
#[test]
fn test_restore_returns_the_original_document() {
    let rules = RuleDocument::decode(GITHUB_RULES_JSON.as_bytes(), DocumentFormat::Json).unwrap();
    let mut engine = TranslationEngine::from_documents(&rules, &ContextMappingDocument::github_default());
    let dom = dom(
        r#"<header><a>Sign in</a></header><main><span title="Issues">Issues</span><p>Show 3 results</p></main>"#,
    );
    let root = body(&dom);
    let original = inner_html(&root);

    let report = engine.run_pass(&root, &AugmentorRegistry::new(), Some("github.com"));
    assert!(report.total() >= 4);
    assert_ne!(inner_html(&root), original);

    engine.restore();
    assert_eq!(inner_html(&root), original);
}

/// 测试 TOML 规则文档
#[test]
fn test_toml_rule_document() {
    let toml = r#"
        [[translations]]
        original = "Watch"
        translated = "ウォッチ"

        [[translations]]
        original = "^(\\d+) forks?$"
        translated = "$1 フォーク"
        regex = true
    "#;
    let rules = RuleDocument::decode(toml.as_bytes(), DocumentFormat::Toml).unwrap();
    let mut engine = TranslationEngine::from_documents(&rules, &Default::default());
    let dom = dom("<span>Watch</span><span>1 fork</span>");
    let root = body(&dom);

    assert_eq!(engine.apply_translations(&root), 2);
    assert_eq!(text_content(&root), "ウォッチ1 フォーク");
}
