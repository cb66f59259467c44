//! CSS 选择器
//!
//! 上下文映射文档用 CSS 选择器描述页面区域。本模块用 cssparser 对选择器做词法切分，
//! 再编译成可在 rcdom 元素上直接匹配的结构。
//!
//! # 支持范围
//!
//! - 类型选择器、通配符、`#id`、`.class`
//! - 属性选择器：存在性及 `=`、`~=`、`|=`、`^=`、`$=`、`*=`，支持 `i` 标志
//! - 组合符：后代、`>`、`+`、`~`，以及逗号分隔的选择器列表
//! - 伪类：`:not()`、`:is()`、`:where()`、`:first-child`、`:last-child`、
//!   `:only-child`、`:empty`、`:root`
//!
//! 其它语法（`:has()`、`:nth-child()`、伪元素、命名空间等）在编译时报告为
//! [`SelectorError::Unsupported`]，由调用方按单个选择器跳过。

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use cssparser::{ParseError, Parser, ParserInput, Token};
use markup5ever_rcdom::{Handle, NodeData};
use thiserror::Error;

use super::node::{ancestors, get_node_attr, get_node_name, get_parent_element, get_parent_node};

/// 选择器编译错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// 语法错误
    #[error("选择器语法错误 `{selector}`: {reason}")]
    Syntax { selector: String, reason: String },

    /// 语法合法但当前引擎不支持
    #[error("不支持的选择器 `{selector}`: {feature}")]
    Unsupported { selector: String, feature: String },
}

/// 编译后的选择器（逗号分隔的选择器列表）
#[derive(Clone)]
pub struct Selector {
    source: String,
    list: Vec<Complex>,
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.source).finish()
    }
}

impl Selector {
    /// 编译选择器字符串
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let mut input = ParserInput::new(source);
        let mut parser = Parser::new(&mut input);
        let tokens = lex(&mut parser).map_err(|err| SelectorError::Syntax {
            selector: source.to_string(),
            reason: format!("{:?}", err.kind),
        })?;

        let list = TokenStream::new(&tokens, source).parse_list()?;

        Ok(Self {
            source: source.to_string(),
            list,
        })
    }

    /// 原始选择器文本
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 元素是否匹配；非元素节点永远不匹配
    pub fn matches(&self, element: &Handle) -> bool {
        get_node_name(element).is_some() && matches_any(&self.list, element)
    }

    /// 查找 `root` 的所有匹配后代（不含 `root` 自身），按文档顺序
    pub fn select_all(&self, root: &Handle) -> Vec<Handle> {
        let mut found = Vec::new();
        for child in root.children.borrow().iter() {
            self.collect(child, &mut found);
        }
        found
    }

    fn collect(&self, node: &Handle, found: &mut Vec<Handle>) {
        if self.matches(node) {
            found.push(node.clone());
        }
        for child in node.children.borrow().iter() {
            self.collect(child, found);
        }
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// 批量编译选择器，无效的选择器记录日志后跳过
pub fn compile_selectors<S: AsRef<str>>(sources: &[S], owner: &str) -> Vec<Selector> {
    sources
        .iter()
        .filter_map(|source| match Selector::parse(source.as_ref()) {
            Ok(selector) => Some(selector),
            Err(err) => {
                tracing::warn!("跳过选择器（{}）: {}", owner, err);
                None
            }
        })
        .collect()
}

// ============================================================================
// 词法
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Hash(String),
    Delim(char),
    Colon,
    Comma,
    Space,
    Str(String),
    Op(AttrOp),
    Function(String, Vec<Tok>),
    Bracket(Vec<Tok>),
    Other(String),
}

fn lex<'i>(parser: &mut Parser<'i, '_>) -> Result<Vec<Tok>, ParseError<'i, SelectorError>> {
    let mut tokens = Vec::new();

    loop {
        let token = match parser.next_including_whitespace() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };

        let tok = match token {
            Token::Ident(value) => Tok::Ident(value.to_string()),
            Token::IDHash(value) | Token::Hash(value) => Tok::Hash(value.to_string()),
            Token::Delim(value) => Tok::Delim(value),
            Token::Colon => Tok::Colon,
            Token::Comma => Tok::Comma,
            Token::WhiteSpace(_) => Tok::Space,
            Token::QuotedString(value) => Tok::Str(value.to_string()),
            Token::IncludeMatch => Tok::Op(AttrOp::Includes),
            Token::DashMatch => Tok::Op(AttrOp::DashMatch),
            Token::PrefixMatch => Tok::Op(AttrOp::Prefix),
            Token::SuffixMatch => Tok::Op(AttrOp::Suffix),
            Token::SubstringMatch => Tok::Op(AttrOp::Substring),
            Token::Function(name) => {
                let name = name.to_ascii_lowercase();
                let inner = parser.parse_nested_block(lex)?;
                Tok::Function(name, inner)
            }
            Token::SquareBracketBlock => Tok::Bracket(parser.parse_nested_block(lex)?),
            Token::ParenthesisBlock | Token::CurlyBracketBlock => {
                parser.parse_nested_block(lex)?;
                Tok::Other("块".to_string())
            }
            other => Tok::Other(format!("{:?}", other)),
        };
        tokens.push(tok);
    }

    Ok(tokens)
}

// ============================================================================
// 语法
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

#[derive(Debug, Clone)]
enum Simple {
    Id(String),
    Class(String),
    Attr {
        name: String,
        test: Option<(AttrOp, String)>,
        ignore_case: bool,
    },
    FirstChild,
    LastChild,
    OnlyChild,
    Empty,
    Root,
    Not(Vec<Complex>),
    Is(Vec<Complex>),
}

#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    simples: Vec<Simple>,
}

/// 复合选择器序列，`combinators[i]` 连接 `compounds[i]` 与 `compounds[i + 1]`
#[derive(Debug, Clone)]
struct Complex {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

struct TokenStream<'a> {
    tokens: &'a [Tok],
    pos: usize,
    source: &'a str,
}

impl<'a> TokenStream<'a> {
    fn new(tokens: &'a [Tok], source: &'a str) -> Self {
        Self {
            tokens,
            pos: 0,
            source,
        }
    }

    fn peek(&self) -> Option<&'a Tok> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&'a Tok> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn skip_spaces(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(Tok::Space)) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn syntax(&self, reason: impl Into<String>) -> SelectorError {
        SelectorError::Syntax {
            selector: self.source.to_string(),
            reason: reason.into(),
        }
    }

    fn unsupported(&self, feature: impl Into<String>) -> SelectorError {
        SelectorError::Unsupported {
            selector: self.source.to_string(),
            feature: feature.into(),
        }
    }

    fn parse_list(&mut self) -> Result<Vec<Complex>, SelectorError> {
        let mut list = Vec::new();

        loop {
            self.skip_spaces();
            list.push(self.parse_complex()?);
            self.skip_spaces();
            match self.bump() {
                None => break,
                Some(Tok::Comma) => continue,
                Some(other) => return Err(self.syntax(format!("意外的记号 {:?}", other))),
            }
        }

        Ok(list)
    }

    fn parse_complex(&mut self) -> Result<Complex, SelectorError> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_space = self.skip_spaces();
            let combinator = match self.peek() {
                None | Some(Tok::Comma) => break,
                Some(Tok::Delim('>')) => Combinator::Child,
                Some(Tok::Delim('+')) => Combinator::Adjacent,
                Some(Tok::Delim('~')) => Combinator::Sibling,
                Some(_) if had_space => Combinator::Descendant,
                Some(other) => return Err(self.syntax(format!("意外的记号 {:?}", other))),
            };
            if combinator != Combinator::Descendant {
                self.pos += 1;
                self.skip_spaces();
            }
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }

        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let mut has_any = false;

        match self.peek() {
            Some(Tok::Ident(name)) => {
                compound.tag = Some(name.to_ascii_lowercase());
                self.pos += 1;
                has_any = true;
            }
            Some(Tok::Delim('*')) => {
                self.pos += 1;
                has_any = true;
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some(Tok::Hash(id)) => {
                    self.pos += 1;
                    compound.simples.push(Simple::Id(id.clone()));
                }
                Some(Tok::Delim('.')) => {
                    self.pos += 1;
                    match self.bump() {
                        Some(Tok::Ident(class)) => compound.simples.push(Simple::Class(class.clone())),
                        _ => return Err(self.syntax("`.` 之后缺少类名")),
                    }
                }
                Some(Tok::Bracket(inner)) => {
                    self.pos += 1;
                    compound.simples.push(self.parse_attr(inner)?);
                }
                Some(Tok::Colon) => {
                    self.pos += 1;
                    compound.simples.push(self.parse_pseudo()?);
                }
                Some(Tok::Delim('|')) => return Err(self.unsupported("命名空间")),
                _ => break,
            }
            has_any = true;
        }

        if !has_any {
            return Err(match self.peek() {
                Some(Tok::Other(other)) => self.unsupported(other.clone()),
                Some(other) => self.syntax(format!("意外的记号 {:?}", other)),
                None => self.syntax("选择器为空"),
            });
        }

        Ok(compound)
    }

    fn parse_attr(&self, inner: &[Tok]) -> Result<Simple, SelectorError> {
        let mut stream = TokenStream::new(inner, self.source);
        stream.skip_spaces();

        let name = match stream.bump() {
            Some(Tok::Ident(name)) => name.to_ascii_lowercase(),
            Some(Tok::Delim('|')) => return Err(self.unsupported("命名空间属性")),
            _ => return Err(self.syntax("属性选择器缺少属性名")),
        };
        if matches!(stream.peek(), Some(Tok::Delim('|'))) {
            return Err(self.unsupported("命名空间属性"));
        }

        stream.skip_spaces();
        let op = match stream.bump() {
            None => {
                return Ok(Simple::Attr {
                    name,
                    test: None,
                    ignore_case: false,
                })
            }
            Some(Tok::Delim('=')) => AttrOp::Equals,
            Some(Tok::Op(op)) => *op,
            Some(other) => return Err(self.syntax(format!("无效的属性运算符 {:?}", other))),
        };

        stream.skip_spaces();
        let value = match stream.bump() {
            Some(Tok::Ident(value)) | Some(Tok::Str(value)) => value.clone(),
            _ => return Err(self.syntax("属性选择器缺少值")),
        };

        stream.skip_spaces();
        let ignore_case = match stream.bump() {
            None => false,
            Some(Tok::Ident(flag)) if flag.eq_ignore_ascii_case("i") => true,
            Some(Tok::Ident(flag)) if flag.eq_ignore_ascii_case("s") => false,
            Some(other) => return Err(self.syntax(format!("意外的记号 {:?}", other))),
        };
        stream.skip_spaces();
        if stream.peek().is_some() {
            return Err(self.syntax("属性选择器末尾存在多余内容"));
        }

        Ok(Simple::Attr {
            name,
            test: Some((op, value)),
            ignore_case,
        })
    }

    fn parse_pseudo(&mut self) -> Result<Simple, SelectorError> {
        match self.bump() {
            Some(Tok::Ident(name)) => match name.to_ascii_lowercase().as_str() {
                "first-child" => Ok(Simple::FirstChild),
                "last-child" => Ok(Simple::LastChild),
                "only-child" => Ok(Simple::OnlyChild),
                "empty" => Ok(Simple::Empty),
                "root" => Ok(Simple::Root),
                other => Err(self.unsupported(format!(":{}", other))),
            },
            Some(Tok::Function(name, inner)) => {
                let list = match name.as_str() {
                    "not" | "is" | "where" => TokenStream::new(inner, self.source).parse_list()?,
                    other => return Err(self.unsupported(format!(":{}()", other))),
                };
                if name == "not" {
                    Ok(Simple::Not(list))
                } else {
                    Ok(Simple::Is(list))
                }
            }
            Some(Tok::Colon) => Err(self.unsupported("伪元素")),
            _ => Err(self.syntax("`:` 之后缺少伪类名")),
        }
    }
}

// ============================================================================
// 匹配
// ============================================================================

fn matches_any(list: &[Complex], element: &Handle) -> bool {
    list.iter().any(|complex| {
        let last = complex.compounds.len() - 1;
        matches_at(complex, last, element)
    })
}

fn matches_at(complex: &Complex, index: usize, element: &Handle) -> bool {
    if !matches_compound(&complex.compounds[index], element) {
        return false;
    }
    if index == 0 {
        return true;
    }

    match complex.combinators[index - 1] {
        Combinator::Child => {
            get_parent_element(element).is_some_and(|parent| matches_at(complex, index - 1, &parent))
        }
        Combinator::Descendant => {
            ancestors(element).any(|ancestor| matches_at(complex, index - 1, &ancestor))
        }
        Combinator::Adjacent => preceding_elements(element)
            .last()
            .is_some_and(|sibling| matches_at(complex, index - 1, sibling)),
        Combinator::Sibling => preceding_elements(element)
            .iter()
            .any(|sibling| matches_at(complex, index - 1, sibling)),
    }
}

fn matches_compound(compound: &Compound, element: &Handle) -> bool {
    let Some(name) = get_node_name(element) else {
        return false;
    };
    if let Some(tag) = &compound.tag {
        if !name.eq_ignore_ascii_case(tag) {
            return false;
        }
    }

    compound.simples.iter().all(|simple| matches_simple(simple, element))
}

fn matches_simple(simple: &Simple, element: &Handle) -> bool {
    match simple {
        Simple::Id(id) => get_node_attr(element, "id").is_some_and(|value| &value == id),
        Simple::Class(class) => get_node_attr(element, "class")
            .is_some_and(|value| value.split_whitespace().any(|c| c == class)),
        Simple::Attr {
            name,
            test,
            ignore_case,
        } => match (get_node_attr(element, name), test) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some((op, expected))) => {
                if *ignore_case {
                    attr_matches(*op, &actual.to_lowercase(), &expected.to_lowercase())
                } else {
                    attr_matches(*op, &actual, expected)
                }
            }
        },
        Simple::FirstChild => preceding_elements(element).is_empty(),
        Simple::LastChild => following_elements(element).is_empty(),
        Simple::OnlyChild => {
            preceding_elements(element).is_empty() && following_elements(element).is_empty()
        }
        Simple::Empty => element.children.borrow().iter().all(|child| match &child.data {
            NodeData::Text { contents } => contents.borrow().is_empty(),
            NodeData::Comment { .. } | NodeData::ProcessingInstruction { .. } => true,
            _ => false,
        }),
        Simple::Root => get_parent_node(element)
            .is_some_and(|parent| matches!(parent.data, NodeData::Document)),
        Simple::Not(list) => !matches_any(list, element),
        Simple::Is(list) => matches_any(list, element),
    }
}

fn attr_matches(op: AttrOp, actual: &str, expected: &str) -> bool {
    match op {
        AttrOp::Equals => actual == expected,
        AttrOp::Includes => {
            !expected.is_empty() && actual.split_whitespace().any(|word| word == expected)
        }
        AttrOp::DashMatch => {
            actual == expected
                || actual
                    .strip_prefix(expected)
                    .is_some_and(|rest| rest.starts_with('-'))
        }
        AttrOp::Prefix => !expected.is_empty() && actual.starts_with(expected),
        AttrOp::Suffix => !expected.is_empty() && actual.ends_with(expected),
        AttrOp::Substring => !expected.is_empty() && actual.contains(expected),
    }
}

/// 同级中位于 `element` 之前的元素，按文档顺序
fn preceding_elements(element: &Handle) -> Vec<Handle> {
    sibling_elements(element).0
}

fn following_elements(element: &Handle) -> Vec<Handle> {
    sibling_elements(element).1
}

fn sibling_elements(element: &Handle) -> (Vec<Handle>, Vec<Handle>) {
    let Some(parent) = get_parent_node(element) else {
        return (Vec::new(), Vec::new());
    };

    let children = parent.children.borrow();
    let mut before = Vec::new();
    let mut after = Vec::new();
    let mut seen_self = false;

    for child in children.iter() {
        if Rc::ptr_eq(child, element) {
            seen_self = true;
        } else if get_node_name(child).is_some() {
            if seen_self {
                after.push(child.clone());
            } else {
                before.push(child.clone());
            }
        }
    }

    (before, after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{find_nodes, html_to_dom};
    use markup5ever_rcdom::RcDom;

    fn dom(html: &str) -> RcDom {
        html_to_dom(html.as_bytes(), "utf-8")
    }

    fn by_id(dom: &RcDom, id: &str) -> Handle {
        Selector::parse(&format!("#{}", id))
            .unwrap()
            .select_all(&dom.document)
            .pop()
            .unwrap_or_else(|| panic!("no element with id {}", id))
    }

    #[test]
    fn matches_type_class_and_id() {
        let dom = dom(r#"<nav id="main" class="AppHeader-globalBar js-global"><a id="x" class="Link">Home</a></nav>"#);
        let nav = by_id(&dom, "main");

        assert!(Selector::parse("nav").unwrap().matches(&nav));
        assert!(Selector::parse(".AppHeader-globalBar").unwrap().matches(&nav));
        assert!(Selector::parse("nav.js-global#main").unwrap().matches(&nav));
        assert!(!Selector::parse("nav.missing").unwrap().matches(&nav));
        assert!(Selector::parse("*").unwrap().matches(&nav));
    }

    #[test]
    fn matches_combinators() {
        let dom = dom(r#"<div class="outer"><ul><li id="a">A</li><li id="b">B</li><li id="c">C</li></ul></div>"#);
        let b = by_id(&dom, "b");
        let c = by_id(&dom, "c");

        assert!(Selector::parse(".outer li").unwrap().matches(&b));
        assert!(Selector::parse("ul > li").unwrap().matches(&b));
        assert!(!Selector::parse(".outer > li").unwrap().matches(&b));
        assert!(Selector::parse("#a + li").unwrap().matches(&b));
        assert!(!Selector::parse("#a + li").unwrap().matches(&c));
        assert!(Selector::parse("#a ~ li").unwrap().matches(&c));
    }

    #[test]
    fn matches_attribute_operators() {
        let dom = dom(r#"<a id="t" href="/octo/repo?tab=repositories" data-tab-item="i1code-tab" lang="en-US" class="a b">x</a>"#);
        let a = by_id(&dom, "t");

        for source in [
            "[href]",
            "[href$='?tab=repositories']",
            "[href^=\"/octo\"]",
            "[data-tab-item*=code]",
            "[class~=b]",
            "[lang|=en]",
            "[lang='EN-us' i]",
        ] {
            assert!(Selector::parse(source).unwrap().matches(&a), "{} should match", source);
        }
        assert!(!Selector::parse("[lang='EN-us']").unwrap().matches(&a));
        assert!(!Selector::parse("[title]").unwrap().matches(&a));
    }

    #[test]
    fn matches_structural_pseudo_classes() {
        let dom = dom(r#"<ul><li id="a">A</li><li id="b"></li></ul><p id="only"><span id="s">x</span></p>"#);

        assert!(Selector::parse("li:first-child").unwrap().matches(&by_id(&dom, "a")));
        assert!(Selector::parse("li:last-child").unwrap().matches(&by_id(&dom, "b")));
        assert!(Selector::parse("li:empty").unwrap().matches(&by_id(&dom, "b")));
        assert!(Selector::parse("span:only-child").unwrap().matches(&by_id(&dom, "s")));
        assert!(Selector::parse("li:not(#a)").unwrap().matches(&by_id(&dom, "b")));
        assert!(!Selector::parse("li:not(#a, #b)").unwrap().matches(&by_id(&dom, "b")));
        assert!(Selector::parse(":is(p, div) > span").unwrap().matches(&by_id(&dom, "s")));

        let html = find_nodes(&dom.document, &["html"]).pop().unwrap();
        assert!(Selector::parse(":root").unwrap().matches(&html));
    }

    #[test]
    fn selector_list_matches_any() {
        let dom = dom(r#"<footer id="f"></footer>"#);
        assert!(Selector::parse("header, footer").unwrap().matches(&by_id(&dom, "f")));
    }

    #[test]
    fn rejects_unsupported_and_invalid() {
        assert!(matches!(
            Selector::parse("div:has(> a)"),
            Err(SelectorError::Unsupported { .. })
        ));
        assert!(matches!(
            Selector::parse("li:nth-child(2)"),
            Err(SelectorError::Unsupported { .. })
        ));
        assert!(matches!(
            Selector::parse("a::before"),
            Err(SelectorError::Unsupported { .. })
        ));
        assert!(matches!(Selector::parse("div >"), Err(SelectorError::Syntax { .. })));
        assert!(matches!(Selector::parse(""), Err(SelectorError::Syntax { .. })));
        assert!(matches!(Selector::parse("[=x]"), Err(SelectorError::Syntax { .. })));
    }

    #[test]
    fn compile_selectors_skips_bad_entries() {
        let compiled = compile_selectors(&["nav", "div:has(a)", "footer a"], "测试");
        let sources: Vec<&str> = compiled.iter().map(Selector::source).collect();
        assert_eq!(sources, vec!["nav", "footer a"]);
    }

    #[test]
    fn select_all_returns_document_order() {
        let dom = dom(r#"<div><a id="1">a</a><p><a id="2">b</a></p></div><a id="3">c</a>"#);
        let found = Selector::parse("a").unwrap().select_all(&dom.document);
        let ids: Vec<String> = found
            .iter()
            .filter_map(|n| get_node_attr(n, "id"))
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }
}
