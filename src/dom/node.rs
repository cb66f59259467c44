use std::cell::RefCell;
use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::tendril::{format_tendril, TendrilSink};
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> RcDom {
    let s = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => encoding.decode(data).0.into_owned(),
        None => String::from_utf8_lossy(data).into_owned(),
    };

    // 从内存切片读取不会产生 IO 错误
    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
        .unwrap_or_default()
}

/// 将 HTML 片段解析为一组游离节点（没有父节点），用于模拟动态插入的内容
pub fn parse_fragment_nodes(html: &str) -> Vec<Handle> {
    let dom = html_to_dom(html.as_bytes(), "utf-8");
    let Some(body) = find_nodes(&dom.document, &["html", "body"]).into_iter().next() else {
        return Vec::new();
    };

    let children: Vec<Handle> = body.children.borrow_mut().drain(..).collect();
    for child in &children {
        child.parent.set(None);
    }
    children
}

/// 查找指定路径的DOM节点
pub fn find_nodes(node: &Handle, node_names: &[&str]) -> Vec<Handle> {
    let mut found_nodes = Vec::new();
    let Some((&node_name, rest)) = node_names.split_first() else {
        return found_nodes;
    };

    let is_match = get_node_name(node) == Some(node_name);

    if is_match && rest.is_empty() {
        found_nodes.push(node.clone());
    } else if is_match {
        found_nodes.append(&mut find_nodes(node, rest));
        return found_nodes;
    }

    for child_node in node.children.borrow().iter() {
        found_nodes.append(&mut find_nodes(child_node, node_names));
    }

    found_nodes
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// 判断节点是否带有指定属性
pub fn has_node_attr(node: &Handle, attr_name: &str) -> bool {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            attrs.borrow().iter().any(|attr| &*attr.name.local == attr_name)
        }
        _ => false,
    }
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 设置节点属性，`None` 表示删除该属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let position = attrs_mut
            .iter()
            .position(|attr| &*attr.name.local == attr_name);

        match (position, attr_value) {
            (Some(i), Some(value)) => {
                attrs_mut[i].value.clear();
                attrs_mut[i].value.push_slice(&value);
            }
            (Some(i), None) => {
                attrs_mut.remove(i);
            }
            (None, Some(value)) => {
                attrs_mut.push(Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                    value: format_tendril!("{}", value),
                });
            }
            (None, None) => {}
        }
    }
}

/// 是否为元素节点
pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

/// 获取父节点
///
/// rcdom 把父指针存放在 `Cell` 中，读取时必须先取出再放回，否则会切断父子关系。
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|weak| weak.upgrade());
    child.parent.set(weak);
    parent
}

/// 获取父元素（父节点不是元素时返回 `None`）
pub fn get_parent_element(child: &Handle) -> Option<Handle> {
    get_parent_node(child).filter(is_element)
}

/// 祖先元素迭代器，由近及远
pub struct Ancestors {
    next: Option<Handle>,
}

impl Iterator for Ancestors {
    type Item = Handle;

    fn next(&mut self) -> Option<Handle> {
        let current = self.next.take()?;
        self.next = get_parent_element(&current);
        Some(current)
    }
}

/// 从父元素开始向上遍历祖先元素
pub fn ancestors(node: &Handle) -> Ancestors {
    Ancestors {
        next: get_parent_element(node),
    }
}

/// 元素子节点
pub fn element_children(node: &Handle) -> Vec<Handle> {
    node.children
        .borrow()
        .iter()
        .filter(|child| is_element(child))
        .cloned()
        .collect()
}

/// 收集节点下所有文本（与 DOM 的 textContent 一致）
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Handle, out: &mut String) {
    match &node.data {
        NodeData::Text { contents } => out.push_str(&contents.borrow()),
        NodeData::Element { .. } | NodeData::Document => {
            for child in node.children.borrow().iter() {
                collect_text(child, out);
            }
        }
        _ => {}
    }
}

/// 读取文本节点内容
pub fn get_text(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// 改写文本节点内容，非文本节点静默忽略
pub fn set_text(node: &Handle, text: &str) {
    if let NodeData::Text { contents } = &node.data {
        *contents.borrow_mut() = text.into();
    }
}

/// 创建游离的文本节点
pub fn create_text_node(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(text.into()),
    })
}

/// 将 `child` 追加为 `parent` 的最后一个子节点
pub fn append_child(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// 将 `child` 从其父节点中摘除
pub fn detach(child: &Handle) {
    if let Some(parent) = get_parent_node(child) {
        parent
            .children
            .borrow_mut()
            .retain(|sibling| !Rc::ptr_eq(sibling, child));
    }
    child.parent.set(None);
}

/// `ancestor` 是否包含 `node`（含自身）
pub fn contains(ancestor: &Handle, node: &Handle) -> bool {
    if Rc::ptr_eq(ancestor, node) {
        return true;
    }

    let mut current = get_parent_node(node);
    while let Some(parent) = current {
        if Rc::ptr_eq(&parent, ancestor) {
            return true;
        }
        current = get_parent_node(&parent);
    }
    false
}

/// 节点是否仍挂在文档树上
pub fn is_connected(node: &Handle) -> bool {
    let mut current = node.clone();
    loop {
        if matches!(current.data, NodeData::Document) {
            return true;
        }
        match get_parent_node(&current) {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

/// 将空白连续段折叠为单个空格
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 将文本拆成（前导空白, 主体, 尾随空白）
pub fn split_padding(text: &str) -> (&str, &str, &str) {
    let body_start = text.len() - text.trim_start().len();
    let body_end = text.trim_end().len();
    if body_start >= body_end {
        return (text, "", "");
    }
    (&text[..body_start], &text[body_start..body_end], &text[body_end..])
}
