//! DOM 工具
//!
//! 基于 html5ever / markup5ever_rcdom 的节点操作、选择器匹配、身份集合与序列化。

pub mod node;
pub mod processed;
pub mod selector;
pub mod serializer;

pub use node::{
    ancestors, append_child, collapse_whitespace, contains, create_text_node, detach,
    element_children, find_nodes, get_node_attr, get_node_name, get_parent_element,
    get_parent_node, get_text, has_node_attr, html_to_dom, is_connected, is_element,
    parse_fragment_nodes, set_node_attr, set_text, split_padding, text_content, Ancestors,
};
pub use processed::{node_key, NodeKey, ProcessedNodes};
pub use selector::{compile_selectors, Selector, SelectorError};
pub use serializer::{inner_html, serialize_document};

pub use markup5ever_rcdom::{Handle, RcDom};
