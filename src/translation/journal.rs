//! 替换日志
//!
//! 记录每一次写入前的原始值和写入的新值。原始值用于不刷新页面的复位；写入值用于判断
//! 节点当前内容是否仍是翻译自身写下的，从而识别自身引起的变更并避免重复翻译。

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use markup5ever_rcdom::{Handle, Node};

use crate::dom::{get_node_attr, get_text, node_key, set_node_attr, set_text, NodeKey};

/// 写入目标
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JournalTarget {
    Text,
    Attribute(String),
}

#[derive(Debug, Clone)]
struct JournalEntry {
    node: Weak<Node>,
    target: JournalTarget,
    original: String,
}

/// 替换日志
#[derive(Debug, Default)]
pub struct TranslationJournal {
    entries: Vec<JournalEntry>,
    /// 每个写入目标最近一次写下的值；条目中的 `Weak` 保证键不会被复用
    written: HashMap<(NodeKey, JournalTarget), String>,
}

impl TranslationJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_text(&mut self, node: &Handle, original: String, written: &str) {
        self.record(node, JournalTarget::Text, original, written);
    }

    pub fn record_attr(&mut self, node: &Handle, attr: &str, original: String, written: &str) {
        self.record(node, JournalTarget::Attribute(attr.to_string()), original, written);
    }

    fn record(&mut self, node: &Handle, target: JournalTarget, original: String, written: &str) {
        self.written
            .insert((node_key(node), target.clone()), written.to_string());
        self.entries.push(JournalEntry {
            node: Rc::downgrade(node),
            target,
            original,
        });
    }

    /// 文本节点当前内容是否就是最近一次写入的值
    pub fn is_own_text(&self, node: &Handle) -> bool {
        self.written
            .get(&(node_key(node), JournalTarget::Text))
            .is_some_and(|written| get_text(node).as_deref() == Some(written.as_str()))
    }

    /// 属性当前值是否就是最近一次写入的值
    pub fn is_own_attr(&self, node: &Handle, attr: &str) -> bool {
        self.written
            .get(&(node_key(node), JournalTarget::Attribute(attr.to_string())))
            .is_some_and(|written| get_node_attr(node, attr).as_deref() == Some(written.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 由新到旧写回原始值并清空日志，返回恢复的条目数
    pub fn restore(&mut self) -> usize {
        self.written.clear();
        let mut restored = 0;
        for entry in self.entries.drain(..).rev() {
            let Some(node) = entry.node.upgrade() else {
                continue;
            };
            match entry.target {
                JournalTarget::Text => set_text(&node, &entry.original),
                JournalTarget::Attribute(attr) => set_node_attr(&node, &attr, Some(entry.original)),
            }
            restored += 1;
        }
        tracing::debug!("已恢复 {} 处原始内容", restored);
        restored
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.written.clear();
    }
}
