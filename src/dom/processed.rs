//! 已处理节点集合
//!
//! 以节点身份（而非内容）为键的成员集合。集合只持有 `Weak` 引用，不会延长节点寿命；
//! 同时 `Weak` 会保住节点的分配，因此在条目存活期间地址不会被复用，指针可以安全地作为身份键。

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use markup5ever_rcdom::{Handle, Node};

/// 节点身份键
pub type NodeKey = *const Node;

/// 获取节点身份键
pub fn node_key(node: &Handle) -> NodeKey {
    Rc::as_ptr(node)
}

/// 超过该数量时插入会顺带清理已释放的节点
const PURGE_THRESHOLD: usize = 4096;

/// 弱引用的已处理节点集合
#[derive(Debug, Default)]
pub struct ProcessedNodes {
    entries: HashMap<NodeKey, Weak<Node>>,
    purge_at: usize,
}

impl ProcessedNodes {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            purge_at: PURGE_THRESHOLD,
        }
    }

    /// 记录节点，返回该节点此前是否不在集合中
    pub fn insert(&mut self, node: &Handle) -> bool {
        if self.entries.len() >= self.purge_at.max(PURGE_THRESHOLD) {
            self.purge();
            self.purge_at = self.entries.len() * 2;
        }
        self.entries
            .insert(node_key(node), Rc::downgrade(node))
            .map_or(true, |previous| previous.strong_count() == 0)
    }

    /// 节点是否已处理
    pub fn contains(&self, node: &Handle) -> bool {
        self.entries
            .get(&node_key(node))
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// 移除节点（内容被外部改写后需要重新处理）
    pub fn remove(&mut self, node: &Handle) -> bool {
        self.entries.remove(&node_key(node)).is_some()
    }

    /// 清理已经被释放的节点
    pub fn purge(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// 存活节点数量
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
