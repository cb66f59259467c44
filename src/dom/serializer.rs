use std::io;

use encoding_rs::Encoding;
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use markup5ever_rcdom::{Handle, RcDom, SerializableHandle};

/// 序列化文档
///
/// `document_encoding` 为空时输出 UTF-8，否则按给定字符集重新编码。
pub fn serialize_document(dom: RcDom, document_encoding: &str) -> io::Result<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();

    let serializable: SerializableHandle = dom.document.into();
    serialize(&mut buf, &serializable, SerializeOpts::default())?;

    if !document_encoding.is_empty() {
        if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
            let s: &str = &String::from_utf8_lossy(&buf);
            let (data, _, _) = encoding.encode(s);
            buf = data.to_vec();
        }
    }

    Ok(buf)
}

/// 序列化节点的子树内容（相当于 innerHTML）
pub fn inner_html(node: &Handle) -> String {
    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = node.clone().into();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };

    if serialize(&mut buf, &serializable, opts).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{find_nodes, html_to_dom};

    #[test]
    fn inner_html_serializes_children() {
        let dom = html_to_dom(b"<div><span title=\"t\">Hi</span></div>", "utf-8");
        let div = find_nodes(&dom.document, &["div"]).pop().unwrap();
        assert_eq!(inner_html(&div), "<span title=\"t\">Hi</span>");
    }

    #[test]
    fn serialize_document_round_trips_text() {
        let dom = html_to_dom("<p>課題</p>".as_bytes(), "utf-8");
        let out = serialize_document(dom, "").unwrap();
        assert!(String::from_utf8(out).unwrap().contains("<p>課題</p>"));
    }
}
