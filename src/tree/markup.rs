use crate::tree::tree_model::{NodeId, UiTree};

/// Escapes the five XML special characters.
pub fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn unescape_xml(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

impl UiTree {
    /// Indented HTML-like rendering of the retained tree, one element per line.
    ///
    /// `<Button id='12' resource_id='ok' alt='Confirm' status='checked'>OK</Button>`
    pub fn markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(self.root, 0, &mut out);
        out
    }

    fn write_markup(&self, id: NodeId, depth: usize, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let tag = escape_xml(&node.tag);

        out.push_str(&indent);
        out.push('<');
        out.push_str(&tag);
        out.push_str(&format!(" id='{}'", node.id));
        if let Some(rid) = &node.resource_id {
            out.push_str(&format!(" resource_id='{}'", escape_xml(rid)));
        }
        if let Some(alt) = &node.content_description {
            out.push_str(&format!(" alt='{}'", escape_xml(alt)));
        }
        let status = node.status();
        if !status.is_empty() {
            out.push_str(&format!(" status='{}'", status.join(",")));
        }
        out.push('>');
        if let Some(text) = &node.text {
            out.push_str(&escape_xml(text));
        }

        if node.children.is_empty() {
            out.push_str(&format!("</{}>\n", tag));
            return;
        }

        out.push('\n');
        for &child in &node.children {
            self.write_markup(child, depth + 1, out);
        }
        out.push_str(&format!("{}</{}>\n", indent, tag));
    }
}
