use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::tree::diff::sha1_hex;
use crate::tree::markup::{escape_xml, unescape_xml};
use crate::tree::{NodeId, UiTree};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkeletonNode {
    pub tag: String,
    pub resource_id: Option<String>,
    pub children: Vec<SkeletonNode>,
}

impl SkeletonNode {
    /// Tag and resource id equal; children are not compared.
    pub fn same_shape(&self, other: &SkeletonNode) -> bool {
        self.tag == other.tag && self.resource_id == other.resource_id
    }

    pub fn count(&self) -> usize {
        1 + self.children.iter().map(SkeletonNode::count).sum::<usize>()
    }
}

/// Structure-only view of a screen: tags and resource ids, no text, no bounds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fingerprint {
    pub root: Option<SkeletonNode>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed skeleton markup at byte {offset}: {message}")]
pub struct SkeletonError {
    pub offset: usize,
    pub message: String,
}

impl Fingerprint {
    pub fn empty() -> Self {
        Self { root: None }
    }

    pub fn of_tree(tree: &UiTree) -> Self {
        Self {
            root: Some(skeleton_of(tree, tree.root())),
        }
    }

    /// Node count.
    pub fn size(&self) -> usize {
        self.root.as_ref().map(SkeletonNode::count).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        if let Some(root) = &self.root {
            write_node(root, 0, &mut out);
        }
        out
    }

    pub fn digest(&self) -> String {
        sha1_hex(&self.to_markup())
    }

    /// Parses skeleton markup. Attributes other than `resource_id` and all text
    /// are dropped, so a full screen rendering parses to its fingerprint.
    pub fn from_markup(markup: &str) -> Result<Self, SkeletonError> {
        let mut parser = MarkupParser {
            src: markup,
            pos: 0,
        };
        parser.skip_text();
        if parser.at_end() {
            return Ok(Self::empty());
        }
        let mut root = parser.element()?;
        parser.skip_text();
        if !parser.at_end() {
            return Err(parser.error("content after the root element"));
        }
        collapse_repeats(&mut root);
        Ok(Self { root: Some(root) })
    }
}

impl UiTree {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of_tree(self)
    }
}

fn skeleton_of(tree: &UiTree, id: NodeId) -> SkeletonNode {
    let (tag, resource_id) = tree
        .node(id)
        .map(|n| (n.tag.clone(), n.resource_id.clone()))
        .unwrap_or_else(|| ("div".to_string(), None));

    let mut node = SkeletonNode {
        tag,
        resource_id,
        children: tree
            .children(id)
            .iter()
            .map(|&c| skeleton_of(tree, c))
            .collect(),
    };
    collapse_repeats(&mut node);
    node
}

/// Collapses runs of consecutive siblings that share tag and resource id.
fn collapse_repeats(node: &mut SkeletonNode) {
    for child in &mut node.children {
        collapse_repeats(child);
    }
    node.children.dedup_by(|later, earlier| later.same_shape(earlier));
}

fn write_node(node: &SkeletonNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    out.push_str(&indent);
    out.push('<');
    out.push_str(&node.tag);
    if let Some(rid) = &node.resource_id {
        out.push_str(&format!(" resource_id='{}'", escape_xml(rid)));
    }
    out.push('>');
    if node.children.is_empty() {
        out.push_str(&format!("</{}>\n", node.tag));
        return;
    }
    out.push('\n');
    for child in &node.children {
        write_node(child, depth + 1, out);
    }
    out.push_str(&format!("{}</{}>\n", indent, node.tag));
}

struct MarkupParser<'a> {
    src: &'a str,
    pos: usize,
}

impl MarkupParser<'_> {
    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn error(&self, message: &str) -> SkeletonError {
        SkeletonError {
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn skip_text(&mut self) {
        let skip = self.rest().find('<').unwrap_or(self.rest().len());
        self.pos += skip;
    }

    fn skip_space(&mut self) {
        let skip = self.rest().len() - self.rest().trim_start().len();
        self.pos += skip;
    }

    fn name(&mut self) -> Result<String, SkeletonError> {
        let len = self
            .rest()
            .find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')))
            .unwrap_or(self.rest().len());
        if len == 0 {
            return Err(self.error("expected a name"));
        }
        let name = self.rest()[..len].to_string();
        self.pos += len;
        Ok(name)
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn element(&mut self) -> Result<SkeletonNode, SkeletonError> {
        if !self.eat("<") {
            return Err(self.error("expected '<'"));
        }
        let tag = self.name()?;
        let mut resource_id = None;

        loop {
            self.skip_space();
            if self.eat("/>") {
                return Ok(SkeletonNode {
                    tag,
                    resource_id,
                    children: Vec::new(),
                });
            }
            if self.eat(">") {
                break;
            }
            let attr = self.name()?;
            self.skip_space();
            if !self.eat("=") {
                return Err(self.error("expected '=' after attribute name"));
            }
            self.skip_space();
            let quote = match self.rest().chars().next() {
                Some(q @ ('\'' | '"')) => q,
                _ => return Err(self.error("expected a quoted attribute value")),
            };
            self.pos += 1;
            let close = self
                .rest()
                .find(quote)
                .ok_or_else(|| self.error("unterminated attribute value"))?;
            let value = unescape_xml(&self.rest()[..close]);
            self.pos += close + 1;
            if attr == "resource_id" && !value.is_empty() {
                resource_id = Some(value);
            }
        }

        let mut children = Vec::new();
        loop {
            self.skip_text();
            if self.at_end() {
                return Err(self.error(&format!("unclosed <{}>", tag)));
            }
            if self.eat("</") {
                let closing = self.name()?;
                if closing != tag {
                    return Err(self.error(&format!(
                        "</{}> closes <{}>",
                        closing, tag
                    )));
                }
                self.skip_space();
                if !self.eat(">") {
                    return Err(self.error("expected '>'"));
                }
                break;
            }
            children.push(self.element()?);
        }

        Ok(SkeletonNode {
            tag,
            resource_id,
            children,
        })
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_markup())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let markup = String::deserialize(deserializer)?;
        Fingerprint::from_markup(&markup).map_err(serde::de::Error::custom)
    }
}
