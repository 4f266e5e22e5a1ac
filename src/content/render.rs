//! Projection of decoded content into a presentation tree.
//!
//! Pure functions: no I/O and no mutation. Unknown component types project
//! to nothing.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::content::codec;
use crate::models::{
    AccordionItem, ComponentContent, ComponentKind, ElementKind, ListItem, RenderedBlock,
    RichTextNode, StoredEntry, TextLeaf,
};

/// A node of the presentation tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "camelCase")]
pub enum RenderNode {
    Element {
        tag: &'static str,
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        attrs: BTreeMap<&'static str, String>,
        children: Vec<RenderNode>,
    },
    Text {
        text: String,
    },
}

impl RenderNode {
    pub fn element(tag: &'static str, children: Vec<RenderNode>) -> Self {
        RenderNode::Element {
            tag,
            attrs: BTreeMap::new(),
            children,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        RenderNode::Text { text: text.into() }
    }

    fn with_attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        if let RenderNode::Element { attrs, .. } = &mut self {
            attrs.insert(name, value.into());
        }
        self
    }

    fn with_class(self, class: &'static str) -> Self {
        self.with_attr("class", class)
    }

    /// Serialize to HTML, escaping text and attribute values.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            RenderNode::Text { text } => out.push_str(&escape(text)),
            RenderNode::Element {
                tag,
                attrs,
                children,
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push_str(&format!(" {}=\"{}\"", name, escape(value)));
                }
                out.push('>');
                if is_void(tag) {
                    return;
                }
                for child in children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    /// Visible text of the tree, whitespace separated.
    pub fn plain_text(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        parts.join(" ")
    }

    fn collect_text<'a>(&'a self, parts: &mut Vec<&'a str>) {
        match self {
            RenderNode::Text { text } => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed);
                }
            }
            RenderNode::Element { children, .. } => {
                for child in children {
                    child.collect_text(parts);
                }
            }
        }
    }
}

/// Project one entry's content into a presentation tree.
pub fn project(kind: &ComponentKind, content: &ComponentContent) -> Option<RenderNode> {
    let node = match (kind, content) {
        (ComponentKind::TextBlock, ComponentContent::Text(lines)) => RenderNode::element(
            "div",
            lines
                .iter()
                .map(|line| RenderNode::element("p", vec![RenderNode::text(line.clone())]))
                .collect(),
        )
        .with_class("text-block"),
        (ComponentKind::TextEditorBlock, ComponentContent::RichText(nodes)) => {
            RenderNode::element("div", project_rich_text(nodes)).with_class("text-editor-block")
        }
        (ComponentKind::ImageBlock, ComponentContent::Images(urls)) => {
            RenderNode::element("div", urls.iter().filter_map(|url| image(url)).collect())
                .with_class("image-block")
        }
        (ComponentKind::AccordionBlock, ComponentContent::Accordion(items)) => {
            RenderNode::element("div", items.iter().map(accordion_panel).collect())
                .with_class("accordion-block")
        }
        (ComponentKind::ListBlock, ComponentContent::List(items)) => {
            RenderNode::element("ul", items.iter().map(list_item).collect())
                .with_class("list-block")
        }
        _ => return None,
    };

    Some(node)
}

/// Project a rich-text tree.
pub fn project_rich_text(nodes: &[RichTextNode]) -> Vec<RenderNode> {
    nodes.iter().map(project_node).collect()
}

fn project_node(node: &RichTextNode) -> RenderNode {
    match node {
        RichTextNode::Element(element) => {
            let tag = match element.kind {
                ElementKind::Paragraph => "p",
                ElementKind::HeadingOne => "h1",
                ElementKind::HeadingTwo => "h2",
                ElementKind::BulletedList => "ul",
                ElementKind::NumberedList => "ol",
                ElementKind::ListItem => "li",
                ElementKind::Other(_) => "div",
            };
            RenderNode::element(tag, project_rich_text(&element.children))
        }
        RichTextNode::Leaf(leaf) => project_leaf(leaf),
        RichTextNode::Bare(text) => RenderNode::text(text.clone()),
    }
}

/// Wrap the leaf text in one inline element per active mark, link outermost.
fn project_leaf(leaf: &TextLeaf) -> RenderNode {
    let mut node = RenderNode::text(leaf.text.clone());
    let marks = [
        (leaf.code, "code"),
        (leaf.underline, "u"),
        (leaf.italic, "em"),
        (leaf.bold, "strong"),
    ];
    for (active, tag) in marks {
        if active.unwrap_or(false) {
            node = RenderNode::element(tag, vec![node]);
        }
    }
    match leaf.link.as_deref() {
        Some(href) if is_safe_url(href) => {
            RenderNode::element("a", vec![node]).with_attr("href", href)
        }
        _ => node,
    }
}

/// Whether `url` may be emitted as an `href` or `src`.
///
/// Relative references and `http`, `https` and `mailto` URLs pass; any other
/// scheme (`javascript:`, `data:`, `vbscript:`) does not.
pub fn is_safe_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return false;
    }
    let scheme_end = url.find(|c: char| matches!(c, ':' | '/' | '?' | '#'));
    match scheme_end {
        Some(i) if url[i..].starts_with(':') => {
            let scheme = url[..i].to_ascii_lowercase();
            matches!(scheme.as_str(), "http" | "https" | "mailto")
        }
        _ => !url.chars().any(|c| c.is_control()),
    }
}

fn image(url: &str) -> Option<RenderNode> {
    is_safe_url(url).then(|| {
        RenderNode::element("img", Vec::new())
            .with_attr("src", url)
            .with_attr("alt", "")
    })
}

fn accordion_panel(item: &AccordionItem) -> RenderNode {
    RenderNode::element(
        "details",
        vec![
            RenderNode::element("summary", vec![RenderNode::text(item.title.clone())]),
            RenderNode::element("div", project_rich_text(&item.content))
                .with_class("accordion-content"),
        ],
    )
}

fn list_item(item: &ListItem) -> RenderNode {
    let title = RenderNode::text(item.title.clone());
    let heading = if is_safe_url(&item.link) {
        RenderNode::element(
            "h3",
            vec![RenderNode::element("a", vec![title]).with_attr("href", item.link.clone())],
        )
    } else {
        RenderNode::element("h3", vec![title])
    };

    let mut children = vec![heading];
    if !item.content.is_empty() {
        children.push(
            RenderNode::element("div", project_rich_text(&item.content))
                .with_class("list-content"),
        );
    }
    if !item.images.is_empty() {
        children.push(
            RenderNode::element("div", item.images.iter().filter_map(|url| image(url)).collect())
                .with_class("list-images"),
        );
    }
    RenderNode::element("li", children)
}

fn is_void(tag: &str) -> bool {
    matches!(tag, "img" | "br" | "hr")
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Decode and project a parent's entries in order.
///
/// Entries of unknown or vanished component types are skipped.
pub fn render_entries(entries: &[StoredEntry]) -> Vec<RenderedBlock> {
    entries
        .iter()
        .filter_map(|entry| {
            let kind = entry.kind();
            let content = codec::decode(&kind, &entry.data);
            let node = project(&kind, &content)?;
            Some(RenderedBlock {
                id: entry.id.clone(),
                kind: kind.as_str().to_string(),
                html: node.to_html(),
                node,
            })
        })
        .collect()
}
