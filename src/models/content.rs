//! Structured content shapes carried by content entries.
//!
//! These types describe the in-memory (and rendered API) form. The transport
//! form stored in the database is produced by [`crate::content::codec`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::ComponentKind;
use crate::content::codec;

/// Block-level element types of the rich-text editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ElementKind {
    Paragraph,
    HeadingOne,
    HeadingTwo,
    BulletedList,
    NumberedList,
    ListItem,
    /// Element types the editor may emit that we do not style specially.
    Other(String),
}

impl ElementKind {
    pub fn as_str(&self) -> &str {
        match self {
            ElementKind::Paragraph => "paragraph",
            ElementKind::HeadingOne => "heading-one",
            ElementKind::HeadingTwo => "heading-two",
            ElementKind::BulletedList => "bulleted-list",
            ElementKind::NumberedList => "numbered-list",
            ElementKind::ListItem => "list-item",
            ElementKind::Other(other) => other,
        }
    }
}

impl From<String> for ElementKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "paragraph" => ElementKind::Paragraph,
            "heading-one" => ElementKind::HeadingOne,
            "heading-two" => ElementKind::HeadingTwo,
            "bulleted-list" => ElementKind::BulletedList,
            "numbered-list" => ElementKind::NumberedList,
            "list-item" => ElementKind::ListItem,
            _ => ElementKind::Other(s),
        }
    }
}

impl From<ElementKind> for String {
    fn from(kind: ElementKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A formatted run of text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextLeaf {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[cfg(test)]
impl TextLeaf {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// A block element with nested children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichTextElement {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    #[serde(default)]
    pub children: Vec<RichTextNode>,
}

/// One node of a rich-text tree.
///
/// `Bare` is what lenient decoding produces for free text that was pasted
/// where a structured node was expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RichTextNode {
    Element(RichTextElement),
    Leaf(TextLeaf),
    Bare(String),
}

#[cfg(test)]
impl RichTextNode {
    pub fn element(kind: ElementKind, children: Vec<RichTextNode>) -> Self {
        RichTextNode::Element(RichTextElement { kind, children })
    }

    pub fn text(text: impl Into<String>) -> Self {
        RichTextNode::Leaf(TextLeaf::plain(text))
    }
}

/// One collapsible panel of an accordion block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AccordionItem {
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_rich_text")]
    pub content: Vec<RichTextNode>,
}

/// One item of a list block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default, deserialize_with = "lenient_rich_text")]
    pub content: Vec<RichTextNode>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub images: Vec<String>,
}

/// Decoded `data` of a content entry, one variant per shape.
///
/// Serializes untagged: the rendered API exposes the bare structured value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ComponentContent {
    Text(Vec<String>),
    RichText(Vec<RichTextNode>),
    Images(Vec<String>),
    Accordion(Vec<AccordionItem>),
    List(Vec<ListItem>),
    /// Data of a template whose type this service does not understand.
    Raw(Value),
}

impl ComponentContent {
    /// Canonical empty value of a shape.
    pub fn empty(kind: &ComponentKind) -> Self {
        match kind {
            ComponentKind::TextBlock => ComponentContent::Text(Vec::new()),
            ComponentKind::TextEditorBlock => ComponentContent::RichText(Vec::new()),
            ComponentKind::ImageBlock => ComponentContent::Images(Vec::new()),
            ComponentKind::AccordionBlock => ComponentContent::Accordion(Vec::new()),
            ComponentKind::ListBlock => ComponentContent::List(Vec::new()),
            ComponentKind::Unknown(_) => ComponentContent::Raw(Value::Array(Vec::new())),
        }
    }
}

fn lenient_rich_text<'de, D>(deserializer: D) -> Result<Vec<RichTextNode>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(codec::rich_text_from_value(value))
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(codec::strings_from_value(value))
}
