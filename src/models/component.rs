//! Component catalog model.

use serde::{Deserialize, Serialize};

/// Content shape a component template produces.
///
/// Parsed once from the catalog's `type` column; everything downstream
/// dispatches on this enum instead of comparing strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComponentKind {
    TextBlock,
    TextEditorBlock,
    ImageBlock,
    AccordionBlock,
    ListBlock,
    Unknown(String),
}

impl ComponentKind {
    /// The five shapes the codec and renderer understand.
    pub const KNOWN: [ComponentKind; 5] = [
        ComponentKind::TextBlock,
        ComponentKind::TextEditorBlock,
        ComponentKind::ImageBlock,
        ComponentKind::AccordionBlock,
        ComponentKind::ListBlock,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ComponentKind::TextBlock => "text-block",
            ComponentKind::TextEditorBlock => "text-editor-block",
            ComponentKind::ImageBlock => "image-block",
            ComponentKind::AccordionBlock => "accordion-block",
            ComponentKind::ListBlock => "list-block",
            ComponentKind::Unknown(other) => other,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "text-block" => ComponentKind::TextBlock,
            "text-editor-block" => ComponentKind::TextEditorBlock,
            "image-block" => ComponentKind::ImageBlock,
            "accordion-block" => ComponentKind::AccordionBlock,
            "list-block" => ComponentKind::ListBlock,
            other => ComponentKind::Unknown(other.to_string()),
        }
    }

    /// Human label used when seeding the catalog.
    pub fn label(&self) -> &str {
        match self {
            ComponentKind::TextBlock => "Text block",
            ComponentKind::TextEditorBlock => "Rich text editor",
            ComponentKind::ImageBlock => "Image gallery",
            ComponentKind::AccordionBlock => "Accordion",
            ComponentKind::ListBlock => "List of items",
            ComponentKind::Unknown(other) => other,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ComponentKind::Unknown(_))
    }
}

impl From<String> for ComponentKind {
    fn from(s: String) -> Self {
        ComponentKind::parse(&s)
    }
}

impl From<ComponentKind> for String {
    fn from(kind: ComponentKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog entry describing one kind of content block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ComponentKind,
}

/// Request body for adding a template to the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Defaults to `name` when omitted.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}
