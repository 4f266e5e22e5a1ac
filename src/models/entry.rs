//! Content entries attached to taxonomy entities.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ComponentContent, ComponentKind, ComponentTemplate};

/// Wire form of a stored content entry; `data` is JSON text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentEntry {
    pub id: String,
    pub component_id: String,
    pub data: String,
}

/// A content entry as listed from storage, joined with its template.
///
/// `template` is `None` when the referenced template has vanished from the
/// catalog.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub id: String,
    pub component_id: String,
    pub data: String,
    pub template: Option<ComponentTemplate>,
}

impl StoredEntry {
    pub fn kind(&self) -> ComponentKind {
        self.template
            .as_ref()
            .map(|t| t.kind.clone())
            .unwrap_or_else(|| ComponentKind::Unknown(String::new()))
    }

    pub fn to_wire(&self) -> ContentEntry {
        ContentEntry {
            id: self.id.clone(),
            component_id: self.component_id.clone(),
            data: self.data.clone(),
        }
    }
}

/// One block submitted by the page builder.
///
/// `content` is usually JSON text, but structured values are accepted too.
#[derive(Debug, Clone, Deserialize)]
pub struct BuilderElement {
    #[serde(alias = "componentId")]
    pub component_id: String,
    #[serde(default)]
    pub content: Value,
}

/// A builder element that passed catalog resolution and decoding, ready to
/// be written.
#[derive(Debug, Clone)]
pub struct PreparedEntry {
    pub component_id: String,
    pub content: ComponentContent,
}

/// A decoded component as exposed by the public read API.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedComponent {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    pub description: String,
    pub content: ComponentContent,
}
