//! Taxonomy entities: the authorable objects that own content entries.

use serde::{Deserialize, Deserializer, Serialize};

use super::{BuilderElement, ContentEntry, RenderedComponent};
use crate::content::render::RenderNode;

/// Kind of authorable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomyKind {
    Page,
    Section,
    Service,
    Persona,
}

impl TaxonomyKind {
    pub const ALL: [TaxonomyKind; 4] = [
        TaxonomyKind::Page,
        TaxonomyKind::Section,
        TaxonomyKind::Service,
        TaxonomyKind::Persona,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomyKind::Page => "page",
            TaxonomyKind::Section => "section",
            TaxonomyKind::Service => "service",
            TaxonomyKind::Persona => "persona",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "page" => Some(TaxonomyKind::Page),
            "section" => Some(TaxonomyKind::Section),
            "service" => Some(TaxonomyKind::Service),
            "persona" => Some(TaxonomyKind::Persona),
            _ => None,
        }
    }

    /// Plural URL segment, e.g. `pages`.
    pub fn segment(&self) -> &'static str {
        match self {
            TaxonomyKind::Page => "pages",
            TaxonomyKind::Section => "sections",
            TaxonomyKind::Service => "services",
            TaxonomyKind::Persona => "personas",
        }
    }

    pub fn from_segment(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.segment() == s)
    }

    /// Capitalised name used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            TaxonomyKind::Page => "Page",
            TaxonomyKind::Section => "Section",
            TaxonomyKind::Service => "Service",
            TaxonomyKind::Persona => "Persona",
        }
    }
}

/// An authorable page, section, service or persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub kind: TaxonomyKind,
    pub slug: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Services only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Services only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona_ids: Option<Vec<String>>,
    pub created_at: String,
    pub updated_at: String,
}

/// Admin view: the entity plus its entries in transport form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDetail {
    #[serde(flatten)]
    pub entity: Entity,
    pub entries: Vec<ContentEntry>,
}

/// Public view: the entity plus its decoded components.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedEntity {
    #[serde(flatten)]
    pub entity: Entity,
    pub components: Vec<RenderedComponent>,
}

/// One projected block of a rendered entity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub node: RenderNode,
    pub html: String,
}

/// Public render view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedEntity {
    #[serde(flatten)]
    pub entity: Entity,
    pub blocks: Vec<RenderedBlock>,
}

/// Request body for creating an entity.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntityRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub persona_ids: Option<Vec<String>>,
    #[serde(default)]
    pub elements: Vec<BuilderElement>,
}

/// Request body for updating an entity.
///
/// Scalar fields are partial; `elements` always replaces the whole entry set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEntityRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Absent keeps the parent, `null` detaches it.
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<String>>,
    #[serde(default)]
    pub persona_ids: Option<Vec<String>>,
    #[serde(default)]
    pub elements: Vec<BuilderElement>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Pagination query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}
