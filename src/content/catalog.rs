//! Component catalog lookups and builder-element preparation.

use crate::content::codec;
use crate::errors::{AppError, FieldErrors};
use crate::models::{
    BuilderElement, ComponentContent, ComponentKind, ComponentTemplate, PreparedEntry,
};

/// Message shown when a builder element references a template that is gone.
pub const MISSING_COMPONENT: &str = "Selected component type no longer exists";

/// Templates the catalog starts with.
pub fn seed_templates() -> Vec<ComponentTemplate> {
    ComponentKind::KNOWN
        .iter()
        .map(|kind| ComponentTemplate {
            id: kind.as_str().to_string(),
            name: kind.as_str().to_string(),
            description: kind.label().to_string(),
            kind: kind.clone(),
        })
        .collect()
}

/// A snapshot of the component catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    templates: Vec<ComponentTemplate>,
}

impl Catalog {
    pub fn new(templates: Vec<ComponentTemplate>) -> Self {
        Self { templates }
    }

    pub fn get(&self, id: &str) -> Option<&ComponentTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Resolve a template by id.
    pub fn resolve(&self, id: &str) -> Result<&ComponentTemplate, AppError> {
        self.get(id)
            .ok_or_else(|| AppError::NotFound(format!("Component {} not found", id)))
    }

    /// Resolve a template by its machine name.
    pub fn resolve_name(&self, name: &str) -> Result<&ComponentTemplate, AppError> {
        self.templates
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| AppError::NotFound(format!("Component {} not found", name)))
    }

    /// Empty content for a block an editor has just added.
    pub fn default_content(&self, name: &str) -> Result<ComponentContent, AppError> {
        self.resolve_name(name)
            .map(|template| ComponentContent::empty(&template.kind))
    }

    /// Resolve and decode every builder element, preserving order.
    ///
    /// All-or-nothing: any unresolved component rejects the whole set.
    pub fn prepare(&self, elements: &[BuilderElement]) -> Result<Vec<PreparedEntry>, AppError> {
        let mut errors = FieldErrors::new();
        let mut prepared = Vec::with_capacity(elements.len());

        for (index, element) in elements.iter().enumerate() {
            match self.get(&element.component_id) {
                Some(template) => prepared.push(PreparedEntry {
                    component_id: template.id.clone(),
                    content: codec::decode_value(&template.kind, element.content.clone()),
                }),
                None => {
                    errors.insert(
                        format!("elements[{}].component_id", index),
                        MISSING_COMPONENT.to_string(),
                    );
                }
            }
        }

        if !errors.is_empty() {
            return Err(AppError::Fields(errors));
        }
        Ok(prepared)
    }
}
