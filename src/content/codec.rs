//! Conversion between the transport form of entry data (JSON text) and
//! the structured [`ComponentContent`].
//!
//! Decoding never fails. Editors paste free text into any field, so input
//! that does not fit the expected shape is coerced into the closest valid
//! value of that shape.

use serde_json::{json, Value};

use crate::models::{
    AccordionItem, ComponentContent, ComponentKind, ListItem, RenderedComponent, RichTextNode,
    StoredEntry,
};

/// Decode transport text into the shape of `kind`.
///
/// - empty input yields the shape's canonical empty value
/// - text that is not JSON becomes a one-element sequence holding that text
/// - a JSON scalar where a sequence is expected is wrapped in one
pub fn decode(kind: &ComponentKind, raw: &str) -> ComponentContent {
    if raw.trim().is_empty() {
        return ComponentContent::empty(kind);
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(value) => shape(kind, value),
        Err(_) => {
            tracing::debug!(kind = %kind, "Entry data is not JSON, keeping it as literal text");
            shape(kind, Value::Array(vec![Value::String(raw.to_string())]))
        }
    }
}

/// Decode an editor-supplied value. Strings are treated as transport text.
pub fn decode_value(kind: &ComponentKind, value: Value) -> ComponentContent {
    match value {
        Value::String(raw) => decode(kind, &raw),
        other => shape(kind, other),
    }
}

/// Encode structured content into transport text.
///
/// A text block encodes as a one-element array, or `[]` when it has no
/// text. Rich text nested in
/// accordion and list items travels as a JSON string.
pub fn encode(content: &ComponentContent) -> String {
    let value = match content {
        ComponentContent::Text(lines) => match lines.as_slice() {
            [] => json!([]),
            [single] => json!([single]),
            many => json!([many.join("\n")]),
        },
        ComponentContent::RichText(nodes) => serde_json::to_value(nodes).unwrap_or_default(),
        ComponentContent::Images(urls) => json!(urls),
        ComponentContent::Accordion(items) => Value::Array(
            items
                .iter()
                .map(|item| {
                    json!({
                        "title": item.title,
                        "content": rich_text_to_string(&item.content),
                    })
                })
                .collect(),
        ),
        ComponentContent::List(items) => Value::Array(
            items
                .iter()
                .map(|item| {
                    json!({
                        "title": item.title,
                        "link": item.link,
                        "content": rich_text_to_string(&item.content),
                        "images": item.images,
                    })
                })
                .collect(),
        ),
        ComponentContent::Raw(value) => value.clone(),
    };

    value.to_string()
}

fn shape(kind: &ComponentKind, value: Value) -> ComponentContent {
    if let ComponentKind::Unknown(_) = kind {
        return ComponentContent::Raw(value);
    }

    let items = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => vec![other],
    };

    match kind {
        ComponentKind::TextBlock => {
            ComponentContent::Text(items.into_iter().filter_map(scalar_text).collect())
        }
        ComponentKind::TextEditorBlock => {
            ComponentContent::RichText(items.into_iter().filter_map(node_from_value).collect())
        }
        ComponentKind::ImageBlock => {
            ComponentContent::Images(items.into_iter().filter_map(scalar_text).collect())
        }
        ComponentKind::AccordionBlock => ComponentContent::Accordion(
            items.into_iter().filter_map(accordion_from_value).collect(),
        ),
        ComponentKind::ListBlock => {
            ComponentContent::List(items.into_iter().filter_map(list_item_from_value).collect())
        }
        ComponentKind::Unknown(_) => ComponentContent::Raw(Value::Array(items)),
    }
}

/// Lenient rich-text reader shared with the model deserializers.
///
/// Accepts the structured array, the JSON-string transport form, or free
/// text (kept as a single bare node).
pub fn rich_text_from_value(value: Value) -> Vec<RichTextNode> {
    match value {
        Value::Null => Vec::new(),
        Value::String(raw) => {
            if raw.trim().is_empty() {
                return Vec::new();
            }
            match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Array(items)) => items.into_iter().filter_map(node_from_value).collect(),
                Ok(object @ Value::Object(_)) => node_from_value(object).into_iter().collect(),
                _ => vec![RichTextNode::Bare(raw)],
            }
        }
        Value::Array(items) => items.into_iter().filter_map(node_from_value).collect(),
        other => node_from_value(other).into_iter().collect(),
    }
}

/// Lenient reader for image path lists.
pub fn strings_from_value(value: Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().filter_map(scalar_text).collect(),
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => items.into_iter().filter_map(scalar_text).collect(),
            _ if raw.trim().is_empty() => Vec::new(),
            _ => vec![raw],
        },
        other => scalar_text(other).into_iter().collect(),
    }
}

fn rich_text_to_string(nodes: &[RichTextNode]) -> String {
    if nodes.is_empty() {
        return String::new();
    }
    serde_json::to_string(nodes).unwrap_or_default()
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn node_from_value(value: Value) -> Option<RichTextNode> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(RichTextNode::Bare(s)),
        Value::Object(_) => {
            let fallback = value.to_string();
            Some(serde_json::from_value(value).unwrap_or(RichTextNode::Bare(fallback)))
        }
        other => scalar_text(other).map(RichTextNode::Bare),
    }
}

fn accordion_from_value(value: Value) -> Option<AccordionItem> {
    match value {
        Value::Null => None,
        Value::Object(mut fields) => Some(AccordionItem {
            title: fields.remove("title").and_then(scalar_text).unwrap_or_default(),
            content: rich_text_from_value(fields.remove("content").unwrap_or(Value::Null)),
        }),
        other => Some(AccordionItem {
            title: String::new(),
            content: scalar_text(other).map(RichTextNode::Bare).into_iter().collect(),
        }),
    }
}

fn list_item_from_value(value: Value) -> Option<ListItem> {
    match value {
        Value::Null => None,
        Value::Object(mut fields) => Some(ListItem {
            title: fields.remove("title").and_then(scalar_text).unwrap_or_default(),
            link: fields.remove("link").and_then(scalar_text).unwrap_or_default(),
            content: rich_text_from_value(fields.remove("content").unwrap_or(Value::Null)),
            images: strings_from_value(fields.remove("images").unwrap_or(Value::Null)),
        }),
        other => Some(ListItem {
            content: scalar_text(other).map(RichTextNode::Bare).into_iter().collect(),
            ..ListItem::default()
        }),
    }
}

/// Decode a stored entry for the public read API.
///
/// An entry whose template has left the catalog keeps its data as a raw
/// value under an empty type.
pub fn decode_entry(entry: &StoredEntry) -> RenderedComponent {
    let kind = entry.kind();
    let (name, description) = match &entry.template {
        Some(template) => (template.name.clone(), template.description.clone()),
        None => (String::new(), String::new()),
    };

    RenderedComponent {
        id: entry.id.clone(),
        name,
        content: decode(&kind, &entry.data),
        kind,
        description,
    }
}
