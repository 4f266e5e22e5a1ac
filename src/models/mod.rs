//! Data models for the content backend.
//!
//! Field names follow the admin UI's camelCase contract, except content
//! entries which keep the `component_id` key of the builder payload.

mod component;
mod content;
mod entry;
mod taxonomy;

pub use component::*;
pub use content::*;
pub use entry::*;
pub use taxonomy::*;
