//! The component content model: catalog lookups, the transport codec,
//! rendering projection and the structural checks run before a save.

pub mod catalog;
pub mod codec;
pub mod hierarchy;
pub mod render;
pub mod slug;

pub use catalog::Catalog;
