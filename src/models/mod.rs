//! Data models
//!
//! Elements, their class tags and the notation payloads they carry.

pub mod class_tag;
pub mod element;
pub mod notation;
pub mod offset;
pub mod pitch;

// Re-export commonly used types
pub use class_tag::{ClassTag, HasClassTag};
pub use element::{Element, ElementId, WeakElement};
pub use notation::*;
pub use offset::{ql, ql_frac, OffsetQL};
pub use pitch::Pitch;
