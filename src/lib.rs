//! Element membership and context resolution for notated music
//!
//! Elements (notes, clefs, time signatures, ...) are placed into containers
//! (measures, parts, scores), which are elements themselves. Containers own
//! their members; members only point back weakly, so intermediate
//! containers built by a transformation disappear as soon as the caller
//! drops them. On top of that graph the [`context`] module answers
//! questions such as "which measure holds this note" or "what beat is it
//! on", following derivation links for elements that were never placed.

pub mod context;
pub mod derivation;
pub mod errors;
pub mod export;
pub mod models;
pub mod settings;
pub mod sites;
pub mod stream;

// Re-export commonly used types
pub use context::{ContextResolver, ContextSite, DerivedAttribute, SearchType};
pub use derivation::Derivation;
pub use errors::{ContextError, Result, SettingsError, StreamError};
pub use export::{export_stream, ExportNode, SiteReport};
pub use models::*;
pub use settings::ResolverSettings;
pub use sites::{SiteEntry, Sites};
pub use stream::{ContainerOffsetMap, Stream};
