//! Error types
//!
//! Only membership operations fail with errors. A context query that finds
//! nothing returns `None`; callers that need the context (derived
//! attributes) turn that into a [`ContextError`].

use crate::models::class_tag::ClassTag;
use crate::models::element::ElementId;
use crate::models::offset::OffsetQL;
use thiserror::Error;

/// Container membership errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Offset lookup or update for an element that is not a member
    #[error("element {element} is not a member of container {container}")]
    NotFound {
        element: ElementId,
        container: ElementId,
    },

    /// Element is already a member of this container
    #[error("element {element} is already a member of container {container}")]
    AlreadyMember {
        element: ElementId,
        container: ElementId,
    },

    /// Container placed inside itself or inside one of its descendants
    #[error("element {element} cannot be placed inside {container}, which it contains")]
    SelfContainment {
        element: ElementId,
        container: ElementId,
    },

    /// Element already sits in a container nested with the target
    #[error("element {element} is already placed in {existing}, which is nested with {container}")]
    NestedPlacement {
        element: ElementId,
        existing: ElementId,
        container: ElementId,
    },

    #[error("negative offset {offset} for element {element}")]
    NegativeOffset { element: ElementId, offset: OffsetQL },

    #[error("element {element} is a {class}, not a container")]
    NotAContainer { element: ElementId, class: ClassTag },
}

pub type Result<T> = std::result::Result<T, StreamError>;

/// Failure to compute a context-dependent attribute
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// Element sits in no live container, directly or through derivations
    #[error("element {element} is not placed in any live container")]
    Orphaned { element: ElementId },

    /// The hierarchy has no object of the class the attribute needs
    #[error("cannot compute {attribute} for {element}: no {class} in context")]
    MissingContext {
        element: ElementId,
        attribute: &'static str,
        class: ClassTag,
    },
}

/// Failure to load or save resolver settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML settings: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON settings: {0}")]
    Json(#[from] serde_json::Error),
}
