//! A single membership record

use crate::models::class_tag::{ClassTag, HasClassTag};
use crate::models::element::{Element, ElementId, WeakElement};
use std::sync::atomic::{AtomicU64, Ordering};

static GLOBAL_SITE_INDEX: AtomicU64 = AtomicU64::new(0);

/// Next value of the process-wide insertion counter
pub(crate) fn next_global_index() -> u64 {
    GLOBAL_SITE_INDEX.fetch_add(1, Ordering::Relaxed)
}

/// One placement of an element inside a container
///
/// The container is referenced weakly. Its class tag is cached so that
/// class-filtered queries can skip a record without touching the weak
/// reference. A record without a container is the "unplaced" placeholder
/// every element starts with.
#[derive(Debug, Clone)]
pub struct Site {
    container: Option<WeakElement>,
    class_tag: Option<ClassTag>,
    local_index: usize,
    global_index: u64,
}

/// Returned by [`Sites::add`](super::Sites::add)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteHandle {
    pub container_id: ElementId,
    pub local_index: usize,
    pub global_index: u64,
}

impl Site {
    pub(crate) fn placeholder() -> Self {
        Self {
            container: None,
            class_tag: None,
            local_index: 0,
            global_index: next_global_index(),
        }
    }

    pub(crate) fn new(container: &Element, local_index: usize) -> Self {
        Self {
            container: Some(container.downgrade()),
            class_tag: Some(container.class_tag()),
            local_index,
            global_index: next_global_index(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.container.is_none()
    }

    pub fn container_id(&self) -> Option<ElementId> {
        self.container.as_ref().map(|weak| weak.id())
    }

    /// Strong handle to the container, if it still exists
    pub fn container(&self) -> Option<Element> {
        self.container.as_ref().and_then(|weak| weak.upgrade())
    }

    /// The placeholder is always alive; other records live as long as
    /// their container does
    pub fn is_alive(&self) -> bool {
        match &self.container {
            Some(weak) => weak.is_alive(),
            None => true,
        }
    }

    pub fn class_tag(&self) -> Option<ClassTag> {
        self.class_tag
    }

    /// Position among this element's own records
    pub fn local_index(&self) -> usize {
        self.local_index
    }

    /// Position in the process-wide insertion order
    pub fn global_index(&self) -> u64 {
        self.global_index
    }

    pub(crate) fn handle(&self) -> Option<SiteHandle> {
        self.container_id().map(|container_id| SiteHandle {
            container_id,
            local_index: self.local_index,
            global_index: self.global_index,
        })
    }
}
