//! Elements and their identities
//!
//! An [`Element`] is a cheap, clonable handle to a shared node. Containers
//! hold strong handles to their members; everything that merely needs to
//! *find* a container (membership records, most importantly) holds a
//! [`WeakElement`], so a container lives exactly as long as somebody other
//! than its own members keeps it.
//!
//! ```text
//! Stream ──(strong: ContainerOffsetMap)──▶ Element
//!    ▲                                        │
//!    └──────────(weak: Sites record)──────────┘
//! ```

use super::class_tag::{ClassTag, HasClassTag};
use super::notation::{AttributeValue, Payload};
use super::offset::OffsetQL;
use crate::derivation::Derivation;
use crate::sites::Sites;
use crate::stream::offset_map::ContainerOffsetMap;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique, never reused element identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(u64);

impl ElementId {
    fn next() -> Self {
        ElementId(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared state behind an [`Element`] handle
pub(crate) struct ElementNode {
    pub(crate) id: ElementId,
    pub(crate) class_tag: ClassTag,
    pub(crate) payload: RefCell<Payload>,
    pub(crate) duration: Cell<OffsetQL>,
    pub(crate) sites: RefCell<Sites>,
    pub(crate) derivation: RefCell<Option<Derivation>>,
    /// Members, for containers; always empty for leaf elements
    pub(crate) store: RefCell<ContainerOffsetMap>,
}

/// Handle to a placeable musical object (note, clef, measure, ...)
///
/// Cloning a handle is cheap and shares the object. Equality and hashing
/// use the element identity.
#[derive(Clone)]
pub struct Element(pub(crate) Rc<ElementNode>);

impl Element {
    /// Create an element from its payload and duration
    ///
    /// Container payloads (measure, part, ...) take their duration from
    /// their contents; the given duration is ignored for them.
    pub fn new(payload: Payload, duration: OffsetQL) -> Self {
        let class_tag = payload.class_tag();
        Element(Rc::new(ElementNode {
            id: ElementId::next(),
            class_tag,
            payload: RefCell::new(payload),
            duration: Cell::new(duration),
            sites: RefCell::new(Sites::new()),
            derivation: RefCell::new(None),
            store: RefCell::new(ContainerOffsetMap::new()),
        }))
    }

    pub fn id(&self) -> ElementId {
        self.0.id
    }

    /// Copy of the notation payload
    pub fn payload(&self) -> Payload {
        self.0.payload.borrow().clone()
    }

    /// Replace the payload; the class of an element can never change
    pub fn set_payload(&self, payload: Payload) -> Result<(), String> {
        if payload.class_tag() != self.0.class_tag {
            return Err(format!(
                "cannot change {} {} into a {}",
                self.0.class_tag,
                self.0.id,
                payload.class_tag()
            ));
        }
        *self.0.payload.borrow_mut() = payload;
        Ok(())
    }

    /// Duration in quarter lengths; for containers, the highest time of
    /// their contents
    pub fn duration(&self) -> OffsetQL {
        if self.is_stream() {
            self.0.store.borrow().highest_time()
        } else {
            self.0.duration.get()
        }
    }

    /// Set the duration of a leaf element (containers ignore this)
    pub fn set_duration(&self, duration: OffsetQL) {
        if self.is_stream() {
            log::warn!("ignoring set_duration on container {}", self.0.id);
            return;
        }
        self.0.duration.set(duration);
    }

    pub fn is_stream(&self) -> bool {
        self.0.class_tag.is_stream()
    }

    /// Look up a named attribute ("id", "duration", "class" or a payload
    /// attribute such as a measure's "number")
    pub fn attribute(&self, name: &str) -> Option<AttributeValue> {
        match name {
            "id" => Some(AttributeValue::Integer(self.0.id.value() as i64)),
            "duration" => Some(AttributeValue::Offset(self.duration())),
            "class" => Some(AttributeValue::Text(self.0.class_tag.name().to_string())),
            _ => self.0.payload.borrow().attribute(name),
        }
    }

    pub fn downgrade(&self) -> WeakElement {
        WeakElement {
            id: self.0.id,
            node: Rc::downgrade(&self.0),
        }
    }

    /// True if both handles refer to the same object
    pub fn ptr_eq(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ------------------------------------------------------------------
    // Membership queries
    // ------------------------------------------------------------------

    /// Number of live containers holding this element
    pub fn site_count(&self) -> usize {
        self.0.sites.borrow_mut().site_count(true)
    }

    /// Live containers matching `tag`, oldest first unless
    /// `sort_by_creation_time` asks for newest first
    pub fn sites_by_class(&self, tag: ClassTag, sort_by_creation_time: bool) -> Vec<Element> {
        self.0
            .sites
            .borrow_mut()
            .sites_by_class(tag, sort_by_creation_time)
    }

    /// Live containers, oldest first unless `sort_by_creation_time`
    pub fn containers(&self, sort_by_creation_time: bool) -> Vec<Element> {
        self.0
            .sites
            .borrow_mut()
            .iter_sites(true, sort_by_creation_time)
            .filter_map(|entry| entry.container)
            .collect()
    }

    /// Lazy walk over this element's membership records
    pub fn iter_sites(
        &self,
        exclude_none: bool,
        sort_by_creation_time: bool,
    ) -> crate::sites::SiteIter {
        self.0
            .sites
            .borrow_mut()
            .iter_sites(exclude_none, sort_by_creation_time)
    }

    /// First container (newest first) exposing `attribute_name`
    pub fn attribute_by_ancestor_class(&self, attribute_name: &str) -> Option<AttributeValue> {
        self.0
            .sites
            .borrow_mut()
            .attribute_by_ancestor_class(attribute_name)
    }

    /// True if `container` currently holds this element
    pub fn has_site(&self, container: &Element) -> bool {
        self.0.sites.borrow_mut().has_site(container.id())
    }
}

impl HasClassTag for Element {
    fn class_tag(&self) -> ClassTag {
        self.0.class_tag
    }
}

impl AsRef<Element> for Element {
    fn as_ref(&self) -> &Element {
        self
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.0.payload.borrow().label();
        if label.is_empty() {
            write!(f, "{}({})", self.0.class_tag, self.0.id)
        } else {
            write!(f, "{}({} {})", self.0.class_tag, self.0.id, label)
        }
    }
}

/// Non-owning handle; does not keep the element alive
#[derive(Clone)]
pub struct WeakElement {
    id: ElementId,
    node: Weak<ElementNode>,
}

impl WeakElement {
    /// Identity of the referenced element, available even once it is gone
    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn upgrade(&self) -> Option<Element> {
        self.node.upgrade().map(Element)
    }

    /// Liveness check that does not materialize a strong handle
    pub fn is_alive(&self) -> bool {
        self.node.strong_count() > 0
    }
}

impl fmt::Debug for WeakElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_alive() { "live" } else { "dead" };
        write!(f, "WeakElement({} {})", self.id, state)
    }
}
