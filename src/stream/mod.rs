//! Containers (streams) and coordinated membership
//!
//! A [`Stream`] is an [`Element`] that holds other elements: a plain stream,
//! a measure, a part, a score or a voice. Every membership change goes
//! through this module so that the container's
//! [`ContainerOffsetMap`] and the member's [`Sites`](crate::sites::Sites)
//! always agree:
//!
//! ```text
//! insert(offset, e)          remove(e)
//!   offset map  += e           offset map  -= e
//!   e.sites     += self        e.sites     -= self
//! ```

pub mod offset_map;
pub mod transform;

pub use offset_map::ContainerOffsetMap;

use crate::errors::{Result, StreamError};
use crate::models::class_tag::{ClassTag, HasClassTag};
use crate::models::element::{Element, ElementId};
use crate::models::notation::{MeasureData, Payload};
use crate::models::offset::{ql, OffsetQL};
use std::cell::{Ref, RefMut};
use std::collections::HashSet;
use std::ops::Deref;

/// Handle to a container element
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Stream(Element);

impl Stream {
    fn with_payload(payload: Payload) -> Self {
        Stream(Element::new(payload, ql(0)))
    }

    /// Plain, untyped container
    pub fn new() -> Self {
        Self::with_payload(Payload::Stream)
    }

    pub fn measure(number: u32) -> Self {
        Self::with_payload(Payload::Measure(MeasureData {
            number,
            padding_left: ql(0),
        }))
    }

    /// Incomplete measure whose first `padding_left` quarter lengths are
    /// missing (an anacrusis)
    pub fn pickup_measure(number: u32, padding_left: OffsetQL) -> Self {
        Self::with_payload(Payload::Measure(MeasureData {
            number,
            padding_left,
        }))
    }

    pub fn part(name: impl Into<String>) -> Self {
        Self::with_payload(Payload::Part { name: name.into() })
    }

    pub fn score() -> Self {
        Self::with_payload(Payload::Score { title: None })
    }

    pub fn titled_score(title: impl Into<String>) -> Self {
        Self::with_payload(Payload::Score {
            title: Some(title.into()),
        })
    }

    pub fn voice(id: impl Into<String>) -> Self {
        Self::with_payload(Payload::Voice { id: id.into() })
    }

    /// Empty container of the same class and payload as `self`
    pub(crate) fn empty_like(&self) -> Self {
        Self::with_payload(self.0.payload())
    }

    pub fn element(&self) -> &Element {
        &self.0
    }

    pub fn into_element(self) -> Element {
        self.0
    }

    fn store(&self) -> Ref<'_, ContainerOffsetMap> {
        self.0 .0.store.borrow()
    }

    fn store_mut(&self) -> RefMut<'_, ContainerOffsetMap> {
        self.0 .0.store.borrow_mut()
    }

    // ------------------------------------------------------------------
    // Membership changes
    // ------------------------------------------------------------------

    /// Place `element` at `offset`
    ///
    /// Records the offset here and the back-reference in the element's
    /// sites. Rejected when the element is this container or one of its
    /// ancestors, holds this container through its members or derivation
    /// origins, is already a member, or it or any of its descendants
    /// already sits in a container nested with this one.
    pub fn insert(&self, offset: OffsetQL, element: impl AsRef<Element>) -> Result<()> {
        let element = element.as_ref();
        if offset < ql(0) {
            return Err(StreamError::NegativeOffset {
                element: element.id(),
                offset,
            });
        }
        // members and derivation origins are strong edges; a path back to
        // self would be a reference cycle
        if element.id() == self.id()
            || is_ancestor(element, self)
            || strongly_reaches(element, self)
        {
            return Err(StreamError::SelfContainment {
                element: element.id(),
                container: self.id(),
            });
        }
        if self.contains(element.id()) {
            return Err(StreamError::AlreadyMember {
                element: element.id(),
                container: self.id(),
            });
        }
        for existing in element.containers(false) {
            if is_ancestor(&existing, self) || is_ancestor(self, &existing) {
                return Err(StreamError::NestedPlacement {
                    element: element.id(),
                    existing: existing.id(),
                    container: self.id(),
                });
            }
        }
        if let Some(inserted) = element.as_stream() {
            self.check_descendant_placements(&inserted)?;
        }

        let handle = element.0.sites.borrow_mut().add(self);
        self.store_mut()
            .insert(element.clone(), offset, handle.global_index);
        log::debug!(
            "inserted {:?} into {:?} at offset {}",
            element,
            self.0,
            offset
        );
        Ok(())
    }

    /// Descendants of `inserted` must not already sit in this container or
    /// in a container nested with it
    fn check_descendant_placements(&self, inserted: &Stream) -> Result<()> {
        let walk = inserted.recurse();
        let mut subtree: HashSet<ElementId> = walk
            .iter()
            .filter(|(_, e)| e.is_stream())
            .map(|(_, e)| e.id())
            .collect();
        subtree.insert(inserted.id());

        for (_, descendant) in &walk {
            for existing in descendant.containers(false) {
                if subtree.contains(&existing.id()) {
                    continue;
                }
                if existing.id() == self.id()
                    || is_ancestor(&existing, self)
                    || is_ancestor(self, &existing)
                {
                    return Err(StreamError::NestedPlacement {
                        element: descendant.id(),
                        existing: existing.id(),
                        container: self.id(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Place `element` at the current highest time
    pub fn append(&self, element: impl AsRef<Element>) -> Result<()> {
        let offset = self.highest_time();
        self.insert(offset, element)
    }

    /// Remove `element`; false if it was not a member
    pub fn remove(&self, element: impl AsRef<Element>) -> bool {
        self.remove_element(element.as_ref().id())
    }

    /// Remove the member with identity `id` and drop its site for this
    /// container; false if it was not a member
    pub fn remove_element(&self, id: ElementId) -> bool {
        let removed = self.store_mut().remove(id);
        let Some(element) = removed else {
            return false;
        };
        let had_site = element.0.sites.borrow_mut().remove(self.id());
        if !had_site {
            log::warn!("{:?} had no site record for {:?}", element, self.0);
        }
        debug_assert!(had_site, "forward membership without a back-reference");
        log::debug!("removed {:?} from {:?}", element, self.0);
        true
    }

    /// Move a member to `offset`
    pub fn set_offset(&self, id: ElementId, offset: OffsetQL) -> Result<()> {
        if offset < ql(0) {
            return Err(StreamError::NegativeOffset { element: id, offset });
        }
        match self.store_mut().set_offset(id, offset) {
            Some(_) => Ok(()),
            None => Err(StreamError::NotFound {
                element: id,
                container: self.id(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Offset of member `id`; `NotFound` for non-members
    pub fn get_offset(&self, id: ElementId) -> Result<OffsetQL> {
        self.store().get_offset(id).ok_or(StreamError::NotFound {
            element: id,
            container: self.id(),
        })
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.store().contains(id)
    }

    pub fn len(&self) -> usize {
        self.store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store().is_empty()
    }

    pub fn index_of(&self, id: ElementId) -> Option<usize> {
        self.store().index_of(id)
    }

    /// Members sorted by offset, class and insertion
    pub fn elements(&self) -> Vec<Element> {
        self.store().elements()
    }

    /// (offset, member) pairs in sorted order
    pub fn entries(&self) -> Vec<(OffsetQL, Element)> {
        self.store().entries()
    }

    /// Direct members of class `tag`
    pub fn elements_by_class(&self, tag: ClassTag) -> Vec<Element> {
        self.store()
            .elements()
            .into_iter()
            .filter(|element| element.is_class_or_subclass(tag))
            .collect()
    }

    pub fn first(&self) -> Option<Element> {
        self.store().elements().into_iter().next()
    }

    pub fn last(&self) -> Option<Element> {
        self.store().elements().pop()
    }

    pub fn highest_time(&self) -> OffsetQL {
        self.store().highest_time()
    }

    /// Depth-first walk of all descendants with offsets relative to this
    /// container; a nested container precedes its own contents
    pub fn recurse(&self) -> Vec<(OffsetQL, Element)> {
        let mut out = Vec::new();
        self.recurse_into(ql(0), &mut out);
        out
    }

    fn recurse_into(&self, base: OffsetQL, out: &mut Vec<(OffsetQL, Element)>) {
        for (offset, element) in self.entries() {
            let absolute = base + offset;
            let nested = element.as_stream();
            out.push((absolute, element));
            if let Some(stream) = nested {
                stream.recurse_into(absolute, out);
            }
        }
    }

    /// Members whose back-reference to this container is missing
    ///
    /// Always empty unless the coordinated paths are broken; meant for
    /// tests and debugging.
    pub fn verify_membership(&self) -> Vec<ElementId> {
        let violations: Vec<ElementId> = self
            .elements()
            .into_iter()
            .filter(|element| !element.has_site(self))
            .map(|element| element.id())
            .collect();
        if !violations.is_empty() {
            log::warn!("{:?}: members without back-reference: {:?}", self.0, violations);
        }
        violations
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Stream {
    type Target = Element;

    fn deref(&self) -> &Element {
        &self.0
    }
}

impl AsRef<Element> for Stream {
    fn as_ref(&self) -> &Element {
        &self.0
    }
}

impl From<Stream> for Element {
    fn from(stream: Stream) -> Element {
        stream.0
    }
}

impl TryFrom<Element> for Stream {
    type Error = StreamError;

    fn try_from(element: Element) -> Result<Stream> {
        if element.is_stream() {
            Ok(Stream(element))
        } else {
            Err(StreamError::NotAContainer {
                element: element.id(),
                class: element.class_tag(),
            })
        }
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.0, f)
    }
}

impl Element {
    /// Container view of this element, if it is one
    pub fn as_stream(&self) -> Option<Stream> {
        if self.is_stream() {
            Some(Stream(self.clone()))
        } else {
            None
        }
    }
}

/// True if `candidate` is reachable by walking outward from `node`
fn is_ancestor(candidate: &Element, node: &Element) -> bool {
    let mut visited = HashSet::new();
    let mut pending = node.containers(false);
    while let Some(container) = pending.pop() {
        if container.id() == candidate.id() {
            return true;
        }
        if visited.insert(container.id()) {
            pending.extend(container.containers(false));
        }
    }
    false
}

/// True if `target` is reachable from `node` through members or
/// derivation origins
fn strongly_reaches(node: &Element, target: &Element) -> bool {
    let mut visited = HashSet::new();
    let mut pending = vec![node.clone()];
    while let Some(current) = pending.pop() {
        if current.id() == target.id() {
            return true;
        }
        if !visited.insert(current.id()) {
            continue;
        }
        if let Some(derivation) = current.derivation() {
            pending.push(derivation.origin().clone());
        }
        pending.extend(current.0.store.borrow().elements());
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notation::NoteData;
    use crate::models::pitch::Pitch;

    fn note(name: &str) -> Element {
        Element::new(
            Payload::Note(NoteData::new(Pitch::from_name(name).unwrap())),
            ql(1),
        )
    }

    #[test]
    fn test_insert_records_both_directions() {
        let measure = Stream::measure(1);
        let n = note("C4");
        measure.insert(ql(2), &n).unwrap();

        assert_eq!(measure.get_offset(n.id()), Ok(ql(2)));
        assert!(n.has_site(&measure));
        assert_eq!(n.site_count(), 1);
        assert!(measure.verify_membership().is_empty());
    }

    #[test]
    fn test_remove_clears_both_directions() {
        let measure = Stream::measure(1);
        let n = note("C4");
        measure.insert(ql(0), &n).unwrap();

        assert!(measure.remove(&n));
        assert!(!measure.remove(&n));
        assert!(!n.has_site(&measure));
        assert_eq!(
            measure.get_offset(n.id()),
            Err(StreamError::NotFound {
                element: n.id(),
                container: measure.id()
            })
        );
    }

    #[test]
    fn test_append_uses_highest_time() {
        let measure = Stream::measure(1);
        let a = note("C4");
        let b = note("D4");
        let c = note("E4");
        measure.append(&a).unwrap();
        measure.append(&b).unwrap();
        measure.append(&c).unwrap();

        assert_eq!(measure.get_offset(c.id()), Ok(ql(2)));
        assert_eq!(measure.highest_time(), ql(3));
        assert_eq!(measure.duration(), ql(3));
    }

    #[test]
    fn test_rejects_duplicates_and_self_containment() {
        let part = Stream::part("Viola");
        let measure = Stream::measure(1);
        let n = note("C4");
        part.insert(ql(0), &measure).unwrap();
        measure.insert(ql(0), &n).unwrap();

        assert!(matches!(
            measure.insert(ql(1), &n),
            Err(StreamError::AlreadyMember { .. })
        ));
        assert!(matches!(
            measure.insert(ql(0), &measure),
            Err(StreamError::SelfContainment { .. })
        ));
        assert!(matches!(
            measure.insert(ql(0), &part),
            Err(StreamError::SelfContainment { .. })
        ));
    }

    #[test]
    fn test_rejects_nested_placement() {
        let part = Stream::part("Cello");
        let measure = Stream::measure(1);
        let n = note("C3");
        part.insert(ql(0), &measure).unwrap();
        measure.insert(ql(0), &n).unwrap();

        let err = part.insert(ql(0), &n).unwrap_err();
        assert_eq!(
            err,
            StreamError::NestedPlacement {
                element: n.id(),
                existing: measure.id(),
                container: part.id()
            }
        );

        // an unrelated container is fine
        let other = Stream::new();
        other.insert(ql(5), &n).unwrap();
        assert_eq!(n.site_count(), 2);
    }

    #[test]
    fn test_rejects_container_holding_a_nested_member() {
        let part = Stream::part("Cello");
        let measure = Stream::measure(1);
        let n = note("C3");
        part.insert(ql(0), &n).unwrap();
        measure.insert(ql(0), &n).unwrap();

        assert_eq!(
            part.insert(ql(0), &measure),
            Err(StreamError::NestedPlacement {
                element: n.id(),
                existing: part.id(),
                container: part.id()
            })
        );
        assert_eq!(part.len(), 1);
        assert_eq!(n.site_count(), 2);

        // the note's parent inside the inserted measure is not a conflict
        let other = Stream::part("Bass");
        other.insert(ql(0), &measure).unwrap();
    }

    #[test]
    fn test_rejects_derived_container_holding_its_origin() {
        let part = Stream::part("Harp");
        let measure = Stream::measure(1);
        measure.insert(ql(0), note("C4")).unwrap();
        part.insert(ql(0), &measure).unwrap();

        let flat = part.flatten().unwrap();
        assert!(matches!(
            part.insert(ql(4), &flat),
            Err(StreamError::SelfContainment { .. })
        ));
        let copy = part.deep_copy().unwrap();
        assert!(matches!(
            measure.insert(ql(4), &copy),
            Err(StreamError::SelfContainment { .. })
        ));

        let weak = part.downgrade();
        drop((part, measure, flat, copy));
        assert!(!weak.is_alive());
    }

    #[test]
    fn test_rejects_negative_offsets() {
        let s = Stream::new();
        let n = note("C4");
        assert!(matches!(
            s.insert(ql(-1), &n),
            Err(StreamError::NegativeOffset { .. })
        ));
        s.insert(ql(0), &n).unwrap();
        assert!(s.set_offset(n.id(), ql(-2)).is_err());
    }

    #[test]
    fn test_set_offset_requires_membership() {
        let s = Stream::new();
        let n = note("C4");
        let stranger = note("D4");
        s.insert(ql(0), &n).unwrap();

        s.set_offset(n.id(), ql(4)).unwrap();
        assert_eq!(s.get_offset(n.id()), Ok(ql(4)));
        assert!(matches!(
            s.set_offset(stranger.id(), ql(1)),
            Err(StreamError::NotFound { .. })
        ));
    }

    #[test]
    fn test_recurse_offsets_are_relative_to_root() {
        let part = Stream::part("Flute");
        let m1 = Stream::measure(1);
        let m2 = Stream::measure(2);
        let a = note("C4");
        let b = note("D4");
        m1.insert(ql(1), &a).unwrap();
        m2.insert(ql(2), &b).unwrap();
        part.insert(ql(0), &m1).unwrap();
        part.insert(ql(4), &m2).unwrap();

        let walk: Vec<(OffsetQL, ElementId)> =
            part.recurse().into_iter().map(|(o, e)| (o, e.id())).collect();
        assert_eq!(
            walk,
            vec![
                (ql(0), m1.id()),
                (ql(1), a.id()),
                (ql(4), m2.id()),
                (ql(6), b.id()),
            ]
        );
    }

    #[test]
    fn test_members_survive_while_container_lives() {
        let measure = Stream::measure(1);
        let id = {
            let n = note("C4");
            measure.insert(ql(0), &n).unwrap();
            n.id()
        };
        // the container keeps the note alive
        assert_eq!(measure.first().map(|e| e.id()), Some(id));
    }

    #[test]
    fn test_try_from_element() {
        let n = note("C4");
        assert!(matches!(
            Stream::try_from(n),
            Err(StreamError::NotAContainer { class: ClassTag::Note, .. })
        ));
        let m = Stream::measure(2);
        let as_element: Element = m.clone().into();
        assert_eq!(Stream::try_from(as_element).map(|s| s.id()), Ok(m.id()));
    }
}
