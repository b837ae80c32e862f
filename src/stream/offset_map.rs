//! Container-side membership: members and their offsets
//!
//! The [`ContainerOffsetMap`] is the forward half of membership. It owns the
//! members (strong handles) and maps each member identity to its offset.
//! The backward half is the member's [`Sites`](crate::sites::Sites) record;
//! [`Stream`](super::Stream) keeps the two in step.

use crate::models::class_tag::HasClassTag;
use crate::models::element::{Element, ElementId};
use crate::models::offset::{ql, OffsetQL};
use std::collections::HashMap;

#[derive(Clone)]
struct Member {
    element: Element,
    /// Global site index of the insertion; breaks ties after offset and class
    insert_index: u64,
}

/// Ordered members of one container plus identity → offset
#[derive(Clone, Default)]
pub struct ContainerOffsetMap {
    /// Sorted by (offset, class sort order, insertion)
    members: Vec<Member>,
    offsets: HashMap<ElementId, OffsetQL>,
}

impl ContainerOffsetMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn sort_key(&self, member: &Member) -> (OffsetQL, i8, u64) {
        let offset = self
            .offsets
            .get(&member.element.id())
            .copied()
            .unwrap_or_else(|| ql(0));
        (offset, member.element.class_tag().sort_order(), member.insert_index)
    }

    /// Add a member; the caller records the matching site
    pub(crate) fn insert(&mut self, element: Element, offset: OffsetQL, insert_index: u64) {
        self.offsets.insert(element.id(), offset);
        let member = Member {
            element,
            insert_index,
        };
        let key = self.sort_key(&member);
        let position = self
            .members
            .partition_point(|existing| self.sort_key(existing) <= key);
        self.members.insert(position, member);
    }

    /// Move a member; returns the previous offset, or `None` for a
    /// non-member (nothing changes then)
    pub(crate) fn set_offset(&mut self, id: ElementId, offset: OffsetQL) -> Option<OffsetQL> {
        let previous = self.offsets.get_mut(&id).map(|slot| std::mem::replace(slot, offset))?;
        let mut members = std::mem::take(&mut self.members);
        members.sort_by_key(|member| self.sort_key(member));
        self.members = members;
        Some(previous)
    }

    /// Drop a member and hand back its handle; the caller removes the site
    pub(crate) fn remove(&mut self, id: ElementId) -> Option<Element> {
        self.offsets.remove(&id)?;
        let position = self
            .members
            .iter()
            .position(|member| member.element.id() == id)?;
        Some(self.members.remove(position).element)
    }

    /// Offset of a member; `None` when `id` is not a member
    pub fn get_offset(&self, id: ElementId) -> Option<OffsetQL> {
        self.offsets.get(&id).copied()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.offsets.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Position of a member in sorted order
    pub fn index_of(&self, id: ElementId) -> Option<usize> {
        self.members.iter().position(|member| member.element.id() == id)
    }

    /// Members in sorted order
    pub fn elements(&self) -> Vec<Element> {
        self.members.iter().map(|member| member.element.clone()).collect()
    }

    /// (offset, member) pairs in sorted order
    pub fn entries(&self) -> Vec<(OffsetQL, Element)> {
        self.members
            .iter()
            .map(|member| (self.sort_key(member).0, member.element.clone()))
            .collect()
    }

    /// Member identities in sorted order
    pub fn ids(&self) -> Vec<ElementId> {
        self.members.iter().map(|member| member.element.id()).collect()
    }

    /// Latest end point (offset + duration) over all members
    pub fn highest_time(&self) -> OffsetQL {
        self.members
            .iter()
            .map(|member| self.sort_key(member).0 + member.element.duration())
            .max()
            .unwrap_or_else(|| ql(0))
    }
}
