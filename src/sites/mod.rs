//! Membership sets
//!
//! Every element owns a [`Sites`] collection recording each container that
//! currently holds it. Records are kept in insertion order (the global
//! counter only grows), so "oldest first" and "newest first" traversals are
//! a plain walk or a reversed walk and never depend on hash order or on when
//! a container happened to be dropped.
//!
//! # Liveness
//!
//! Records reference containers weakly. A container that nobody else holds
//! is freed normally; its record becomes dead. Dead records are only
//! discovered by a query, which skips them and prunes them as a side effect.
//! Nothing here scans in the background.

pub mod site;

pub use site::{Site, SiteHandle};

use crate::models::class_tag::ClassTag;
use crate::models::element::{Element, ElementId};
use crate::models::notation::AttributeValue;

/// All membership records of one element
#[derive(Debug, Clone)]
pub struct Sites {
    records: Vec<Site>,
    next_local_index: usize,
}

impl Default for Sites {
    fn default() -> Self {
        Self::new()
    }
}

impl Sites {
    /// A set holding only the "unplaced" placeholder
    pub fn new() -> Self {
        Self {
            records: vec![Site::placeholder()],
            next_local_index: 1,
        }
    }

    /// Record a placement in `container`
    ///
    /// The same element may be recorded in any number of unrelated
    /// containers; each call appends a record with the next global index.
    pub fn add(&mut self, container: &Element) -> SiteHandle {
        let site = Site::new(container, self.next_local_index);
        self.next_local_index += 1;
        let handle = SiteHandle {
            container_id: container.id(),
            local_index: site.local_index(),
            global_index: site.global_index(),
        };
        self.records.push(site);
        handle
    }

    /// Delete the record for `container_id`; absent records are a no-op
    pub fn remove(&mut self, container_id: ElementId) -> bool {
        let before = self.records.len();
        self.records
            .retain(|site| site.container_id() != Some(container_id));
        before != self.records.len()
    }

    /// Drop every record whose container no longer exists
    pub fn purge_dead(&mut self) -> usize {
        let before = self.records.len();
        self.records.retain(|site| {
            let alive = site.is_alive();
            if !alive {
                log::trace!("pruning dead site {:?}", site.container_id());
            }
            alive
        });
        before - self.records.len()
    }

    /// Number of live records, by default not counting the placeholder
    pub fn site_count(&mut self, exclude_none: bool) -> usize {
        self.purge_dead();
        self.records
            .iter()
            .filter(|site| !(exclude_none && site.is_placeholder()))
            .count()
    }

    /// True if a live record for `container_id` exists
    pub fn has_site(&mut self, container_id: ElementId) -> bool {
        self.purge_dead();
        self.records
            .iter()
            .any(|site| site.container_id() == Some(container_id))
    }

    /// Global insertion index of the record for `container_id`
    pub fn global_index_of(&self, container_id: ElementId) -> Option<u64> {
        self.records
            .iter()
            .find(|site| site.container_id() == Some(container_id) && site.is_alive())
            .map(|site| site.global_index())
    }

    /// Live containers of class `tag`
    ///
    /// Oldest first; newest first when `sort_by_creation_time` is set.
    pub fn sites_by_class(&mut self, tag: ClassTag, sort_by_creation_time: bool) -> Vec<Element> {
        let mut found = Vec::new();
        let mut dead = 0usize;
        for site in &self.records {
            // cached tag first: no weak dereference for non-matching records
            let matches = site.class_tag().is_some_and(|t| t.is_a(tag));
            if !matches {
                continue;
            }
            match site.container() {
                Some(container) => found.push(container),
                None => dead += 1,
            }
        }
        if dead > 0 {
            self.purge_dead();
        }
        if sort_by_creation_time {
            found.reverse();
        }
        found
    }

    /// Lazy, restartable traversal of the records
    ///
    /// Each call starts from the current live set. The iterator holds only
    /// weak references; a container dropped mid-walk is skipped.
    pub fn iter_sites(&mut self, exclude_none: bool, sort_by_creation_time: bool) -> SiteIter {
        self.purge_dead();
        let mut pending: Vec<Site> = self
            .records
            .iter()
            .filter(|site| !(exclude_none && site.is_placeholder()))
            .cloned()
            .collect();
        if sort_by_creation_time {
            pending.reverse();
        }
        SiteIter {
            pending: pending.into_iter(),
        }
    }

    /// Walk live containers newest first and return the first value of
    /// `attribute_name` any of them exposes
    pub fn attribute_by_ancestor_class(&mut self, attribute_name: &str) -> Option<AttributeValue> {
        self.iter_sites(true, true)
            .filter_map(|entry| entry.container)
            .find_map(|container| container.attribute(attribute_name))
    }

    /// Records in insertion order, including dead ones not yet pruned
    pub fn records(&self) -> &[Site] {
        &self.records
    }
}

/// One step of a [`SiteIter`]
#[derive(Debug, Clone)]
pub struct SiteEntry {
    /// The container, or `None` for the unplaced placeholder
    pub container: Option<Element>,
    pub class_tag: Option<ClassTag>,
    pub local_index: usize,
    pub global_index: u64,
}

/// Iterator returned by [`Sites::iter_sites`]
pub struct SiteIter {
    pending: std::vec::IntoIter<Site>,
}

impl Iterator for SiteIter {
    type Item = SiteEntry;

    fn next(&mut self) -> Option<SiteEntry> {
        loop {
            let site = self.pending.next()?;
            let container = if site.is_placeholder() {
                None
            } else {
                match site.container() {
                    Some(container) => Some(container),
                    None => continue,
                }
            };
            return Some(SiteEntry {
                container,
                class_tag: site.class_tag(),
                local_index: site.local_index(),
                global_index: site.global_index(),
            });
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.pending.len()))
    }
}
