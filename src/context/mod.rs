//! Context resolution
//!
//! Answers questions an element cannot answer from its own fields: which
//! measure holds it, which time signature is in force, which note came
//! before it. The resolver walks outward through live membership records,
//! then through derivation links when the element's own placements run out.
//!
//! Search order for a note in measure 2 of a part:
//!
//! ```text
//! depth 1  measure 2   members at or before the note, measure 2, its contents
//! depth 2  part        part, its flattened contents at or before the note
//! then     origin of the note (if derived), same walk
//! ```

pub mod attributes;

pub use attributes::DerivedAttribute;

use crate::models::class_tag::{ClassTag, HasClassTag};
use crate::models::element::{Element, ElementId};
use crate::models::offset::OffsetQL;
use crate::settings::ResolverSettings;
use std::collections::HashSet;

/// How a context site is searched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    /// Direct members first, then the site, then its flattened contents
    ElementsFirst,
    /// The site, then its flattened contents
    Flatten,
}

/// One container reachable outward from an element
#[derive(Debug, Clone)]
pub struct ContextSite {
    pub site: Element,
    /// Offset of the anchor expressed in `site`'s coordinates
    pub offset: OffsetQL,
    /// 1 for a direct container, 2 for its container, ...
    pub depth: usize,
    /// Reached through a derivation origin rather than the element itself
    pub via_derivation: bool,
    /// The element whose placement leads here (the start element or one of
    /// its derivation origins)
    pub anchor: ElementId,
    pub search: SearchType,
}

/// Context queries configured by [`ResolverSettings`]
#[derive(Debug, Clone, Default)]
pub struct ContextResolver {
    settings: ResolverSettings,
}

impl ContextResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Every container reachable outward from `element`, nearest first
    ///
    /// Live sites are taken most recently added first and each is explored
    /// depth-first before the next one. A container reached twice is only
    /// listed the first time. Derivation origins follow when enabled.
    pub fn context_sites(&self, element: &Element) -> Vec<ContextSite> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(element.id());
        collect_from(element, false, &mut visited, &mut out);

        if self.settings.follow_derivation {
            for origin in element.derivation_chain() {
                log::trace!("{:?}: following derivation to {:?}", element, origin);
                visited.insert(origin.id());
                collect_from(&origin, true, &mut visited, &mut out);
            }
        }
        out
    }

    /// Nearest object of class `tag` around `element`, limited by the
    /// configured maximum distance
    pub fn get_context_by_class(&self, element: &Element, tag: ClassTag) -> Option<Element> {
        self.get_context_by_class_within(element, tag, self.settings.max_distance)
    }

    /// Like [`get_context_by_class`](Self::get_context_by_class) with an
    /// explicit depth limit (`None` is unbounded)
    pub fn get_context_by_class_within(
        &self,
        element: &Element,
        tag: ClassTag,
        maximum_distance: Option<usize>,
    ) -> Option<Element> {
        let sites = self.context_sites(element);
        search_sites(element, &sites, tag, maximum_distance)
    }

    /// Nearest element before `element` (across container boundaries)
    /// matching `predicate`
    ///
    /// Containers of the context chain and the element itself are never
    /// returned; other containers are offered to `predicate`.
    pub fn find_previous_element<F>(&self, element: &Element, predicate: F) -> Option<Element>
    where
        F: Fn(&Element) -> bool,
    {
        let sites = self.context_sites(element);
        let excluded = excluded_ids(element, &sites);
        for context in &sites {
            let ordered = ordered_contents(&context.site);
            let before = match ordered.iter().position(|(_, e)| e.id() == context.anchor) {
                Some(index) => &ordered[..index],
                None => {
                    let end = ordered.partition_point(|(offset, _)| *offset < context.offset);
                    &ordered[..end]
                }
            };
            let found = before
                .iter()
                .rev()
                .map(|(_, candidate)| candidate)
                .find(|candidate| !excluded.contains(&candidate.id()) && predicate(candidate));
            if let Some(found) = found {
                return Some(found.clone());
            }
        }
        None
    }

    /// Nearest element after `element` matching `predicate`
    pub fn find_next_element<F>(&self, element: &Element, predicate: F) -> Option<Element>
    where
        F: Fn(&Element) -> bool,
    {
        let sites = self.context_sites(element);
        let excluded = excluded_ids(element, &sites);
        for context in &sites {
            let ordered = ordered_contents(&context.site);
            let after = match ordered.iter().position(|(_, e)| e.id() == context.anchor) {
                Some(index) => &ordered[index + 1..],
                None => {
                    let start = ordered.partition_point(|(offset, _)| *offset <= context.offset);
                    &ordered[start..]
                }
            };
            let found = after
                .iter()
                .map(|(_, candidate)| candidate)
                .find(|candidate| !excluded.contains(&candidate.id()) && predicate(candidate));
            if let Some(found) = found {
                return Some(found.clone());
            }
        }
        None
    }

    /// Offset of `element` in the coordinates of `ancestor`, if `ancestor`
    /// is one of its context sites
    pub fn offset_in_hierarchy(&self, element: &Element, ancestor: &Element) -> Option<OffsetQL> {
        self.context_sites(element)
            .into_iter()
            .find(|context| context.site.id() == ancestor.id())
            .map(|context| context.offset)
    }
}

fn collect_from(
    anchor: &Element,
    via_derivation: bool,
    visited: &mut HashSet<ElementId>,
    out: &mut Vec<ContextSite>,
) {
    for container in anchor.containers(true) {
        if !visited.insert(container.id()) {
            continue;
        }
        let Some(offset) = member_offset(&container, anchor) else {
            continue;
        };
        out.push(ContextSite {
            site: container.clone(),
            offset,
            depth: 1,
            via_derivation,
            anchor: anchor.id(),
            search: SearchType::ElementsFirst,
        });
        collect_outer(anchor.id(), &container, offset, 2, via_derivation, visited, out);
    }
}

fn collect_outer(
    anchor: ElementId,
    inner: &Element,
    offset_in_inner: OffsetQL,
    depth: usize,
    via_derivation: bool,
    visited: &mut HashSet<ElementId>,
    out: &mut Vec<ContextSite>,
) {
    for outer in inner.containers(true) {
        if !visited.insert(outer.id()) {
            continue;
        }
        let Some(inner_offset) = member_offset(&outer, inner) else {
            continue;
        };
        let offset = inner_offset + offset_in_inner;
        out.push(ContextSite {
            site: outer.clone(),
            offset,
            depth,
            via_derivation,
            anchor,
            search: SearchType::Flatten,
        });
        collect_outer(anchor, &outer, offset, depth + 1, via_derivation, visited, out);
    }
}

fn member_offset(container: &Element, member: &Element) -> Option<OffsetQL> {
    container.as_stream()?.get_offset(member.id()).ok()
}

/// Contents of `site` in hierarchy order, stably sorted by offset
fn ordered_contents(site: &Element) -> Vec<(OffsetQL, Element)> {
    let mut contents = site
        .as_stream()
        .map(|stream| stream.recurse())
        .unwrap_or_default();
    contents.sort_by_key(|(offset, _)| *offset);
    contents
}

fn excluded_ids(element: &Element, sites: &[ContextSite]) -> HashSet<ElementId> {
    let mut excluded: HashSet<ElementId> = sites.iter().map(|c| c.site.id()).collect();
    excluded.insert(element.id());
    excluded.extend(sites.iter().map(|c| c.anchor));
    excluded
}

pub(crate) fn search_sites(
    element: &Element,
    sites: &[ContextSite],
    tag: ClassTag,
    maximum_distance: Option<usize>,
) -> Option<Element> {
    let usable = |candidate: &Element, anchor: ElementId| {
        candidate.id() != element.id()
            && candidate.id() != anchor
            && candidate.is_class_or_subclass(tag)
    };

    for context in sites {
        if maximum_distance.is_some_and(|max| context.depth > max) {
            continue;
        }
        let Some(stream) = context.site.as_stream() else {
            continue;
        };

        if context.search == SearchType::ElementsFirst {
            let entries = stream.entries();
            // members sorted after the anchor come later even at its offset
            let before = match entries.iter().position(|(_, e)| e.id() == context.anchor) {
                Some(index) => &entries[..index],
                None => {
                    let end = entries.partition_point(|(offset, _)| *offset <= context.offset);
                    &entries[..end]
                }
            };
            let direct = before
                .iter()
                .rev()
                .find(|(_, candidate)| usable(candidate, context.anchor));
            if let Some((_, found)) = direct {
                return Some(found.clone());
            }
        }

        if usable(&context.site, context.anchor) {
            return Some(context.site.clone());
        }

        // latest (offset, walk position) wins among flattened contents
        let walk = stream.recurse();
        let anchor_position = walk.iter().position(|(_, e)| e.id() == context.anchor);
        let flattened = walk
            .into_iter()
            .enumerate()
            .filter(|(position, (offset, candidate))| {
                let in_time = *offset < context.offset
                    || (*offset == context.offset
                        && anchor_position.map_or(true, |anchor| *position < anchor));
                in_time && usable(candidate, context.anchor)
            })
            .max_by_key(|(position, (offset, _))| (*offset, *position));
        if let Some((_, (_, found))) = flattened {
            return Some(found);
        }
    }
    None
}

impl Element {
    /// Nearest object of class `tag` with default resolver settings
    pub fn get_context_by_class(&self, tag: ClassTag) -> Option<Element> {
        ContextResolver::default().get_context_by_class(self, tag)
    }

    /// Nearest earlier element matching `predicate`
    pub fn previous_element<F>(&self, predicate: F) -> Option<Element>
    where
        F: Fn(&Element) -> bool,
    {
        ContextResolver::default().find_previous_element(self, predicate)
    }

    /// Nearest later element matching `predicate`
    pub fn next_element<F>(&self, predicate: F) -> Option<Element>
    where
        F: Fn(&Element) -> bool,
    {
        ContextResolver::default().find_next_element(self, predicate)
    }
}
