//! Serializable snapshots for export and debugging
//!
//! Format writers place each element using its container's offset map;
//! [`ExportNode`] captures that tree. [`SiteReport`] lists every place an
//! element currently lives.

use crate::models::class_tag::{ClassTag, HasClassTag};
use crate::models::element::{Element, ElementId};
use crate::models::offset::{ql, OffsetQL};
use crate::stream::Stream;
use serde::{Deserialize, Serialize};

/// One element of an exported container tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportNode {
    pub id: ElementId,
    pub class: ClassTag,
    pub label: String,
    /// Offset in the parent container (0 for the root)
    pub offset: OffsetQL,
    pub duration: OffsetQL,
    /// Members in container order; empty for leaf elements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ExportNode>,
}

impl ExportNode {
    /// Number of nodes in this subtree, including this one
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ExportNode::node_count).sum::<usize>()
    }
}

/// Snapshot of `stream` and everything it contains
pub fn export_stream(stream: &Stream) -> ExportNode {
    export_node(stream, ql(0))
}

fn export_node(element: &Element, offset: OffsetQL) -> ExportNode {
    let children = match element.as_stream() {
        Some(stream) => stream
            .entries()
            .iter()
            .map(|(child_offset, child)| export_node(child, *child_offset))
            .collect(),
        None => Vec::new(),
    };
    ExportNode {
        id: element.id(),
        class: element.class_tag(),
        label: element.payload().label(),
        offset,
        duration: element.duration(),
        children,
    }
}

/// One membership record of a [`SiteReport`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    /// `None` for the unplaced placeholder
    pub container: Option<ElementId>,
    pub class: Option<ClassTag>,
    pub local_index: usize,
    pub global_index: u64,
    /// Offset of the element in this container
    pub offset: Option<OffsetQL>,
}

/// Every live membership record of one element, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteReport {
    pub element: ElementId,
    pub class: ClassTag,
    pub sites: Vec<SiteRecord>,
}

impl SiteReport {
    pub fn for_element(element: &Element) -> Self {
        let sites = element
            .iter_sites(false, false)
            .map(|entry| {
                let offset = entry
                    .container
                    .as_ref()
                    .and_then(|container| container.as_stream())
                    .and_then(|stream| stream.get_offset(element.id()).ok());
                SiteRecord {
                    container: entry.container.as_ref().map(|c| c.id()),
                    class: entry.class_tag,
                    local_index: entry.local_index,
                    global_index: entry.global_index,
                    offset,
                }
            })
            .collect();
        SiteReport {
            element: element.id(),
            class: element.class_tag(),
            sites,
        }
    }

    /// Records for live containers only
    pub fn placed(&self) -> impl Iterator<Item = &SiteRecord> {
        self.sites.iter().filter(|record| record.container.is_some())
    }
}

/// Pretty-printed JSON for any snapshot
pub fn to_json<T: Serialize>(snapshot: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(snapshot)
}
