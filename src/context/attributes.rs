//! Attributes that depend on an element's context
//!
//! Beat, measure number, active key and the like are computed on demand
//! from the context sites rather than stored on the element, so they stay
//! correct as the element moves between containers.

use super::{search_sites, ContextResolver, ContextSite};
use crate::errors::ContextError;
use crate::models::class_tag::ClassTag;
use crate::models::element::Element;
use crate::models::notation::{AttributeValue, Payload, TimeSignatureData};
use crate::models::offset::{ql, OffsetQL};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Context-dependent attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedAttribute {
    /// One-based beat position within the bar (fractional between beats)
    Beat,
    MeasureNumber,
    OffsetInMeasure,
    KeyFifths,
    ClefSign,
    /// Active time signature as "n/d"
    TimeSignature,
    PartName,
}

impl DerivedAttribute {
    pub fn name(&self) -> &'static str {
        match self {
            DerivedAttribute::Beat => "beat",
            DerivedAttribute::MeasureNumber => "measure_number",
            DerivedAttribute::OffsetInMeasure => "offset_in_measure",
            DerivedAttribute::KeyFifths => "key_fifths",
            DerivedAttribute::ClefSign => "clef_sign",
            DerivedAttribute::TimeSignature => "time_signature",
            DerivedAttribute::PartName => "part_name",
        }
    }
}

impl fmt::Display for DerivedAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ContextResolver {
    /// Compute `attribute` for `element` from its context
    ///
    /// Fails with [`ContextError::Orphaned`] when the element sits in no
    /// live container (directly or through its derivations), and with
    /// [`ContextError::MissingContext`] when the hierarchy lacks the class
    /// the attribute needs.
    pub fn compute_derived_attribute(
        &self,
        element: &Element,
        attribute: DerivedAttribute,
    ) -> Result<AttributeValue, ContextError> {
        let value = match attribute {
            DerivedAttribute::Beat => AttributeValue::Offset(self.beat(element)?),
            DerivedAttribute::MeasureNumber => {
                AttributeValue::Integer(self.measure_number(element)? as i64)
            }
            DerivedAttribute::OffsetInMeasure => {
                AttributeValue::Offset(self.offset_in_measure(element)?)
            }
            DerivedAttribute::KeyFifths => AttributeValue::Integer(self.key_fifths(element)? as i64),
            DerivedAttribute::ClefSign => AttributeValue::Text(self.clef_sign(element)?),
            DerivedAttribute::TimeSignature => {
                AttributeValue::Text(self.active_time_signature(element)?.to_string())
            }
            DerivedAttribute::PartName => AttributeValue::Text(self.part_name(element)?),
        };
        log::trace!("{:?}: {} = {:?}", element, attribute, value);
        Ok(value)
    }

    /// One-based beat of `element` under the active time signature
    pub fn beat(&self, element: &Element) -> Result<OffsetQL, ContextError> {
        let sites = self.placed_sites(element)?;
        let (time_signature, found) = self.time_signature_context(element, &sites, "beat")?;
        let position = match self.nearest_measure(&sites) {
            Some((context, padding_left)) => context.offset + padding_left,
            None => {
                // no measure: count bars from the time signature (or the
                // start) of the outermost container
                let outermost = self.outermost_site(&sites);
                let bar_start = found
                    .and_then(|ts| self.offset_in_hierarchy(&ts, &outermost.site))
                    .filter(|start| *start <= outermost.offset)
                    .unwrap_or_else(|| ql(0));
                (outermost.offset - bar_start) % time_signature.bar_duration()
            }
        };
        Ok(time_signature.beat_at(position))
    }

    /// Number of the measure holding `element`
    pub fn measure_number(&self, element: &Element) -> Result<u32, ContextError> {
        let sites = self.placed_sites(element)?;
        match self.nearest_measure(&sites) {
            Some((context, _)) => match context.site.payload() {
                Payload::Measure(measure) => Ok(measure.number),
                _ => Err(missing(element, "measure_number", ClassTag::Measure)),
            },
            None => Err(missing(element, "measure_number", ClassTag::Measure)),
        }
    }

    /// Offset of `element` from the start of its measure
    pub fn offset_in_measure(&self, element: &Element) -> Result<OffsetQL, ContextError> {
        let sites = self.placed_sites(element)?;
        self.nearest_measure(&sites)
            .map(|(context, _)| context.offset)
            .ok_or_else(|| missing(element, "offset_in_measure", ClassTag::Measure))
    }

    /// Time signature in force at `element`, or the configured default
    pub fn active_time_signature(
        &self,
        element: &Element,
    ) -> Result<TimeSignatureData, ContextError> {
        let sites = self.placed_sites(element)?;
        self.time_signature_context(element, &sites, "time_signature")
            .map(|(ts, _)| ts)
    }

    pub fn key_fifths(&self, element: &Element) -> Result<i8, ContextError> {
        match self.required_context(element, ClassTag::KeySignature, "key_fifths")? {
            Payload::KeySignature(key) => Ok(key.fifths),
            _ => Err(missing(element, "key_fifths", ClassTag::KeySignature)),
        }
    }

    pub fn clef_sign(&self, element: &Element) -> Result<String, ContextError> {
        match self.required_context(element, ClassTag::Clef, "clef_sign")? {
            Payload::Clef(clef) => Ok(clef.sign().to_string()),
            _ => Err(missing(element, "clef_sign", ClassTag::Clef)),
        }
    }

    pub fn part_name(&self, element: &Element) -> Result<String, ContextError> {
        match self.required_context(element, ClassTag::Part, "part_name")? {
            Payload::Part { name } => Ok(name),
            _ => Err(missing(element, "part_name", ClassTag::Part)),
        }
    }

    /// Context sites of `element`; an element with none is orphaned
    fn placed_sites(&self, element: &Element) -> Result<Vec<ContextSite>, ContextError> {
        let sites = self.context_sites(element);
        if sites.is_empty() {
            return Err(ContextError::Orphaned {
                element: element.id(),
            });
        }
        Ok(sites)
    }

    fn required_context(
        &self,
        element: &Element,
        tag: ClassTag,
        attribute: &'static str,
    ) -> Result<Payload, ContextError> {
        let sites = self.placed_sites(element)?;
        search_sites(element, &sites, tag, self.settings.max_distance)
            .map(|found| found.payload())
            .ok_or_else(|| missing(element, attribute, tag))
    }

    /// Time signature in force and the element carrying it (`None` when
    /// the configured default applies)
    fn time_signature_context(
        &self,
        element: &Element,
        sites: &[ContextSite],
        attribute: &'static str,
    ) -> Result<(TimeSignatureData, Option<Element>), ContextError> {
        let found = search_sites(element, sites, ClassTag::TimeSignature, self.settings.max_distance);
        if let Some(found) = found {
            if let Payload::TimeSignature(ts) = found.payload() {
                return Ok((ts, Some(found)));
            }
        }
        match self.settings.default_time_signature {
            Some(ts) => {
                log::debug!("{:?}: no time signature in context, assuming {}", element, ts);
                Ok((ts, None))
            }
            None => Err(missing(element, attribute, ClassTag::TimeSignature)),
        }
    }

    /// Last site on the chain of containers above the first site
    ///
    /// Follows one container per level, so sibling branches of a container
    /// placed in several hierarchies are not mixed in.
    fn outermost_site<'a>(&self, sites: &'a [ContextSite]) -> &'a ContextSite {
        let mut current = &sites[0];
        for next in &sites[1..] {
            let in_range = self
                .settings
                .max_distance
                .map_or(true, |max| next.depth <= max);
            if next.depth != current.depth + 1 || !in_range {
                break;
            }
            current = next;
        }
        current
    }

    /// Innermost measure in the containment chain and its left padding
    fn nearest_measure<'a>(&self, sites: &'a [ContextSite]) -> Option<(&'a ContextSite, OffsetQL)> {
        sites
            .iter()
            .filter(|context| {
                self.settings
                    .max_distance
                    .map_or(true, |max| context.depth <= max)
            })
            .find_map(|context| match context.site.payload() {
                Payload::Measure(measure) => Some((context, measure.padding_left)),
                _ => None,
            })
    }
}

fn missing(element: &Element, attribute: &'static str, class: ClassTag) -> ContextError {
    ContextError::MissingContext {
        element: element.id(),
        attribute,
        class,
    }
}

impl Element {
    /// Beat with default resolver settings
    pub fn beat(&self) -> Result<OffsetQL, ContextError> {
        ContextResolver::default().beat(self)
    }

    /// Measure number with default resolver settings
    pub fn measure_number(&self) -> Result<u32, ContextError> {
        ContextResolver::default().measure_number(self)
    }
}
