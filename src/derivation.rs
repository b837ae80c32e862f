//! Derivation links
//!
//! When a transformation produces a new element from an existing one, the
//! new element records its origin and the name of the transformation. The
//! context resolver follows these links when the new element has not been
//! placed anywhere yet, so a freshly derived note still knows its measure.
//!
//! The link holds the origin strongly. An origin is always created before
//! the elements derived from it, so chains are finite and acyclic.
//! Inserting an element into a container its own origins hold would close
//! a strong loop; `Stream::insert` rejects that.

use crate::models::element::Element;
use std::fmt;

/// Record that an element was produced from `origin` by `method`
#[derive(Clone)]
pub struct Derivation {
    origin: Element,
    method: String,
}

impl Derivation {
    pub fn new(origin: &Element, method: impl Into<String>) -> Self {
        Self {
            origin: origin.clone(),
            method: method.into(),
        }
    }

    pub fn origin(&self) -> &Element {
        &self.origin
    }

    /// Name of the transformation ("flat", "deepcopy", ...)
    pub fn method(&self) -> &str {
        &self.method
    }
}

impl fmt::Debug for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Derivation({:?} via {})", self.origin, self.method)
    }
}

impl Element {
    pub fn derivation(&self) -> Option<Derivation> {
        self.0.derivation.borrow().clone()
    }

    /// Only used on freshly created elements, which keeps chains acyclic
    pub(crate) fn set_derivation(&self, derivation: Derivation) {
        *self.0.derivation.borrow_mut() = Some(derivation);
    }

    /// Origins from nearest to oldest
    pub fn derivation_chain(&self) -> Vec<Element> {
        let mut chain = Vec::new();
        let mut current = self.derivation();
        while let Some(derivation) = current {
            let origin = derivation.origin().clone();
            current = origin.derivation();
            chain.push(origin);
        }
        chain
    }

    /// Oldest origin, or `None` for an element not derived from anything
    pub fn root_derivation(&self) -> Option<Element> {
        self.derivation_chain().pop()
    }

    /// Fresh element with this element's payload and duration, linked to
    /// this element as its origin
    ///
    /// The copy has a new identity and no sites. For containers only the
    /// container itself is copied; see
    /// [`Stream::deep_copy`](crate::stream::Stream::deep_copy) for contents.
    pub fn derive(&self, method: impl Into<String>) -> Element {
        let copy = Element::new(self.payload(), self.0.duration.get());
        copy.set_derivation(Derivation::new(self, method));
        copy
    }
}
