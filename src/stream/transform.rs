//! Transformations that produce derived containers
//!
//! Each result carries a derivation link to the container it came from.
//! `flatten` and `filter_by_class` share the original leaf elements, which
//! therefore gain one more (weak) site; once the caller drops the result
//! those sites are dead and get pruned by the next query.

use super::Stream;
use crate::derivation::Derivation;
use crate::errors::Result;
use crate::models::class_tag::{ClassTag, HasClassTag};

impl Stream {
    /// Plain stream of every non-container descendant at its offset
    /// relative to this container
    pub fn flatten(&self) -> Result<Stream> {
        let flat = Stream::new();
        flat.set_derivation(Derivation::new(self, "flat"));
        for (offset, element) in self.recurse() {
            if element.is_stream() || flat.contains(element.id()) {
                continue;
            }
            flat.insert(offset, &element)?;
        }
        log::debug!("flattened {:?} into {:?} ({} elements)", self, flat, flat.len());
        Ok(flat)
    }

    /// Container of the same kind holding the direct members of class `tag`
    pub fn filter_by_class(&self, tag: ClassTag) -> Result<Stream> {
        let filtered = self.empty_like();
        filtered.set_derivation(Derivation::new(self, "getElementsByClass"));
        for (offset, element) in self.entries() {
            if element.is_class_or_subclass(tag) {
                filtered.insert(offset, &element)?;
            }
        }
        Ok(filtered)
    }

    /// Recursive copy; every copied element derives from its source
    pub fn deep_copy(&self) -> Result<Stream> {
        let copy = self.empty_like();
        copy.set_derivation(Derivation::new(self, "deepcopy"));
        for (offset, element) in self.entries() {
            match element.as_stream() {
                Some(nested) => copy.insert(offset, nested.deep_copy()?)?,
                None => copy.insert(offset, element.derive("deepcopy"))?,
            }
        }
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::element::Element;
    use crate::models::notation::{NoteData, Payload};
    use crate::models::offset::ql;
    use crate::models::pitch::Pitch;

    fn note(name: &str) -> Element {
        Element::new(
            Payload::Note(NoteData::new(Pitch::from_name(name).unwrap())),
            ql(1),
        )
    }

    fn two_bar_part() -> (Stream, Vec<Element>) {
        let part = Stream::part("Violin");
        let m1 = Stream::measure(1);
        let m2 = Stream::measure(2);
        let notes: Vec<Element> = ["C4", "D4", "E4"].iter().map(|n| note(n)).collect();
        m1.insert(ql(0), &notes[0]).unwrap();
        m1.insert(ql(2), &notes[1]).unwrap();
        m2.insert(ql(1), &notes[2]).unwrap();
        part.insert(ql(0), &m1).unwrap();
        part.insert(ql(4), &m2).unwrap();
        (part, notes)
    }

    #[test]
    fn test_flatten_shares_leaves() {
        let (part, notes) = two_bar_part();
        let flat = part.flatten().unwrap();

        assert_eq!(flat.len(), 3);
        assert_eq!(flat.get_offset(notes[2].id()), Ok(ql(5)));
        assert_eq!(flat.derivation().map(|d| d.method().to_string()), Some("flat".to_string()));
        assert_eq!(notes[2].site_count(), 2);
    }

    #[test]
    fn test_dropping_flat_result_frees_its_sites() {
        let (part, notes) = two_bar_part();
        {
            let flat = part.flatten().unwrap();
            assert_eq!(flat.len(), 3);
        }
        for n in &notes {
            assert_eq!(n.site_count(), 1);
        }
    }

    #[test]
    fn test_filter_by_class_keeps_container_kind() {
        let (part, _) = two_bar_part();
        let measures = part.filter_by_class(ClassTag::Measure).unwrap();
        assert_eq!(measures.class_tag(), ClassTag::Part);
        assert_eq!(measures.len(), 2);
        assert_eq!(measures.get_offset(measures.elements()[1].id()), Ok(ql(4)));

        let m1 = part.first().and_then(|e| e.as_stream()).unwrap();
        let notes_only = m1.filter_by_class(ClassTag::Note).unwrap();
        assert_eq!(notes_only.class_tag(), ClassTag::Measure);
        assert_eq!(notes_only.len(), 2);
        assert_eq!(
            notes_only.derivation().map(|d| d.origin().id()),
            Some(m1.id())
        );
    }

    #[test]
    fn test_deep_copy_derives_every_element() {
        let (part, notes) = two_bar_part();
        let copy = part.deep_copy().unwrap();

        let originals: Vec<_> = part.recurse().into_iter().map(|(o, _)| o).collect();
        let copied = copy.recurse();
        assert_eq!(copied.iter().map(|(o, _)| *o).collect::<Vec<_>>(), originals);

        for (_, element) in &copied {
            assert!(notes.iter().all(|n| n.id() != element.id()));
            assert!(element.derivation().is_some());
        }
        assert_eq!(notes[0].site_count(), 1);
    }
}
