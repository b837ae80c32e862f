use score_context::{
    ql, ql_frac, AttributeValue, ClassTag, ContextError, ContextResolver, DerivedAttribute,
    Element, HasClassTag, NoteData, Payload, Pitch, ResolverSettings, Stream, TimeSignatureData,
};

/// Helper to create a quarter note
fn note(name: &str) -> Element {
    Element::new(
        Payload::Note(NoteData::new(Pitch::from_name(name).unwrap())),
        ql(1),
    )
}

fn time_signature(ratio: &str) -> Element {
    Element::new(Payload::TimeSignature(ratio.parse().unwrap()), ql(0))
}

fn id_of(found: Option<Element>) -> Option<u64> {
    found.map(|e| e.id().value())
}

#[test]
fn test_ancestor_found_then_lost_after_removal() {
    let a = Stream::part("Voice");
    let b = Stream::measure(1);
    let x = note("C5");
    b.insert(ql(0), &x).unwrap();
    a.insert(ql(0), &b).unwrap();

    assert_eq!(id_of(x.get_context_by_class(ClassTag::Part)), Some(a.id().value()));

    b.remove(&x);
    assert!(x.get_context_by_class(ClassTag::Part).is_none());
}

#[test]
fn test_unplaced_derivation_resolves_through_origin() {
    let a = Stream::part("Voice");
    let x = note("D5");
    a.insert(ql(2), &x).unwrap();

    let y = x.derive("stripTies");
    assert_eq!(y.site_count(), 0);
    assert_eq!(id_of(y.get_context_by_class(ClassTag::Part)), Some(a.id().value()));

    // two steps back along the chain
    let z = y.derive("transpose");
    assert_eq!(id_of(z.get_context_by_class(ClassTag::Part)), Some(a.id().value()));
}

#[test]
fn test_measure_in_part_scenario() {
    let part1 = Stream::part("Soprano");
    let n1 = note("E5");
    let measure1 = Stream::measure(1);
    measure1.insert(ql(2), &n1).unwrap();
    part1.insert(ql(0), &measure1).unwrap();

    assert_eq!(
        id_of(n1.get_context_by_class(ClassTag::Measure)),
        Some(measure1.id().value())
    );
    assert_eq!(measure1.get_offset(n1.id()), Ok(ql(2)));

    assert!(part1.remove(&measure1));
    drop(measure1);
    assert!(n1.get_context_by_class(ClassTag::Part).is_none());
    assert!(n1.get_context_by_class(ClassTag::Measure).is_none());
    assert_eq!(n1.site_count(), 0);
}

#[test]
fn test_beats_in_common_time() {
    let part = Stream::part("Alto");
    let m1 = Stream::measure(1);
    let m2 = Stream::measure(2);
    m1.insert(ql(0), time_signature("4/4")).unwrap();
    let notes: Vec<Element> = ["C4", "D4", "E4", "F4"].iter().map(|n| note(n)).collect();
    for n in &notes {
        m1.append(n).unwrap();
    }
    let late = note("G4");
    m2.insert(ql_frac(5, 2), &late).unwrap();
    part.insert(ql(0), &m1).unwrap();
    part.insert(ql(4), &m2).unwrap();

    let beats: Vec<_> = notes.iter().map(|n| n.beat().unwrap()).collect();
    assert_eq!(beats, vec![ql(1), ql(2), ql(3), ql(4)]);
    assert_eq!(late.beat(), Ok(ql_frac(7, 2)));
    assert_eq!(late.measure_number(), Ok(2));
}

#[test]
fn test_beats_in_compound_meter() {
    let measure = Stream::measure(1);
    measure.insert(ql(0), time_signature("6/8")).unwrap();
    let on_two = note("A4");
    let between = note("B4");
    measure.insert(ql_frac(3, 2), &on_two).unwrap();
    measure.insert(ql_frac(1, 2), &between).unwrap();

    assert_eq!(on_two.beat(), Ok(ql(2)));
    assert_eq!(between.beat(), Ok(ql_frac(4, 3)));
}

#[test]
fn test_pickup_measure_counts_from_padding() {
    let part = Stream::part("Tenor");
    let pickup = Stream::pickup_measure(0, ql(2));
    let upbeat = note("G3");
    pickup.insert(ql(0), time_signature("3/4")).unwrap();
    pickup.insert(ql(0), &upbeat).unwrap();
    let m1 = Stream::measure(1);
    let downbeat = note("C4");
    m1.insert(ql(0), &downbeat).unwrap();
    part.insert(ql(0), &pickup).unwrap();
    part.insert(ql(1), &m1).unwrap();

    assert_eq!(upbeat.beat(), Ok(ql(3)));
    assert_eq!(upbeat.measure_number(), Ok(0));
    assert_eq!(downbeat.beat(), Ok(ql(1)));
}

#[test]
fn test_missing_time_signature_and_default() {
    let measure = Stream::measure(9);
    let n = note("C4");
    measure.insert(ql(1), &n).unwrap();

    let resolver = ContextResolver::default();
    assert_eq!(
        resolver.compute_derived_attribute(&n, DerivedAttribute::Beat),
        Err(ContextError::MissingContext {
            element: n.id(),
            attribute: "beat",
            class: ClassTag::TimeSignature
        })
    );

    let with_default = ContextResolver::new(ResolverSettings {
        default_time_signature: Some(TimeSignatureData::new(2, 2).unwrap()),
        ..ResolverSettings::default()
    });
    // half-note beats: offset 1 is halfway through beat one
    assert_eq!(
        with_default.compute_derived_attribute(&n, DerivedAttribute::Beat),
        Ok(AttributeValue::Offset(ql_frac(3, 2)))
    );
    assert_eq!(
        with_default.compute_derived_attribute(&n, DerivedAttribute::MeasureNumber),
        Ok(AttributeValue::Integer(9))
    );
}

#[test]
fn test_orphan_fails_clearly() {
    let n = note("C4");
    let resolver = ContextResolver::default();
    for attribute in [
        DerivedAttribute::Beat,
        DerivedAttribute::MeasureNumber,
        DerivedAttribute::KeyFifths,
        DerivedAttribute::PartName,
    ] {
        assert_eq!(
            resolver.compute_derived_attribute(&n, attribute),
            Err(ContextError::Orphaned { element: n.id() })
        );
    }

    // a removed element is an orphan again
    let measure = Stream::measure(1);
    measure.insert(ql(0), &n).unwrap();
    measure.remove(&n);
    assert_eq!(n.beat(), Err(ContextError::Orphaned { element: n.id() }));
}

/// Characterization: with two unrelated hierarchies the most recently
/// added placement wins, and the older one takes over once it is removed
#[test]
fn test_most_recent_hierarchy_wins() {
    let original = Stream::part("Original");
    let old_measure = Stream::measure(3);
    original.insert(ql(8), &old_measure).unwrap();

    let copy = Stream::part("Copy");
    let new_measure = Stream::measure(12);
    copy.insert(ql(44), &new_measure).unwrap();

    let n = note("D4");
    old_measure.insert(ql(1), &n).unwrap();
    new_measure.insert(ql(2), &n).unwrap();

    let resolver = ContextResolver::default();
    assert_eq!(resolver.measure_number(&n), Ok(12));
    assert_eq!(resolver.part_name(&n), Ok("Copy".to_string()));

    let order: Vec<_> = resolver
        .context_sites(&n)
        .iter()
        .map(|c| (c.site.id(), c.depth))
        .collect();
    assert_eq!(
        order,
        vec![
            (new_measure.id(), 1),
            (copy.id(), 2),
            (old_measure.id(), 1),
            (original.id(), 2),
        ]
    );

    new_measure.remove(&n);
    assert_eq!(resolver.measure_number(&n), Ok(3));
    assert_eq!(resolver.part_name(&n), Ok("Original".to_string()));
}

#[test]
fn test_flatten_result_is_searched_first_then_dropped() {
    let part = Stream::part("Cello");
    let measure = Stream::measure(5);
    measure.insert(ql(0), time_signature("3/4")).unwrap();
    let n = note("C3");
    measure.insert(ql(2), &n).unwrap();
    part.insert(ql(9), &measure).unwrap();

    {
        let flat = part.flatten().unwrap();
        assert_eq!(flat.get_offset(n.id()), Ok(ql(11)));
        let sites = ContextResolver::default().context_sites(&n);
        assert_eq!(sites[0].site.id(), flat.id());
        // the flat stream has no measure; the real one is still found
        assert_eq!(n.measure_number(), Ok(5));
        assert_eq!(n.beat(), Ok(ql(3)));
    }

    assert_eq!(n.site_count(), 1);
    let sites = ContextResolver::default().context_sites(&n);
    assert_eq!(sites.len(), 2);
}

#[test]
fn test_previous_note_skips_other_classes() {
    let part = Stream::part("Flute");
    let m1 = Stream::measure(1);
    let m2 = Stream::measure(2);
    let first = note("C5");
    let rest = Element::new(Payload::Rest, ql(1));
    let second = note("D5");
    m1.insert(ql(0), &first).unwrap();
    m1.insert(ql(1), &rest).unwrap();
    m2.insert(ql(0), time_signature("2/4")).unwrap();
    m2.insert(ql(0), &second).unwrap();
    part.insert(ql(0), &m1).unwrap();
    part.insert(ql(2), &m2).unwrap();

    let resolver = ContextResolver::default();
    let is_note = |e: &Element| e.class_tag() == ClassTag::Note;
    assert_eq!(
        id_of(resolver.find_previous_element(&second, is_note)),
        Some(first.id().value())
    );
    assert_eq!(
        id_of(resolver.find_previous_element(&second, |e| e.class_tag().is_a(ClassTag::GeneralNote))),
        Some(rest.id().value())
    );
    assert_eq!(
        id_of(resolver.find_next_element(&first, is_note)),
        Some(second.id().value())
    );
    assert!(resolver.find_next_element(&second, is_note).is_none());
}

#[test]
fn test_ancestor_attribute_lookup() {
    let part = Stream::part("Organ");
    let measure = Stream::measure(5);
    let n = note("C4");
    measure.insert(ql(0), &n).unwrap();
    part.insert(ql(16), &measure).unwrap();

    assert_eq!(
        n.attribute_by_ancestor_class("number"),
        Some(AttributeValue::Integer(5))
    );
    assert!(n.attribute_by_ancestor_class("name").is_none());
    assert_eq!(
        measure.attribute_by_ancestor_class("name"),
        Some(AttributeValue::Text("Organ".to_string()))
    );
}

#[test]
fn test_configured_max_distance_limits_derived_attributes() {
    let part = Stream::part("Trumpet");
    let measure = Stream::measure(7);
    let n = note("G4");
    measure.insert(ql(0), time_signature("3/4")).unwrap();
    measure.insert(ql(2), &n).unwrap();
    part.insert(ql(18), &measure).unwrap();

    let settings = ResolverSettings::from_yaml_str("max_distance: 1\n").unwrap();
    let near = ContextResolver::new(settings);
    assert_eq!(
        near.compute_derived_attribute(&n, DerivedAttribute::MeasureNumber),
        Ok(AttributeValue::Integer(7))
    );
    assert_eq!(
        near.compute_derived_attribute(&n, DerivedAttribute::Beat),
        Ok(AttributeValue::Offset(ql(3)))
    );
    assert_eq!(
        near.compute_derived_attribute(&n, DerivedAttribute::PartName),
        Err(ContextError::MissingContext {
            element: n.id(),
            attribute: "part_name",
            class: ClassTag::Part
        })
    );
    assert_eq!(
        ContextResolver::default().compute_derived_attribute(&n, DerivedAttribute::PartName),
        Ok(AttributeValue::Text("Trumpet".to_string()))
    );
}

#[test]
fn test_note_in_voice_finds_enclosing_measure() {
    let score = Stream::titled_score("Quartet");
    let part = Stream::part("Violin I");
    let measure = Stream::measure(3);
    let voice = Stream::voice("2");
    let n = note("A4");
    measure.insert(ql(0), time_signature("4/4")).unwrap();
    voice.insert(ql(3), &n).unwrap();
    measure.insert(ql(0), &voice).unwrap();
    part.insert(ql(8), &measure).unwrap();
    score.insert(ql(0), &part).unwrap();

    assert_eq!(n.measure_number(), Ok(3));
    assert_eq!(n.beat(), Ok(ql(4)));
    assert_eq!(id_of(n.get_context_by_class(ClassTag::Voice)), Some(voice.id().value()));
    assert_eq!(id_of(n.get_context_by_class(ClassTag::Score)), Some(score.id().value()));
    assert_eq!(
        score.attribute("title"),
        Some(AttributeValue::Text("Quartet".to_string()))
    );
}
