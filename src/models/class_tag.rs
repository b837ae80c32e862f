//! Class tags for find-by-class dispatch
//!
//! Every element carries a static [`ClassTag`]. Context queries ("nearest
//! Measure", "active TimeSignature") filter on tags instead of inspecting
//! concrete types, and membership records cache the tag of their container
//! so a query can skip a record without dereferencing its weak reference.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Enumeration of every class an element can belong to
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClassTag {
    /// Root of the hierarchy; every element is an `Element`
    Element = 0,

    /// Abstract class shared by notes and rests
    GeneralNote = 1,

    /// Pitched note
    Note = 2,

    /// Rest
    Rest = 3,

    /// Clef
    Clef = 4,

    /// Key signature
    KeySignature = 5,

    /// Time signature
    TimeSignature = 6,

    /// Plain container; also the abstract class of every container
    Stream = 10,

    /// Measure (bar)
    Measure = 11,

    /// Part (one instrument or staff)
    Part = 12,

    /// Score (the outermost container)
    Score = 13,

    /// Voice inside a measure
    Voice = 14,
}

// Serialize as {name, value} so dumps are readable and still compact
impl Serialize for ClassTag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ClassTag", 2)?;
        state.serialize_field("name", self.name())?;
        state.serialize_field("value", &(*self as u8))?;
        state.end()
    }
}

// Accepts either the bare number or the {name, value} object
impl<'de> Deserialize<'de> for ClassTag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ClassTagVisitor;

        impl<'de> serde::de::Visitor<'de> for ClassTagVisitor {
            type Value = ClassTag;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a ClassTag number or object")
            }

            fn visit_u64<E>(self, value: u64) -> Result<ClassTag, E>
            where
                E: serde::de::Error,
            {
                u8::try_from(value)
                    .ok()
                    .and_then(ClassTag::from_value)
                    .ok_or_else(|| E::custom(format!("invalid ClassTag value: {}", value)))
            }

            fn visit_str<E>(self, value: &str) -> Result<ClassTag, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(E::custom)
            }

            fn visit_map<A>(self, mut map: A) -> Result<ClassTag, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut value: Option<u8> = None;
                while let Some(key) = map.next_key::<String>()? {
                    if key == "value" {
                        value = Some(map.next_value()?);
                    } else {
                        map.next_value::<serde::de::IgnoredAny>()?;
                    }
                }
                match value {
                    Some(v) => ClassTag::from_value(v).ok_or_else(|| {
                        serde::de::Error::custom(format!("invalid ClassTag value: {}", v))
                    }),
                    None => Err(serde::de::Error::missing_field("value")),
                }
            }
        }

        deserializer.deserialize_any(ClassTagVisitor)
    }
}

impl ClassTag {
    /// Look up a tag by its numeric value
    pub fn from_value(value: u8) -> Option<ClassTag> {
        match value {
            0 => Some(ClassTag::Element),
            1 => Some(ClassTag::GeneralNote),
            2 => Some(ClassTag::Note),
            3 => Some(ClassTag::Rest),
            4 => Some(ClassTag::Clef),
            5 => Some(ClassTag::KeySignature),
            6 => Some(ClassTag::TimeSignature),
            10 => Some(ClassTag::Stream),
            11 => Some(ClassTag::Measure),
            12 => Some(ClassTag::Part),
            13 => Some(ClassTag::Score),
            14 => Some(ClassTag::Voice),
            _ => None,
        }
    }

    /// Check whether this class is `other` or a subclass of it
    ///
    /// `Measure.is_a(Stream)` and `Note.is_a(GeneralNote)` hold; every tag
    /// is an `Element`.
    pub fn is_a(&self, other: ClassTag) -> bool {
        if *self == other || other == ClassTag::Element {
            return true;
        }
        match other {
            ClassTag::GeneralNote => matches!(self, ClassTag::Note | ClassTag::Rest),
            ClassTag::Stream => self.is_stream(),
            _ => false,
        }
    }

    /// Determine if elements of this class hold other elements
    pub fn is_stream(&self) -> bool {
        matches!(
            self,
            ClassTag::Stream | ClassTag::Measure | ClassTag::Part | ClassTag::Score | ClassTag::Voice
        )
    }

    /// Ordering among elements that share an offset
    ///
    /// Containers sort before clefs, clefs before key signatures, key
    /// signatures before time signatures, and all of those before notes.
    pub fn sort_order(&self) -> i8 {
        match self {
            ClassTag::Stream
            | ClassTag::Measure
            | ClassTag::Part
            | ClassTag::Score
            | ClassTag::Voice => -20,
            ClassTag::Clef => 0,
            ClassTag::KeySignature => 2,
            ClassTag::TimeSignature => 4,
            ClassTag::Element => 20,
            ClassTag::GeneralNote | ClassTag::Note | ClassTag::Rest => 20,
        }
    }

    /// Class name as used in queries and dumps
    pub fn name(&self) -> &'static str {
        match self {
            ClassTag::Element => "Element",
            ClassTag::GeneralNote => "GeneralNote",
            ClassTag::Note => "Note",
            ClassTag::Rest => "Rest",
            ClassTag::Clef => "Clef",
            ClassTag::KeySignature => "KeySignature",
            ClassTag::TimeSignature => "TimeSignature",
            ClassTag::Stream => "Stream",
            ClassTag::Measure => "Measure",
            ClassTag::Part => "Part",
            ClassTag::Score => "Score",
            ClassTag::Voice => "Voice",
        }
    }
}

impl fmt::Display for ClassTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ClassTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Element" | "Music21Object" => Ok(ClassTag::Element),
            "GeneralNote" => Ok(ClassTag::GeneralNote),
            "Note" => Ok(ClassTag::Note),
            "Rest" => Ok(ClassTag::Rest),
            "Clef" => Ok(ClassTag::Clef),
            "KeySignature" => Ok(ClassTag::KeySignature),
            "TimeSignature" => Ok(ClassTag::TimeSignature),
            "Stream" => Ok(ClassTag::Stream),
            "Measure" => Ok(ClassTag::Measure),
            "Part" => Ok(ClassTag::Part),
            "Score" => Ok(ClassTag::Score),
            "Voice" => Ok(ClassTag::Voice),
            _ => Err(format!("unknown class name: {}", s)),
        }
    }
}

/// Capability of exposing a static class tag
pub trait HasClassTag {
    fn class_tag(&self) -> ClassTag;

    /// Shorthand for `self.class_tag().is_a(tag)`
    fn is_class_or_subclass(&self, tag: ClassTag) -> bool {
        self.class_tag().is_a(tag)
    }
}

impl HasClassTag for ClassTag {
    fn class_tag(&self) -> ClassTag {
        *self
    }
}
