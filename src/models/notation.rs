//! Notation payloads carried by elements
//!
//! The context core treats payloads as opaque except for their class tag
//! and a small set of named attributes that containers expose to
//! [`Sites::attribute_by_ancestor_class`](crate::sites::Sites::attribute_by_ancestor_class).

use super::class_tag::{ClassTag, HasClassTag};
use super::offset::{ql, OffsetQL};
use super::pitch::Pitch;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Value of a named attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AttributeValue {
    Integer(i64),
    Offset(OffsetQL),
    Text(String),
}

impl AttributeValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_offset(&self) -> Option<OffsetQL> {
        match self {
            AttributeValue::Offset(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// Tie information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tie {
    Start,
    Stop,
    Continue,
}

/// Pitched note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteData {
    pub pitch: Pitch,
    pub tie: Option<Tie>,
}

impl NoteData {
    pub fn new(pitch: Pitch) -> Self {
        Self { pitch, tie: None }
    }
}

/// Clef types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClefType {
    Treble,
    Bass,
    Alto,
    Tenor,
    Soprano,
    MezzoSoprano,
    Baritone,
    Percussion,
}

impl ClefType {
    /// Clef sign ("G", "F", "C" or "percussion")
    pub fn sign(&self) -> &'static str {
        match self {
            ClefType::Treble => "G",
            ClefType::Bass | ClefType::Baritone => "F",
            ClefType::Alto | ClefType::Tenor | ClefType::Soprano | ClefType::MezzoSoprano => "C",
            ClefType::Percussion => "percussion",
        }
    }

    /// Staff line the sign sits on (counting from the bottom)
    pub fn line(&self) -> u8 {
        match self {
            ClefType::Treble => 2,
            ClefType::Bass => 4,
            ClefType::Alto => 3,
            ClefType::Tenor => 4,
            ClefType::Soprano => 1,
            ClefType::MezzoSoprano => 2,
            ClefType::Baritone => 3,
            ClefType::Percussion => 3,
        }
    }
}

/// Musical mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    Locrian,
}

/// Key signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySignatureData {
    /// Position on circle of fifths (-7 to +7, flats to sharps)
    pub fifths: i8,
    pub mode: Mode,
}

impl KeySignatureData {
    pub fn new(fifths: i8, mode: Mode) -> Result<Self, String> {
        if !(-7..=7).contains(&fifths) {
            return Err(format!("Invalid fifths: {} (must be -7 to +7)", fifths));
        }
        Ok(Self { fifths, mode })
    }
}

/// Time signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeSignature")]
pub struct TimeSignatureData {
    /// Number of beats per measure
    pub beats: u8,
    /// Beat unit (2, 4, 8, 16, etc.)
    pub beat_type: u8,
}

impl TimeSignatureData {
    pub fn new(beats: u8, beat_type: u8) -> Result<Self, String> {
        if beats == 0 {
            return Err("Beats must be greater than 0".to_string());
        }
        if !beat_type.is_power_of_two() {
            return Err(format!("Beat type must be power of 2, got {}", beat_type));
        }
        Ok(Self { beats, beat_type })
    }

    /// 6/8, 9/8, 12/8 and similar group three units per beat
    pub fn is_compound(&self) -> bool {
        self.beats > 3 && self.beats % 3 == 0
    }

    /// Length of one bar in quarter lengths
    pub fn bar_duration(&self) -> OffsetQL {
        OffsetQL::new(4 * self.beats as i32, self.beat_type as i32)
    }

    /// Length of one counted beat in quarter lengths
    pub fn beat_duration(&self) -> OffsetQL {
        let unit = OffsetQL::new(4, self.beat_type as i32);
        if self.is_compound() {
            unit * ql(3)
        } else {
            unit
        }
    }

    /// One-based beat for a position measured from the start of the bar
    pub fn beat_at(&self, position_in_bar: OffsetQL) -> OffsetQL {
        ql(1) + position_in_bar / self.beat_duration()
    }
}

/// Unchecked form read from settings and snapshots
#[derive(Deserialize)]
struct RawTimeSignature {
    beats: u8,
    beat_type: u8,
}

impl TryFrom<RawTimeSignature> for TimeSignatureData {
    type Error = String;

    fn try_from(raw: RawTimeSignature) -> Result<Self, Self::Error> {
        TimeSignatureData::new(raw.beats, raw.beat_type)
    }
}

impl fmt::Display for TimeSignatureData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats, self.beat_type)
    }
}

impl FromStr for TimeSignatureData {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (beats, beat_type) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| format!("Invalid time signature {:?} (expected \"n/d\")", s))?;
        let beats = beats
            .trim()
            .parse::<u8>()
            .map_err(|e| format!("Invalid beat count in {:?}: {}", s, e))?;
        let beat_type = beat_type
            .trim()
            .parse::<u8>()
            .map_err(|e| format!("Invalid beat type in {:?}: {}", s, e))?;
        TimeSignatureData::new(beats, beat_type)
    }
}

/// Measure attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureData {
    /// Measure number as printed (0 for a pickup bar)
    pub number: u32,
    /// Quarter lengths missing from the start of an incomplete (pickup) bar
    pub padding_left: OffsetQL,
}

/// The notation data of an element; determines its class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Note(NoteData),
    Rest,
    Clef(ClefType),
    KeySignature(KeySignatureData),
    TimeSignature(TimeSignatureData),
    Stream,
    Measure(MeasureData),
    Part { name: String },
    Score { title: Option<String> },
    Voice { id: String },
}

impl HasClassTag for Payload {
    fn class_tag(&self) -> ClassTag {
        match self {
            Payload::Note(_) => ClassTag::Note,
            Payload::Rest => ClassTag::Rest,
            Payload::Clef(_) => ClassTag::Clef,
            Payload::KeySignature(_) => ClassTag::KeySignature,
            Payload::TimeSignature(_) => ClassTag::TimeSignature,
            Payload::Stream => ClassTag::Stream,
            Payload::Measure(_) => ClassTag::Measure,
            Payload::Part { .. } => ClassTag::Part,
            Payload::Score { .. } => ClassTag::Score,
            Payload::Voice { .. } => ClassTag::Voice,
        }
    }
}

impl Payload {
    /// Look up a payload attribute by name
    pub fn attribute(&self, name: &str) -> Option<AttributeValue> {
        match (self, name) {
            (Payload::Note(note), "pitch") => Some(AttributeValue::Text(note.pitch.to_string())),
            (Payload::Note(note), "midi") => Some(AttributeValue::Integer(note.pitch.midi() as i64)),
            (Payload::Clef(clef), "sign") => Some(AttributeValue::Text(clef.sign().to_string())),
            (Payload::Clef(clef), "line") => Some(AttributeValue::Integer(clef.line() as i64)),
            (Payload::KeySignature(key), "fifths") => Some(AttributeValue::Integer(key.fifths as i64)),
            (Payload::KeySignature(key), "mode") => Some(AttributeValue::Text(format!("{:?}", key.mode))),
            (Payload::TimeSignature(ts), "ratio") => Some(AttributeValue::Text(ts.to_string())),
            (Payload::TimeSignature(ts), "numerator") => Some(AttributeValue::Integer(ts.beats as i64)),
            (Payload::TimeSignature(ts), "denominator") => {
                Some(AttributeValue::Integer(ts.beat_type as i64))
            }
            (Payload::Measure(m), "number") => Some(AttributeValue::Integer(m.number as i64)),
            (Payload::Measure(m), "padding_left") => Some(AttributeValue::Offset(m.padding_left)),
            (Payload::Part { name }, "name") => Some(AttributeValue::Text(name.clone())),
            (Payload::Score { title: Some(title) }, "title") => Some(AttributeValue::Text(title.clone())),
            (Payload::Voice { id }, "id") => Some(AttributeValue::Text(id.clone())),
            _ => None,
        }
    }

    /// Short human-readable label for dumps
    pub fn label(&self) -> String {
        match self {
            Payload::Note(note) => note.pitch.to_string(),
            Payload::Rest => "rest".to_string(),
            Payload::Clef(clef) => format!("{}{}", clef.sign(), clef.line()),
            Payload::KeySignature(key) => format!("{} fifths {:?}", key.fifths, key.mode),
            Payload::TimeSignature(ts) => ts.to_string(),
            Payload::Stream => String::new(),
            Payload::Measure(m) => format!("m{}", m.number),
            Payload::Part { name } => name.clone(),
            Payload::Score { title } => title.clone().unwrap_or_default(),
            Payload::Voice { id } => id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::offset::ql_frac;

    #[test]
    fn test_simple_meter() {
        let ts: TimeSignatureData = "3/4".parse().unwrap();
        assert!(!ts.is_compound());
        assert_eq!(ts.bar_duration(), ql(3));
        assert_eq!(ts.beat_duration(), ql(1));
        assert_eq!(ts.beat_at(ql(2)), ql(3));
        assert_eq!(ts.beat_at(ql_frac(1, 2)), ql_frac(3, 2));
    }

    #[test]
    fn test_compound_meter() {
        let ts = TimeSignatureData::new(6, 8).unwrap();
        assert!(ts.is_compound());
        assert_eq!(ts.bar_duration(), ql(3));
        assert_eq!(ts.beat_duration(), ql_frac(3, 2));
        assert_eq!(ts.beat_at(ql_frac(3, 2)), ql(2));
    }

    #[test]
    fn test_invalid_time_signatures() {
        assert!("4".parse::<TimeSignatureData>().is_err());
        assert!("0/4".parse::<TimeSignatureData>().is_err());
        assert!("3/5".parse::<TimeSignatureData>().is_err());
        assert!(KeySignatureData::new(8, Mode::Major).is_err());
    }

    #[test]
    fn test_deserialize_validates_time_signature() {
        let ts: TimeSignatureData =
            serde_json::from_str("{\"beats\": 9, \"beat_type\": 8}").unwrap();
        assert_eq!(ts, TimeSignatureData::new(9, 8).unwrap());
        assert!(serde_json::from_str::<TimeSignatureData>("{\"beats\": 4, \"beat_type\": 0}").is_err());
        assert!(serde_json::from_str::<TimeSignatureData>("{\"beats\": 0, \"beat_type\": 4}").is_err());
    }

    #[test]
    fn test_payload_attributes() {
        let measure = Payload::Measure(MeasureData { number: 7, padding_left: ql(0) });
        assert_eq!(measure.class_tag(), ClassTag::Measure);
        assert_eq!(measure.attribute("number"), Some(AttributeValue::Integer(7)));
        assert_eq!(measure.attribute("name"), None);

        let part = Payload::Part { name: "Violin I".to_string() };
        assert_eq!(part.attribute("name").unwrap().as_text(), Some("Violin I"));

        let untitled = Payload::Score { title: None };
        assert_eq!(untitled.attribute("title"), None);
    }
}
