//! Pitch representation for notes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Musical pitch representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pitch {
    /// Scale degree (0=C, 1=D, 2=E, 3=F, 4=G, 5=A, 6=B)
    pub step: u8,

    /// Accidental (-2=double flat, -1=flat, 0=natural, +1=sharp, +2=double sharp)
    pub alteration: i8,

    /// Octave number (4 = middle C octave)
    pub octave: i8,
}

const STEP_NAMES: [char; 7] = ['C', 'D', 'E', 'F', 'G', 'A', 'B'];
const STEP_SEMITONES: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];

impl Pitch {
    /// Create a new pitch with validation
    pub fn new(step: u8, alteration: i8, octave: i8) -> Result<Self, String> {
        if step > 6 {
            return Err(format!("Invalid step: {} (must be 0-6)", step));
        }
        if !(-2..=2).contains(&alteration) {
            return Err(format!(
                "Invalid alteration: {} (must be -2 to +2)",
                alteration
            ));
        }
        if !(-1..=9).contains(&octave) {
            return Err(format!("Invalid octave: {} (must be -1 to 9)", octave));
        }
        Ok(Self {
            step,
            alteration,
            octave,
        })
    }

    /// Parse a name such as "C4", "F#3", "Bb5" or "e-2"
    ///
    /// Accidentals: `#`/`##` sharp, `b`/`bb` or `-`/`--` flat. A missing
    /// octave means octave 4.
    pub fn from_name(name: &str) -> Result<Self, String> {
        let mut chars = name.chars();
        let letter = chars
            .next()
            .ok_or_else(|| "Empty pitch name".to_string())?
            .to_ascii_uppercase();
        let step = STEP_NAMES
            .iter()
            .position(|&c| c == letter)
            .ok_or_else(|| format!("Invalid pitch letter in {:?}", name))?;

        let rest: String = chars.collect();
        let accidental_len = rest
            .chars()
            .take_while(|c| matches!(c, '#' | 'b' | '-'))
            .count();
        let (accidental, octave_text) = rest.split_at(accidental_len);

        let alteration = match accidental {
            "" => 0,
            "#" => 1,
            "##" => 2,
            "b" | "-" => -1,
            "bb" | "--" => -2,
            other => return Err(format!("Invalid accidental {:?} in {:?}", other, name)),
        };

        let octave = if octave_text.is_empty() {
            4
        } else {
            octave_text
                .parse::<i8>()
                .map_err(|e| format!("Invalid octave in {:?}: {}", name, e))?
        };

        Pitch::new(step as u8, alteration, octave)
    }

    /// MIDI note number (C4 = 60)
    pub fn midi(&self) -> i32 {
        (self.octave as i32 + 1) * 12 + STEP_SEMITONES[self.step as usize] + self.alteration as i32
    }

    /// Letter name without octave (e.g. "F#")
    pub fn name(&self) -> String {
        let letter = STEP_NAMES[self.step as usize];
        let accidental = match self.alteration {
            -2 => "bb",
            -1 => "b",
            1 => "#",
            2 => "##",
            _ => "",
        };
        format!("{}{}", letter, accidental)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name(), self.octave)
    }
}
