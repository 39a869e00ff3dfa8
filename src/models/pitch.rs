//! Opaque pitch payload
//!
//! The tree never does pitch arithmetic; it only needs to store, compare and
//! print pitches. A `Pitch` is a LilyPond pitch name in English note-name
//! spelling (`c`, `fs''`, `bf,`), validated on construction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ScoreError, ScoreResult};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pitch(String);

const ACCIDENTALS: [&str; 9] = ["", "s", "f", "ss", "ff", "qs", "qf", "tqs", "tqf"];

impl Pitch {
    /// Parse a pitch name such as `c'`, `ef,` or `gqs''`
    pub fn new(name: &str) -> ScoreResult<Self> {
        let invalid = |message: &str| ScoreError::ParseError {
            line: 0,
            column: 0,
            message: format!("invalid pitch '{}': {}", name, message),
        };
        let mut chars = name.chars();
        match chars.next() {
            Some('a'..='g') => {}
            _ => return Err(invalid("pitch must start with a note letter a-g")),
        }
        let rest: &str = chars.as_str();
        let octave_start = rest.find(|c: char| c == '\'' || c == ',').unwrap_or(rest.len());
        let (accidental, octave) = rest.split_at(octave_start);
        if !ACCIDENTALS.contains(&accidental) {
            return Err(invalid("unknown accidental"));
        }
        if !(octave.chars().all(|c| c == '\'') || octave.chars().all(|c| c == ',')) {
            return Err(invalid("mixed octave marks"));
        }
        Ok(Pitch(name.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Octave relative to the octave starting at middle C (`c'` is 1)
    pub fn octave_ticks(&self) -> i32 {
        self.0.chars().fold(0, |acc, c| match c {
            '\'' => acc + 1,
            ',' => acc - 1,
            _ => acc,
        })
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_pitches() {
        for name in ["c", "c'", "fs''", "bf,", "eqf'", "atqs,,"] {
            assert!(Pitch::new(name).is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_invalid_pitches() {
        for name in ["", "h", "cx'", "c',", "C"] {
            assert!(Pitch::new(name).is_err(), "{}", name);
        }
    }

    #[test]
    fn test_octave_ticks() {
        assert_eq!(Pitch::new("c'").unwrap().octave_ticks(), 1);
        assert_eq!(Pitch::new("c,,").unwrap().octave_ticks(), -2);
        assert_eq!(Pitch::new("c").unwrap().octave_ticks(), 0);
    }
}
