//! Rational durations, offsets and multipliers
//!
//! Durations are stored as reduced `Rational64` values measured in whole
//! notes, so `Duration::new(1, 4)` is a quarter note. Arithmetic never
//! rounds; duration conservation across splits is exact.
//!
//! A duration is *assignable* when LilyPond can write it as one note value:
//! a power-of-two denominator and a numerator of the form `2^k * (2^m - 1)`
//! (a base value plus `m - 1` dots), strictly less than 16 whole notes.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Sub};

use crate::error::{ScoreError, ScoreResult};

/// A notated or prolated duration in whole-note units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Duration(Rational64);

/// A point in score time, measured from the start of the root component
pub type Offset = Duration;

/// A tuplet or leaf multiplier (e.g. `2/3` for a triplet)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Multiplier(Rational64);

/// How a written duration has to be notated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DurationNotation {
    /// One note value (possibly dotted)
    Assignable(Duration),
    /// Several tied note values summing to the duration
    TieChain(Vec<Duration>),
    /// Written values inside a tuplet with the given multiplier
    Tuplet {
        multiplier: Multiplier,
        written: Vec<Duration>,
    },
}

fn is_power_of_two(n: i64) -> bool {
    n > 0 && (n & (n - 1)) == 0
}

/// Integers whose binary form is one run of ones followed by zeros
fn is_assignable_integer(n: i64) -> bool {
    if n <= 0 {
        return false;
    }
    let odd = n >> n.trailing_zeros();
    is_power_of_two(odd + 1)
}

fn greatest_power_of_two_at_most(n: i64) -> i64 {
    debug_assert!(n > 0);
    1_i64 << (63 - n.leading_zeros())
}

impl Duration {
    /// Create a duration; panics when `denominator` is zero
    pub fn new(numerator: i64, denominator: i64) -> Self {
        assert!(denominator != 0, "Duration denominator must be nonzero");
        Duration(Rational64::new(numerator, denominator))
    }

    /// Fallible constructor for user-supplied values
    pub fn try_new(numerator: i64, denominator: i64) -> ScoreResult<Self> {
        if denominator == 0 {
            return Err(ScoreError::InvalidDuration(format!(
                "{}/{} has a zero denominator",
                numerator, denominator
            )));
        }
        Ok(Duration::new(numerator, denominator))
    }

    pub fn zero() -> Self {
        Duration(Rational64::from_integer(0))
    }

    pub fn from_ratio(ratio: Rational64) -> Self {
        Duration(ratio)
    }

    pub fn as_ratio(&self) -> Rational64 {
        self.0
    }

    pub fn numerator(&self) -> i64 {
        *self.0.numer()
    }

    pub fn denominator(&self) -> i64 {
        *self.0.denom()
    }

    pub fn is_positive(&self) -> bool {
        self.numerator() > 0
    }

    pub fn is_zero(&self) -> bool {
        self.numerator() == 0
    }

    /// Whether the duration can be written as a single (dotted) note value
    pub fn is_assignable(&self) -> bool {
        self.is_positive()
            && *self < Duration::new(16, 1)
            && is_power_of_two(self.denominator())
            && is_assignable_integer(self.numerator())
    }

    /// Number of dots needed to write an assignable duration
    pub fn dot_count(&self) -> Option<usize> {
        if !self.is_assignable() {
            return None;
        }
        let n = self.numerator();
        let odd = n >> n.trailing_zeros();
        Some((odd + 1).trailing_zeros() as usize - 1)
    }

    /// The undotted value an assignable duration is built on
    fn undotted(&self) -> Option<Duration> {
        let dots = self.dot_count()?;
        // d = base * (2 - 1/2^dots)  =>  base = d * 2^dots / (2^(dots+1) - 1)
        let factor = Rational64::new(1_i64 << dots, (1_i64 << (dots + 1)) - 1);
        Some(Duration(self.0 * factor))
    }

    /// Flag count of an assignable duration (eighth = 1, sixteenth = 2, ...)
    pub fn flag_count(&self) -> usize {
        match self.undotted() {
            Some(base) if base.numerator() == 1 => {
                let log = base.denominator().trailing_zeros() as usize;
                log.saturating_sub(2)
            }
            _ => 0,
        }
    }

    /// LilyPond duration token (`4`, `8.`, `\breve`), assignable values only
    pub fn lilypond_duration_string(&self) -> Option<String> {
        let dots = self.dot_count()?;
        let base = self.undotted()?;
        let body = if base.numerator() == 1 {
            base.denominator().to_string()
        } else {
            match base.numerator() {
                2 => "\\breve".to_string(),
                4 => "\\longa".to_string(),
                8 => "\\maxima".to_string(),
                _ => return None,
            }
        };
        Some(format!("{}{}", body, ".".repeat(dots)))
    }

    /// Largest assignable duration not greater than this one, keeping the
    /// denominator
    pub fn equal_or_lesser_assignable(&self) -> Option<Duration> {
        if !self.is_positive() {
            return None;
        }
        let denominator = self.denominator();
        (1..=self.numerator())
            .rev()
            .map(|n| Duration::new(n, denominator))
            .find(|d| d.is_assignable())
    }

    /// Greedy decomposition of a power-of-two-denominator duration into
    /// assignable parts, largest first
    pub fn assignable_parts(&self) -> Option<Vec<Duration>> {
        if !self.is_positive() || !is_power_of_two(self.denominator()) {
            return None;
        }
        let mut parts = Vec::new();
        let mut remaining = *self;
        while remaining.is_positive() {
            let part = remaining.equal_or_lesser_assignable()?;
            parts.push(part);
            remaining = remaining - part;
        }
        Some(parts)
    }

    /// Decide how this written duration is notated
    pub fn notate(&self) -> ScoreResult<DurationNotation> {
        if !self.is_positive() {
            return Err(ScoreError::InvalidDuration(format!(
                "{} is not positive",
                self
            )));
        }
        if self.is_assignable() {
            return Ok(DurationNotation::Assignable(*self));
        }
        if let Some(parts) = self.assignable_parts() {
            return Ok(DurationNotation::TieChain(parts));
        }
        let denominator = self.denominator();
        let multiplier = Multiplier::new(greatest_power_of_two_at_most(denominator), denominator);
        let unprolated = *self / multiplier;
        let written = match unprolated.notate()? {
            DurationNotation::Assignable(d) => vec![d],
            DurationNotation::TieChain(parts) => parts,
            DurationNotation::Tuplet { .. } => {
                return Err(ScoreError::InvalidDuration(format!(
                    "{} cannot be notated",
                    self
                )))
            }
        };
        Ok(DurationNotation::Tuplet { multiplier, written })
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator() == 1 {
            write!(f, "{}", self.numerator())
        } else {
            write!(f, "{}/{}", self.numerator(), self.denominator())
        }
    }
}

impl Add for Duration {
    type Output = Duration;
    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0 + rhs.0)
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 = self.0 + rhs.0;
    }
}

impl Sub for Duration {
    type Output = Duration;
    fn sub(self, rhs: Duration) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl Mul<Multiplier> for Duration {
    type Output = Duration;
    fn mul(self, rhs: Multiplier) -> Duration {
        Duration(self.0 * rhs.0)
    }
}

impl Div<Multiplier> for Duration {
    type Output = Duration;
    fn div(self, rhs: Multiplier) -> Duration {
        Duration(self.0 / rhs.0)
    }
}

impl Sum for Duration {
    fn sum<I: Iterator<Item = Duration>>(iter: I) -> Duration {
        iter.fold(Duration::zero(), |acc, d| acc + d)
    }
}

impl Multiplier {
    /// Create a multiplier; panics on a zero denominator
    pub fn new(numerator: i64, denominator: i64) -> Self {
        assert!(denominator != 0, "Multiplier denominator must be nonzero");
        Multiplier(Rational64::new(numerator, denominator))
    }

    pub fn one() -> Self {
        Multiplier(Rational64::from_integer(1))
    }

    pub fn is_one(&self) -> bool {
        self.numerator() == 1 && self.denominator() == 1
    }

    pub fn numerator(&self) -> i64 {
        *self.0.numer()
    }

    pub fn denominator(&self) -> i64 {
        *self.0.denom()
    }

    pub fn as_ratio(&self) -> Rational64 {
        self.0
    }
}

impl Mul for Multiplier {
    type Output = Multiplier;
    fn mul(self, rhs: Multiplier) -> Multiplier {
        Multiplier(self.0 * rhs.0)
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator(), self.denominator())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignable_durations() {
        assert!(Duration::new(1, 4).is_assignable());
        assert!(Duration::new(3, 16).is_assignable());
        assert!(Duration::new(7, 32).is_assignable());
        assert!(Duration::new(2, 1).is_assignable());
        assert!(!Duration::new(5, 16).is_assignable());
        assert!(!Duration::new(1, 12).is_assignable());
        assert!(!Duration::zero().is_assignable());
    }

    #[test]
    fn test_lilypond_duration_strings() {
        assert_eq!(Duration::new(1, 8).lilypond_duration_string().as_deref(), Some("8"));
        assert_eq!(Duration::new(3, 32).lilypond_duration_string().as_deref(), Some("16."));
        assert_eq!(Duration::new(7, 16).lilypond_duration_string().as_deref(), Some("4.."));
        assert_eq!(Duration::new(2, 1).lilypond_duration_string().as_deref(), Some("\\breve"));
        assert_eq!(Duration::new(5, 16).lilypond_duration_string(), None);
    }

    #[test]
    fn test_equal_or_lesser_assignable() {
        let expected = [1, 2, 3, 4, 4, 6, 7, 8, 8, 8, 8, 12];
        for (n, want) in (1..=12).zip(expected) {
            assert_eq!(
                Duration::new(n, 16).equal_or_lesser_assignable(),
                Some(Duration::new(want, 16)),
                "{}/16",
                n
            );
        }
    }

    #[test]
    fn test_notate_tie_chain() {
        assert_eq!(
            Duration::new(5, 16).notate().unwrap(),
            DurationNotation::TieChain(vec![Duration::new(1, 4), Duration::new(1, 16)])
        );
        assert_eq!(
            Duration::new(11, 16).notate().unwrap(),
            DurationNotation::TieChain(vec![Duration::new(1, 2), Duration::new(3, 16)])
        );
    }

    #[test]
    fn test_notate_tuplet() {
        assert_eq!(
            Duration::new(1, 24).notate().unwrap(),
            DurationNotation::Tuplet {
                multiplier: Multiplier::new(2, 3),
                written: vec![Duration::new(1, 16)],
            }
        );
        assert_eq!(
            Duration::new(3, 40).notate().unwrap(),
            DurationNotation::Tuplet {
                multiplier: Multiplier::new(4, 5),
                written: vec![Duration::new(3, 32)],
            }
        );
    }

    #[test]
    fn test_flag_count() {
        assert_eq!(Duration::new(1, 4).flag_count(), 0);
        assert_eq!(Duration::new(1, 8).flag_count(), 1);
        assert_eq!(Duration::new(3, 32).flag_count(), 2);
    }

    #[test]
    fn test_sum_is_exact() {
        let total: Duration = [Duration::new(1, 3), Duration::new(1, 6), Duration::new(1, 2)]
            .into_iter()
            .sum();
        assert_eq!(total, Duration::new(1, 1));
        assert_eq!(total.to_string(), "1");
    }
}
