//! Indicators: markings attached to exactly one component
//!
//! Clefs, dynamics, articulations, literals and the like. An indicator only
//! ever contributes to the format bundle of the component it is attached to;
//! anything that spans several leaves is a spanner instead.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Free-form tag carried into the rendered output as `%! TAG`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag(String);

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Tag(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Vertical placement of postfix markings (`^`, `_`, `-`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Neutral,
}

impl Direction {
    pub fn lilypond_symbol(&self) -> &'static str {
        match self {
            Direction::Up => "^",
            Direction::Down => "_",
            Direction::Neutral => "-",
        }
    }
}

/// Where a literal lands relative to its component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiteralPlacement {
    /// Line before the component
    Before,
    /// First line inside a container (treated as `Before` on leaves)
    Opening,
    /// Postfix token after a leaf
    Postfix,
    /// Last line inside a container (treated as `After` on leaves)
    Closing,
    /// Line after the component
    After,
}

/// Whether an indicator sticks to the start or the end of its component
/// when the component is split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOrientation {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Indicator {
    Clef(String),
    TimeSignature { numerator: u32, denominator: u32 },
    KeySignature { tonic: String, mode: String },
    Dynamic(String),
    Articulation(String),
    Markup { text: String, direction: Direction },
    BarLine(String),
    BeamCount { left: u8, right: u8 },
    Literal { text: String, placement: LiteralPlacement },
}

/// Discriminant of `Indicator`, used for queries and detach calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndicatorKind {
    Clef,
    TimeSignature,
    KeySignature,
    Dynamic,
    Articulation,
    Markup,
    BarLine,
    BeamCount,
    Literal,
}

impl Indicator {
    pub fn clef(name: &str) -> Self {
        Indicator::Clef(name.to_string())
    }

    pub fn dynamic(name: &str) -> Self {
        Indicator::Dynamic(name.to_string())
    }

    pub fn articulation(name: &str) -> Self {
        Indicator::Articulation(name.to_string())
    }

    pub fn literal(text: &str, placement: LiteralPlacement) -> Self {
        Indicator::Literal {
            text: text.to_string(),
            placement,
        }
    }

    pub fn markup(text: &str, direction: Direction) -> Self {
        Indicator::Markup {
            text: text.to_string(),
            direction,
        }
    }

    pub fn kind(&self) -> IndicatorKind {
        match self {
            Indicator::Clef(_) => IndicatorKind::Clef,
            Indicator::TimeSignature { .. } => IndicatorKind::TimeSignature,
            Indicator::KeySignature { .. } => IndicatorKind::KeySignature,
            Indicator::Dynamic(_) => IndicatorKind::Dynamic,
            Indicator::Articulation(_) => IndicatorKind::Articulation,
            Indicator::Markup { .. } => IndicatorKind::Markup,
            Indicator::BarLine(_) => IndicatorKind::BarLine,
            Indicator::BeamCount { .. } => IndicatorKind::BeamCount,
            Indicator::Literal { .. } => IndicatorKind::Literal,
        }
    }

    /// Bar lines and trailing literals follow the end of their component
    pub fn time_orientation(&self) -> TimeOrientation {
        match self {
            Indicator::BarLine(_) => TimeOrientation::Right,
            Indicator::Literal {
                placement: LiteralPlacement::After | LiteralPlacement::Closing,
                ..
            } => TimeOrientation::Right,
            _ => TimeOrientation::Left,
        }
    }
}

/// An indicator as stored on a component, with its optional tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachedIndicator {
    pub indicator: Indicator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<Tag>,
}

impl AttachedIndicator {
    pub fn new(indicator: Indicator) -> Self {
        Self {
            indicator,
            tag: None,
        }
    }

    pub fn tagged(indicator: Indicator, tag: Tag) -> Self {
        Self {
            indicator,
            tag: Some(tag),
        }
    }
}
