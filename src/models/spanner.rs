//! Spanners: markings that stretch over an ordered run of leaves
//!
//! The spanner value only carries its kind-specific payload and the ordered
//! leaf list. Membership bookkeeping (the per-leaf inverse index) lives in
//! the registry on `ScoreTree`, which is the only code allowed to change
//! `leaves`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::component::ComponentId;
use super::indicator::{Direction, Tag};
use crate::error::{ScoreError, ScoreResult};

/// Stable spanner handle, allocated monotonically and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpannerId(pub(crate) u64);

impl SpannerId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpannerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Which end of a leaf an operation acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HairpinShape {
    Crescendo,
    Decrescendo,
}

/// Hairpin payload, usually built from a descriptor like `"p < f"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hairpin {
    pub start_dynamic: Option<String>,
    pub shape: HairpinShape,
    pub stop_dynamic: Option<String>,
    /// Whether dynamics may be written on rests at either end
    pub include_rests: bool,
}

pub(crate) const DYNAMIC_NAMES: [&str; 19] = [
    "ppppp", "pppp", "ppp", "pp", "p", "mp", "mf", "f", "ff", "fff", "ffff", "fffff", "fp", "sf",
    "sff", "sfz", "sfp", "rfz", "niente",
];

impl Hairpin {
    pub fn crescendo() -> Self {
        Self {
            start_dynamic: None,
            shape: HairpinShape::Crescendo,
            stop_dynamic: None,
            include_rests: false,
        }
    }

    pub fn decrescendo() -> Self {
        Self {
            shape: HairpinShape::Decrescendo,
            ..Self::crescendo()
        }
    }

    /// Parse `"<"`, `"p <"`, `"< f"` or `"p > pp"`
    pub fn from_descriptor(descriptor: &str) -> ScoreResult<Self> {
        let invalid = |message: String| ScoreError::ParseError {
            line: 1,
            column: 0,
            message: format!("hairpin descriptor '{}': {}", descriptor, message),
        };
        let words: Vec<&str> = descriptor.split_whitespace().collect();
        let shape_at = words
            .iter()
            .position(|w| *w == "<" || *w == ">")
            .ok_or_else(|| invalid("missing '<' or '>'".to_string()))?;
        if shape_at > 1 || words.len() > shape_at + 2 {
            return Err(invalid("expected at most one dynamic on each side".to_string()));
        }
        let dynamic = |word: &str| -> ScoreResult<String> {
            if DYNAMIC_NAMES.contains(&word) {
                Ok(word.to_string())
            } else {
                Err(invalid(format!("unknown dynamic '{}'", word)))
            }
        };
        let start_dynamic = match shape_at {
            1 => Some(dynamic(words[0])?),
            _ => None,
        };
        let stop_dynamic = match words.get(shape_at + 1) {
            Some(word) => Some(dynamic(word)?),
            None => None,
        };
        let shape = if words[shape_at] == "<" {
            HairpinShape::Crescendo
        } else {
            HairpinShape::Decrescendo
        };
        Ok(Self {
            start_dynamic,
            shape,
            stop_dynamic,
            include_rests: false,
        })
    }

    pub fn with_rests(mut self) -> Self {
        self.include_rests = true;
        self
    }

    pub fn shape_token(&self) -> &'static str {
        match self.shape {
            HairpinShape::Crescendo => "\\<",
            HairpinShape::Decrescendo => "\\>",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextSpan {
    pub left_text: Option<String>,
    pub right_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Glissando {
    /// Draw glissandi between repeated pitches too
    pub allow_repeats: bool,
    /// Continue the last glissando past the end of the spanner (deactivated)
    pub right_broken: bool,
}

/// Kind-specific spanner payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SpannerKind {
    Beam { direction: Option<Direction> },
    Slur { direction: Option<Direction> },
    PhrasingSlur,
    Tie { direction: Option<Direction> },
    Hairpin(Hairpin),
    TextSpan(TextSpan),
    Glissando(Glissando),
    TrillSpan,
    PianoPedal,
    Ottava(i8),
    HorizontalBracket,
}

/// Coarse spanner family, used for detach calls and exclusivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SpannerFamily {
    Beam,
    Slur,
    PhrasingSlur,
    Tie,
    Hairpin,
    TextSpan,
    Glissando,
    TrillSpan,
    PianoPedal,
    Ottava,
    HorizontalBracket,
}

impl SpannerFamily {
    /// Whether two spanners of this family may share a leaf
    pub fn is_exclusive(&self) -> bool {
        !matches!(self, SpannerFamily::TextSpan | SpannerFamily::HorizontalBracket)
    }
}

impl SpannerKind {
    pub fn beam() -> Self {
        SpannerKind::Beam { direction: None }
    }

    pub fn slur() -> Self {
        SpannerKind::Slur { direction: None }
    }

    pub fn tie() -> Self {
        SpannerKind::Tie { direction: None }
    }

    pub fn family(&self) -> SpannerFamily {
        match self {
            SpannerKind::Beam { .. } => SpannerFamily::Beam,
            SpannerKind::Slur { .. } => SpannerFamily::Slur,
            SpannerKind::PhrasingSlur => SpannerFamily::PhrasingSlur,
            SpannerKind::Tie { .. } => SpannerFamily::Tie,
            SpannerKind::Hairpin(_) => SpannerFamily::Hairpin,
            SpannerKind::TextSpan(_) => SpannerFamily::TextSpan,
            SpannerKind::Glissando(_) => SpannerFamily::Glissando,
            SpannerKind::TrillSpan => SpannerFamily::TrillSpan,
            SpannerKind::PianoPedal => SpannerFamily::PianoPedal,
            SpannerKind::Ottava(_) => SpannerFamily::Ottava,
            SpannerKind::HorizontalBracket => SpannerFamily::HorizontalBracket,
        }
    }

    /// Fewest leaves accepted by `attach_spanner`
    pub fn min_leaves(&self) -> usize {
        match self {
            SpannerKind::Tie { .. } | SpannerKind::Glissando(_) => 2,
            _ => 1,
        }
    }
}

/// A spanner as stored in the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spanner {
    pub(crate) id: SpannerId,
    pub(crate) kind: SpannerKind,
    pub(crate) leaves: Vec<ComponentId>,
    pub(crate) tag: Option<Tag>,
}

impl Spanner {
    pub fn id(&self) -> SpannerId {
        self.id
    }

    pub fn kind(&self) -> &SpannerKind {
        &self.kind
    }

    pub fn family(&self) -> SpannerFamily {
        self.kind.family()
    }

    /// Leaves in score order
    pub fn leaves(&self) -> &[ComponentId] {
        &self.leaves
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    pub fn first_leaf(&self) -> Option<ComponentId> {
        self.leaves.first().copied()
    }

    pub fn last_leaf(&self) -> Option<ComponentId> {
        self.leaves.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hairpin_descriptor() {
        let hairpin = Hairpin::from_descriptor("p < f").unwrap();
        assert_eq!(hairpin.start_dynamic.as_deref(), Some("p"));
        assert_eq!(hairpin.shape, HairpinShape::Crescendo);
        assert_eq!(hairpin.stop_dynamic.as_deref(), Some("f"));

        let hairpin = Hairpin::from_descriptor(">").unwrap();
        assert_eq!(hairpin, Hairpin::decrescendo());

        let hairpin = Hairpin::from_descriptor("< ff").unwrap();
        assert_eq!(hairpin.start_dynamic, None);
        assert_eq!(hairpin.stop_dynamic.as_deref(), Some("ff"));
    }

    #[test]
    fn test_hairpin_descriptor_errors() {
        assert!(Hairpin::from_descriptor("p f").is_err());
        assert!(Hairpin::from_descriptor("p < q").is_err());
        assert!(Hairpin::from_descriptor("p mp < f").is_err());
    }

    #[test]
    fn test_families() {
        assert_eq!(SpannerKind::beam().family(), SpannerFamily::Beam);
        assert!(SpannerFamily::Beam.is_exclusive());
        assert!(!SpannerFamily::TextSpan.is_exclusive());
        assert_eq!(SpannerKind::tie().min_leaves(), 2);
        assert_eq!(SpannerKind::slur().min_leaves(), 1);
    }
}
