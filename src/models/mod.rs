//! Data models for the score tree
//!
//! Plain value types: durations, pitches, component payloads, indicators
//! and spanners. Everything structural lives in `crate::structure`.

pub mod component;
pub mod duration;
pub mod indicator;
pub mod pitch;
pub mod spanner;

// Re-export commonly used types
pub use component::{Component, ComponentId, Container, ContainerKind, GraceKind, Leaf, LeafKind};
pub use duration::{Duration, DurationNotation, Multiplier, Offset};
pub use indicator::{
    AttachedIndicator, Direction, Indicator, IndicatorKind, LiteralPlacement, Tag, TimeOrientation,
};
pub use pitch::Pitch;
pub use spanner::{
    Glissando, Hairpin, HairpinShape, Side, Spanner, SpannerFamily, SpannerId, SpannerKind,
    TextSpan,
};
