//! Components: leaves and containers
//!
//! A component value is the payload stored in one arena slot of a
//! `ScoreTree`. Structural links (parent, children, spanner membership,
//! grace anchors) are owned by the tree and only changed through its edit
//! operations, so those fields are crate-private here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::duration::{Duration, Multiplier};
use super::pitch::Pitch;
use super::spanner::SpannerId;

/// Generational arena handle for a component
///
/// A handle whose slot has been freed (or reused) is reported as
/// `ScoreError::StaleComponent` instead of silently aliasing a new node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeafKind {
    Note(Pitch),
    Chord(Vec<Pitch>),
    Rest,
    /// Invisible rest that still takes time
    Skip,
}

impl LeafKind {
    /// Notes and chords; ties only make sense on these
    pub fn is_pitched(&self) -> bool {
        matches!(self, LeafKind::Note(_) | LeafKind::Chord(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub(crate) kind: LeafKind,
    pub(crate) written_duration: Duration,
    pub(crate) multiplier: Option<Multiplier>,
    /// Inverse spanner index: spanner -> position of this leaf in it
    pub(crate) spanners: BTreeMap<SpannerId, usize>,
    pub(crate) grace: Option<ComponentId>,
    pub(crate) after_grace: Option<ComponentId>,
}

impl Leaf {
    pub fn new(kind: LeafKind, written_duration: Duration) -> Self {
        Self {
            kind,
            written_duration,
            multiplier: None,
            spanners: BTreeMap::new(),
            grace: None,
            after_grace: None,
        }
    }

    pub fn kind(&self) -> &LeafKind {
        &self.kind
    }

    pub fn written_duration(&self) -> Duration {
        self.written_duration
    }

    pub fn multiplier(&self) -> Option<Multiplier> {
        self.multiplier
    }

    /// Written duration times the leaf's own multiplier (no tuplet prolation)
    pub fn multiplied_duration(&self) -> Duration {
        match self.multiplier {
            Some(m) => self.written_duration * m,
            None => self.written_duration,
        }
    }

    pub fn pitch(&self) -> Option<&Pitch> {
        match &self.kind {
            LeafKind::Note(p) => Some(p),
            _ => None,
        }
    }

    /// Grace container rendered before this leaf
    pub fn grace(&self) -> Option<ComponentId> {
        self.grace
    }

    /// Grace container rendered after this leaf
    pub fn after_grace(&self) -> Option<ComponentId> {
        self.after_grace
    }

    /// Copy of the musical payload without any structural links
    pub(crate) fn detached_copy(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            written_duration: self.written_duration,
            multiplier: self.multiplier,
            spanners: BTreeMap::new(),
            grace: None,
            after_grace: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraceKind {
    /// `\grace { ... }` before the anchor leaf
    Grace,
    /// `\afterGrace anchor { ... }`
    AfterGrace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    Container,
    Voice,
    Staff,
    StaffGroup,
    Score,
    Tuplet(Multiplier),
    Grace(GraceKind),
}

impl ContainerKind {
    /// Named LilyPond context (`\new Staff`, ...), if any
    pub fn context_name(&self) -> Option<&'static str> {
        match self {
            ContainerKind::Voice => Some("Voice"),
            ContainerKind::Staff => Some("Staff"),
            ContainerKind::StaffGroup => Some("StaffGroup"),
            ContainerKind::Score => Some("Score"),
            _ => None,
        }
    }

    pub fn is_context(&self) -> bool {
        self.context_name().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub(crate) kind: ContainerKind,
    pub(crate) name: Option<String>,
    pub(crate) simultaneous: bool,
    pub(crate) children: Vec<ComponentId>,
}

impl Container {
    pub fn new(kind: ContainerKind) -> Self {
        let simultaneous = matches!(kind, ContainerKind::Score | ContainerKind::StaffGroup);
        Self {
            kind,
            name: None,
            simultaneous,
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_simultaneous(&self) -> bool {
        self.simultaneous
    }

    pub fn children(&self) -> &[ComponentId] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn tuplet_multiplier(&self) -> Option<Multiplier> {
        match self.kind {
            ContainerKind::Tuplet(m) => Some(m),
            _ => None,
        }
    }

    pub(crate) fn detached_copy(&self) -> Self {
        Self {
            kind: self.kind,
            name: self.name.clone(),
            simultaneous: self.simultaneous,
            children: Vec::new(),
        }
    }
}

/// Payload of one tree node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Leaf(Leaf),
    Container(Container),
}

impl Component {
    pub fn note(pitch: Pitch, duration: Duration) -> Self {
        Component::Leaf(Leaf::new(LeafKind::Note(pitch), duration))
    }

    pub fn chord(pitches: Vec<Pitch>, duration: Duration) -> Self {
        Component::Leaf(Leaf::new(LeafKind::Chord(pitches), duration))
    }

    pub fn rest(duration: Duration) -> Self {
        Component::Leaf(Leaf::new(LeafKind::Rest, duration))
    }

    pub fn skip(duration: Duration) -> Self {
        Component::Leaf(Leaf::new(LeafKind::Skip, duration))
    }

    pub fn container() -> Self {
        Component::Container(Container::new(ContainerKind::Container))
    }

    /// `<< ... >>` without a context
    pub fn simultaneous() -> Self {
        let mut container = Container::new(ContainerKind::Container);
        container.simultaneous = true;
        Component::Container(container)
    }

    pub fn voice(name: Option<&str>) -> Self {
        let mut container = Container::new(ContainerKind::Voice);
        container.name = name.map(str::to_string);
        Component::Container(container)
    }

    pub fn staff(name: Option<&str>) -> Self {
        let mut container = Container::new(ContainerKind::Staff);
        container.name = name.map(str::to_string);
        Component::Container(container)
    }

    pub fn staff_group() -> Self {
        Component::Container(Container::new(ContainerKind::StaffGroup))
    }

    pub fn score() -> Self {
        Component::Container(Container::new(ContainerKind::Score))
    }

    pub fn tuplet(multiplier: Multiplier) -> Self {
        Component::Container(Container::new(ContainerKind::Tuplet(multiplier)))
    }

    pub fn grace(kind: GraceKind) -> Self {
        Component::Container(Container::new(ContainerKind::Grace(kind)))
    }

    /// Set a leaf multiplier (`c'4 * 1/2`); no-op on containers
    pub fn with_multiplier(mut self, multiplier: Multiplier) -> Self {
        if let Component::Leaf(leaf) = &mut self {
            leaf.multiplier = Some(multiplier);
        }
        self
    }

    /// Make a container simultaneous; no-op on leaves
    pub fn with_simultaneous(mut self, simultaneous: bool) -> Self {
        if let Component::Container(container) = &mut self {
            container.simultaneous = simultaneous;
        }
        self
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Component::Leaf(_))
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Component::Leaf(leaf) => Some(leaf),
            Component::Container(_) => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Component::Container(container) => Some(container),
            Component::Leaf(_) => None,
        }
    }

    pub(crate) fn as_leaf_mut(&mut self) -> Option<&mut Leaf> {
        match self {
            Component::Leaf(leaf) => Some(leaf),
            Component::Container(_) => None,
        }
    }

    pub(crate) fn as_container_mut(&mut self) -> Option<&mut Container> {
        match self {
            Component::Container(container) => Some(container),
            Component::Leaf(_) => None,
        }
    }

    /// Copy of the payload with all structural links cleared
    pub(crate) fn detached_copy(&self) -> Self {
        match self {
            Component::Leaf(leaf) => Component::Leaf(leaf.detached_copy()),
            Component::Container(container) => Component::Container(container.detached_copy()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_simultaneity() {
        let score = Component::score();
        assert!(score.as_container().unwrap().is_simultaneous());
        let staff = Component::staff(None);
        assert!(!staff.as_container().unwrap().is_simultaneous());
    }

    #[test]
    fn test_multiplied_duration() {
        let note = Component::note(Pitch::new("c'").unwrap(), Duration::new(1, 4))
            .with_multiplier(Multiplier::new(1, 2));
        assert_eq!(note.as_leaf().unwrap().multiplied_duration(), Duration::new(1, 8));
    }
}
