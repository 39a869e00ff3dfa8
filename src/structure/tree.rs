//! The component arena
//!
//! `ScoreTree` owns every component and spanner. Components are addressed by
//! generational `ComponentId` handles; parent/child links and spanner
//! membership are stored as ids on both sides and are only changed by the
//! edit operations in this module family.

use std::cell::Cell;
use std::collections::BTreeMap;

use crate::error::{ScoreError, ScoreResult};
use crate::models::{
    AttachedIndicator, Component, ComponentId, Container, ContainerKind, Duration, GraceKind,
    Indicator, IndicatorKind, Leaf, LeafKind, Multiplier, Spanner, SpannerId, Tag,
};

use super::timespan::Timespan;

/// One live arena entry
#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) component: Component,
    pub(crate) parent: Option<ComponentId>,
    pub(crate) rank: usize,
    /// Anchor leaf, set only on grace containers
    pub(crate) anchor: Option<ComponentId>,
    pub(crate) indicators: Vec<AttachedIndicator>,
    /// Cached timespan; `None` means stale
    pub(crate) timespan: Cell<Option<Timespan>>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena of components plus the spanner registry
#[derive(Debug, Default)]
pub struct ScoreTree {
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    pub(crate) spanners: BTreeMap<SpannerId, Spanner>,
    pub(crate) next_spanner_id: u64,
}

impl ScoreTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a free component (no parent, no spanners) and return its handle
    pub fn create(&mut self, component: Component) -> ComponentId {
        let node = Node {
            component: component.detached_copy(),
            parent: None,
            rank: 0,
            anchor: None,
            indicators: Vec::new(),
            timespan: Cell::new(None),
        };
        match self.free_slots.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                ComponentId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                ComponentId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Whether `id` still refers to a live component
    pub fn contains(&self, id: ComponentId) -> bool {
        self.node(id).is_ok()
    }

    /// Number of live components
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn node(&self, id: ComponentId) -> ScoreResult<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(ScoreError::StaleComponent(id))
    }

    pub(crate) fn node_mut(&mut self, id: ComponentId) -> ScoreResult<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(ScoreError::StaleComponent(id))
    }

    pub fn component(&self, id: ComponentId) -> ScoreResult<&Component> {
        Ok(&self.node(id)?.component)
    }

    pub fn leaf(&self, id: ComponentId) -> ScoreResult<&Leaf> {
        self.component(id)?
            .as_leaf()
            .ok_or(ScoreError::NotALeaf(id))
    }

    pub fn container(&self, id: ComponentId) -> ScoreResult<&Container> {
        self.component(id)?
            .as_container()
            .ok_or(ScoreError::NotAContainer(id))
    }

    pub(crate) fn leaf_mut(&mut self, id: ComponentId) -> ScoreResult<&mut Leaf> {
        self.node_mut(id)?
            .component
            .as_leaf_mut()
            .ok_or(ScoreError::NotALeaf(id))
    }

    pub(crate) fn container_mut(&mut self, id: ComponentId) -> ScoreResult<&mut Container> {
        self.node_mut(id)?
            .component
            .as_container_mut()
            .ok_or(ScoreError::NotAContainer(id))
    }

    pub fn is_leaf(&self, id: ComponentId) -> ScoreResult<bool> {
        Ok(self.component(id)?.is_leaf())
    }

    // ---------------------------------------------------------------
    // Payload setters
    // ---------------------------------------------------------------

    pub fn set_written_duration(&mut self, leaf: ComponentId, duration: Duration) -> ScoreResult<()> {
        if !duration.is_positive() {
            return Err(ScoreError::InvalidDuration(format!(
                "written duration {} is not positive",
                duration
            )));
        }
        self.leaf_mut(leaf)?.written_duration = duration;
        self.mark_stale(leaf);
        Ok(())
    }

    pub fn set_multiplier(&mut self, leaf: ComponentId, multiplier: Option<Multiplier>) -> ScoreResult<()> {
        if let Some(m) = multiplier {
            if m.numerator() <= 0 {
                return Err(ScoreError::InvalidDuration(format!(
                    "multiplier {} is not positive",
                    m
                )));
            }
        }
        self.leaf_mut(leaf)?.multiplier = multiplier;
        self.mark_stale(leaf);
        Ok(())
    }

    pub fn set_leaf_kind(&mut self, leaf: ComponentId, kind: LeafKind) -> ScoreResult<()> {
        self.leaf_mut(leaf)?.kind = kind;
        Ok(())
    }

    pub fn set_name(&mut self, container: ComponentId, name: Option<&str>) -> ScoreResult<()> {
        self.container_mut(container)?.name = name.map(str::to_string);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Indicators
    // ---------------------------------------------------------------

    pub fn attach_indicator(&mut self, id: ComponentId, indicator: Indicator) -> ScoreResult<()> {
        self.node_mut(id)?
            .indicators
            .push(AttachedIndicator::new(indicator));
        Ok(())
    }

    pub fn attach_tagged_indicator(
        &mut self,
        id: ComponentId,
        indicator: Indicator,
        tag: Tag,
    ) -> ScoreResult<()> {
        self.node_mut(id)?
            .indicators
            .push(AttachedIndicator::tagged(indicator, tag));
        Ok(())
    }

    /// Remove every indicator of `kind`, returning them in attach order
    pub fn detach_indicators(&mut self, id: ComponentId, kind: IndicatorKind) -> ScoreResult<Vec<Indicator>> {
        let node = self.node_mut(id)?;
        let (removed, kept): (Vec<_>, Vec<_>) = node
            .indicators
            .drain(..)
            .partition(|attached| attached.indicator.kind() == kind);
        node.indicators = kept;
        Ok(removed.into_iter().map(|attached| attached.indicator).collect())
    }

    pub fn indicators(&self, id: ComponentId) -> ScoreResult<&[AttachedIndicator]> {
        Ok(&self.node(id)?.indicators)
    }

    pub fn indicators_of(&self, id: ComponentId, kind: IndicatorKind) -> ScoreResult<Vec<&Indicator>> {
        Ok(self
            .node(id)?
            .indicators
            .iter()
            .map(|attached| &attached.indicator)
            .filter(|indicator| indicator.kind() == kind)
            .collect())
    }

    /// The single indicator of `kind` on `id`
    ///
    /// ## Errors
    /// - `MissingIndicator` when there is none
    /// - `ExtraIndicator` when there are several
    pub fn indicator(&self, id: ComponentId, kind: IndicatorKind) -> ScoreResult<&Indicator> {
        let found = self.indicators_of(id, kind)?;
        match found.as_slice() {
            [] => Err(ScoreError::MissingIndicator { component: id, kind }),
            [one] => Ok(one),
            many => Err(ScoreError::ExtraIndicator {
                component: id,
                kind,
                count: many.len(),
            }),
        }
    }

    /// The indicator of `kind` in effect at the start of `id`
    ///
    /// Looks back through the enclosing staff (or the whole tree when there
    /// is no staff) for the latest component starting no later than `id`
    /// that carries such an indicator. Ancestors count, so a clef on a
    /// staff is in effect for all of its leaves.
    pub fn effective_indicator(&self, id: ComponentId, kind: IndicatorKind) -> ScoreResult<Option<&Indicator>> {
        let scope = self
            .improper_parentage(id)?
            .into_iter()
            .find(|&c| matches!(self.container(c).map(|c| c.kind()), Ok(ContainerKind::Staff)))
            .map_or_else(|| self.root_of(id), Ok)?;
        let target_start = self.timespan(id)?.start;
        let mut best: Option<(Duration, &Indicator)> = None;
        for candidate in self.descendants(scope)? {
            let start = self.timespan(candidate)?.start;
            if start > target_start {
                continue;
            }
            if let Some(indicator) = self.indicators_of(candidate, kind)?.last() {
                if best.map_or(true, |(best_start, _)| start >= best_start) {
                    best = Some((start, *indicator));
                }
            }
            if candidate == id {
                break;
            }
        }
        Ok(best.map(|(_, indicator)| indicator))
    }

    // ---------------------------------------------------------------
    // Iteration
    // ---------------------------------------------------------------

    /// `id` and everything below it in preorder (grace containers excluded)
    pub fn descendants(&self, id: ComponentId) -> ScoreResult<Vec<ComponentId>> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(container) = self.component(current)?.as_container() {
                stack.extend(container.children.iter().rev().copied());
            }
        }
        Ok(out)
    }

    /// Leaves under `id` in score order (grace leaves excluded)
    pub fn leaves(&self, id: ComponentId) -> ScoreResult<Vec<ComponentId>> {
        let mut out = Vec::new();
        for component in self.descendants(id)? {
            if self.is_leaf(component)? {
                out.push(component);
            }
        }
        Ok(out)
    }

    /// Like `descendants`, plus grace containers and their contents
    pub(crate) fn descendants_with_graces(&self, id: ComponentId) -> ScoreResult<Vec<ComponentId>> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            match &self.node(current)?.component {
                Component::Container(container) => {
                    stack.extend(container.children.iter().rev().copied());
                }
                Component::Leaf(leaf) => {
                    stack.extend(leaf.after_grace);
                    stack.extend(leaf.grace);
                }
            }
        }
        Ok(out)
    }

    // ---------------------------------------------------------------
    // Grace containers
    // ---------------------------------------------------------------

    /// Anchor a free grace container of matching kind to `leaf`
    pub fn attach_grace(&mut self, leaf: ComponentId, grace: ComponentId) -> ScoreResult<()> {
        let kind = match self.container(grace)?.kind() {
            ContainerKind::Grace(kind) => kind,
            _ => {
                return Err(ScoreError::InvalidSpannerRange(format!(
                    "{} is not a grace container",
                    grace
                )))
            }
        };
        let grace_node = self.node(grace)?;
        if grace_node.parent.is_some() || grace_node.anchor.is_some() {
            return Err(ScoreError::AlreadyAttached(grace));
        }
        if self.in_grace(leaf)? {
            return Err(ScoreError::InvalidSpannerRange(format!(
                "{} is itself a grace note",
                leaf
            )));
        }
        if self.improper_parentage(leaf)?.contains(&grace) {
            return Err(ScoreError::CyclicGraft {
                subtree: grace,
                target: leaf,
            });
        }
        for inner in self.leaves(grace)? {
            if !self.leaf(inner)?.spanners.is_empty() {
                return Err(ScoreError::InvalidSpannerRange(format!(
                    "grace note {} belongs to a spanner",
                    inner
                )));
            }
        }
        let existing = match kind {
            GraceKind::Grace => self.leaf(leaf)?.grace,
            GraceKind::AfterGrace => self.leaf(leaf)?.after_grace,
        };
        if let Some(old) = existing {
            self.node_mut(old)?.anchor = None;
        }
        let slot = self.leaf_mut(leaf)?;
        match kind {
            GraceKind::Grace => slot.grace = Some(grace),
            GraceKind::AfterGrace => slot.after_grace = Some(grace),
        }
        self.node_mut(grace)?.anchor = Some(leaf);
        self.mark_stale(grace);
        Ok(())
    }

    /// Release the grace container of `kind` anchored to `leaf`, if any
    pub fn detach_grace(&mut self, leaf: ComponentId, kind: GraceKind) -> ScoreResult<Option<ComponentId>> {
        let slot = self.leaf_mut(leaf)?;
        let grace = match kind {
            GraceKind::Grace => slot.grace.take(),
            GraceKind::AfterGrace => slot.after_grace.take(),
        };
        if let Some(grace) = grace {
            self.node_mut(grace)?.anchor = None;
            self.mark_stale(grace);
        }
        Ok(grace)
    }

    /// Whether `id` sits inside a grace container
    pub fn in_grace(&self, id: ComponentId) -> ScoreResult<bool> {
        for component in self.improper_parentage(id)? {
            if self.node(component)?.anchor.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ---------------------------------------------------------------
    // Destruction
    // ---------------------------------------------------------------

    /// Destroy a free subtree, its grace containers and every spanner
    /// touching it. All handles into the subtree become stale.
    pub fn free(&mut self, id: ComponentId) -> ScoreResult<()> {
        let node = self.node(id)?;
        if node.parent.is_some() || node.anchor.is_some() {
            return Err(ScoreError::AlreadyAttached(id));
        }
        let doomed = self.descendants_with_graces(id)?;
        let mut touched = Vec::new();
        for &component in &doomed {
            if let Some(leaf) = self.component(component)?.as_leaf() {
                touched.extend(leaf.spanners.keys().copied());
            }
        }
        touched.sort();
        touched.dedup();
        for spanner in touched {
            self.delete_spanner(spanner)?;
        }
        for component in doomed {
            let slot = &mut self.slots[component.index as usize];
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free_slots.push(component.index);
        }
        log::trace!("freed subtree {}", id);
        Ok(())
    }

    pub(crate) fn spanner_ids_of_leaf(&self, leaf: ComponentId) -> ScoreResult<Vec<SpannerId>> {
        Ok(self.leaf(leaf)?.spanners.keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Pitch;

    fn note(tree: &mut ScoreTree, name: &str) -> ComponentId {
        tree.create(Component::note(Pitch::new(name).unwrap(), Duration::new(1, 8)))
    }

    #[test]
    fn test_freed_handle_is_stale() {
        let mut tree = ScoreTree::new();
        let a = note(&mut tree, "c'");
        tree.free(a).unwrap();
        assert_eq!(tree.component(a).unwrap_err(), ScoreError::StaleComponent(a));

        // Slot reuse must not revive the old handle
        let b = note(&mut tree, "d'");
        assert_eq!(a.index, b.index);
        assert!(!tree.contains(a));
        assert!(tree.contains(b));
    }

    #[test]
    fn test_indicator_queries() {
        let mut tree = ScoreTree::new();
        let a = note(&mut tree, "c'");
        assert_eq!(
            tree.indicator(a, IndicatorKind::Clef).unwrap_err(),
            ScoreError::MissingIndicator {
                component: a,
                kind: IndicatorKind::Clef
            }
        );
        tree.attach_indicator(a, Indicator::clef("bass")).unwrap();
        assert_eq!(tree.indicator(a, IndicatorKind::Clef).unwrap(), &Indicator::clef("bass"));
        tree.attach_indicator(a, Indicator::clef("alto")).unwrap();
        assert!(matches!(
            tree.indicator(a, IndicatorKind::Clef),
            Err(ScoreError::ExtraIndicator { count: 2, .. })
        ));
        let removed = tree.detach_indicators(a, IndicatorKind::Clef).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(tree.indicators(a).unwrap().is_empty());
    }

    #[test]
    fn test_free_requires_root() {
        let mut tree = ScoreTree::new();
        let container = tree.create(Component::container());
        let a = note(&mut tree, "c'");
        tree.append(container, a).unwrap();
        assert_eq!(tree.free(a).unwrap_err(), ScoreError::AlreadyAttached(a));
        tree.free(container).unwrap();
        assert!(!tree.contains(a));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_create_clears_structural_links() {
        let mut tree = ScoreTree::new();
        let container = tree.create(Component::container());
        let a = note(&mut tree, "c'");
        tree.append(container, a).unwrap();
        let copy = tree.create(tree.component(container).unwrap().clone());
        assert!(tree.container(copy).unwrap().is_empty());
    }
}
