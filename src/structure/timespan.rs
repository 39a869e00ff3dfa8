//! Lazy offset and duration cache
//!
//! Every node caches its `[start, stop)` span in score time. Edits mark the
//! improper parentage of the touched node stale; a read that finds any
//! stale entry on its way to the root recomputes the whole tree in one
//! pass. Grace containers (and everything inside them) take no time and
//! sit at the start offset of their anchor leaf.

use crate::error::{ScoreError, ScoreResult};
use crate::models::{Component, ComponentId, Duration, Multiplier, Offset};

use super::tree::ScoreTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timespan {
    pub start: Offset,
    pub stop: Offset,
}

impl Timespan {
    pub fn new(start: Offset, stop: Offset) -> Self {
        Self { start, stop }
    }

    pub fn duration(&self) -> Duration {
        self.stop - self.start
    }

    pub fn contains(&self, offset: Offset) -> bool {
        self.start <= offset && offset < self.stop
    }
}

impl ScoreTree {
    /// Start and stop offset of `id`, measured from the start of its root
    pub fn timespan(&self, id: ComponentId) -> ScoreResult<Timespan> {
        let mut stale = false;
        let mut current = Some(id);
        while let Some(component) = current {
            let node = self.node(component)?;
            if node.timespan.get().is_none() {
                stale = true;
                break;
            }
            current = node.parent.or(node.anchor);
        }
        if stale {
            let root = self.logical_root(id)?;
            self.recompute_timespans(root)?;
        }
        let node = self.node(id)?;
        match node.timespan.get() {
            Some(span) => Ok(span),
            None => Err(ScoreError::MalformedTree(format!(
                "timespan of {} missing after recompute",
                id
            ))),
        }
    }

    /// Prolated duration of `id` in score time
    pub fn duration_of(&self, id: ComponentId) -> ScoreResult<Duration> {
        Ok(self.timespan(id)?.duration())
    }

    pub fn start_offset(&self, id: ComponentId) -> ScoreResult<Offset> {
        Ok(self.timespan(id)?.start)
    }

    pub fn stop_offset(&self, id: ComponentId) -> ScoreResult<Offset> {
        Ok(self.timespan(id)?.stop)
    }

    /// Root reached through parent links and grace anchors
    pub(crate) fn logical_root(&self, id: ComponentId) -> ScoreResult<ComponentId> {
        let mut current = id;
        loop {
            let node = self.node(current)?;
            match node.parent.or(node.anchor) {
                Some(next) => current = next,
                None => return Ok(current),
            }
        }
    }

    /// Invalidate the cache on the improper parentage of `id`
    pub(crate) fn mark_stale(&self, id: ComponentId) {
        let mut current = Some(id);
        while let Some(component) = current {
            match self.node(component) {
                Ok(node) => {
                    node.timespan.set(None);
                    current = node.parent.or(node.anchor);
                }
                Err(_) => break,
            }
        }
    }

    fn recompute_timespans(&self, root: ComponentId) -> ScoreResult<()> {
        log::trace!("recomputing timespans from {}", root);
        self.assign_timespans(root, Duration::zero(), Multiplier::one())?;
        Ok(())
    }

    /// Assign spans to `id` and its subtree; returns the duration consumed
    fn assign_timespans(&self, id: ComponentId, start: Offset, prolation: Multiplier) -> ScoreResult<Duration> {
        let node = self.node(id)?;
        let duration = match &node.component {
            Component::Leaf(leaf) => {
                let duration = leaf.multiplied_duration() * prolation;
                for grace in [leaf.grace, leaf.after_grace].into_iter().flatten() {
                    self.assign_grace_timespans(grace, start)?;
                }
                duration
            }
            Component::Container(container) => {
                let inner = match container.tuplet_multiplier() {
                    Some(m) => prolation * m,
                    None => prolation,
                };
                if container.is_simultaneous() {
                    let mut longest = Duration::zero();
                    for &child in container.children() {
                        let consumed = self.assign_timespans(child, start, inner)?;
                        if consumed > longest {
                            longest = consumed;
                        }
                    }
                    longest
                } else {
                    let mut cursor = start;
                    for &child in container.children() {
                        cursor += self.assign_timespans(child, cursor, inner)?;
                    }
                    cursor - start
                }
            }
        };
        node.timespan.set(Some(Timespan::new(start, start + duration)));
        Ok(duration)
    }

    fn assign_grace_timespans(&self, grace: ComponentId, at: Offset) -> ScoreResult<()> {
        for component in self.descendants_with_graces(grace)? {
            self.node(component)?
                .timespan
                .set(Some(Timespan::new(at, at)));
        }
        Ok(())
    }
}
