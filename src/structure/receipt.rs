//! Detach receipts and edit transactions
//!
//! `detach` returns an `EditReceipt` recording the parent, rank and spanner
//! positions the component had; `reattach` puts everything back. An
//! `EditTransaction` stacks such steps and undoes them in reverse unless it
//! is committed.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ScoreError, ScoreResult};
use crate::models::{ComponentId, SpannerId};

use super::tree::ScoreTree;

/// One spanner position held by a detached leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Membership {
    pub spanner: SpannerId,
    pub index: usize,
    pub leaf: ComponentId,
}

/// Everything needed to undo a `detach`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditReceipt {
    component: ComponentId,
    parent: Option<ComponentId>,
    rank: usize,
    memberships: Vec<Membership>,
}

impl EditReceipt {
    pub fn component(&self) -> ComponentId {
        self.component
    }

    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Memberships sorted by spanner, then index
    pub fn memberships(&self) -> &[Membership] {
        &self.memberships
    }
}

impl ScoreTree {
    /// Remove `component` from its parent and from every spanner that
    /// reaches outside it
    ///
    /// Spanners lying entirely inside the component travel with it.
    pub fn detach(&mut self, component: ComponentId) -> ScoreResult<EditReceipt> {
        let inside: BTreeSet<ComponentId> = self.leaves(component)?.into_iter().collect();
        let mut memberships = Vec::new();
        for &leaf in &inside {
            for (&spanner, &index) in &self.leaf(leaf)?.spanners {
                let crosses = self
                    .spanner(spanner)?
                    .leaves
                    .iter()
                    .any(|other| !inside.contains(other));
                if crosses {
                    memberships.push(Membership { spanner, index, leaf });
                }
            }
        }
        memberships.sort();
        for membership in memberships.iter().rev() {
            self.registry_remove(membership.spanner, membership.leaf)?;
        }
        let (parent, rank) = match self.unlink_child(component)? {
            Some((parent, rank)) => (Some(parent), rank),
            None => (None, 0),
        };
        log::debug!(
            "detached {} from {:?} ({} spanner memberships)",
            component,
            parent,
            memberships.len()
        );
        Ok(EditReceipt {
            component,
            parent,
            rank,
            memberships,
        })
    }

    /// Undo a `detach`, restoring parent, rank and spanner positions
    pub fn reattach(&mut self, receipt: EditReceipt) -> ScoreResult<()> {
        let component = receipt.component;
        let node = self.node(component)?;
        if node.parent.is_some() || node.anchor.is_some() {
            return Err(ScoreError::AlreadyAttached(component));
        }
        if let Some(parent) = receipt.parent {
            let len = self.container(parent)?.len();
            if receipt.rank > len {
                return Err(ScoreError::IndexOutOfRange {
                    container: parent,
                    index: receipt.rank,
                    len,
                });
            }
        }
        let inside: BTreeSet<ComponentId> = self.leaves(component)?.into_iter().collect();
        let mut grown: BTreeMap<SpannerId, usize> = BTreeMap::new();
        for membership in &receipt.memberships {
            let len = self.spanner(membership.spanner)?.len();
            let inserted = grown.entry(membership.spanner).or_insert(0);
            if !inside.contains(&membership.leaf) || membership.index > len + *inserted {
                return Err(ScoreError::MalformedTree(format!(
                    "receipt for {} no longer matches spanner {}",
                    component, membership.spanner
                )));
            }
            *inserted += 1;
        }

        if let Some(parent) = receipt.parent {
            self.link_child(parent, receipt.rank, component)?;
        }
        for membership in &receipt.memberships {
            self.registry_insert(membership.spanner, membership.index, membership.leaf)?;
        }
        for &spanner in grown.keys() {
            let leaves = self.spanner(spanner)?.leaves.clone();
            if let Err(err) = self.validate_spanner_leaves(&leaves) {
                log::warn!("reattach of {} broke {}: {}", component, spanner, err);
                for membership in receipt.memberships.iter().rev() {
                    self.registry_remove(membership.spanner, membership.leaf)?;
                }
                self.unlink_child(component)?;
                return Err(err);
            }
        }
        log::debug!("reattached {}", component);
        Ok(())
    }
}

enum Step {
    Detached(EditReceipt),
    Linked(ComponentId),
}

/// A group of detach/graft steps that is rolled back on drop unless
/// `commit` is called
pub struct EditTransaction<'a> {
    tree: &'a mut ScoreTree,
    steps: Vec<Step>,
    committed: bool,
}

impl<'a> EditTransaction<'a> {
    pub fn new(tree: &'a mut ScoreTree) -> Self {
        Self {
            tree,
            steps: Vec::new(),
            committed: false,
        }
    }

    pub fn tree(&self) -> &ScoreTree {
        &*self.tree
    }

    pub fn detach(&mut self, component: ComponentId) -> ScoreResult<()> {
        let receipt = self.tree.detach(component)?;
        self.steps.push(Step::Detached(receipt));
        Ok(())
    }

    pub fn graft(&mut self, subtree: ComponentId, target: ComponentId, index: usize) -> ScoreResult<()> {
        self.tree.graft(subtree, target, index)?;
        self.steps.push(Step::Linked(subtree));
        Ok(())
    }

    pub fn commit(mut self) {
        log::debug!("committed edit with {} steps", self.steps.len());
        self.committed = true;
        self.steps.clear();
    }

    pub fn rollback(mut self) -> ScoreResult<()> {
        self.undo_steps()
    }

    fn undo_steps(&mut self) -> ScoreResult<()> {
        while let Some(step) = self.steps.pop() {
            match step {
                Step::Detached(receipt) => self.tree.reattach(receipt)?,
                Step::Linked(component) => {
                    self.tree.detach(component)?;
                }
            }
        }
        Ok(())
    }
}

impl Drop for EditTransaction<'_> {
    fn drop(&mut self) {
        if self.committed || self.steps.is_empty() {
            return;
        }
        log::warn!("rolling back uncommitted edit ({} steps)", self.steps.len());
        if let Err(err) = self.undo_steps() {
            log::warn!("rollback failed: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Component, Duration, Pitch, SpannerKind};

    fn staff_with_notes(tree: &mut ScoreTree, count: usize) -> (ComponentId, Vec<ComponentId>) {
        let staff = tree.create(Component::staff(None));
        let notes: Vec<_> = (0..count)
            .map(|_| tree.create(Component::note(Pitch::new("c'").unwrap(), Duration::new(1, 8))))
            .collect();
        tree.extend(staff, &notes).unwrap();
        (staff, notes)
    }

    #[test]
    fn test_detach_then_reattach_restores_state() {
        let mut tree = ScoreTree::new();
        let (staff, notes) = staff_with_notes(&mut tree, 4);
        let beam = tree.attach_spanner(SpannerKind::beam(), &notes).unwrap();

        let receipt = tree.detach(notes[1]).unwrap();
        assert_eq!(receipt.parent(), Some(staff));
        assert_eq!(receipt.rank(), 1);
        assert_eq!(tree.spanner(beam).unwrap().leaves(), &[notes[0], notes[2], notes[3]]);
        assert_eq!(tree.parent_of(notes[1]).unwrap(), None);

        tree.reattach(receipt).unwrap();
        assert_eq!(tree.children_of(staff).unwrap(), notes.as_slice());
        assert_eq!(tree.spanner(beam).unwrap().leaves(), notes.as_slice());
        assert_eq!(tree.index_in_spanner(beam, notes[1]).unwrap(), Some(1));
    }

    #[test]
    fn test_internal_spanners_travel_with_component() {
        let mut tree = ScoreTree::new();
        let staff = tree.create(Component::staff(None));
        let inner = tree.create(Component::container());
        tree.append(staff, inner).unwrap();
        let notes: Vec<_> = (0..2)
            .map(|_| tree.create(Component::note(Pitch::new("d'").unwrap(), Duration::new(1, 8))))
            .collect();
        tree.extend(inner, &notes).unwrap();
        let slur = tree.attach_spanner(SpannerKind::slur(), &notes).unwrap();
        let receipt = tree.detach(inner).unwrap();
        assert!(receipt.memberships().is_empty());
        assert_eq!(tree.spanner(slur).unwrap().leaves(), notes.as_slice());
    }

    #[test]
    fn test_reattach_into_occupied_slot_fails() {
        let mut tree = ScoreTree::new();
        let (_, notes) = staff_with_notes(&mut tree, 2);
        let receipt = tree.detach(notes[0]).unwrap();
        let other = tree.create(Component::container());
        tree.append(other, notes[0]).unwrap();
        assert_eq!(tree.reattach(receipt).unwrap_err(), ScoreError::AlreadyAttached(notes[0]));
    }

    #[test]
    fn test_uncommitted_transaction_rolls_back() {
        let mut tree = ScoreTree::new();
        let (staff, notes) = staff_with_notes(&mut tree, 3);
        let beam = tree.attach_spanner(SpannerKind::beam(), &notes).unwrap();
        {
            let mut transaction = EditTransaction::new(&mut tree);
            transaction.detach(notes[1]).unwrap();
            transaction.detach(notes[2]).unwrap();
            assert_eq!(transaction.tree().children_of(staff).unwrap().len(), 1);
        }
        assert_eq!(tree.children_of(staff).unwrap(), notes.as_slice());
        assert_eq!(tree.spanner(beam).unwrap().leaves(), notes.as_slice());

        let mut transaction = EditTransaction::new(&mut tree);
        transaction.detach(notes[2]).unwrap();
        transaction.commit();
        assert_eq!(tree.children_of(staff).unwrap(), &notes[..2]);
    }
}
