//! Parentage queries and the two link primitives
//!
//! `link_child` and `unlink_child` are the only functions that touch
//! `Node::parent`, `Node::rank` or `Container::children`. Every edit goes
//! through them, which keeps parent and child lists mirror images of each
//! other and keeps ranks dense.

use crate::error::{ScoreError, ScoreResult};
use crate::models::{ComponentId, Multiplier};

use super::tree::ScoreTree;

/// Proper ancestors of a component, nearest first
pub struct Ancestors<'a> {
    tree: &'a ScoreTree,
    current: Option<ComponentId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = ComponentId;

    fn next(&mut self) -> Option<ComponentId> {
        let parent = self
            .current
            .and_then(|id| self.tree.node(id).ok())
            .and_then(|node| node.parent);
        self.current = parent;
        parent
    }
}

impl ScoreTree {
    pub fn parent_of(&self, id: ComponentId) -> ScoreResult<Option<ComponentId>> {
        Ok(self.node(id)?.parent)
    }

    /// Index of `id` among its parent's children (`None` for roots)
    pub fn rank_of(&self, id: ComponentId) -> ScoreResult<Option<usize>> {
        let node = self.node(id)?;
        Ok(node.parent.map(|_| node.rank))
    }

    pub fn children_of(&self, id: ComponentId) -> ScoreResult<&[ComponentId]> {
        Ok(self.container(id)?.children())
    }

    pub fn ancestors(&self, id: ComponentId) -> ScoreResult<Ancestors<'_>> {
        self.node(id)?;
        Ok(Ancestors {
            tree: self,
            current: Some(id),
        })
    }

    /// `id` followed by its proper ancestors
    pub fn improper_parentage(&self, id: ComponentId) -> ScoreResult<Vec<ComponentId>> {
        let mut out = vec![id];
        out.extend(self.ancestors(id)?);
        Ok(out)
    }

    /// Topmost ancestor reachable through parent links
    pub fn root_of(&self, id: ComponentId) -> ScoreResult<ComponentId> {
        Ok(self.ancestors(id)?.last().unwrap_or(id))
    }

    pub fn depth_of(&self, id: ComponentId) -> ScoreResult<usize> {
        Ok(self.ancestors(id)?.count())
    }

    /// Whether `ancestor` is a proper ancestor of `id`
    pub fn is_ancestor_of(&self, ancestor: ComponentId, id: ComponentId) -> ScoreResult<bool> {
        Ok(self.ancestors(id)?.any(|a| a == ancestor))
    }

    /// Leaf a grace container is anchored to
    pub fn anchor_of(&self, grace: ComponentId) -> ScoreResult<Option<ComponentId>> {
        Ok(self.node(grace)?.anchor)
    }

    /// Product of the tuplet multipliers of all proper ancestors
    pub fn prolation_of(&self, id: ComponentId) -> ScoreResult<Multiplier> {
        let mut prolation = Multiplier::one();
        for ancestor in self.ancestors(id)? {
            if let Some(m) = self.container(ancestor)?.tuplet_multiplier() {
                prolation = prolation * m;
            }
        }
        Ok(prolation)
    }

    /// Ranks from the root down to `id`; lexicographic order is preorder
    pub(crate) fn tree_path(&self, id: ComponentId) -> ScoreResult<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = id;
        loop {
            let node = self.node(current)?;
            match node.parent {
                Some(parent) => {
                    path.push(node.rank);
                    current = parent;
                }
                None => break,
            }
        }
        path.reverse();
        Ok(path)
    }

    // ---------------------------------------------------------------
    // Link primitives
    // ---------------------------------------------------------------

    /// Insert a free `child` into `container` at `index`
    pub(crate) fn link_child(
        &mut self,
        container: ComponentId,
        index: usize,
        child: ComponentId,
    ) -> ScoreResult<()> {
        let child_node = self.node(child)?;
        if child_node.parent.is_some() || child_node.anchor.is_some() {
            return Err(ScoreError::AlreadyAttached(child));
        }
        if self.logical_root(container)? == child {
            return Err(ScoreError::CyclicGraft {
                subtree: child,
                target: container,
            });
        }
        let len = self.container(container)?.children.len();
        if index > len {
            return Err(ScoreError::IndexOutOfRange {
                container,
                index,
                len,
            });
        }
        self.container_mut(container)?.children.insert(index, child);
        {
            let node = self.node_mut(child)?;
            node.parent = Some(container);
        }
        self.renumber_from(container, index)?;
        self.mark_stale(child);
        log::trace!("linked {} into {} at {}", child, container, index);
        Ok(())
    }

    /// Remove `child` from its parent; returns `(parent, rank)` it had
    pub(crate) fn unlink_child(&mut self, child: ComponentId) -> ScoreResult<Option<(ComponentId, usize)>> {
        let node = self.node(child)?;
        let Some(parent) = node.parent else {
            return Ok(None);
        };
        let rank = node.rank;
        self.mark_stale(child);
        let siblings = &mut self.container_mut(parent)?.children;
        if siblings.get(rank) != Some(&child) {
            return Err(ScoreError::MalformedTree(format!(
                "{} is not at rank {} of {}",
                child, rank, parent
            )));
        }
        siblings.remove(rank);
        {
            let node = self.node_mut(child)?;
            node.parent = None;
            node.rank = 0;
        }
        self.renumber_from(parent, rank)?;
        self.mark_stale(child);
        log::trace!("unlinked {} from {} at {}", child, parent, rank);
        Ok(Some((parent, rank)))
    }

    fn renumber_from(&mut self, container: ComponentId, start: usize) -> ScoreResult<()> {
        let children = self.container(container)?.children[start..].to_vec();
        for (offset, child) in children.into_iter().enumerate() {
            self.node_mut(child)?.rank = start + offset;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Component, Duration, Pitch};

    #[test]
    fn test_ranks_stay_dense() {
        let mut tree = ScoreTree::new();
        let container = tree.create(Component::container());
        let notes: Vec<_> = ["c'", "d'", "e'"]
            .iter()
            .map(|name| tree.create(Component::note(Pitch::new(name).unwrap(), Duration::new(1, 4))))
            .collect();
        for &note in &notes {
            tree.link_child(container, tree.container(container).unwrap().len(), note)
                .unwrap();
        }
        assert_eq!(tree.unlink_child(notes[0]).unwrap(), Some((container, 0)));
        assert_eq!(tree.rank_of(notes[1]).unwrap(), Some(0));
        assert_eq!(tree.rank_of(notes[2]).unwrap(), Some(1));
        assert_eq!(tree.rank_of(notes[0]).unwrap(), None);
        assert_eq!(tree.parent_of(notes[0]).unwrap(), None);
    }

    #[test]
    fn test_prolation_and_path() {
        let mut tree = ScoreTree::new();
        let staff = tree.create(Component::staff(None));
        let tuplet = tree.create(Component::tuplet(Multiplier::new(2, 3)));
        let note = tree.create(Component::note(Pitch::new("c'").unwrap(), Duration::new(1, 8)));
        tree.link_child(staff, 0, tuplet).unwrap();
        tree.link_child(tuplet, 0, note).unwrap();
        assert_eq!(tree.prolation_of(note).unwrap(), Multiplier::new(2, 3));
        assert_eq!(tree.root_of(note).unwrap(), staff);
        assert_eq!(tree.depth_of(note).unwrap(), 2);
        assert_eq!(tree.tree_path(note).unwrap(), vec![0, 0]);
        assert!(tree.is_ancestor_of(staff, note).unwrap());
        assert!(!tree.is_ancestor_of(note, staff).unwrap());
    }
}
