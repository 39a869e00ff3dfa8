//! Spanner registry
//!
//! Spanners live in `ScoreTree::spanners` keyed by id; each leaf keeps an
//! inverse index `spanner -> position`. The helpers at the bottom of this
//! file (`registry_*`) are the only code that edits either side, so the
//! forward list and the inverse index cannot drift apart.
//!
//! Invariants kept by every public call:
//! - a spanner's leaves are distinct, live, share one root and one logical
//!   voice, and are in strictly increasing score order
//! - exclusive families never overlap on a leaf

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::error::{ScoreError, ScoreResult};
use crate::models::{ComponentId, Side, Spanner, SpannerFamily, SpannerId, SpannerKind, Tag};

use super::tree::ScoreTree;

impl ScoreTree {
    /// Attach a new spanner covering `leaves`
    ///
    /// Any existing spanner of the same exclusive family that touches one
    /// of the leaves is removed first.
    ///
    /// ## Errors
    /// - `InvalidSpannerRange` for too few, duplicate, grace or unordered leaves
    /// - `NonContiguousComponents` when leaves span roots or logical voices
    pub fn attach_spanner(&mut self, kind: SpannerKind, leaves: &[ComponentId]) -> ScoreResult<SpannerId> {
        self.attach_spanner_with_tag(kind, leaves, None)
    }

    pub fn attach_tagged_spanner(
        &mut self,
        kind: SpannerKind,
        leaves: &[ComponentId],
        tag: Tag,
    ) -> ScoreResult<SpannerId> {
        self.attach_spanner_with_tag(kind, leaves, Some(tag))
    }

    fn attach_spanner_with_tag(
        &mut self,
        kind: SpannerKind,
        leaves: &[ComponentId],
        tag: Option<Tag>,
    ) -> ScoreResult<SpannerId> {
        if leaves.len() < kind.min_leaves() {
            return Err(ScoreError::InvalidSpannerRange(format!(
                "{:?} needs at least {} leaves, got {}",
                kind.family(),
                kind.min_leaves(),
                leaves.len()
            )));
        }
        self.validate_spanner_leaves(leaves)?;

        let family = kind.family();
        if family.is_exclusive() {
            let mut displaced = BTreeSet::new();
            for &leaf in leaves {
                for spanner in self.spanners_of_family(leaf, family)? {
                    displaced.insert(spanner);
                }
            }
            for spanner in displaced {
                log::trace!("{} displaced by new {:?}", spanner, family);
                self.delete_spanner(spanner)?;
            }
        }
        let id = self.register_spanner(kind, leaves.to_vec(), tag)?;
        log::debug!("attached {:?} {} over {} leaves", family, id, leaves.len());
        Ok(id)
    }

    /// Check the leaf-sequence invariants without touching the registry
    pub(crate) fn validate_spanner_leaves(&self, leaves: &[ComponentId]) -> ScoreResult<()> {
        if leaves.is_empty() {
            return Err(ScoreError::InvalidSpannerRange("no leaves".to_string()));
        }
        let mut seen = BTreeSet::new();
        for &leaf in leaves {
            self.leaf(leaf)?;
            if !seen.insert(leaf) {
                return Err(ScoreError::InvalidSpannerRange(format!(
                    "leaf {} appears twice",
                    leaf
                )));
            }
            if self.in_grace(leaf)? {
                return Err(ScoreError::InvalidSpannerRange(format!(
                    "grace note {} cannot belong to a spanner",
                    leaf
                )));
            }
        }
        if !self.in_same_logical_voice(leaves)? {
            return Err(ScoreError::NonContiguousComponents(
                "spanner leaves must share one logical voice".to_string(),
            ));
        }
        for pair in leaves.windows(2) {
            if self.score_order(pair[0], pair[1])? != Ordering::Less {
                return Err(ScoreError::InvalidSpannerRange(format!(
                    "leaf {} does not come after {}",
                    pair[1], pair[0]
                )));
            }
        }
        Ok(())
    }

    /// Preorder comparison of two components under the same root
    pub(crate) fn score_order(&self, a: ComponentId, b: ComponentId) -> ScoreResult<Ordering> {
        Ok(self.tree_path(a)?.cmp(&self.tree_path(b)?))
    }

    /// Remove every spanner of `family` touching `component` or its leaves
    pub fn detach_spanners(&mut self, family: SpannerFamily, component: ComponentId) -> ScoreResult<Vec<SpannerId>> {
        let mut doomed = BTreeSet::new();
        for leaf in self.leaves(component)? {
            doomed.extend(self.spanners_of_family(leaf, family)?);
        }
        for &spanner in &doomed {
            self.delete_spanner(spanner)?;
        }
        Ok(doomed.into_iter().collect())
    }

    /// Remove a spanner from the registry and from all of its leaves
    pub fn delete_spanner(&mut self, id: SpannerId) -> ScoreResult<Spanner> {
        let spanner = self.spanners.remove(&id).ok_or(ScoreError::StaleSpanner(id))?;
        for &leaf in &spanner.leaves {
            if let Ok(leaf) = self.leaf_mut(leaf) {
                leaf.spanners.remove(&id);
            }
        }
        log::trace!("deleted spanner {}", id);
        Ok(spanner)
    }

    pub fn spanner(&self, id: SpannerId) -> ScoreResult<&Spanner> {
        self.spanners.get(&id).ok_or(ScoreError::StaleSpanner(id))
    }

    /// All spanners in id order
    pub fn spanners(&self) -> impl Iterator<Item = &Spanner> {
        self.spanners.values()
    }

    /// Spanners touching `component` (or any leaf below it), in id order
    pub fn spanners_of(&self, component: ComponentId) -> ScoreResult<Vec<SpannerId>> {
        let mut ids = BTreeSet::new();
        for leaf in self.leaves(component)? {
            ids.extend(self.leaf(leaf)?.spanners.keys().copied());
        }
        Ok(ids.into_iter().collect())
    }

    pub fn spanners_of_family(&self, leaf: ComponentId, family: SpannerFamily) -> ScoreResult<Vec<SpannerId>> {
        let mut out = Vec::new();
        for &id in self.leaf(leaf)?.spanners.keys() {
            if self.spanner(id)?.family() == family {
                out.push(id);
            }
        }
        Ok(out)
    }

    /// Position of `leaf` in `spanner`, answered from the inverse index
    pub fn index_in_spanner(&self, spanner: SpannerId, leaf: ComponentId) -> ScoreResult<Option<usize>> {
        self.spanner(spanner)?;
        Ok(self.leaf(leaf)?.spanners.get(&spanner).copied())
    }

    pub fn is_first_leaf(&self, spanner: SpannerId, leaf: ComponentId) -> ScoreResult<bool> {
        Ok(self.index_in_spanner(spanner, leaf)? == Some(0))
    }

    pub fn is_last_leaf(&self, spanner: SpannerId, leaf: ComponentId) -> ScoreResult<bool> {
        let len = self.spanner(spanner)?.len();
        Ok(len > 0 && self.index_in_spanner(spanner, leaf)? == Some(len - 1))
    }

    /// Spanners covering both `left` and `right`, with the index in each
    /// spanner at which `right` begins
    ///
    /// `left` and `right` must be equal or contiguous. Result is sorted by
    /// spanner id.
    pub fn dominant_spanners(
        &self,
        left: ComponentId,
        right: ComponentId,
    ) -> ScoreResult<Vec<(SpannerId, usize)>> {
        if left != right {
            self.ensure_contiguous(&[left, right])?;
        }
        let left_spanners: BTreeSet<SpannerId> = self.spanners_of(left)?.into_iter().collect();
        let right_leaves = self.leaves(right)?;
        let Some(&first_right) = right_leaves.first() else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for spanner in self.spanners_of(right)? {
            if !left_spanners.contains(&spanner) {
                continue;
            }
            if let Some(index) = self.index_in_spanner(spanner, first_right)? {
                out.push((spanner, index));
            }
        }
        Ok(out)
    }

    /// Spanners containing every leaf of `component`
    pub(crate) fn spanners_dominating(&self, component: ComponentId) -> ScoreResult<Vec<SpannerId>> {
        let leaves = self.leaves(component)?;
        let Some((&first, rest)) = leaves.split_first() else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for spanner in self.spanner_ids_of_leaf(first)? {
            let mut covers = true;
            for &leaf in rest {
                if !self.leaf(leaf)?.spanners.contains_key(&spanner) {
                    covers = false;
                    break;
                }
            }
            if covers {
                out.push(spanner);
            }
        }
        Ok(out)
    }

    /// Split `spanner` at `leaf`
    ///
    /// ## Parameters
    /// - `spanner`: the spanner to break
    /// - `leaf`: one of its leaves
    /// - `side`: `Side::Left` breaks just before the leaf, `Side::Right`
    ///   just after
    ///
    /// ## Returns
    /// `(left, right)`. The original id keeps the left part; the right part
    /// gets a new id. Breaking at either end of the spanner is a no-op and
    /// returns `None` for the right part.
    ///
    /// ## Errors
    /// - `InvalidSpannerRange` if `leaf` is not in `spanner`
    /// - `StaleSpanner` for a deleted spanner
    pub fn fracture_spanner(
        &mut self,
        spanner: SpannerId,
        leaf: ComponentId,
        side: Side,
    ) -> ScoreResult<(SpannerId, Option<SpannerId>)> {
        let index = self.index_in_spanner(spanner, leaf)?.ok_or_else(|| {
            ScoreError::InvalidSpannerRange(format!("leaf {} is not in spanner {}", leaf, spanner))
        })?;
        let len = self.spanner(spanner)?.len();
        let split_at = match side {
            Side::Left => index,
            Side::Right => index + 1,
        };
        if split_at == 0 || split_at >= len {
            return Ok((spanner, None));
        }
        let (kind, tag, moved) = {
            let original = self.spanner(spanner)?;
            (
                original.kind.clone(),
                original.tag.clone(),
                original.leaves[split_at..].to_vec(),
            )
        };
        for &moved_leaf in moved.iter().rev() {
            self.registry_remove(spanner, moved_leaf)?;
        }
        let right = self.register_spanner(kind, moved, tag)?;
        log::trace!("fractured {} at {} into {}", spanner, leaf, right);
        Ok((spanner, Some(right)))
    }

    /// Fracture every spanner of `leaf` on `side`
    pub fn fracture_all(
        &mut self,
        leaf: ComponentId,
        side: Side,
    ) -> ScoreResult<Vec<(SpannerId, Option<SpannerId>)>> {
        let mut out = Vec::new();
        for spanner in self.spanner_ids_of_leaf(leaf)? {
            out.push(self.fracture_spanner(spanner, leaf, side)?);
        }
        Ok(out)
    }

    /// Add `leaf` after the last leaf of `spanner`
    pub fn spanner_append(&mut self, spanner: SpannerId, leaf: ComponentId) -> ScoreResult<()> {
        let len = self.spanner(spanner)?.len();
        self.spanner_insert(spanner, len, leaf)
    }

    /// Insert `leaf` into `spanner` at `index`, keeping score order
    pub fn spanner_insert(&mut self, spanner: SpannerId, index: usize, leaf: ComponentId) -> ScoreResult<()> {
        let mut leaves = self.spanner(spanner)?.leaves.clone();
        if index > leaves.len() {
            return Err(ScoreError::InvalidSpannerRange(format!(
                "index {} past the end of {}",
                index, spanner
            )));
        }
        leaves.insert(index, leaf);
        self.validate_spanner_leaves(&leaves)?;
        let family = self.spanner(spanner)?.family();
        if family.is_exclusive() && !self.spanners_of_family(leaf, family)?.is_empty() {
            return Err(ScoreError::InvalidSpannerRange(format!(
                "{} already belongs to a {:?}",
                leaf, family
            )));
        }
        self.registry_insert(spanner, index, leaf)
    }

    /// Remove `leaf` from `spanner`; an emptied spanner is deleted
    pub fn spanner_remove_leaf(&mut self, spanner: SpannerId, leaf: ComponentId) -> ScoreResult<()> {
        if self.index_in_spanner(spanner, leaf)?.is_none() {
            return Err(ScoreError::InvalidSpannerRange(format!(
                "leaf {} is not in spanner {}",
                leaf, spanner
            )));
        }
        self.registry_remove(spanner, leaf)?;
        if self.spanner(spanner)?.is_empty() {
            self.delete_spanner(spanner)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Registry primitives
    // ---------------------------------------------------------------

    /// Store a spanner whose leaves are already validated
    pub(crate) fn register_spanner(
        &mut self,
        kind: SpannerKind,
        leaves: Vec<ComponentId>,
        tag: Option<Tag>,
    ) -> ScoreResult<SpannerId> {
        let id = SpannerId(self.next_spanner_id);
        self.next_spanner_id += 1;
        for (index, &leaf) in leaves.iter().enumerate() {
            self.leaf_mut(leaf)?.spanners.insert(id, index);
        }
        self.spanners.insert(id, Spanner { id, kind, leaves, tag });
        Ok(id)
    }

    pub(crate) fn registry_insert(&mut self, spanner: SpannerId, index: usize, leaf: ComponentId) -> ScoreResult<()> {
        let entry = self.spanners.get_mut(&spanner).ok_or(ScoreError::StaleSpanner(spanner))?;
        entry.leaves.insert(index, leaf);
        let shifted = entry.leaves[index..].to_vec();
        for (offset, shifted_leaf) in shifted.into_iter().enumerate() {
            self.leaf_mut(shifted_leaf)?.spanners.insert(spanner, index + offset);
        }
        Ok(())
    }

    /// Remove `leaf` from the spanner's list; returns its former index
    pub(crate) fn registry_remove(&mut self, spanner: SpannerId, leaf: ComponentId) -> ScoreResult<usize> {
        let index = self
            .leaf_mut(leaf)?
            .spanners
            .remove(&spanner)
            .ok_or_else(|| ScoreError::MalformedTree(format!("{} has no entry for {}", leaf, spanner)))?;
        let entry = self.spanners.get_mut(&spanner).ok_or(ScoreError::StaleSpanner(spanner))?;
        if entry.leaves.get(index) != Some(&leaf) {
            return Err(ScoreError::MalformedTree(format!(
                "{} is not at index {} of {}",
                leaf, index, spanner
            )));
        }
        entry.leaves.remove(index);
        let shifted = entry.leaves[index..].to_vec();
        for (offset, shifted_leaf) in shifted.into_iter().enumerate() {
            self.leaf_mut(shifted_leaf)?.spanners.insert(spanner, index + offset);
        }
        Ok(index)
    }

    /// Replace the leaf at `index` with `replacements` (possibly none)
    pub(crate) fn registry_replace(
        &mut self,
        spanner: SpannerId,
        leaf: ComponentId,
        replacements: &[ComponentId],
    ) -> ScoreResult<()> {
        let index = self.registry_remove(spanner, leaf)?;
        for (offset, &replacement) in replacements.iter().enumerate() {
            self.registry_insert(spanner, index + offset, replacement)?;
        }
        Ok(())
    }
}
