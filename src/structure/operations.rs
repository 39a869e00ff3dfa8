//! Edit operations on the score tree
//!
//! Every operation validates its inputs before mutating anything, then
//! changes structure only through the link primitives and the spanner
//! registry primitives. The main operations:
//! - `graft` / `append` / `extend` / `insert`: add free subtrees
//! - `splice`: add siblings and grow the spanners dominating a component
//! - `split_leaf`: cut a leaf into pieces, moving spanners and indicators
//! - `fuse_leaves`: the inverse of a split
//! - `replace`: swap a component for others, handing over its spanners
//! - `deep_copy`: copy a subtree, optionally with its spanners

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ScoreError, ScoreResult};
use crate::models::{
    Component, ComponentId, Duration, DurationNotation, GraceKind, Leaf, Multiplier, Side,
    SpannerFamily, SpannerId, SpannerKind, TimeOrientation,
};
use crate::settings::SplitOptions;

use super::tree::ScoreTree;

/// Leaves produced by `split_leaf`, grouped by requested duration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitResult {
    pub shards: Vec<Vec<ComponentId>>,
}

impl SplitResult {
    /// Leaves of the first shard
    pub fn before(&self) -> &[ComponentId] {
        self.shards.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Leaves of every later shard
    pub fn after(&self) -> Vec<ComponentId> {
        self.shards.iter().skip(1).flatten().copied().collect()
    }

    pub fn leaves(&self) -> Vec<ComponentId> {
        self.shards.concat()
    }
}

/// Cut `total` into pieces following `durations`
///
/// A short list gets the remainder appended (or is repeated when `cyclic`);
/// a long list is truncated so the pieces sum to exactly `total`.
fn split_pieces(total: Duration, durations: &[Duration], cyclic: bool) -> Vec<Duration> {
    let mut pieces = Vec::new();
    let mut covered = Duration::zero();
    let mut next_index = 0;
    while covered < total {
        let requested = if cyclic {
            durations[next_index % durations.len()]
        } else {
            match durations.get(next_index) {
                Some(&d) => d,
                None => {
                    pieces.push(total - covered);
                    break;
                }
            }
        };
        next_index += 1;
        let piece = if covered + requested > total {
            total - covered
        } else {
            requested
        };
        pieces.push(piece);
        covered += piece;
    }
    pieces
}

impl ScoreTree {
    // ---------------------------------------------------------------
    // Grafting
    // ---------------------------------------------------------------

    /// Insert the free subtree `subtree` into `target` at `index`
    ///
    /// ## Errors
    /// - `AlreadyAttached` if `subtree` has a parent or is a grace container
    /// - `NotAContainer` if `target` is a leaf
    /// - `IndexOutOfRange` if `index > len`
    /// - `CyclicGraft` if `target` lies inside `subtree`
    pub fn graft(&mut self, subtree: ComponentId, target: ComponentId, index: usize) -> ScoreResult<()> {
        self.validate_free(subtree)?;
        self.container(target)?;
        self.link_child(target, index, subtree)?;
        log::debug!("grafted {} into {} at {}", subtree, target, index);
        Ok(())
    }

    pub fn append(&mut self, container: ComponentId, component: ComponentId) -> ScoreResult<()> {
        let len = self.container(container)?.len();
        self.graft(component, container, len)
    }

    pub fn insert(&mut self, container: ComponentId, index: usize, component: ComponentId) -> ScoreResult<()> {
        self.graft(component, container, index)
    }

    /// Append several free components; nothing is linked if any is invalid
    pub fn extend(&mut self, container: ComponentId, components: &[ComponentId]) -> ScoreResult<()> {
        self.container(container)?;
        self.validate_free_run(components)?;
        let root = self.logical_root(container)?;
        if let Some(&cyclic) = components.iter().find(|&&c| c == root) {
            return Err(ScoreError::CyclicGraft {
                subtree: cyclic,
                target: container,
            });
        }
        for &component in components {
            let len = self.container(container)?.len();
            self.link_child(container, len, component)?;
        }
        log::debug!("extended {} by {} components", container, components.len());
        Ok(())
    }

    fn validate_free(&self, component: ComponentId) -> ScoreResult<()> {
        let node = self.node(component)?;
        if node.parent.is_some() || node.anchor.is_some() {
            return Err(ScoreError::AlreadyAttached(component));
        }
        Ok(())
    }

    fn validate_free_run(&self, components: &[ComponentId]) -> ScoreResult<()> {
        let mut seen = BTreeSet::new();
        for &component in components {
            self.validate_free(component)?;
            if !seen.insert(component) {
                return Err(ScoreError::AlreadyAttached(component));
            }
        }
        Ok(())
    }

    /// Reject new leaves that would put two spanners of one exclusive
    /// family on the same leaf once `spanners` grow over them
    fn validate_growth(&self, spanners: &[SpannerId], new_leaves: &[ComponentId]) -> ScoreResult<()> {
        for &spanner in spanners {
            let family = self.spanner(spanner)?.family();
            if !family.is_exclusive() {
                continue;
            }
            for &leaf in new_leaves {
                if !self.spanners_of_family(leaf, family)?.is_empty() {
                    return Err(ScoreError::InvalidSpannerRange(format!(
                        "{} already belongs to a {:?}",
                        leaf, family
                    )));
                }
            }
        }
        Ok(())
    }

    /// Reject new leaves that would not share one logical voice once their
    /// roots are linked into `parent`, or that would leave the voice of
    /// `reference`
    fn validate_landing_voice(
        &self,
        parent: ComponentId,
        new_leaves: &[ComponentId],
        reference: Option<ComponentId>,
    ) -> ScoreResult<()> {
        let mut expected = match reference {
            Some(leaf) => Some(self.logical_voice(leaf)?),
            None => None,
        };
        for &leaf in new_leaves {
            let voice = self.logical_voice_under(leaf, parent)?;
            match &expected {
                Some(expected) if *expected != voice => {
                    return Err(ScoreError::NonContiguousComponents(format!(
                        "{} would land in another logical voice",
                        leaf
                    )))
                }
                Some(_) => {}
                None => expected = Some(voice),
            }
        }
        Ok(())
    }

    fn leaves_of_all(&self, components: &[ComponentId]) -> ScoreResult<Vec<ComponentId>> {
        let mut out = Vec::new();
        for &component in components {
            out.extend(self.leaves(component)?);
        }
        Ok(out)
    }

    // ---------------------------------------------------------------
    // Splice
    // ---------------------------------------------------------------

    /// Insert `new_components` next to `component` and grow every spanner
    /// that contains all of `component`'s leaves over the new leaves
    ///
    /// ## Parameters
    /// - `component`: an attached component in a sequential container
    /// - `new_components`: free subtrees, inserted in the given order
    /// - `side`: whether they go before or after `component`
    ///
    /// ## Returns
    /// The combined run in score order.
    ///
    /// ## Errors
    /// - `NonContiguousComponents` if nothing is given, `component` has no
    ///   sequential parent, or the new leaves would mix logical voices or
    ///   leave the voice of the spanners they grow
    /// - `AlreadyAttached` / `CyclicGraft` for components that are not free
    /// - `InvalidSpannerRange` if a new leaf already belongs to an exclusive
    ///   spanner of a family being grown
    pub fn splice(
        &mut self,
        component: ComponentId,
        new_components: &[ComponentId],
        side: Side,
    ) -> ScoreResult<Vec<ComponentId>> {
        if new_components.is_empty() {
            return Err(ScoreError::NonContiguousComponents(
                "nothing to splice".to_string(),
            ));
        }
        let node = self.node(component)?;
        let (parent, rank) = match node.parent {
            Some(parent) => (parent, node.rank),
            None => {
                return Err(ScoreError::NonContiguousComponents(format!(
                    "{} has no parent to splice into",
                    component
                )))
            }
        };
        if self.container(parent)?.is_simultaneous() {
            return Err(ScoreError::NonContiguousComponents(format!(
                "cannot splice into simultaneous container {}",
                parent
            )));
        }
        self.validate_free_run(new_components)?;
        let root = self.logical_root(component)?;
        if let Some(&cyclic) = new_components.iter().find(|&&c| c == root) {
            return Err(ScoreError::CyclicGraft {
                subtree: cyclic,
                target: parent,
            });
        }

        let dominant = self.spanners_dominating(component)?;
        let new_leaves = self.leaves_of_all(new_components)?;
        let own_leaves = self.leaves(component)?;
        let reference = if dominant.is_empty() {
            None
        } else {
            own_leaves.first().copied()
        };
        self.validate_landing_voice(parent, &new_leaves, reference)?;
        self.validate_growth(&dominant, &new_leaves)?;

        let insert_at = match side {
            Side::Left => rank,
            Side::Right => rank + 1,
        };
        for (offset, &new) in new_components.iter().enumerate() {
            self.link_child(parent, insert_at + offset, new)?;
        }
        for &spanner in &dominant {
            let anchor = match side {
                Side::Left => own_leaves.first(),
                Side::Right => own_leaves.last(),
            };
            let Some(&anchor) = anchor else { continue };
            let anchor_index = self.index_in_spanner(spanner, anchor)?.ok_or_else(|| {
                ScoreError::MalformedTree(format!("{} lost leaf {}", spanner, anchor))
            })?;
            let start = match side {
                Side::Left => anchor_index,
                Side::Right => anchor_index + 1,
            };
            for (offset, &leaf) in new_leaves.iter().enumerate() {
                self.registry_insert(spanner, start + offset, leaf)?;
            }
        }
        log::debug!(
            "spliced {} components {:?} of {}, growing {} spanners",
            new_components.len(),
            side,
            component,
            dominant.len()
        );
        let mut result = Vec::with_capacity(new_components.len() + 1);
        match side {
            Side::Left => {
                result.extend_from_slice(new_components);
                result.push(component);
            }
            Side::Right => {
                result.push(component);
                result.extend_from_slice(new_components);
            }
        }
        Ok(result)
    }

    // ---------------------------------------------------------------
    // Replace
    // ---------------------------------------------------------------

    /// Put `new_components` where `old` is, handing over its spanners
    ///
    /// Spanners containing all of `old`'s leaves get the new leaves in
    /// their place; spanners covering only part of `old` just lose those
    /// leaves. `old` is left free with its indicators intact.
    pub fn replace(&mut self, old: ComponentId, new_components: &[ComponentId]) -> ScoreResult<()> {
        if new_components.is_empty() {
            return Err(ScoreError::NonContiguousComponents(
                "no replacement components".to_string(),
            ));
        }
        let node = self.node(old)?;
        let (parent, rank) = match node.parent {
            Some(parent) => (parent, node.rank),
            None => {
                return Err(ScoreError::NonContiguousComponents(format!(
                    "{} has no parent to replace it in",
                    old
                )))
            }
        };
        self.validate_free_run(new_components)?;
        let root = self.logical_root(old)?;
        if let Some(&cyclic) = new_components.iter().find(|&&c| c == root || c == old) {
            return Err(ScoreError::CyclicGraft {
                subtree: cyclic,
                target: parent,
            });
        }
        let new_leaves = self.leaves_of_all(new_components)?;
        let dominant = self.spanners_dominating(old)?;
        let old_leaves = self.leaves(old)?;
        if !dominant.is_empty() {
            self.validate_landing_voice(parent, &new_leaves, old_leaves.first().copied())?;
        }
        self.validate_growth(&dominant, &new_leaves)?;
        let touched = self.spanners_of(old)?;

        self.hand_over_spanners(&touched, &dominant, &old_leaves, &new_leaves)?;
        self.unlink_child(old)?;
        for (offset, &new) in new_components.iter().enumerate() {
            self.link_child(parent, rank + offset, new)?;
        }
        log::debug!("replaced {} with {} components", old, new_components.len());
        Ok(())
    }

    fn hand_over_spanners(
        &mut self,
        touched: &[SpannerId],
        dominant: &[SpannerId],
        old_leaves: &[ComponentId],
        new_leaves: &[ComponentId],
    ) -> ScoreResult<()> {
        for &spanner in touched {
            let mut first_index = None;
            for &leaf in old_leaves.iter().rev() {
                if self.leaf(leaf)?.spanners.contains_key(&spanner) {
                    first_index = Some(self.registry_remove(spanner, leaf)?);
                }
            }
            if dominant.contains(&spanner) {
                if let Some(start) = first_index {
                    for (offset, &leaf) in new_leaves.iter().enumerate() {
                        self.registry_insert(spanner, start + offset, leaf)?;
                    }
                }
            }
            if self.spanner(spanner)?.is_empty() {
                self.delete_spanner(spanner)?;
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Split
    // ---------------------------------------------------------------

    /// Split `leaf` into pieces of the given score-time durations
    ///
    /// The leaf is replaced by one shard per piece. A piece that is not a
    /// single note value becomes tied notes or a tuplet; adjacent tuplet
    /// pieces with equal multipliers share one tuplet. Spanners of the
    /// leaf cover all new leaves (fractured at shard boundaries when asked
    /// to), left-oriented indicators go to the first new leaf and
    /// right-oriented ones to the last.
    ///
    /// ## Parameters
    /// - `leaf`: the attached, non-grace leaf to cut
    /// - `durations`: piece lengths in score time; a short list gets the
    ///   remainder appended, a long one is truncated
    /// - `options`: tie and fracture behaviour, cyclic durations
    ///
    /// ## Returns
    /// The new leaves grouped by piece. The old handle is freed unless the
    /// list asks for a single piece, in which case `leaf` comes back as is.
    ///
    /// ## Errors
    /// - `InvalidDuration` for an empty or non-positive duration list, or a
    ///   grace leaf
    /// - `NonContiguousComponents` if the leaf has no parent or its parent
    ///   is simultaneous
    ///
    /// Nothing changes when an error is returned.
    pub fn split_leaf(
        &mut self,
        leaf: ComponentId,
        durations: &[Duration],
        options: &SplitOptions,
    ) -> ScoreResult<SplitResult> {
        let source = self.leaf(leaf)?.clone();
        if self.in_grace(leaf)? {
            return Err(ScoreError::InvalidDuration(format!(
                "grace note {} takes no score time",
                leaf
            )));
        }
        if durations.is_empty() {
            return Err(ScoreError::InvalidDuration("no split durations".to_string()));
        }
        if let Some(bad) = durations.iter().find(|d| !d.is_positive()) {
            return Err(ScoreError::InvalidDuration(format!(
                "split duration {} is not positive",
                bad
            )));
        }
        let Some(parent) = self.node(leaf)?.parent else {
            return Err(ScoreError::NonContiguousComponents(format!(
                "{} has no parent to split into",
                leaf
            )));
        };
        if self.container(parent)?.is_simultaneous() {
            return Err(ScoreError::NonContiguousComponents(format!(
                "cannot split {} inside simultaneous container {}",
                leaf, parent
            )));
        }

        let total = self.duration_of(leaf)?;
        let pieces = split_pieces(total, durations, options.cyclic);
        if pieces.len() <= 1 {
            return Ok(SplitResult {
                shards: vec![vec![leaf]],
            });
        }
        let scale = self.prolation_of(leaf)? * source.multiplier.unwrap_or_else(Multiplier::one);
        let notations = pieces
            .iter()
            .map(|&piece| (piece / scale).notate())
            .collect::<ScoreResult<Vec<_>>>()?;

        // Build the new material while the old leaf is still in place
        let mut shards: Vec<Vec<ComponentId>> = Vec::new();
        let mut tops: Vec<ComponentId> = Vec::new();
        let mut new_tuplets: Vec<ComponentId> = Vec::new();
        let mut chains: Vec<Vec<ComponentId>> = Vec::new();
        for notation in notations {
            let mut shard = Vec::new();
            match notation {
                DurationNotation::Assignable(written) => {
                    let id = self.create_leaf_like(&source, written);
                    shard.push(id);
                    tops.push(id);
                }
                DurationNotation::TieChain(parts) => {
                    for written in parts {
                        let id = self.create_leaf_like(&source, written);
                        shard.push(id);
                        tops.push(id);
                    }
                    chains.push(shard.clone());
                }
                DurationNotation::Tuplet { multiplier, written } => {
                    let reusable = match tops.last() {
                        Some(&prev) if new_tuplets.contains(&prev) => {
                            self.container(prev)?.tuplet_multiplier() == Some(multiplier)
                        }
                        _ => false,
                    };
                    let tuplet = match (reusable, tops.last()) {
                        (true, Some(&prev)) => prev,
                        _ => {
                            let tuplet = self.create(Component::tuplet(multiplier));
                            new_tuplets.push(tuplet);
                            tops.push(tuplet);
                            tuplet
                        }
                    };
                    for part in written {
                        let id = self.create_leaf_like(&source, part);
                        let len = self.container(tuplet)?.len();
                        self.link_child(tuplet, len, id)?;
                        shard.push(id);
                    }
                    if shard.len() > 1 {
                        chains.push(shard.clone());
                    }
                }
            }
            shards.push(shard);
        }
        let new_leaves: Vec<ComponentId> = shards.concat();

        // Swap the new material in
        for spanner in self.spanner_ids_of_leaf(leaf)? {
            self.registry_replace(spanner, leaf, &new_leaves)?;
        }
        let rank = match self.unlink_child(leaf)? {
            Some((_, rank)) => rank,
            None => 0,
        };
        for (offset, &top) in tops.iter().enumerate() {
            self.link_child(parent, rank + offset, top)?;
        }
        self.hand_over_markings(leaf, &new_leaves)?;
        self.free(leaf)?;

        if options.fracture_spanners {
            for shard in &shards[..shards.len() - 1] {
                if let Some(&last) = shard.last() {
                    self.fracture_all(last, Side::Right)?;
                }
            }
        }
        let pitched = source.kind().is_pitched();
        let tie_across = if pitched {
            options.tie_split_notes
        } else {
            options.tie_split_rests
        };
        if tie_across {
            self.merge_ties(&new_leaves)?;
        } else if pitched {
            for chain in &chains {
                self.merge_ties(chain)?;
            }
        }
        log::debug!(
            "split {} into {} shards ({} leaves)",
            leaf,
            shards.len(),
            new_leaves.len()
        );
        Ok(SplitResult { shards })
    }

    fn create_leaf_like(&mut self, source: &Leaf, written: Duration) -> ComponentId {
        let mut copy = source.detached_copy();
        copy.written_duration = written;
        self.create(Component::Leaf(copy))
    }

    /// Move indicators and grace containers from `old` onto its pieces
    fn hand_over_markings(&mut self, old: ComponentId, pieces: &[ComponentId]) -> ScoreResult<()> {
        let (Some(&first), Some(&last)) = (pieces.first(), pieces.last()) else {
            return Ok(());
        };
        let indicators = std::mem::take(&mut self.node_mut(old)?.indicators);
        for attached in indicators {
            let target = match attached.indicator.time_orientation() {
                TimeOrientation::Left => first,
                TimeOrientation::Right => last,
            };
            self.node_mut(target)?.indicators.push(attached);
        }
        if let Some(grace) = self.detach_grace(old, GraceKind::Grace)? {
            self.attach_grace(first, grace)?;
        }
        if let Some(grace) = self.detach_grace(old, GraceKind::AfterGrace)? {
            self.attach_grace(last, grace)?;
        }
        Ok(())
    }

    /// Replace all ties touching `leaves` with one tie over their union
    pub(crate) fn merge_ties(&mut self, leaves: &[ComponentId]) -> ScoreResult<Option<SpannerId>> {
        let mut members: BTreeSet<ComponentId> = leaves.iter().copied().collect();
        let mut old_ties = BTreeSet::new();
        for &leaf in leaves {
            old_ties.extend(self.spanners_of_family(leaf, SpannerFamily::Tie)?);
        }
        for &tie in &old_ties {
            members.extend(self.spanner(tie)?.leaves.iter().copied());
        }
        if members.len() < 2 {
            return Ok(None);
        }
        let mut keyed = members
            .into_iter()
            .map(|leaf| Ok((self.tree_path(leaf)?, leaf)))
            .collect::<ScoreResult<Vec<_>>>()?;
        keyed.sort();
        let ordered: Vec<ComponentId> = keyed.into_iter().map(|(_, leaf)| leaf).collect();
        self.validate_spanner_leaves(&ordered)?;

        let (kind, tag) = match old_ties.iter().next() {
            Some(&tie) => {
                let spanner = self.spanner(tie)?;
                (spanner.kind.clone(), spanner.tag.clone())
            }
            None => (SpannerKind::tie(), None),
        };
        for tie in old_ties {
            self.delete_spanner(tie)?;
        }
        Ok(Some(self.register_spanner(kind, ordered, tag)?))
    }

    // ---------------------------------------------------------------
    // Fuse
    // ---------------------------------------------------------------

    /// Merge contiguous leaves into the first one
    ///
    /// The first leaf takes the total duration (as tied notes when one
    /// note value is not enough). The others are destroyed; right-oriented
    /// indicators and the after-grace of the last one move to the end of
    /// the result.
    pub fn fuse_leaves(&mut self, leaves: &[ComponentId]) -> ScoreResult<Vec<ComponentId>> {
        let Some((&first, rest)) = leaves.split_first() else {
            return Err(ScoreError::NonContiguousComponents("nothing to fuse".to_string()));
        };
        for &leaf in leaves {
            self.leaf(leaf)?;
            if self.in_grace(leaf)? {
                return Err(ScoreError::InvalidDuration(format!(
                    "grace note {} takes no score time",
                    leaf
                )));
            }
        }
        self.ensure_contiguous(leaves)?;
        let Some(&last) = rest.last() else {
            return Ok(vec![first]);
        };
        let mut total = Duration::zero();
        for &leaf in leaves {
            total += self.duration_of(leaf)?;
        }
        let scale = self.prolation_of(first)?
            * self.leaf(first)?.multiplier.unwrap_or_else(Multiplier::one);
        let written = match (total / scale).notate()? {
            DurationNotation::Assignable(d) => vec![d],
            DurationNotation::TieChain(parts) => parts,
            DurationNotation::Tuplet { .. } => {
                return Err(ScoreError::InvalidDuration(format!(
                    "{} cannot be written without a tuplet",
                    total
                )))
            }
        };

        let carried: Vec<_> = {
            let node = self.node_mut(last)?;
            let (right, left): (Vec<_>, Vec<_>) = node
                .indicators
                .drain(..)
                .partition(|a| a.indicator.time_orientation() == TimeOrientation::Right);
            node.indicators = left;
            right
        };
        let after_grace = self.detach_grace(last, GraceKind::AfterGrace)?;
        for &leaf in rest {
            self.detach(leaf)?;
            self.free(leaf)?;
        }
        for tie in self.spanners_of_family(first, SpannerFamily::Tie)? {
            if self.spanner(tie)?.len() < 2 {
                self.delete_spanner(tie)?;
            }
        }
        self.leaf_mut(first)?.written_duration = written[0];
        self.mark_stale(first);

        let mut result = vec![first];
        if written.len() > 1 {
            let source = self.leaf(first)?.clone();
            let extra: Vec<ComponentId> = written[1..]
                .iter()
                .map(|&d| self.create_leaf_like(&source, d))
                .collect();
            self.splice(first, &extra, Side::Right)?;
            result.extend(extra);
            if source.kind().is_pitched() {
                self.merge_ties(&result)?;
            }
        }
        let end = result[result.len() - 1];
        self.node_mut(end)?.indicators.extend(carried);
        if let Some(grace) = after_grace {
            self.attach_grace(end, grace)?;
        }
        log::debug!("fused {} leaves into {}", leaves.len(), result.len());
        Ok(result)
    }

    // ---------------------------------------------------------------
    // Copy
    // ---------------------------------------------------------------

    /// Copy `component` and its subtree into a new free tree
    ///
    /// ## Parameters
    /// - `component`: root of the subtree to copy, attached or free
    /// - `include_spanners`: also copy every spanner touching the subtree,
    ///   restricted to the copied leaves (in spanner id order); copies left
    ///   with fewer leaves than their kind needs are dropped
    ///
    /// ## Returns
    /// The id of the copied root. Indicators and grace containers are
    /// copied by value.
    pub fn deep_copy(&mut self, component: ComponentId, include_spanners: bool) -> ScoreResult<ComponentId> {
        let mut mapping = BTreeMap::new();
        let copy = self.copy_subtree(component, &mut mapping)?;
        if include_spanners {
            let mut touched = BTreeSet::new();
            for &original in mapping.keys() {
                if let Some(leaf) = self.component(original)?.as_leaf() {
                    touched.extend(leaf.spanners.keys().copied());
                }
            }
            for spanner in touched {
                let original = self.spanner(spanner)?.clone();
                let leaves: Vec<ComponentId> = original
                    .leaves
                    .iter()
                    .filter_map(|leaf| mapping.get(leaf).copied())
                    .collect();
                if leaves.len() >= original.kind.min_leaves() {
                    self.register_spanner(original.kind, leaves, original.tag)?;
                }
            }
        }
        log::debug!("copied {} as {} ({} components)", component, copy, mapping.len());
        Ok(copy)
    }

    fn copy_subtree(
        &mut self,
        id: ComponentId,
        mapping: &mut BTreeMap<ComponentId, ComponentId>,
    ) -> ScoreResult<ComponentId> {
        let node = self.node(id)?;
        let payload = node.component.detached_copy();
        let indicators = node.indicators.clone();
        let (children, graces) = match &node.component {
            Component::Container(container) => (container.children.clone(), Vec::new()),
            Component::Leaf(leaf) => (
                Vec::new(),
                [leaf.grace, leaf.after_grace].into_iter().flatten().collect(),
            ),
        };
        let copy = self.create(payload);
        self.node_mut(copy)?.indicators = indicators;
        mapping.insert(id, copy);
        for child in children {
            let child_copy = self.copy_subtree(child, mapping)?;
            let len = self.container(copy)?.len();
            self.link_child(copy, len, child_copy)?;
        }
        for grace in graces {
            let grace_copy = self.copy_subtree(grace, mapping)?;
            self.attach_grace(copy, grace_copy)?;
        }
        Ok(copy)
    }
}
