//! Logical voices and contiguity
//!
//! Two components share a logical voice when they hang off the same root
//! and pass through the same context containers (voices, staves, ...) and
//! the same branches of every simultaneous container on the way up.
//! Spanners may only cover leaves of one logical voice.

use crate::error::{ScoreError, ScoreResult};
use crate::models::ComponentId;

use super::tree::ScoreTree;

/// Signature identifying a logical voice; compare with `==`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalVoice(Vec<VoiceMark>);

/// Named contexts are identified by name, so two sequential voices called
/// "upper" continue the same logical voice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum VoiceMark {
    Component(ComponentId),
    Context(&'static str, String),
}

impl ScoreTree {
    pub fn logical_voice(&self, id: ComponentId) -> ScoreResult<LogicalVoice> {
        let mut signature = Vec::new();
        if self.parent_is_simultaneous(id)? {
            signature.push(VoiceMark::Component(id));
        }
        for ancestor in self.ancestors(id)? {
            let under_simultaneous = self.parent_is_simultaneous(ancestor)?;
            signature.extend(self.ancestor_mark(ancestor, under_simultaneous)?);
        }
        signature.push(VoiceMark::Component(self.root_of(id)?));
        Ok(LogicalVoice(signature))
    }

    /// Logical voice the leaf `id` of a free subtree would have once that
    /// subtree's root is linked into `parent`
    pub(crate) fn logical_voice_under(&self, id: ComponentId, parent: ComponentId) -> ScoreResult<LogicalVoice> {
        let top = self.root_of(id)?;
        let into_simultaneous = self.container(parent)?.is_simultaneous();
        let under_simultaneous = |component: ComponentId| -> ScoreResult<bool> {
            if component == top {
                Ok(into_simultaneous)
            } else {
                self.parent_is_simultaneous(component)
            }
        };
        let mut signature = Vec::new();
        if under_simultaneous(id)? {
            signature.push(VoiceMark::Component(id));
        }
        for ancestor in self.ancestors(id)? {
            signature.extend(self.ancestor_mark(ancestor, under_simultaneous(ancestor)?)?);
        }
        for ancestor in self.improper_parentage(parent)? {
            let under = self.parent_is_simultaneous(ancestor)?;
            signature.extend(self.ancestor_mark(ancestor, under)?);
        }
        signature.push(VoiceMark::Component(self.root_of(parent)?));
        Ok(LogicalVoice(signature))
    }

    fn ancestor_mark(&self, ancestor: ComponentId, under_simultaneous: bool) -> ScoreResult<Option<VoiceMark>> {
        let container = self.container(ancestor)?;
        Ok(match (container.kind().context_name(), container.name()) {
            (Some(context), Some(name)) => Some(VoiceMark::Context(context, name.to_string())),
            (Some(_), None) => Some(VoiceMark::Component(ancestor)),
            (None, _) if under_simultaneous => Some(VoiceMark::Component(ancestor)),
            (None, _) => None,
        })
    }

    fn parent_is_simultaneous(&self, id: ComponentId) -> ScoreResult<bool> {
        match self.parent_of(id)? {
            Some(parent) => Ok(self.container(parent)?.is_simultaneous()),
            None => Ok(false),
        }
    }

    pub fn in_same_logical_voice(&self, ids: &[ComponentId]) -> ScoreResult<bool> {
        let Some((&first, rest)) = ids.split_first() else {
            return Ok(true);
        };
        let voice = self.logical_voice(first)?;
        for &id in rest {
            if self.logical_voice(id)? != voice {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Components that start exactly where `id` stops, in the same voice
    ///
    /// The next sibling of the nearest improper ancestor that has one, plus
    /// every descendant of that sibling starting with it. Simultaneous
    /// containers have no "next sibling".
    pub fn immediate_temporal_successors(&self, id: ComponentId) -> ScoreResult<Vec<ComponentId>> {
        let mut current = Some(id);
        while let Some(component) = current {
            let node = self.node(component)?;
            let Some(parent) = node.parent else {
                break;
            };
            let container = self.container(parent)?;
            if !container.is_simultaneous() {
                if let Some(&next) = container.children().get(node.rank + 1) {
                    let mut out = vec![next];
                    self.collect_starting_with(next, &mut out)?;
                    return Ok(out);
                }
            }
            current = Some(parent);
        }
        Ok(Vec::new())
    }

    fn collect_starting_with(&self, id: ComponentId, out: &mut Vec<ComponentId>) -> ScoreResult<()> {
        if let Some(container) = self.component(id)?.as_container() {
            let firsts: &[ComponentId] = if container.is_simultaneous() {
                container.children()
            } else {
                container.children().get(..1).unwrap_or(&[])
            };
            for &child in firsts {
                out.push(child);
                self.collect_starting_with(child, out)?;
            }
        }
        Ok(())
    }

    /// Whether `ids` form a gapless run in one logical voice, in order
    pub fn are_contiguous(&self, ids: &[ComponentId]) -> ScoreResult<bool> {
        if !self.in_same_logical_voice(ids)? {
            return Ok(false);
        }
        for pair in ids.windows(2) {
            if !self.immediate_temporal_successors(pair[0])?.contains(&pair[1]) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub(crate) fn ensure_contiguous(&self, ids: &[ComponentId]) -> ScoreResult<()> {
        if self.are_contiguous(ids)? {
            Ok(())
        } else {
            Err(ScoreError::NonContiguousComponents(format!(
                "{} components do not form a contiguous run in one logical voice",
                ids.len()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Component, Duration, Pitch};

    fn note(tree: &mut ScoreTree) -> ComponentId {
        tree.create(Component::note(Pitch::new("c'").unwrap(), Duration::new(1, 8)))
    }

    #[test]
    fn test_contiguity_across_containers() {
        let mut tree = ScoreTree::new();
        let staff = tree.create(Component::staff(None));
        let left = tree.create(Component::container());
        let right = tree.create(Component::container());
        tree.extend(staff, &[left, right]).unwrap();
        let a = note(&mut tree);
        let b = note(&mut tree);
        let c = note(&mut tree);
        tree.extend(left, &[a, b]).unwrap();
        tree.append(right, c).unwrap();
        assert!(tree.are_contiguous(&[a, b, c]).unwrap());
        assert!(!tree.are_contiguous(&[a, c]).unwrap());
        assert!(tree.are_contiguous(&[left, right]).unwrap());
        assert_eq!(tree.immediate_temporal_successors(b).unwrap(), vec![right, c]);
    }

    #[test]
    fn test_parallel_voices_differ() {
        let mut tree = ScoreTree::new();
        let staff = tree.create(Component::staff(None).with_simultaneous(true));
        let upper = tree.create(Component::voice(Some("upper")));
        let lower = tree.create(Component::voice(Some("lower")));
        tree.extend(staff, &[upper, lower]).unwrap();
        let a = note(&mut tree);
        let b = note(&mut tree);
        tree.append(upper, a).unwrap();
        tree.append(lower, b).unwrap();
        assert!(!tree.in_same_logical_voice(&[a, b]).unwrap());
        assert!(tree.immediate_temporal_successors(upper).unwrap().is_empty());
    }

    #[test]
    fn test_same_named_voices_continue() {
        let mut tree = ScoreTree::new();
        let staff = tree.create(Component::staff(None));
        let first = tree.create(Component::voice(Some("upper")));
        let second = tree.create(Component::voice(Some("upper")));
        tree.extend(staff, &[first, second]).unwrap();
        let a = note(&mut tree);
        let b = note(&mut tree);
        tree.append(first, a).unwrap();
        tree.append(second, b).unwrap();
        assert!(tree.are_contiguous(&[a, b]).unwrap());
    }

    #[test]
    fn test_separate_trees_differ() {
        let mut tree = ScoreTree::new();
        let a = note(&mut tree);
        let b = note(&mut tree);
        assert!(!tree.in_same_logical_voice(&[a, b]).unwrap());
        assert!(tree.are_contiguous(&[a]).unwrap());
    }
}
