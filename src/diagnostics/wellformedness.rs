//! Well-formedness checks
//!
//! Walks a tree (grace containers included) and every spanner touching it,
//! cross-checking the stored links against each other:
//!
//! - child lists against parent links and cached ranks
//! - grace containers against their anchors
//! - each leaf's spanner index against the spanner's leaf list
//! - spanner leaves: live, not grace, one root, one logical voice, in order
//! - exclusive spanner families sharing a leaf

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ScoreError, ScoreResult};
use crate::models::{Component, ComponentId, ContainerKind, GraceKind, SpannerFamily, SpannerId};
use crate::structure::ScoreTree;

use super::Violation;

/// Every violation found under `root`
pub fn check_wellformedness(tree: &ScoreTree, root: ComponentId) -> ScoreResult<Vec<Violation>> {
    let mut violations = Vec::new();
    let mut touched: BTreeSet<SpannerId> = BTreeSet::new();
    let mut stack = vec![root];

    while let Some(id) = stack.pop() {
        let node = tree.node(id)?;
        match &node.component {
            Component::Container(container) => {
                for (index, &child) in container.children.iter().enumerate() {
                    let Ok(child_node) = tree.node(child) else {
                        violations.push(
                            Violation::error("dangling_child", format!("child {} of {} is stale", child, id))
                                .at_component(id),
                        );
                        continue;
                    };
                    if child_node.parent != Some(id) {
                        violations.push(
                            Violation::error(
                                "parent_mismatch",
                                format!("{} lists {} as a child but its parent is {:?}", id, child, child_node.parent),
                            )
                            .at_component(child),
                        );
                    }
                    if child_node.rank != index {
                        violations.push(
                            Violation::error(
                                "rank_mismatch",
                                format!("{} sits at {} but caches rank {}", child, index, child_node.rank),
                            )
                            .at_component(child),
                        );
                    }
                    stack.push(child);
                }
            }
            Component::Leaf(leaf) => {
                let graces = [(leaf.grace, GraceKind::Grace), (leaf.after_grace, GraceKind::AfterGrace)];
                for (grace, expected) in graces {
                    let Some(grace) = grace else {
                        continue;
                    };
                    let Ok(grace_node) = tree.node(grace) else {
                        violations.push(
                            Violation::error("dangling_grace", format!("grace {} of {} is stale", grace, id))
                                .at_component(id),
                        );
                        continue;
                    };
                    let kind_matches = matches!(
                        grace_node.component.as_container().map(|c| c.kind()),
                        Some(ContainerKind::Grace(kind)) if kind == expected
                    );
                    if grace_node.anchor != Some(id) || !kind_matches {
                        violations.push(
                            Violation::error(
                                "grace_anchor",
                                format!("{} does not point back to its anchor {}", grace, id),
                            )
                            .at_component(grace),
                        );
                    }
                    stack.push(grace);
                }
                for (&spanner, &index) in &leaf.spanners {
                    touched.insert(spanner);
                    let holds = tree
                        .spanner(spanner)
                        .map(|s| s.leaves().get(index) == Some(&id))
                        .unwrap_or(false);
                    if !holds {
                        violations.push(
                            Violation::error(
                                "inverse_index",
                                format!("{} records index {} in {} but the spanner disagrees", id, index, spanner),
                            )
                            .at_component(id)
                            .at_spanner(spanner),
                        );
                    }
                }
            }
        }
    }

    let mut families: BTreeMap<(ComponentId, SpannerFamily), Vec<SpannerId>> = BTreeMap::new();
    for &id in &touched {
        let Ok(spanner) = tree.spanner(id) else {
            violations.push(Violation::error("dangling_spanner", format!("{} no longer exists", id)).at_spanner(id));
            continue;
        };
        violations.extend(check_spanner_leaves(tree, root, id, spanner.leaves())?);
        for &leaf in spanner.leaves() {
            families.entry((leaf, spanner.family())).or_default().push(id);
        }
    }
    for ((leaf, family), spanners) in families {
        if family.is_exclusive() && spanners.len() > 1 {
            violations.push(
                Violation::error(
                    "exclusive_overlap",
                    format!("{} carries {} {:?} spanners", leaf, spanners.len(), family),
                )
                .at_component(leaf),
            );
        }
    }

    for violation in &violations {
        log::warn!("{}: {}", violation.kind, violation.message);
    }
    Ok(violations)
}

fn check_spanner_leaves(
    tree: &ScoreTree,
    root: ComponentId,
    id: SpannerId,
    leaves: &[ComponentId],
) -> ScoreResult<Vec<Violation>> {
    let mut violations = Vec::new();
    let mut live = Vec::new();
    for (index, &leaf) in leaves.iter().enumerate() {
        let Ok(leaf_value) = tree.leaf(leaf) else {
            violations.push(
                Violation::error("dangling_leaf", format!("{} holds stale or non-leaf {}", id, leaf)).at_spanner(id),
            );
            continue;
        };
        if leaf_value.spanners.get(&id) != Some(&index) {
            violations.push(
                Violation::error(
                    "inverse_index",
                    format!("{} holds {} at {} but the leaf disagrees", id, leaf, index),
                )
                .at_component(leaf)
                .at_spanner(id),
            );
        }
        if tree.in_grace(leaf)? {
            violations.push(
                Violation::error("spanner_grace", format!("{} covers grace note {}", id, leaf))
                    .at_component(leaf)
                    .at_spanner(id),
            );
        }
        if tree.root_of(leaf)? != root {
            violations.push(
                Violation::error("spanner_root", format!("{} reaches {} outside the tree", id, leaf))
                    .at_component(leaf)
                    .at_spanner(id),
            );
        }
        live.push(leaf);
    }
    if !tree.in_same_logical_voice(&live)? {
        violations.push(
            Violation::error("spanner_voice", format!("{} crosses logical voices", id)).at_spanner(id),
        );
    }
    for pair in live.windows(2) {
        if tree.score_order(pair[0], pair[1])? != Ordering::Less {
            violations.push(
                Violation::error(
                    "spanner_order",
                    format!("{} lists {} before {}", id, pair[0], pair[1]),
                )
                .at_spanner(id),
            );
        }
    }
    Ok(violations)
}

/// Fail with `MalformedTree` on the first error-level violation
pub fn assert_wellformed(tree: &ScoreTree, root: ComponentId) -> ScoreResult<()> {
    let violations = check_wellformedness(tree, root)?;
    match violations.into_iter().find(|v| v.severity == super::Severity::Error) {
        Some(violation) => Err(ScoreError::MalformedTree(format!(
            "{}: {}",
            violation.kind, violation.message
        ))),
        None => Ok(()),
    }
}
