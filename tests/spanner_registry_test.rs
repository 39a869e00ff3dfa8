//! Spanner registry behavior: attach, displacement, fracture and queries

use scoretree::{
    assert_wellformed, check_wellformedness, parse_container, Component, ComponentId, Duration,
    Indicator, IndicatorKind, Pitch, ScoreError, ScoreTree, Side, SpannerFamily, SpannerKind,
    TextSpan,
};

fn run(tree: &mut ScoreTree, source: &str) -> (ComponentId, Vec<ComponentId>) {
    let root = parse_container(tree, source).unwrap();
    let leaves = tree.leaves(root).unwrap();
    (root, leaves)
}

#[test]
fn test_exclusive_family_displaces_overlap() {
    let mut tree = ScoreTree::new();
    let (root, leaves) = run(&mut tree, "c'8 d'8 e'8 f'8");
    let first = tree.attach_spanner(SpannerKind::beam(), &leaves[..2]).unwrap();
    let second = tree.attach_spanner(SpannerKind::beam(), &leaves[1..]).unwrap();

    assert!(tree.spanner(first).unwrap_err() == ScoreError::StaleSpanner(first));
    assert_eq!(tree.spanner(second).unwrap().leaves(), &leaves[1..]);
    assert!(tree
        .spanners_of_family(leaves[0], SpannerFamily::Beam)
        .unwrap()
        .is_empty());
    assert_wellformed(&tree, root).unwrap();
}

#[test]
fn test_text_spans_may_overlap() {
    let mut tree = ScoreTree::new();
    let (root, leaves) = run(&mut tree, "c'4 d'4 e'4");
    let kind = SpannerKind::TextSpan(TextSpan::default());
    let a = tree.attach_spanner(kind.clone(), &leaves[..2]).unwrap();
    let b = tree.attach_spanner(kind, &leaves[1..]).unwrap();
    assert_eq!(
        tree.spanners_of_family(leaves[1], SpannerFamily::TextSpan).unwrap(),
        vec![a, b]
    );
    assert!(check_wellformedness(&tree, root).unwrap().is_empty());
}

#[test]
fn test_attach_rejects_bad_ranges() {
    let mut tree = ScoreTree::new();
    let (_, leaves) = run(&mut tree, "c'4 d'4 e'4");

    let reversed = [leaves[1], leaves[0]];
    assert!(matches!(
        tree.attach_spanner(SpannerKind::slur(), &reversed),
        Err(ScoreError::InvalidSpannerRange(_))
    ));
    let duplicate = [leaves[0], leaves[0]];
    assert!(matches!(
        tree.attach_spanner(SpannerKind::slur(), &duplicate),
        Err(ScoreError::InvalidSpannerRange(_))
    ));
    assert!(matches!(
        tree.attach_spanner(SpannerKind::tie(), &leaves[..1]),
        Err(ScoreError::InvalidSpannerRange(_))
    ));
    assert!(matches!(
        tree.attach_spanner(SpannerKind::slur(), &[]),
        Err(ScoreError::InvalidSpannerRange(_))
    ));
    assert!(tree.spanners().next().is_none());
}

#[test]
fn test_attach_across_staves_is_non_contiguous() {
    let mut tree = ScoreTree::new();
    let (_, leaves) = run(
        &mut tree,
        "\\new Score << \\new Staff { c'4 d'4 } \\new Staff { e4 f4 } >>",
    );
    let err = tree
        .attach_spanner(SpannerKind::slur(), &[leaves[0], leaves[2]])
        .unwrap_err();
    assert!(matches!(err, ScoreError::NonContiguousComponents(_)));
    assert!(err.is_validation());
}

#[test]
fn test_attach_to_free_leaves_of_different_roots() {
    let mut tree = ScoreTree::new();
    let a = tree.create(Component::note(Pitch::new("c'").unwrap(), Duration::new(1, 4)));
    let b = tree.create(Component::note(Pitch::new("d'").unwrap(), Duration::new(1, 4)));
    assert!(tree.attach_spanner(SpannerKind::slur(), &[a, b]).is_err());
}

#[test]
fn test_grace_notes_cannot_join_spanners() {
    let mut tree = ScoreTree::new();
    let root = parse_container(&mut tree, "\\grace { b16 } c'4 d'4").unwrap();
    let main = tree.leaves(root).unwrap();
    let anchor = main[0];
    let grace = tree.leaf(anchor).unwrap().grace().unwrap();
    let grace_note = tree.children_of(grace).unwrap()[0];
    assert!(matches!(
        tree.attach_spanner(SpannerKind::slur(), &[grace_note, anchor]),
        Err(ScoreError::InvalidSpannerRange(_))
    ));
}

#[test]
fn test_fracture_spanner() {
    let mut tree = ScoreTree::new();
    let (root, leaves) = run(&mut tree, "c'8 [ d'8 e'8 f'8 ]");
    let beam = tree.spanners_of_family(leaves[0], SpannerFamily::Beam).unwrap()[0];

    assert_eq!(tree.fracture_spanner(beam, leaves[0], Side::Left).unwrap(), (beam, None));
    assert_eq!(tree.fracture_spanner(beam, leaves[3], Side::Right).unwrap(), (beam, None));

    let (left, right) = tree.fracture_spanner(beam, leaves[1], Side::Right).unwrap();
    let right = right.unwrap();
    assert_eq!(left, beam);
    assert_eq!(tree.spanner(left).unwrap().leaves(), &leaves[..2]);
    assert_eq!(tree.spanner(right).unwrap().leaves(), &leaves[2..]);
    assert_eq!(tree.index_in_spanner(right, leaves[2]).unwrap(), Some(0));
    assert!(tree.is_last_leaf(left, leaves[1]).unwrap());
    assert!(tree.is_first_leaf(right, leaves[2]).unwrap());
    assert_eq!(tree.index_in_spanner(left, leaves[3]).unwrap(), None);
    assert_wellformed(&tree, root).unwrap();

    let err = tree.fracture_spanner(left, leaves[3], Side::Left).unwrap_err();
    assert!(matches!(err, ScoreError::InvalidSpannerRange(_)));
}

#[test]
fn test_spanner_membership_edits() {
    let mut tree = ScoreTree::new();
    let (root, leaves) = run(&mut tree, "c'8 d'8 e'8 f'8");
    let slur = tree.attach_spanner(SpannerKind::slur(), &leaves[1..3]).unwrap();

    tree.spanner_append(slur, leaves[3]).unwrap();
    tree.spanner_insert(slur, 0, leaves[0]).unwrap();
    assert_eq!(tree.spanner(slur).unwrap().leaves(), leaves.as_slice());
    assert_eq!(tree.index_in_spanner(slur, leaves[3]).unwrap(), Some(3));

    tree.spanner_remove_leaf(slur, leaves[0]).unwrap();
    assert_eq!(tree.index_in_spanner(slur, leaves[1]).unwrap(), Some(0));
    assert!(matches!(
        tree.spanner_remove_leaf(slur, leaves[0]),
        Err(ScoreError::InvalidSpannerRange(_))
    ));
    assert!(matches!(
        tree.spanner_insert(slur, 3, leaves[0]),
        Err(ScoreError::InvalidSpannerRange(_))
    ));
    assert_wellformed(&tree, root).unwrap();

    for &leaf in &leaves[1..] {
        tree.spanner_remove_leaf(slur, leaf).unwrap();
    }
    assert!(matches!(tree.spanner(slur), Err(ScoreError::StaleSpanner(_))));
}

#[test]
fn test_insert_refuses_second_exclusive_membership() {
    let mut tree = ScoreTree::new();
    let (_, leaves) = run(&mut tree, "c'8 [ d'8 ] e'8 [ f'8 ]");
    let left = tree.spanners_of_family(leaves[0], SpannerFamily::Beam).unwrap()[0];
    assert!(matches!(
        tree.spanner_append(left, leaves[2]),
        Err(ScoreError::InvalidSpannerRange(_))
    ));
}

#[test]
fn test_dominant_spanners() {
    let mut tree = ScoreTree::new();
    let (_, leaves) = run(&mut tree, "c'8 ( [ d'8 e'8 ] f'8 )");
    let slur = tree.spanners_of_family(leaves[0], SpannerFamily::Slur).unwrap()[0];
    let beam = tree.spanners_of_family(leaves[0], SpannerFamily::Beam).unwrap()[0];

    let mut dominant = tree.dominant_spanners(leaves[1], leaves[2]).unwrap();
    dominant.sort();
    let mut expected = vec![(slur, 2), (beam, 2)];
    expected.sort();
    assert_eq!(dominant, expected);

    assert_eq!(tree.dominant_spanners(leaves[2], leaves[3]).unwrap(), vec![(slur, 3)]);
    assert!(matches!(
        tree.dominant_spanners(leaves[0], leaves[2]),
        Err(ScoreError::NonContiguousComponents(_))
    ));
}

#[test]
fn test_dominant_spanners_across_staves() {
    let mut tree = ScoreTree::new();
    let (_, leaves) = run(
        &mut tree,
        "\\new Score << \\new Staff { c'4 ( d'4 ) } \\new Staff { e4 f4 } >>",
    );
    assert!(matches!(
        tree.dominant_spanners(leaves[1], leaves[2]),
        Err(ScoreError::NonContiguousComponents(_))
    ));
}

#[test]
fn test_detach_spanners_by_family() {
    let mut tree = ScoreTree::new();
    let (root, leaves) = run(&mut tree, "c'8 ( [ d'8 ] e'8 [ f'8 ] )");
    let removed = tree.detach_spanners(SpannerFamily::Beam, root).unwrap();
    assert_eq!(removed.len(), 2);
    assert_eq!(tree.spanners().count(), 1);
    assert_eq!(tree.spanners_of(leaves[3]).unwrap().len(), 1);
}

#[test]
fn test_indicator_queries() {
    let mut tree = ScoreTree::new();
    let (root, leaves) = run(&mut tree, "\\clef \"treble\" c'4 d'4 -\\accent -\\staccato e'4");

    assert_eq!(
        tree.indicator(leaves[0], IndicatorKind::Clef).unwrap(),
        &Indicator::clef("treble")
    );
    assert!(matches!(
        tree.indicator(leaves[0], IndicatorKind::Dynamic),
        Err(ScoreError::MissingIndicator { .. })
    ));
    assert!(matches!(
        tree.indicator(leaves[1], IndicatorKind::Articulation),
        Err(ScoreError::ExtraIndicator { count: 2, .. })
    ));
    assert_eq!(tree.indicators_of(leaves[1], IndicatorKind::Articulation).unwrap().len(), 2);

    assert_eq!(
        tree.effective_indicator(leaves[2], IndicatorKind::Clef).unwrap(),
        Some(&Indicator::clef("treble"))
    );
    assert_eq!(tree.effective_indicator(leaves[2], IndicatorKind::TimeSignature).unwrap(), None);

    tree.attach_indicator(root, Indicator::clef("bass")).unwrap();
    tree.detach_indicators(leaves[0], IndicatorKind::Clef).unwrap();
    assert_eq!(
        tree.effective_indicator(leaves[2], IndicatorKind::Clef).unwrap(),
        Some(&Indicator::clef("bass"))
    );
}
