//! Splitting and fusing leaves

use scoretree::{
    assert_wellformed, format, parse_container, Duration, ScoreError, ScoreTree, SpannerFamily,
    SplitOptions,
};

fn lines(lines: &[&str]) -> String {
    lines.join("\n")
}

fn eighths(tree: &mut ScoreTree) -> scoretree::ComponentId {
    parse_container(tree, "c'8 [ d'8 e'8 f'8 ]").unwrap()
}

#[test]
fn test_split_extends_beam_over_pieces() {
    let mut tree = ScoreTree::new();
    let root = eighths(&mut tree);
    let original = tree.leaves(root).unwrap();
    let beam = tree.spanners_of_family(original[0], SpannerFamily::Beam).unwrap()[0];

    let result = tree
        .split_leaf(original[1], &[Duration::new(1, 16)], &SplitOptions::default())
        .unwrap();
    assert_eq!(result.shards.len(), 2);

    let leaves = tree.leaves(root).unwrap();
    assert_eq!(leaves.len(), 5);
    assert_eq!(tree.spanner(beam).unwrap().leaves(), leaves.as_slice());
    assert_eq!(
        format(&tree, root).unwrap(),
        lines(&[
            "{", "    c'8", "    [", "    d'16", "    ~", "    d'16", "    e'8", "    f'8", "    ]", "}",
        ])
    );
    assert_wellformed(&tree, root).unwrap();
}

#[test]
fn test_split_with_fracture() {
    let mut tree = ScoreTree::new();
    let root = eighths(&mut tree);
    let original = tree.leaves(root).unwrap();

    let result = tree
        .split_leaf(
            original[1],
            &[Duration::new(1, 16)],
            &SplitOptions::default().fracturing(),
        )
        .unwrap();
    let before = result.before().to_vec();
    let after = result.after();

    let left = tree.spanners_of_family(original[0], SpannerFamily::Beam).unwrap();
    let right = tree.spanners_of_family(original[3], SpannerFamily::Beam).unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(right.len(), 1);
    assert_ne!(left, right);
    assert_eq!(tree.spanner(left[0]).unwrap().leaves(), &[original[0], before[0]]);
    assert_eq!(
        tree.spanner(right[0]).unwrap().leaves(),
        &[after[0], original[2], original[3]]
    );
    assert_eq!(
        format(&tree, root).unwrap(),
        lines(&[
            "{", "    c'8", "    [", "    d'16", "    ]", "    ~", "    d'16", "    [", "    e'8",
            "    f'8", "    ]", "}",
        ])
    );
    assert_wellformed(&tree, root).unwrap();
}

#[test]
fn test_split_conserves_duration() {
    let mut tree = ScoreTree::new();
    let root = parse_container(&mut tree, "c'4").unwrap();
    let leaf = tree.leaves(root).unwrap()[0];
    let result = tree
        .split_leaf(leaf, &[Duration::new(1, 8)], &SplitOptions::default())
        .unwrap();
    let pieces: Vec<Duration> = result
        .leaves()
        .iter()
        .map(|&l| tree.duration_of(l).unwrap())
        .collect();
    assert_eq!(pieces, vec![Duration::new(1, 8), Duration::new(1, 8)]);

    let mut tree = ScoreTree::new();
    let root = parse_container(&mut tree, "c'4").unwrap();
    let leaf = tree.leaves(root).unwrap()[0];
    let result = tree
        .split_leaf(leaf, &[Duration::new(1, 16)], &SplitOptions::default())
        .unwrap();
    let leaves = result.leaves();
    assert_eq!(leaves.len(), 2);
    assert_eq!(tree.leaf(leaves[1]).unwrap().written_duration(), Duration::new(3, 16));
    assert_eq!(tree.duration_of(root).unwrap(), Duration::new(1, 4));
}

#[test]
fn test_unassignable_piece_becomes_tie_chain() {
    let mut tree = ScoreTree::new();
    let root = parse_container(&mut tree, "c'2").unwrap();
    let leaf = tree.leaves(root).unwrap()[0];
    let result = tree
        .split_leaf(leaf, &[Duration::new(5, 16)], &SplitOptions::default())
        .unwrap();
    assert_eq!(result.shards[0].len(), 2);
    assert_eq!(result.shards[1].len(), 1);
    let leaves = tree.leaves(root).unwrap();
    let tie = tree.spanners_of_family(leaves[0], SpannerFamily::Tie).unwrap();
    assert_eq!(tree.spanner(tie[0]).unwrap().leaves(), leaves.as_slice());
    assert_eq!(
        format(&tree, root).unwrap(),
        lines(&["{", "    c'4", "    ~", "    c'16", "    ~", "    c'8.", "}"])
    );
}

#[test]
fn test_tuplet_pieces_share_one_tuplet() {
    let mut tree = ScoreTree::new();
    let root = parse_container(&mut tree, "c'4").unwrap();
    let leaf = tree.leaves(root).unwrap()[0];
    tree.split_leaf(leaf, &[Duration::new(1, 12)], &SplitOptions::default())
        .unwrap();
    assert_eq!(tree.children_of(root).unwrap().len(), 1);
    assert_eq!(
        format(&tree, root).unwrap(),
        lines(&[
            "{", "    \\times 2/3", "    {", "        c'8", "        ~", "        c'4", "    }", "}",
        ])
    );
    assert_eq!(tree.duration_of(root).unwrap(), Duration::new(1, 4));
    assert_wellformed(&tree, root).unwrap();
}

#[test]
fn test_split_options() {
    let mut tree = ScoreTree::new();
    let root = parse_container(&mut tree, "c'4 r4 e'2").unwrap();
    let leaves = tree.leaves(root).unwrap();

    let notes = tree
        .split_leaf(leaves[0], &[Duration::new(1, 8)], &SplitOptions::default().untied())
        .unwrap();
    assert!(tree
        .spanners_of_family(notes.before()[0], SpannerFamily::Tie)
        .unwrap()
        .is_empty());

    let rests = tree
        .split_leaf(leaves[1], &[Duration::new(1, 8)], &SplitOptions::default())
        .unwrap();
    assert!(tree.spanners_of(rests.before()[0]).unwrap().is_empty());

    let cyclic = tree
        .split_leaf(leaves[2], &[Duration::new(1, 8)], &SplitOptions::default().cyclic())
        .unwrap();
    assert_eq!(cyclic.shards.len(), 4);
    assert_eq!(tree.leaves(root).unwrap().len(), 8);
}

#[test]
fn test_split_moves_indicators() {
    let mut tree = ScoreTree::new();
    let root = parse_container(&mut tree, "\\clef \"alto\" c'4 \\p -\\accent \\bar \"||\"").unwrap();
    let leaf = tree.leaves(root).unwrap()[0];
    let result = tree
        .split_leaf(leaf, &[Duration::new(1, 8)], &SplitOptions::default())
        .unwrap();
    let leaves = result.leaves();
    assert_eq!(tree.indicators(leaves[0]).unwrap().len(), 3);
    assert_eq!(tree.indicators(leaves[1]).unwrap().len(), 1);
    assert!(!tree.contains(leaf));
}

#[test]
fn test_split_then_fuse_renders_identically() {
    let mut tree = ScoreTree::new();
    let root = parse_container(&mut tree, "c'4 d'2 e'4 \\p").unwrap();
    let before = format(&tree, root).unwrap();
    let leaves = tree.leaves(root).unwrap();

    let result = tree
        .split_leaf(leaves[1], &[Duration::new(5, 16)], &SplitOptions::default())
        .unwrap();
    assert_ne!(format(&tree, root).unwrap(), before);
    let fused = tree.fuse_leaves(&result.leaves()).unwrap();
    assert_eq!(fused.len(), 1);
    assert_eq!(format(&tree, root).unwrap(), before);
    assert!(tree.spanners().next().is_none());
    assert_wellformed(&tree, root).unwrap();
}

#[test]
fn test_invalid_split_requests() {
    let mut tree = ScoreTree::new();
    let root = parse_container(&mut tree, "c'4").unwrap();
    let leaf = tree.leaves(root).unwrap()[0];
    assert!(tree.split_leaf(leaf, &[], &SplitOptions::default()).is_err());
    assert!(tree
        .split_leaf(leaf, &[Duration::zero()], &SplitOptions::default())
        .unwrap_err()
        .is_validation());
    assert!(tree
        .split_leaf(root, &[Duration::new(1, 8)], &SplitOptions::default())
        .is_err());
}

#[test]
fn test_split_inside_simultaneous_container_changes_nothing() {
    let mut tree = ScoreTree::new();
    let root = parse_container(&mut tree, "<< c'4 e'4 >>").unwrap();
    let leaves = tree.leaves(root).unwrap();
    let before = format(&tree, root).unwrap();

    let err = tree
        .split_leaf(leaves[0], &[Duration::new(1, 8)], &SplitOptions::default())
        .unwrap_err();
    assert!(matches!(err, ScoreError::NonContiguousComponents(_)));
    assert_eq!(format(&tree, root).unwrap(), before);
    assert_eq!(tree.leaves(root).unwrap(), leaves);
    assert_eq!(tree.duration_of(leaves[0]).unwrap(), Duration::new(1, 4));
    assert_wellformed(&tree, root).unwrap();
}
