//! Symbolic music score trees
//!
//! A `ScoreTree` holds notes, rests and chords in nested containers
//! (voices, staves, tuplets, ...) together with spanners such as beams,
//! slurs and ties that cover runs of leaves. Edit operations keep the
//! parent/child links and spanner membership consistent, and the LilyPond
//! renderer turns any subtree into deterministic source text.
//!
//! ```rust,ignore
//! let mut tree = ScoreTree::new();
//! let staff = parse_context(&mut tree, Component::staff(None), "c'8 [ d'8 e'8 ]")?;
//! let leaves = tree.leaves(staff)?;
//! tree.split_leaf(leaves[1], &[Duration::new(1, 32)], &SplitOptions::default())?;
//! println!("{}", format(&tree, staff)?);
//! ```

pub mod diagnostics;
pub mod error;
pub mod models;
pub mod parse;
pub mod renderers;
pub mod settings;
pub mod structure;

// Re-export commonly used types
pub use diagnostics::{assert_wellformed, check_wellformedness, Diagnostics, Violation};
pub use error::{ScoreError, ScoreResult};
pub use models::*;
pub use parse::{parse_container, parse_context};
pub use renderers::lilypond::{
    format, lilypond_file, render, write_lilypond_file, FileOptions, FileTemplate,
};
pub use settings::{RenderSettings, SplitOptions};
pub use structure::{EditReceipt, EditTransaction, ScoreTree, SplitResult, Timespan};
