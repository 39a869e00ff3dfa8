//! Text input
//!
//! Currently a single front end: LilyPond note entry.

pub mod note_entry;

pub use note_entry::{parse_container, parse_context};
