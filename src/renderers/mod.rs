//! Output formats for score trees

pub mod lilypond;
