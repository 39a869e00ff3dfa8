//! LilyPond export
//!
//! Rendering happens in two passes per component: contributors fill a
//! `FormatBundle`, then the renderer emits the bundle's slots in a fixed
//! order around the component's children.

pub mod bundle;
pub mod contributions;
pub mod document;
pub mod format;

pub use bundle::{Contribution, FormatBundle, Slot, Token};
pub use contributions::{priority, ContributesFormat, FormatSite};
pub use document::{
    lilypond_file, render_template, write_lilypond_file, FileOptions, FileTemplate,
    TemplateContext, TemplateContextBuilder,
};
pub use format::{build_bundle, format, leaf_body, render};
