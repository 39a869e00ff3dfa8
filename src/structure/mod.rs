//! Score tree structure
//!
//! The arena (`tree`) owns every component and spanner. The remaining
//! modules add `impl ScoreTree` blocks for one concern each:
//!
//! - `parentage`: parent/child links and ancestry queries
//! - `timespan`: cached start/stop offsets
//! - `voice`: logical voices and contiguity
//! - `spanners`: the spanner registry
//! - `operations`: graft, splice, replace, split, fuse and copy
//! - `receipt`: detach/reattach and edit transactions

pub mod operations;
pub mod parentage;
pub mod receipt;
pub mod spanners;
pub mod timespan;
pub mod tree;
pub mod voice;

pub use operations::SplitResult;
pub use parentage::Ancestors;
pub use receipt::{EditReceipt, EditTransaction, Membership};
pub use timespan::Timespan;
pub use tree::ScoreTree;
pub use voice::LogicalVoice;
