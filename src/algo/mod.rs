//! Algorithm implementations.
//!
//! - `diff`: recursive structural comparison producing a change set
//! - `patch`: applying a change set to a live value
//! - `multiset`: order-insensitive sequence alignment
//! - `hash`: stable content fingerprints

mod diff;
mod hash;
mod multiset;
mod patch;

pub use diff::{diff, diff_values, diff_with_options};
pub use hash::{fingerprint, StableHasher};
pub use multiset::{align, Alignment};
pub use patch::{patch, patch_with_options, PatchEntry, PatchLog, PatchStatus, Step};
