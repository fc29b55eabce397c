//! Operations derived from merge.
//!
//! This module provides:
//! - [`diff`]: the patch that turns one value into another
//! - [`intersect`]: the structure two values share, with `"$required"` holes
//! - [`required`]: the `"$required"` skeleton of a value
//!
//! They are dual to [`merge`](crate::merge::merge): `merge(a, diff(a, b)) == b`,
//! and merging a layer onto an intersection fills its required holes.

mod diff;
mod intersect;
mod required;

pub use diff::{diff, diff_document};
pub use intersect::{intersect, intersect_all};
pub use required::required;
