//! OSGi versions and version ranges compatible with bnd
//!
//! This crate provides strict version parsing, total ordering of versions and
//! interval-style version ranges as used by OSGi manifests and repository indexes.

mod range;
mod version;

pub use range::VersionRange;
pub use version::{Version, VersionError};
