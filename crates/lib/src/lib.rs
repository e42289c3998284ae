//! condabundle-lib: building conda installers from a recipe.
//!
//! This crate holds the whole build pipeline behind the `conda-bundle` CLI:
//! - [`recipe`]: loading `construct.yaml` with platform selectors
//! - [`packages`]: solving, downloading and describing the package set
//! - [`template`]: filling the embedded installer templates
//! - [`installer`]: installer types and their packaging backends
//! - [`pipeline`]: the end-to-end build

pub mod clean;
pub mod consts;
pub mod info;
pub mod installer;
pub mod packages;
pub mod pipeline;
pub mod platform;
pub mod process;
pub mod recipe;
pub mod selector;
pub mod selftest;
pub mod template;
pub mod util;
