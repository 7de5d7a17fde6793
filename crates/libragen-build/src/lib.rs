//! # libragen-build
//!
//! The pack build pipeline: read sources → chunk → embed in batches →
//! insert into a fresh pack → write the manifest → finalize with stats and
//! a content hash. A failed or canceled build leaves no partial pack
//! behind.

mod builder;
mod error;

pub use builder::{BuildConfig, BuildReport, build_pack};
pub use error::BuildError;
