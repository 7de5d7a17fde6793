//! # libragen-collections
//!
//! The collection client: a local config of collection sources, a
//! TTL-cached fetch of served collection indexes, resolution of collection
//! definition documents (including nesting) to concrete pack entries, and
//! hash-verified streaming downloads.

mod client;
mod config;
mod download;
mod error;

pub use client::{ClientOptions, CollectionClient, ResolvedCollection, ResolvedItem};
pub use config::{CollectionRef, CollectionsConfig};
pub use download::download;
pub use error::CollectionError;
