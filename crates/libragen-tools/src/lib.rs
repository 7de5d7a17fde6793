//! # libragen-tools
//!
//! The four tool operations an AI host (MCP server or CLI adapter) wires
//! up: `list`, `search`, `uninstall`, and `update`. Each is a typed async
//! function over the manager, client, and model traits; results are
//! serde-serializable so transports can pass them through unchanged.
//!
//! Exit-code contract for CLI adapters: success is 0; every [`ToolError`]
//! maps to exit code 1 with its `Display` message on the error stream.

mod error;
mod tools;

pub use error::ToolError;
pub use tools::{
    PackSearchHit, PackSummary, SearchParams, UpdateParams, UpdateReport, list_packs,
    search_packs, uninstall_pack, update_packs,
};
