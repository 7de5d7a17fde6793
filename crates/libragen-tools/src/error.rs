//! Error type for the tool surface.

use thiserror::Error;

/// Errors surfaced to tool hosts. Never swallowed: hosts render the
/// message and map any variant to a nonzero exit code.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Manager(#[from] libragen_manager::ManagerError),

    #[error(transparent)]
    Search(#[from] libragen_search::SearchError),

    #[error(transparent)]
    Store(#[from] libragen_store::StoreError),

    #[error(transparent)]
    Collection(#[from] libragen_collections::CollectionError),

    /// Catch-all for host adapter failures.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ToolError {
    /// CLI exit code for this error: user/operational errors are 1.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        1
    }
}
