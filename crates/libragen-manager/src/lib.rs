//! # libragen-manager
//!
//! Management of installed packs across ordered pack roots: format
//! detection, atomic installs (temp file + fsync + rename), uninstall,
//! listing with leftmost-root priority, integrity verification, collection
//! archive extraction, and update planning against collection indexes.

mod archive;
mod detect;
mod error;
mod manager;
mod updates;

pub use archive::{ARCHIVE_EXTENSIONS, extract_collection_archive};
pub use detect::{SourceKind, detect_kind};
pub use error::ManagerError;
pub use manager::{
    CollectionInstallReport, CollectionPreview, InstallOptions, InstallOutcome, ItemFailure,
    PackManager, PackRoot,
};
pub use updates::{UpdateCandidate, find_updates, perform_update};
