//! Durable record stores.
//!
//! Everything persisted locally goes through this module: reports (one
//! file per record) and users (one singleton document). All writes use
//! staging-then-rename publication so readers never see torn records.

pub mod error;
pub mod reports;
pub mod users;

use std::io;
use std::path::Path;

pub use error::StoreError;
pub use reports::{ReportStore, REPORT_SUFFIX};
pub use users::UserStore;

/// Write `content` to a staging file, then publish it with a rename.
/// The rename is the only step a reader can observe.
pub(crate) fn atomic_publish(path: &Path, content: &str) -> io::Result<()> {
    let staging = path.with_extension("tmp");
    std::fs::write(&staging, content)?;
    std::fs::rename(&staging, path)
}
