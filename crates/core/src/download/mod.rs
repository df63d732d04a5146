//! Download model and the persistent store seam.

mod store;
mod types;

pub use store::{DownloadError, DownloadStore};
pub use types::Download;
