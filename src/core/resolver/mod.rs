mod model;
mod platform;
mod updates;

pub use model::{id_str, pick_best, ReleaseChannel, ResourceVersion, VersionFile};
pub use platform::fetch_versions;
pub use updates::{apply_update, check_updates, ResourceUpdate};
