use std::path::Path;

use crate::core::downloader::Downloader;
use crate::core::version::VersionManifest;

/// Everything a loader resolver needs to produce a download plan.
pub struct ResolveContext<'a> {
    pub minecraft_version: &'a str,
    pub loader_version: &'a str,
    pub instance_dir: &'a Path,
    pub libs_dir: &'a Path,
    /// Scratch space for fetched installer jars, shared across instances.
    pub cache_dir: &'a Path,
    pub manifest: &'a VersionManifest,
    pub downloader: &'a Downloader,
    pub http_client: &'a reqwest::Client,
}
