use serde::{Deserialize, Serialize};

use crate::core::resolver::ReleaseChannel;

/// Folder-backed resource categories tracked per instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Mod,
    ResourcePack,
    ShaderPack,
    DataPack,
}

impl ResourceType {
    pub const ALL: [ResourceType; 4] = [
        ResourceType::Mod,
        ResourceType::ResourcePack,
        ResourceType::ShaderPack,
        ResourceType::DataPack,
    ];

    /// Directory under the instance root holding this resource type.
    pub fn folder(&self) -> &'static str {
        match self {
            ResourceType::Mod => "mods",
            ResourceType::ResourcePack => "resourcepacks",
            ResourceType::ShaderPack => "shaderpacks",
            ResourceType::DataPack => "datapacks",
        }
    }
}

/// Where a resource came from. Files dropped in by hand are `Manual`;
/// files we can no longer attribute are `Unknown`. Neither participates in
/// update checks or deep links.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Modrinth,
    Curseforge,
    Manual,
    Unknown,
}

impl Platform {
    pub fn is_remote(&self) -> bool {
        matches!(self, Platform::Modrinth | Platform::Curseforge)
    }
}

/// A single tracked mod / resource pack / shader / datapack.
///
/// `local_path` is relative to the instance root and unique per instance;
/// it always names the *enabled* form of the file (no `.disabled` suffix).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledResource {
    pub id: i64,
    pub instance_id: i64,
    pub display_name: String,
    pub resource_type: ResourceType,
    pub local_path: String,
    pub enabled: bool,
    pub version: String,
    pub platform: Platform,
    pub remote_id: Option<String>,
    pub remote_version_id: Option<String>,
    pub release_channel: ReleaseChannel,
    pub file_size: u64,
    pub file_mtime: i64,
}
