use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Supported mod loaders — strongly typed, no magic strings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoaderType {
    Vanilla,
    Forge,
    Fabric,
    NeoForge,
    Quilt,
}

impl LoaderType {
    /// API-facing identifier, matching what remote platforms declare in
    /// their version `loaders` lists.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoaderType::Vanilla => "vanilla",
            LoaderType::Forge => "forge",
            LoaderType::Fabric => "fabric",
            LoaderType::NeoForge => "neoforge",
            LoaderType::Quilt => "quilt",
        }
    }
}

impl std::fmt::Display for LoaderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Installation lifecycle state, persisted in `instance.json`.
///
/// `Failed` means the operation itself reported an error; `Interrupted`
/// means the backend died mid-operation and the outcome is unknown. The
/// two are kept distinct so startup can surface resumable work.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstallationStatus {
    /// Metadata exists, nothing requested yet.
    None,
    /// Configured, waiting for its first install.
    Pending,
    /// An install/repair/reset operation is running right now.
    Installing,
    /// All files verified in place; launchable.
    Installed,
    /// The last operation reported an error (see `last_error`).
    Failed,
    /// The backend terminated mid-operation; must be resumed.
    Interrupted,
}

/// Which installation-affecting operation last ran (or was running when the
/// backend died). Drives `resume_interrupted` dispatch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Install,
    Repair,
    HardReset,
    Update,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Install => write!(f, "install"),
            OperationKind::Repair => write!(f, "repair"),
            OperationKind::HardReset => write!(f, "hard-reset"),
            OperationKind::Update => write!(f, "update"),
        }
    }
}

/// Link back to the remote modpack an instance was created from.
/// Present iff the instance is pack-managed; mod updates are then locked to
/// pack releases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModpackLink {
    pub platform: String,
    pub remote_id: String,
    pub remote_version_id: String,
    pub icon_url: Option<String>,
}

/// Full instance representation persisted to disk as `instance.json`.
///
/// Each instance has its own folder under `instances/<slug>/` with:
/// - `minecraft/`      — game working directory (.minecraft equivalent)
/// - `mods/`           — mod JARs
/// - `resourcepacks/`, `shaderpacks/`, `datapacks/`
/// - `config/`         — mod configuration files
/// - `logs/`           — rolling process log
/// - `instance.json`   — this serialized struct
/// - `resources.json`  — tracked resource rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: i64,
    pub name: String,
    /// Filesystem-safe directory name, derived from `name` at creation.
    pub slug: String,
    pub path: PathBuf,
    pub minecraft_version: String,
    pub loader: LoaderType,
    pub loader_version: Option<String>,

    // ── Per-instance overrides (None = use global default) ──
    pub memory_min_mb: Option<u32>,
    pub memory_max_mb: Option<u32>,
    pub window_width: Option<u32>,
    pub window_height: Option<u32>,
    pub java_path: Option<PathBuf>,
    pub java_args: Option<Vec<String>>,
    pub env_vars: Option<HashMap<String, String>>,
    pub pre_launch_hook: Option<String>,
    pub post_exit_hook: Option<String>,
    pub wrapper_command: Option<String>,

    pub modpack: Option<ModpackLink>,

    // ── Lifecycle state ──
    pub installation_status: InstallationStatus,
    pub last_operation: Option<OperationKind>,
    pub last_error: Option<String>,
    pub crashed: bool,
    pub crash_details: Option<String>,

    // ── Bookkeeping ──
    pub total_playtime_minutes: i64,
    pub last_played: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // ── Install artifacts (filled by a successful install) ──
    /// Main class resolved from version JSON / loader.
    pub main_class: Option<String>,
    /// Asset index ID (e.g. "17" for 1.21.x).
    pub asset_index: Option<String>,
    /// Library coordinates saved during installation.
    pub libraries: Vec<String>,
    /// Java major version the selected game version requires.
    pub required_java_major: Option<u32>,
    /// Extra JVM arguments contributed by the loader.
    pub jvm_args: Vec<String>,
    /// Extra game arguments contributed by the loader.
    pub game_args: Vec<String>,
}

impl Instance {
    /// Create a new instance record in `Pending` state. The store assigns
    /// `id` and `path` when the instance is created on disk.
    pub fn new(
        name: String,
        minecraft_version: String,
        loader: LoaderType,
        loader_version: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            slug: slugify(&name),
            name,
            path: PathBuf::new(),
            minecraft_version,
            loader,
            loader_version,
            memory_min_mb: None,
            memory_max_mb: None,
            window_width: None,
            window_height: None,
            java_path: None,
            java_args: None,
            env_vars: None,
            pre_launch_hook: None,
            post_exit_hook: None,
            wrapper_command: None,
            modpack: None,
            installation_status: InstallationStatus::Pending,
            last_operation: None,
            last_error: None,
            crashed: false,
            crash_details: None,
            total_playtime_minutes: 0,
            last_played: None,
            created_at: now,
            updated_at: now,
            main_class: None,
            asset_index: None,
            libraries: Vec::new(),
            required_java_major: None,
            jvm_args: Vec::new(),
            game_args: Vec::new(),
        }
    }

    /// Path to the instance's `minecraft/` game working directory.
    pub fn game_dir(&self) -> PathBuf {
        self.path.join("minecraft")
    }

    /// Path to the `mods/` directory.
    pub fn mods_dir(&self) -> PathBuf {
        self.path.join("mods")
    }

    /// Path to the `config/` directory.
    pub fn config_dir(&self) -> PathBuf {
        self.path.join("config")
    }

    /// Path to the `logs/` directory (rolling process log lives here).
    pub fn logs_dir(&self) -> PathBuf {
        self.path.join("logs")
    }

    /// Path to this instance's metadata file.
    pub fn config_path(&self) -> PathBuf {
        self.path.join("instance.json")
    }

    /// Path to the tracked-resources file.
    pub fn resources_path(&self) -> PathBuf {
        self.path.join("resources.json")
    }

    /// Whether an installation-affecting operation may currently start.
    pub fn is_installed(&self) -> bool {
        self.installation_status == InstallationStatus::Installed
    }
}

const SLUG_MAX_LEN: usize = 64;

/// Derive a filesystem-safe directory name from a display name.
///
/// Lowercase, `[a-z0-9-_]` only, runs of separators collapsed to a single
/// dash, no leading/trailing dashes, capped at 64 chars, `"instance"` when
/// nothing survives.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug.truncate(SLUG_MAX_LEN);
    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        "instance".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_lowercase_and_collapsed() {
        assert_eq!(slugify("My  Cool   Pack!"), "my-cool-pack");
        assert_eq!(slugify("--Skyblock--"), "skyblock");
        assert_eq!(slugify("under_score kept"), "under_score-kept");
    }

    #[test]
    fn slug_defaults_when_empty() {
        assert_eq!(slugify(""), "instance");
        assert_eq!(slugify("!!!"), "instance");
    }

    #[test]
    fn slug_is_bounded_and_clean_at_the_edges() {
        let long = "x".repeat(200);
        let slug = slugify(&long);
        assert_eq!(slug.len(), 64);

        // Truncation must not leave a trailing dash behind.
        let tricky = format!("{}-{}", "a".repeat(63), "b".repeat(10));
        let slug = slugify(&tricky);
        assert!(!slug.ends_with('-'));
        assert!(slug.len() <= 64);
    }

    #[test]
    fn slug_is_deterministic() {
        assert_eq!(slugify("Fabric 1.20.1"), slugify("Fabric 1.20.1"));
        assert_eq!(slugify("Fabric 1.20.1"), "fabric-1-20-1");
    }

    #[test]
    fn slug_charset() {
        let slug = slugify("Weird ☃ Name — with Ünicode");
        assert!(slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'));
        assert!(!slug.starts_with('-'));
        assert!(!slug.ends_with('-'));
        assert!(!slug.contains("--"));
    }

    #[test]
    fn operation_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&OperationKind::HardReset).unwrap();
        assert_eq!(json, "\"hard-reset\"");
    }
}
