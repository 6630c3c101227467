use std::path::PathBuf;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::Instance;

use super::model::InstalledResource;

/// Per-instance tracked-resource rows, persisted as `resources.json` inside
/// the instance directory (so uninstalling the instance cascades for free).
pub struct ResourceStore {
    path: PathBuf,
}

impl ResourceStore {
    pub fn for_instance(instance: &Instance) -> Self {
        Self {
            path: instance.resources_path(),
        }
    }

    pub async fn load(&self) -> LauncherResult<Vec<InstalledResource>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(LauncherError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub async fn save(&self, resources: &[InstalledResource]) -> LauncherResult<()> {
        let json = serde_json::to_string_pretty(resources)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|source| LauncherError::Io {
                path: self.path.clone(),
                source,
            })
    }
}
