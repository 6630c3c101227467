use async_trait::async_trait;
use tracing::info;

use super::context::ResolveContext;
use super::forge::{fetch_installer_version_json, profile_from_installer_json};
use super::profile::{LoaderProfile, LoaderResolver};
use crate::core::error::LauncherResult;
use crate::core::maven::NEOFORGE_MAVEN;

/// NeoForge ships the same installer-jar layout as Forge, under its own
/// maven coordinates.
pub struct NeoForgeResolver;

#[async_trait]
impl LoaderResolver for NeoForgeResolver {
    async fn resolve(&self, ctx: ResolveContext<'_>) -> LauncherResult<LoaderProfile> {
        info!(
            "Resolving NeoForge {} for MC {}",
            ctx.loader_version, ctx.minecraft_version
        );

        let installer_name = format!("neoforge-{}-installer.jar", ctx.loader_version);
        let installer_url = format!(
            "{}/net/neoforged/neoforge/{}/{}",
            NEOFORGE_MAVEN, ctx.loader_version, installer_name
        );

        let version_json = fetch_installer_version_json(
            ctx.downloader,
            ctx.cache_dir,
            &installer_name,
            &installer_url,
        )
        .await?;

        profile_from_installer_json(version_json, ctx.libs_dir, NEOFORGE_MAVEN)
    }
}
