use async_trait::async_trait;
use tracing::info;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::VersionJson;

use super::context::ResolveContext;
use super::profile::{LoaderProfile, LoaderResolver};

/// Vanilla "resolver" — resolves the official Mojang version JSON into a
/// plan covering client.jar and libraries (with OS rules evaluation).
pub struct VanillaResolver;

#[async_trait]
impl LoaderResolver for VanillaResolver {
    async fn resolve(&self, ctx: ResolveContext<'_>) -> LauncherResult<LoaderProfile> {
        info!("Resolving Vanilla {}", ctx.minecraft_version);

        let entry = ctx
            .manifest
            .find_version(ctx.minecraft_version)
            .ok_or_else(|| {
                LauncherError::Resolution(format!(
                    "Minecraft version {} not found in manifest",
                    ctx.minecraft_version
                ))
            })?;

        let version_json = VersionJson::fetch(ctx.http_client, &entry.url).await?;

        let mut profile = LoaderProfile {
            main_class: Some(version_json.main_class.clone()),
            asset_index_id: version_json.asset_index.as_ref().map(|ai| ai.id.clone()),
            asset_index_url: version_json.asset_index.as_ref().map(|ai| ai.url.clone()),
            java_major: Some(version_json.required_java_major()),
            extra_jvm_args: version_json.simple_jvm_args(),
            extra_game_args: version_json.simple_game_args(),
            ..Default::default()
        };

        if let Some(client) = version_json.client_entry(ctx.instance_dir) {
            profile.files.push(client);
        }

        for (coord, entry) in version_json.library_entries(ctx.libs_dir) {
            profile.libraries.push(coord);
            profile.files.push(entry);
        }

        Ok(profile)
    }
}
