use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::context::ResolveContext;
use super::fabric::{profile_from_maven_libraries, FabricArguments, FabricLibrary};
use super::profile::{LoaderProfile, LoaderResolver};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::QUILT_MAVEN;

pub const QUILT_META_BASE: &str = "https://meta.quiltmc.org/v3";

/// Quilt publishes the same profile shape as Fabric.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuiltProfile {
    main_class: String,
    #[serde(default)]
    libraries: Vec<FabricLibrary>,
    arguments: Option<FabricArguments>,
}

pub struct QuiltResolver;

#[async_trait]
impl LoaderResolver for QuiltResolver {
    async fn resolve(&self, ctx: ResolveContext<'_>) -> LauncherResult<LoaderProfile> {
        info!(
            "Resolving Quilt {} for MC {}",
            ctx.loader_version, ctx.minecraft_version
        );

        let url = format!(
            "{}/versions/loader/{}/{}/profile/json",
            QUILT_META_BASE, ctx.minecraft_version, ctx.loader_version
        );

        let resp = ctx.http_client.get(&url).send().await?;
        if resp.status().as_u16() == 404 {
            return Err(LauncherError::Resolution(format!(
                "Quilt {} has no build for Minecraft {}",
                ctx.loader_version, ctx.minecraft_version
            )));
        }
        if !resp.status().is_success() {
            return Err(LauncherError::LoaderApi(format!(
                "Quilt meta returned {}",
                resp.status()
            )));
        }

        let quilt: QuiltProfile = resp.json().await?;
        profile_from_maven_libraries(
            quilt.main_class,
            &quilt.libraries,
            quilt.arguments,
            ctx.libs_dir,
            QUILT_MAVEN,
        )
    }
}
