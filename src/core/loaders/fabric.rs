use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::context::ResolveContext;
use super::profile::{LoaderProfile, LoaderResolver};
use crate::core::downloader::DownloadEntry;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::{MavenArtifact, FABRIC_MAVEN};

pub const FABRIC_META_BASE: &str = "https://meta.fabricmc.net/v2";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricProfile {
    pub main_class: String,
    #[serde(default)]
    pub libraries: Vec<FabricLibrary>,
    pub arguments: Option<FabricArguments>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FabricLibrary {
    pub name: String,
    pub url: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FabricArguments {
    #[serde(default)]
    pub jvm: Vec<String>,
    #[serde(default)]
    pub game: Vec<String>,
}

pub struct FabricResolver;

#[async_trait]
impl LoaderResolver for FabricResolver {
    async fn resolve(&self, ctx: ResolveContext<'_>) -> LauncherResult<LoaderProfile> {
        info!(
            "Resolving Fabric {} for MC {}",
            ctx.loader_version, ctx.minecraft_version
        );

        let url = format!(
            "{}/versions/loader/{}/{}/profile/json",
            FABRIC_META_BASE, ctx.minecraft_version, ctx.loader_version
        );

        let resp = ctx.http_client.get(&url).send().await?;
        if resp.status().as_u16() == 404 {
            return Err(LauncherError::Resolution(format!(
                "Fabric {} has no build for Minecraft {}",
                ctx.loader_version, ctx.minecraft_version
            )));
        }
        if !resp.status().is_success() {
            return Err(LauncherError::LoaderApi(format!(
                "Fabric meta returned {}",
                resp.status()
            )));
        }

        let fabric: FabricProfile = resp.json().await?;
        profile_from_maven_libraries(
            fabric.main_class,
            &fabric.libraries,
            fabric.arguments,
            ctx.libs_dir,
            FABRIC_MAVEN,
        )
    }
}

/// Shared between Fabric and Quilt: both publish profiles whose libraries
/// are bare maven coordinates plus a repository base URL.
pub(super) fn profile_from_maven_libraries(
    main_class: String,
    libraries: &[FabricLibrary],
    arguments: Option<FabricArguments>,
    libs_dir: &std::path::Path,
    default_repo: &str,
) -> LauncherResult<LoaderProfile> {
    let mut profile = LoaderProfile {
        main_class: Some(main_class),
        ..Default::default()
    };

    for lib in libraries {
        let artifact = MavenArtifact::parse(&lib.name)?;
        let repo = lib.url.as_deref().unwrap_or(default_repo);
        profile.libraries.push(lib.name.clone());
        profile.files.push(DownloadEntry {
            url: artifact.url(repo),
            dest: libs_dir.join(artifact.local_path()),
            sha1: lib.sha1.clone(),
            size: None,
        });
    }

    if let Some(args) = arguments {
        profile.extra_jvm_args = args.jvm;
        profile.extra_game_args = args.game;
    }

    Ok(profile)
}
