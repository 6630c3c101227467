use async_trait::async_trait;

use crate::core::downloader::DownloadEntry;
use crate::core::error::LauncherResult;
use crate::core::instance::LoaderType;

use super::{
    context::ResolveContext, fabric::FabricResolver, forge::ForgeResolver,
    neoforge::NeoForgeResolver, quilt::QuiltResolver, vanilla::VanillaResolver,
};

/// Unified resolution result: everything the install machine needs to know
/// about one loader layer, as a plan rather than side effects.
#[derive(Debug, Default)]
pub struct LoaderProfile {
    pub main_class: Option<String>,
    /// Files this layer requires on disk (client jar, libraries).
    pub files: Vec<DownloadEntry>,
    /// Classpath coordinates recorded on the instance.
    pub libraries: Vec<String>,
    pub extra_jvm_args: Vec<String>,
    pub extra_game_args: Vec<String>,
    pub asset_index_id: Option<String>,
    pub asset_index_url: Option<String>,
    pub java_major: Option<u32>,
}

impl LoaderProfile {
    /// Overlay a loader profile on top of the vanilla base.
    pub fn merge(&mut self, other: LoaderProfile) {
        if other.main_class.is_some() {
            self.main_class = other.main_class;
        }
        if other.asset_index_id.is_some() {
            self.asset_index_id = other.asset_index_id;
            self.asset_index_url = other.asset_index_url;
        }
        if other.java_major.is_some() {
            self.java_major = other.java_major;
        }
        self.files.extend(other.files);
        self.libraries.extend(other.libraries);
        self.extra_jvm_args.extend(other.extra_jvm_args);
        self.extra_game_args.extend(other.extra_game_args);
    }
}

#[async_trait]
pub trait LoaderResolver: Send + Sync {
    async fn resolve(&self, ctx: ResolveContext<'_>) -> LauncherResult<LoaderProfile>;
}

/// Dispatcher without `Box<dyn>`.
pub enum Resolver {
    Vanilla(VanillaResolver),
    Fabric(FabricResolver),
    Quilt(QuiltResolver),
    Forge(ForgeResolver),
    NeoForge(NeoForgeResolver),
}

impl Resolver {
    pub fn new(loader: &LoaderType) -> Self {
        match loader {
            LoaderType::Vanilla => Self::Vanilla(VanillaResolver),
            LoaderType::Fabric => Self::Fabric(FabricResolver),
            LoaderType::Quilt => Self::Quilt(QuiltResolver),
            LoaderType::Forge => Self::Forge(ForgeResolver),
            LoaderType::NeoForge => Self::NeoForge(NeoForgeResolver),
        }
    }

    pub async fn resolve(&self, ctx: ResolveContext<'_>) -> LauncherResult<LoaderProfile> {
        match self {
            Resolver::Vanilla(r) => r.resolve(ctx).await,
            Resolver::Fabric(r) => r.resolve(ctx).await,
            Resolver::Quilt(r) => r.resolve(ctx).await,
            Resolver::Forge(r) => r.resolve(ctx).await,
            Resolver::NeoForge(r) => r.resolve(ctx).await,
        }
    }
}
