// ─── Vesta Core ───
// Instance lifecycle orchestration for the Vesta launcher backend.
//
// Architecture:
//   core/
//     instance/   — Instance model, on-disk store, layered launch options
//     install/    — Install/repair/reset state machine + per-instance gate
//     version/    — Piston manifest cache + version JSON parsing
//     loaders/    — Vanilla, Fabric, Quilt, Forge, NeoForge resolution
//     maven/      — Artifact coordinate parsing
//     downloader/ — Concurrent downloads with SHA-1 validation
//     assets/     — Asset index + object downloads
//     resources/  — Tracked mods/packs, folder sync, enable/disable
//     resolver/   — Remote version selection + update sweeps
//     process/    — Process supervisor, log capture, kill
//     notify/     — Task & notification broker with cancellation
//     state/      — Global application state + settings

pub mod assets;
pub mod downloader;
pub mod error;
pub mod events;
pub mod http;
pub mod install;
pub mod instance;
pub mod java;
pub mod loaders;
pub mod maven;
pub mod notify;
pub mod process;
pub mod resolver;
pub mod resources;
pub mod state;
pub mod version;
