// ─── InterfaceOficial Installer Core ───
// Forge-style modloader installation backend.
//
// Architecture:
//   core/
//     instance/   Instance model consumed by the installer
//     version/    Mojang manifest + version JSON + OS rules
//     maven/      Coordinates, library resolution, legacy FML libraries
//     downloader/ SHA-1 validated downloads
//     loaders/    Vanilla base + Forge-style installer pipeline
//     java/       Local JDK discovery
//     state/      Settings + explicit application context

pub mod downloader;
pub mod error;
pub mod http;
pub mod instance;
pub mod java;
pub mod loaders;
pub mod maven;
pub mod state;
pub mod task;
pub mod version;
