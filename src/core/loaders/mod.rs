pub mod context;
pub mod forge;
pub mod vanilla;

pub use context::InstallContext;
pub use forge::install_forge_like;
