mod artifact;
pub mod legacy;
mod resolver;

pub use artifact::{posix_to_path, MavenArtifact};
pub use resolver::LibraryResolver;

/// Well-known Maven repositories used by the Minecraft ecosystem.
pub const MOJANG_LIBRARIES: &str = "https://libraries.minecraft.net";
pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2";
pub const FORGE_MAVEN: &str = "https://maven.minecraftforge.net";
