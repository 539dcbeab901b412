//! interface-installer - install Forge-style loaders into an instance

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use interface_installer::core::error::{LauncherError, LauncherResult};
use interface_installer::core::instance::{Instance, InstanceState};
use interface_installer::core::loaders::install_forge_like;
use interface_installer::core::state::{default_data_dir, AppContext, LauncherSettings};
use interface_installer::core::task::{InstallOutcome, TracingProgress};

#[derive(Parser)]
#[command(name = "interface-installer")]
#[command(author, version, about = "Install Forge-style modloaders")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a Forge-style installer jar against an instance
    Install {
        /// Instance directory (created if missing)
        #[arg(long)]
        instance_dir: PathBuf,
        /// Minecraft version of the instance
        #[arg(long)]
        minecraft: String,
        /// Launcher data directory holding libraries/ and versions/
        #[arg(long, env = "INTERFACE_DATA_DIR")]
        data_dir: Option<PathBuf>,
        /// Force a Java major version instead of the one Minecraft declares
        #[arg(long)]
        java_major: Option<u32>,
        /// Path to the installer jar
        installer: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    interface_installer::init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Install {
            instance_dir,
            minecraft,
            data_dir,
            java_major,
            installer,
        } => install(instance_dir, minecraft, data_dir, java_major, installer).await,
    };

    match result {
        Ok(InstallOutcome::Completed) => ExitCode::SUCCESS,
        Ok(InstallOutcome::Cancelled) => {
            warn!("Installation cancelled");
            ExitCode::from(130)
        }
        Err(e) => {
            error!("Installation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn install(
    instance_dir: PathBuf,
    minecraft: String,
    data_dir: Option<PathBuf>,
    java_major: Option<u32>,
    installer: PathBuf,
) -> LauncherResult<InstallOutcome> {
    let data_dir = match data_dir {
        Some(dir) => absolute(&dir)?,
        None => default_data_dir()?,
    };
    let installer = absolute(&installer)?;
    let instance_dir = absolute(&instance_dir)?;

    let settings = LauncherSettings::load(&data_dir);
    let app = AppContext::new(data_dir, settings)?;

    let mut instance = match Instance::load(&instance_dir)? {
        Some(instance) => instance,
        None => {
            let name = instance_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| minecraft.clone());
            Instance::new(name, minecraft.clone(), instance_dir)
        }
    };
    if instance.minecraft_version != minecraft {
        return Err(LauncherError::Other(format!(
            "Instance is for Minecraft {}, not {}",
            instance.minecraft_version, minecraft
        )));
    }
    if java_major.is_some() {
        instance.required_java_major = java_major;
    }
    instance.state = InstanceState::Installing;
    instance.save()?;

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, cancelling installation");
                cancel.cancel();
            }
        })
    };

    info!("Installing {:?} into {:?}", installer, instance.path);
    let result = install_forge_like(&app, &instance, &installer, &cancel, &TracingProgress).await;
    ctrl_c.abort();

    instance.state = match &result {
        Ok(InstallOutcome::Completed) => InstanceState::Ready,
        Ok(InstallOutcome::Cancelled) => InstanceState::Created,
        Err(_) => InstanceState::Error,
    };
    instance.save()?;
    result
}

fn absolute(path: &Path) -> LauncherResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| LauncherError::io(path, e))?;
    Ok(cwd.join(path))
}
