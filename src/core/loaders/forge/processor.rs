use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn, Level};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::loaders::context::InstallContext;
use crate::core::state::ProcessCancelPolicy;
use crate::core::task::ProgressListener;
use crate::core::version::VersionManifest;

use super::install_profile::Processor;
use super::mojmaps;
use super::outputs::{check_cached, declared_outputs};
use super::tokens::resolve_arg;

/// How long output may keep flowing after a killed processor is reaped.
/// Descendants that inherited its pipes would otherwise hold the run open.
const KILLED_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// How a processor finished without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorOutcome {
    /// Every declared output was already valid.
    Skipped,
    /// Handled in-process by the mojmaps bypass.
    Bypassed,
    /// Ran and its outputs validated.
    Validated,
}

/// Run one processor: cache check, bypass, classpath check, spawn, validate.
pub async fn run_processor(
    ctx: &InstallContext<'_>,
    processor: &Processor,
    data: &HashMap<String, String>,
    vanilla: &VersionManifest,
    java: &Path,
) -> LauncherResult<ProcessorOutcome> {
    let outputs = declared_outputs(&processor.outputs, data, ctx.libs_dir)?;
    if check_cached(&outputs).await?.valid {
        info!("Cache validated, skipping processor {}", processor.jar);
        return Ok(ProcessorOutcome::Skipped);
    }

    let args = processor
        .args
        .iter()
        .map(|arg| resolve_arg(arg, data, ctx.libs_dir))
        .collect::<LauncherResult<Vec<_>>>()?;

    if mojmaps::try_bypass(&args, vanilla, ctx.downloader).await? {
        return Ok(ProcessorOutcome::Bypassed);
    }

    let jar = processor.jar.resolve(ctx.libs_dir);
    let mut classpath = Vec::with_capacity(processor.classpath.len() + 2);
    classpath.push(jar.clone());
    classpath.extend(processor.classpath.iter().map(|a| a.resolve(ctx.libs_dir)));
    // Same classloader layout as the vendor installer.
    classpath.push(ctx.installer_path.to_path_buf());
    if let Some(missing) = classpath.iter().find(|p| !p.exists()) {
        error!("Processor classpath entry does not exist: {:?}", missing);
        return Err(LauncherError::MissingClasspathEntry(missing.clone()));
    }

    let main_class = {
        let jar = jar.clone();
        tokio::task::spawn_blocking(move || read_main_class_from_jar(&jar))
            .await
            .map_err(|e| LauncherError::Other(format!("Manifest read task failed: {e}")))??
    };
    let separator = if cfg!(windows) { ";" } else { ":" };
    let classpath = classpath
        .iter()
        .map(|p| p.to_string_lossy())
        .collect::<Vec<_>>()
        .join(separator);

    let mut cmd = Command::new(java);
    cmd.arg("-cp")
        .arg(&classpath)
        .arg(&main_class)
        .arg(&jar)
        .args(&args)
        .current_dir(ctx.root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let command_line = format_command_for_logs(cmd.as_std());
    info!("Starting processor {} with main class {}", processor.jar, main_class);
    debug!("Command (copy/paste): {}", command_line);

    let status = spawn_and_wait(cmd, &command_line, ctx).await?;
    match status.code() {
        Some(0) => {}
        code => {
            let code = code.unwrap_or(-1);
            error!(
                "Processor exited with non-zero status {}. Command: {}",
                code, command_line
            );
            return Err(LauncherError::ProcessorExitNonZero(code));
        }
    }

    let validation = check_cached(&outputs).await?;
    if !validation.failures.is_empty() {
        error!("Processor output validation errors occurred");
        return Err(LauncherError::OutputValidationFailed(validation.failures));
    }

    Ok(ProcessorOutcome::Validated)
}

/// Spawn, drain both pipes concurrently and wait for exit.
///
/// Both drains are joined before returning, except after a kill, where they
/// get [`KILLED_DRAIN_GRACE`] and are then dropped.
async fn spawn_and_wait(
    mut cmd: Command,
    command_line: &str,
    ctx: &InstallContext<'_>,
) -> LauncherResult<ExitStatus> {
    let mut child = cmd.spawn().map_err(|source| {
        error!("Failed to spawn processor: {}", command_line);
        LauncherError::ProcessSpawnFailed {
            command: command_line.to_string(),
            source,
        }
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let kill_on_cancel = ctx.settings.cancel_policy == ProcessCancelPolicy::Kill;

    let wait = async {
        if !kill_on_cancel {
            return child.wait().await.map(|status| (status, false));
        }
        tokio::select! {
            status = child.wait() => status.map(|status| (status, false)),
            _ = ctx.cancel.cancelled() => {
                warn!("Cancellation requested, killing processor");
                match child.kill().await {
                    Ok(()) => child.wait().await.map(|status| (status, true)),
                    Err(e) => Err(e),
                }
            }
        }
    };

    let drains = async {
        tokio::join!(
            drain(stdout, Level::INFO, ctx.progress),
            drain(stderr, Level::WARN, ctx.progress),
        );
    };
    tokio::pin!(wait);
    tokio::pin!(drains);

    let (waited, drained) = tokio::select! {
        waited = &mut wait => (waited, false),
        () = &mut drains => ((&mut wait).await, true),
    };
    let (status, killed) = waited.map_err(|e| LauncherError::io(ctx.root, e))?;

    if killed {
        if !drained && tokio::time::timeout(KILLED_DRAIN_GRACE, drains).await.is_err() {
            warn!("Killed processor left its output open, no longer reading it");
        }
        return Err(LauncherError::Cancelled);
    }
    if !drained {
        drains.await;
    }
    Ok(status)
}

async fn drain<R>(stream: Option<R>, level: Level, progress: &dyn ProgressListener)
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return;
    };
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if level == Level::WARN {
                    warn!(target: "processor", "{}", line);
                } else {
                    info!(target: "processor", "{}", line);
                }
                progress.on_log(level, &line);
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Stopped reading processor output: {}", e);
                break;
            }
        }
    }
}

fn read_main_class_from_jar(path: &Path) -> LauncherResult<String> {
    let bad_jar = |message: String| LauncherError::manifest(path.display().to_string(), message);

    let file = std::fs::File::open(path).map_err(|e| LauncherError::io(path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut manifest = archive
        .by_name("META-INF/MANIFEST.MF")
        .map_err(|e| bad_jar(format!("manifest not found: {e}")))?;

    let mut text = String::new();
    manifest
        .read_to_string(&mut text)
        .map_err(|e| LauncherError::io(path, e))?;

    let mut main_class: Option<String> = None;
    let mut current_key: Option<String> = None;
    for line in text.lines() {
        // Continuation lines drop exactly one leading space.
        if let Some(rest) = line.strip_prefix(' ') {
            if current_key.as_deref() == Some("Main-Class") {
                if let Some(value) = &mut main_class {
                    value.push_str(rest);
                }
            }
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            current_key = Some(key.trim().to_string());
            if key.trim() == "Main-Class" {
                main_class = Some(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
        }
    }

    main_class
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| bad_jar("Main-Class missing".into()))
}

fn format_command_for_logs(cmd: &std::process::Command) -> String {
    let program = shell_escape(&cmd.get_program().to_string_lossy());
    let args = cmd
        .get_args()
        .map(|arg| shell_escape(&arg.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ");

    if args.is_empty() {
        program
    } else {
        format!("{} {}", program, args)
    }
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}
