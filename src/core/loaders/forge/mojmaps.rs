// ─── DOWNLOAD_MOJMAPS bypass ───
// installertools fetches official mappings with its own HTTP client, which
// ignores the launcher's proxy. When the request can be satisfied from the
// vanilla descriptor we download it ourselves instead.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::core::downloader::ArtifactDownloader;
use crate::core::error::LauncherResult;
use crate::core::version::VersionManifest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MojmapsRequest {
    pub version: String,
    pub side: String,
    pub output: PathBuf,
}

/// `true` when `args` is `--task DOWNLOAD_MOJMAPS ...`.
pub fn is_mojmaps_task(args: &[String]) -> bool {
    args.len() > 2 && args[0] == "--task" && args[1] == "DOWNLOAD_MOJMAPS"
}

/// Parse the options following the task name.
///
/// Accepts `--name value` and `--name=value`. Unknown or repeated options and
/// missing values yield `None`; positional arguments are ignored.
pub fn parse_mojmaps_args(args: &[String]) -> Option<MojmapsRequest> {
    let mut version = None;
    let mut side = None;
    let mut output = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let Some(option) = arg.strip_prefix("--") else {
            continue;
        };
        let (name, value) = match option.split_once('=') {
            Some((name, value)) => (name, value.to_string()),
            None => (option, iter.next()?.clone()),
        };
        let slot = match name {
            "version" => &mut version,
            "side" => &mut side,
            "output" => &mut output,
            _ => return None,
        };
        if slot.replace(value).is_some() {
            return None;
        }
    }

    Some(MojmapsRequest {
        version: version?,
        side: side?,
        output: PathBuf::from(output?),
    })
}

/// Try to satisfy a mojmaps processor directly. `Ok(false)` means the caller
/// must run the processor normally.
pub async fn try_bypass(
    args: &[String],
    vanilla: &VersionManifest,
    downloader: &dyn ArtifactDownloader,
) -> LauncherResult<bool> {
    if !is_mojmaps_task(args) {
        return Ok(false);
    }

    let Some(request) = parse_mojmaps_args(&args[2..]) else {
        warn!(
            "Failed to parse DOWNLOAD_MOJMAPS args, falling back to the processor. Args: {:?}",
            args
        );
        return Ok(false);
    };

    if request.version != vanilla.id {
        warn!(
            "DOWNLOAD_MOJMAPS targets {} but the vanilla version is {}, falling back",
            request.version, vanilla.id
        );
        return Ok(false);
    }

    let name = format!("{}_mappings", request.side);
    let Some(download) = vanilla.download(&name) else {
        warn!("No {} download, falling back to the processor", name);
        return Ok(false);
    };

    info!("Downloading {} to {:?}", name, request.output);
    downloader
        .download_file(&download.url, &request.output, Some(&download.sha1))
        .await?;
    Ok(true)
}
