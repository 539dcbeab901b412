#![cfg(unix)]

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use sha1::{Digest, Sha1};
use tokio_util::sync::CancellationToken;
use tracing::Level;

use interface_installer::core::downloader::ArtifactDownloader;
use interface_installer::core::error::{LauncherError, LauncherResult};
use interface_installer::core::instance::Instance;
use interface_installer::core::java::{JdkProvisioner, JdkRequest};
use interface_installer::core::loaders::install_forge_like;
use interface_installer::core::state::{AppContext, LauncherSettings, ProcessCancelPolicy};
use interface_installer::core::task::{InstallOutcome, NoopProgress, ProgressListener};

const BASE: &str = "https://test.invalid";
const FORGE_ID: &str = "1.20.1-forge-47.2.0";

fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        zip.start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(body).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Serves fixed bytes per URL, honouring the expected hash.
#[derive(Default)]
struct FakeDownloader {
    files: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

#[async_trait]
impl ArtifactDownloader for FakeDownloader {
    async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
    ) -> LauncherResult<()> {
        self.requests.lock().unwrap().push(url.to_string());
        let body = self
            .files
            .get(url)
            .ok_or_else(|| LauncherError::DownloadFailed {
                url: url.to_string(),
                status: 404,
            })?;
        if let Some(expected) = sha1_expected {
            assert_eq!(sha1_hex(body), expected, "fixture hash for {url}");
        }
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(dest, body).unwrap();
        Ok(())
    }
}

/// Hands out a runtime whose `bin/java` is a shell script.
struct FakeJdk {
    root: PathBuf,
    requests: Mutex<Vec<JdkRequest>>,
}

#[async_trait]
impl JdkProvisioner for FakeJdk {
    async fn provision_jdk(
        &self,
        request: &JdkRequest,
        _progress: &dyn ProgressListener,
    ) -> LauncherResult<PathBuf> {
        self.requests.lock().unwrap().push(*request);
        Ok(self.root.clone())
    }
}

/// Cancels the token when a progress message starts with `prefix`.
struct CancelOn {
    token: CancellationToken,
    prefix: &'static str,
}

impl ProgressListener for CancelOn {
    fn on_progress(&self, message: &str) {
        if message.starts_with(self.prefix) {
            self.token.cancel();
        }
    }

    fn on_log(&self, _level: Level, _message: &str) {}
}

struct Fixture {
    _dir: tempfile::TempDir,
    data_dir: PathBuf,
    instance_dir: PathBuf,
    installer: PathBuf,
    downloader: Arc<FakeDownloader>,
    jdk: Arc<FakeJdk>,
    cancel_policy: ProcessCancelPolicy,
}

impl Fixture {
    fn new(processors: Value) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let instance_dir = dir.path().join("instance");
        std::fs::create_dir_all(&data_dir).unwrap();

        // Fake JDK: logs its arguments, then handles --out, --fail and --sleep.
        let jdk_root = dir.path().join("jdk");
        std::fs::create_dir_all(jdk_root.join("bin")).unwrap();
        let log = data_dir.join("invocations.log");
        let script = format!(
            "#!/bin/sh\n\
             echo \"$@\" >> '{}'\n\
             shift 4\n\
             while [ $# -gt 0 ]; do\n\
               case \"$1\" in\n\
                 --out) mkdir -p \"$(dirname \"$2\")\"; printf '%s' \"$3\" > \"$2\"; shift 3 ;;\n\
                 --fail) exit \"$2\" ;;\n\
                 --sleep) sleep \"$2\"; shift 2 ;;\n\
                 *) shift ;;\n\
               esac\n\
             done\n",
            log.display()
        );
        let java = jdk_root.join("bin").join("java");
        std::fs::write(&java, script).unwrap();
        std::fs::set_permissions(&java, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::write(jdk_root.join("bin").join("javac"), "").unwrap();

        let processor_jar = zip_bytes(&[(
            "META-INF/MANIFEST.MF",
            b"Manifest-Version: 1.0\nMain-Class: test.Main\n",
        )]);
        let forge_json = json!({
            "id": FORGE_ID,
            "inheritsFrom": "1.20.1",
            "mainClass": "cpw.mods.bootstraplauncher.BootstrapLauncher",
            "libraries": [{
                "name": "net.test:proc:1.0",
                "downloads": {"artifact": {
                    "path": "net/test/proc/1.0/proc-1.0.jar",
                    "url": "",
                    "sha1": sha1_hex(&processor_jar),
                    "size": processor_jar.len()
                }}
            }]
        })
        .to_string();
        let profile = json!({
            "spec": 1,
            "version": FORGE_ID,
            "minecraft": "1.20.1",
            "json": "/version.json",
            "data": {
                "BINPATCH": {"client": "/data/client.lzma", "server": "/data/server.lzma"},
                "MAPPINGS": {"client": "[net.test:mappings:1.20.1@txt]", "server": ""},
                "MARKER": {"client": "'literal-value'", "server": ""}
            },
            "processors": processors,
            "libraries": [{"name": "net.test:dep:2.0"}]
        })
        .to_string();
        let installer_bytes = zip_bytes(&[
            ("install_profile.json", profile.as_bytes()),
            ("version.json", forge_json.as_bytes()),
            ("maven/net/test/proc/1.0/proc-1.0.jar", &processor_jar),
            ("data/client.lzma", b"binpatch"),
        ]);
        let installer = dir.path().join("forge-installer.jar");
        std::fs::write(&installer, installer_bytes).unwrap();

        let client_jar = b"vanilla client".to_vec();
        let mappings = b"client mappings".to_vec();
        let vanilla_json = json!({
            "id": "1.20.1",
            "mainClass": "net.minecraft.client.main.Main",
            "javaVersion": {"component": "java-runtime-gamma", "majorVersion": 17},
            "downloads": {
                "client": {"sha1": sha1_hex(&client_jar), "size": client_jar.len(), "url": format!("{BASE}/client.jar")},
                "client_mappings": {"sha1": sha1_hex(&mappings), "size": mappings.len(), "url": format!("{BASE}/client.txt")}
            },
            "libraries": []
        })
        .to_string();
        let index = json!({
            "latest": {"release": "1.20.1", "snapshot": "1.20.1"},
            "versions": [{
                "id": "1.20.1",
                "type": "release",
                "url": format!("{BASE}/1.20.1.json"),
                "sha1": sha1_hex(vanilla_json.as_bytes())
            }]
        })
        .to_string();

        let mut downloader = FakeDownloader::default();
        downloader.files.extend([
            (format!("{BASE}/version_manifest_v2.json"), index.into_bytes()),
            (format!("{BASE}/1.20.1.json"), vanilla_json.into_bytes()),
            (format!("{BASE}/client.jar"), client_jar),
            (format!("{BASE}/client.txt"), mappings),
            (
                format!("{BASE}/maven/net/test/dep/2.0/dep-2.0.jar"),
                b"dep".to_vec(),
            ),
        ]);

        Self {
            _dir: dir,
            data_dir,
            instance_dir,
            installer,
            downloader: Arc::new(downloader),
            jdk: Arc::new(FakeJdk {
                root: jdk_root,
                requests: Mutex::new(Vec::new()),
            }),
            cancel_policy: ProcessCancelPolicy::Complete,
        }
    }

    fn with_cancel_policy(mut self, policy: ProcessCancelPolicy) -> Self {
        self.cancel_policy = policy;
        self
    }

    fn app(&self) -> AppContext {
        let settings = LauncherSettings {
            version_manifest_url: format!("{BASE}/version_manifest_v2.json"),
            maven_repositories: vec![format!("{BASE}/maven")],
            cancel_policy: self.cancel_policy,
            ..LauncherSettings::default()
        };
        AppContext::new(self.data_dir.clone(), settings)
            .unwrap()
            .with_downloader(self.downloader.clone())
            .with_jdk_provisioner(self.jdk.clone())
    }

    fn instance(&self) -> Instance {
        Instance::new("test".into(), "1.20.1".into(), self.instance_dir.clone())
    }

    async fn install_with(
        &self,
        cancel: &CancellationToken,
        progress: &dyn ProgressListener,
    ) -> LauncherResult<InstallOutcome> {
        install_forge_like(&self.app(), &self.instance(), &self.installer, cancel, progress).await
    }

    async fn install(&self) -> LauncherResult<InstallOutcome> {
        self.install_with(&CancellationToken::new(), &NoopProgress)
            .await
    }

    fn invocations(&self) -> Vec<String> {
        std::fs::read_to_string(self.data_dir.join("invocations.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

fn processor(args: &[&str], outputs: Value, sides: &[&str]) -> Value {
    json!({
        "jar": "net.test:proc:1.0",
        "classpath": ["net.test:dep:2.0"],
        "args": args,
        "outputs": outputs,
        "sides": sides
    })
}

#[tokio::test]
async fn second_run_launches_no_processes() {
    let fixture = Fixture::new(json!([
        processor(
            &["--patch", "{BINPATCH}", "--mappings", "{MAPPINGS}", "--marker", "{MARKER}",
              "--out", "{ROOT}/out/a.txt", "alpha"],
            json!({"{ROOT}/out/a.txt": sha1_hex(b"alpha")}),
            &[],
        ),
    ]));

    assert_eq!(fixture.install().await.unwrap(), InstallOutcome::Completed);
    let first = fixture.invocations();
    assert_eq!(first.len(), 1);
    assert!(first[0].contains("data/client.lzma"));
    assert!(first[0].contains("net/test/mappings/1.20.1/mappings-1.20.1.txt"));
    assert!(first[0].contains("--marker literal-value"));
    assert!(first[0].contains("test.Main"));
    assert_eq!(
        std::fs::read_to_string(fixture.data_dir.join("out/a.txt")).unwrap(),
        "alpha"
    );

    assert_eq!(fixture.install().await.unwrap(), InstallOutcome::Completed);
    assert_eq!(fixture.invocations().len(), 1);
}

#[tokio::test]
async fn installs_descriptor_vanilla_base_and_libraries() {
    let fixture = Fixture::new(json!([]));
    assert_eq!(fixture.install().await.unwrap(), InstallOutcome::Completed);

    let descriptor = fixture
        .data_dir
        .join("versions")
        .join(FORGE_ID)
        .join(format!("{FORGE_ID}.json"));
    let raw: Value = serde_json::from_slice(&std::fs::read(descriptor).unwrap()).unwrap();
    assert_eq!(raw["id"], FORGE_ID);

    let versions = fixture.data_dir.join("versions").join("1.20.1");
    assert_eq!(
        std::fs::read(versions.join("1.20.1.jar")).unwrap(),
        b"vanilla client"
    );
    let libs = fixture.data_dir.join("libraries");
    assert!(libs.join("net/test/proc/1.0/proc-1.0.jar").is_file());
    assert_eq!(
        std::fs::read(libs.join("net/test/dep/2.0/dep-2.0.jar")).unwrap(),
        b"dep"
    );

    let requests = fixture.jdk.requests.lock().unwrap().clone();
    assert_eq!(
        requests,
        vec![JdkRequest {
            major: 17,
            require_compiler: true
        }]
    );
}

#[tokio::test]
async fn server_only_processors_are_skipped() {
    let fixture = Fixture::new(json!([
        processor(&["--out", "{ROOT}/out/a.txt", "alpha"], json!({}), &[]),
        processor(&["--out", "{ROOT}/out/b.txt", "beta"], json!({}), &["server"]),
    ]));

    fixture.install().await.unwrap();
    assert_eq!(fixture.invocations().len(), 1);
    assert!(fixture.data_dir.join("out/a.txt").exists());
    assert!(!fixture.data_dir.join("out/b.txt").exists());
}

#[tokio::test]
async fn non_zero_exit_halts_the_pipeline() {
    let fixture = Fixture::new(json!([
        processor(&["--fail", "1"], json!({}), &[]),
        processor(&["--out", "{ROOT}/out/g.txt", "gamma"], json!({}), &["client"]),
    ]));

    let err = fixture.install().await.unwrap_err();
    assert!(matches!(err, LauncherError::ProcessorExitNonZero(1)));
    assert_eq!(fixture.invocations().len(), 1);
    assert!(!fixture.data_dir.join("out/g.txt").exists());
}

#[tokio::test]
async fn cancellation_before_processors_is_not_a_failure() {
    let fixture = Fixture::new(json!([
        processor(&["--out", "{ROOT}/out/a.txt", "alpha"], json!({}), &[]),
    ]));
    let token = CancellationToken::new();
    let listener = CancelOn {
        token: token.clone(),
        prefix: "Provisioning Java",
    };

    let outcome = fixture.install_with(&token, &listener).await.unwrap();
    assert_eq!(outcome, InstallOutcome::Cancelled);
    assert!(fixture.invocations().is_empty());
    assert!(fixture
        .data_dir
        .join("libraries/net/test/dep/2.0/dep-2.0.jar")
        .exists());
}

#[tokio::test]
async fn already_cancelled_token_does_nothing() {
    let fixture = Fixture::new(json!([]));
    let token = CancellationToken::new();
    token.cancel();

    let outcome = fixture.install_with(&token, &NoopProgress).await.unwrap();
    assert_eq!(outcome, InstallOutcome::Cancelled);
    assert!(fixture.downloader.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn mojmaps_task_is_downloaded_directly() {
    let fixture = Fixture::new(json!([
        processor(
            &["--task", "DOWNLOAD_MOJMAPS", "--version", "1.20.1", "--side", "client",
              "--output", "{ROOT}/maps/client.txt"],
            json!({}),
            &[],
        ),
    ]));

    fixture.install().await.unwrap();
    assert!(fixture.invocations().is_empty());
    assert_eq!(
        std::fs::read(fixture.data_dir.join("maps/client.txt")).unwrap(),
        b"client mappings"
    );
}

#[tokio::test]
async fn mojmaps_for_another_version_runs_the_processor() {
    let fixture = Fixture::new(json!([
        processor(
            &["--task", "DOWNLOAD_MOJMAPS", "--version", "1.19.4", "--side", "client",
              "--output", "{ROOT}/maps/client.txt"],
            json!({}),
            &[],
        ),
    ]));

    fixture.install().await.unwrap();
    assert_eq!(fixture.invocations().len(), 1);
    assert!(!fixture.data_dir.join("maps/client.txt").exists());
}

#[tokio::test]
async fn missing_classpath_entry_fails_before_spawning() {
    let fixture = Fixture::new(json!([{
        "jar": "net.test:proc:1.0",
        "classpath": ["net.test:absent:1.0"],
        "args": []
    }]));

    let err = fixture.install().await.unwrap_err();
    match err {
        LauncherError::MissingClasspathEntry(path) => {
            assert!(path.ends_with("net/test/absent/1.0/absent-1.0.jar"))
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(fixture.invocations().is_empty());
}

#[tokio::test]
async fn wrong_output_fails_validation() {
    let fixture = Fixture::new(json!([
        processor(
            &["--out", "{ROOT}/out/a.txt", "wrong"],
            json!({"{ROOT}/out/a.txt": sha1_hex(b"right")}),
            &[],
        ),
    ]));

    let err = fixture.install().await.unwrap_err();
    match err {
        LauncherError::OutputValidationFailed(paths) => {
            assert_eq!(paths, vec![fixture.data_dir.join("out/a.txt")])
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!fixture.data_dir.join("out/a.txt").exists());
}

#[tokio::test]
async fn unknown_token_is_reported() {
    let fixture = Fixture::new(json!([
        processor(&["--in", "{NOT_A_KEY}"], json!({}), &[]),
    ]));

    let err = fixture.install().await.unwrap_err();
    assert!(matches!(err, LauncherError::UnknownToken { ref key, .. } if key == "NOT_A_KEY"));
    assert!(fixture.invocations().is_empty());
}

#[tokio::test]
async fn kill_policy_cancels_a_running_processor_promptly() {
    // The shell runs `sleep` as its own child, which keeps the pipes open
    // after the shell itself is killed.
    let fixture = Fixture::new(json!([
        processor(&["--sleep", "20"], json!({}), &[]),
        processor(&["--out", "{ROOT}/out/late.txt", "late"], json!({}), &[]),
    ]))
    .with_cancel_policy(ProcessCancelPolicy::Kill);
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let outcome = fixture.install_with(&token, &NoopProgress).await.unwrap();

    assert_eq!(outcome, InstallOutcome::Cancelled);
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "cancellation took {:?}",
        started.elapsed()
    );
    assert!(!fixture.data_dir.join("out/late.txt").exists());
}
