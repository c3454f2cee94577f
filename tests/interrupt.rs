#![cfg(unix)]
// The test binary re-runs itself so that one process can be interrupted while it holds
// a materialized directory.
use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use specpath::{fs::RealFs, SpecDirError};

const HOLDER_ROOT: &str = "SPECPATH_INTERRUPT_ROOT";

fn wait_for(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(30);
    while !path.exists() {
        assert!(Instant::now() < deadline, "{} never appeared", path.display());
        thread::sleep(Duration::from_millis(20));
    }
}

#[test]
#[ignore = "run as a child process by interrupt_removes_materialized_directory"]
fn hold_materialized_directory() {
    let Some(root) = std::env::var_os(HOLDER_ROOT).map(PathBuf::from) else {
        return;
    };

    specpath::materialize::install_interrupt_cleanup();
    let dir = specpath::from_archive_text(
        "<===> input.scss\na {b: c}\n<===> output.css\na {\n  b: c;\n}\n",
        root.join("case"),
        Arc::new(RealFs::default()),
    )
    .unwrap();

    dir.with_real_files(|| -> Result<(), SpecDirError> {
        fs::write(root.join("ready"), "").unwrap();
        thread::sleep(Duration::from_secs(60));
        Ok(())
    })
    .unwrap();
}

#[test]
fn interrupt_removes_materialized_directory() {
    let root = tempfile::tempdir().unwrap();
    let case = root.path().join("case");

    let mut holder = Command::new(std::env::current_exe().unwrap())
        .args(["hold_materialized_directory", "--exact", "--ignored"])
        .env(HOLDER_ROOT, root.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    wait_for(&root.path().join("ready"));
    assert!(case.join("input.scss").is_file());
    assert!(!case.join("output.css").exists());

    let sent = Command::new("kill")
        .args(["-INT", &holder.id().to_string()])
        .status()
        .unwrap();
    assert!(sent.success());

    let status = holder.wait().unwrap();

    assert_eq!(status.code(), Some(130));
    assert!(!case.exists());
}
