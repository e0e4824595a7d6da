#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::{tempdir, TempDir};
use zpull_core::path::DatasetPath;
use zpull_zfs::{SystemZfs, ZfsCommand};

/// A shell script standing in for `zfs`.
///
/// Every invocation appends its argv to `invocations.log`; `$DIR` in the body
/// points at the scratch directory.
pub struct FakeZfs {
    dir: TempDir,
    binary: PathBuf,
    log: PathBuf,
}

impl FakeZfs {
    pub fn new(body: &str) -> Self {
        zpull_core::logging::init("debug");

        let dir = tempdir().unwrap();
        let binary = dir.path().join("zfs");
        let log = dir.path().join("invocations.log");
        let script = format!(
            "#!/bin/sh\nDIR='{}'\nprintf '%s\\n' \"$*\" >> \"$DIR/invocations.log\"\n{body}\n",
            dir.path().display()
        );
        write_executable(&binary, &script);
        Self { dir, binary, log }
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn invocations(&self) -> Vec<String> {
        match fs::read_to_string(&self.log) {
            Ok(contents) => contents.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn command(&self) -> ZfsCommand {
        ZfsCommand::new(&self.binary)
    }

    pub fn system(&self) -> SystemZfs {
        SystemZfs::new(self.command())
    }

    /// Pid the script recorded with `echo $$ > "$DIR/pid"`.
    pub fn recorded_pid(&self) -> u32 {
        let path = self.file("pid");
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Ok(contents) = fs::read_to_string(&path) {
                if let Ok(pid) = contents.trim().parse() {
                    return pid;
                }
            }
            assert!(Instant::now() < deadline, "script never recorded its pid");
            thread::sleep(Duration::from_millis(10));
        }
    }
}

pub fn write_executable(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

pub fn ds(path: &str) -> DatasetPath {
    DatasetPath::parse(path).unwrap()
}

pub fn process_alive(pid: u32) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("kill -0 {pid}"))
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Poll until `pid` is gone, failing the test after ten seconds.
pub fn assert_exits(pid: u32) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while process_alive(pid) {
        assert!(Instant::now() < deadline, "process {pid} still running");
        thread::sleep(Duration::from_millis(20));
    }
}
