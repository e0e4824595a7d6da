//! Snapshot, bookmark and destroy.

use crate::system::SystemZfs;
use log::info;
use std::time::Instant;
use zpull_core::error::{PathError, ZpullError, ZpullResult};
use zpull_core::metrics::Operation;
use zpull_core::path::{DatasetPath, FORBIDDEN_CHARS};

/// `fs@name`.
pub fn snapshot_name(fs: &DatasetPath, name: &str) -> String {
    format!("{fs}@{name}")
}

/// `fs#name`.
pub fn bookmark_name(fs: &DatasetPath, name: &str) -> String {
    format!("{fs}#{name}")
}

fn check_target(fs: &DatasetPath) -> ZpullResult<()> {
    if fs.is_empty() {
        return Err(ZpullError::InvalidPath {
            path: String::new(),
            reason: PathError::EmptyComponent,
        });
    }
    Ok(())
}

fn check_version_name(name: &str) -> ZpullResult<()> {
    let invalid = |reason| ZpullError::InvalidPath {
        path: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid(PathError::EmptyComponent));
    }
    if let Some(ch) = name
        .chars()
        .find(|ch| FORBIDDEN_CHARS.contains(*ch) || *ch == '/')
    {
        return Err(invalid(PathError::ForbiddenCharacter(ch)));
    }
    Ok(())
}

impl SystemZfs {
    /// `zfs destroy <name>`; the name is passed through untouched.
    pub fn destroy(&self, name: &str) -> ZpullResult<()> {
        self.command()
            .run_silent(&["destroy".to_string(), name.to_string()])
    }

    /// `zfs snapshot [-r] fs@name`.
    pub fn snapshot(&self, fs: &DatasetPath, name: &str, recursive: bool) -> ZpullResult<()> {
        check_target(fs)?;
        check_version_name(name)?;

        let mut args = vec!["snapshot".to_string()];
        if recursive {
            args.push("-r".to_string());
        }
        let target = snapshot_name(fs, name);
        args.push(target.clone());

        let started = Instant::now();
        let result = self.command().run_silent(&args);
        self.metrics()
            .observe(Operation::Snapshot, &fs.to_string(), started.elapsed());
        result?;

        info!("created snapshot {target}");
        Ok(())
    }

    /// `zfs bookmark fs@snapshot fs#bookmark`.
    pub fn bookmark(&self, fs: &DatasetPath, snapshot: &str, bookmark: &str) -> ZpullResult<()> {
        check_target(fs)?;
        check_version_name(snapshot)?;
        check_version_name(bookmark)?;

        let target = bookmark_name(fs, bookmark);
        let args = vec![
            "bookmark".to_string(),
            snapshot_name(fs, snapshot),
            target.clone(),
        ];

        let started = Instant::now();
        let result = self.command().run_silent(&args);
        self.metrics()
            .observe(Operation::Bookmark, &fs.to_string(), started.elapsed());
        result?;

        info!("created bookmark {target}");
        Ok(())
    }
}
