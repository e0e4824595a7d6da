//! Snapshot and bookmark listing for one filesystem.

use crate::system::SystemZfs;
use zpull_core::error::{PathError, ZpullError, ZpullResult};
use zpull_core::path::DatasetPath;
use zpull_core::version::{FilesystemVersion, VersionFilter, VersionType};

pub(crate) const VERSION_PROPERTIES: [&str; 4] = ["name", "guid", "createtxg", "creation"];

fn parse_number(field: &str, what: &str, name: &str) -> ZpullResult<u64> {
    field.parse().map_err(|_| {
        ZpullError::UnexpectedOutput(format!("{name}: {what} is not a number: {field:?}"))
    })
}

/// Parse a `name,guid,createtxg,creation` row listed under `fs`.
pub(crate) fn parse_version(fs: &DatasetPath, row: &[String]) -> ZpullResult<FilesystemVersion> {
    let [full, guid, createtxg, creation] = row else {
        return Err(ZpullError::UnexpectedOutput(format!(
            "expected {} fields in version row, got {}",
            VERSION_PROPERTIES.len(),
            row.len()
        )));
    };

    let (split, version_type) = full
        .char_indices()
        .find_map(|(idx, ch)| VersionType::from_delimiter(ch).map(|kind| (idx, kind)))
        .ok_or_else(|| {
            ZpullError::UnexpectedOutput(format!("{full:?} is neither a snapshot nor a bookmark"))
        })?;

    // Both delimiters are single-byte.
    let (dataset, name) = (&full[..split], &full[split + 1..]);
    if dataset != fs.to_string() {
        return Err(ZpullError::UnexpectedOutput(format!(
            "{full:?} does not belong to {fs}"
        )));
    }
    if name.is_empty() {
        return Err(ZpullError::UnexpectedOutput(format!("{full:?} has an empty name")));
    }

    Ok(FilesystemVersion {
        version_type,
        name: name.to_string(),
        guid: parse_number(guid, "guid", full)?,
        createtxg: parse_number(createtxg, "createtxg", full)?,
        creation: parse_number(creation, "creation", full)?,
    })
}

impl SystemZfs {
    /// Snapshots and bookmarks directly under `fs` that `filter` accepts, oldest first.
    pub fn list_filesystem_versions(
        &self,
        fs: &DatasetPath,
        filter: &dyn VersionFilter,
    ) -> ZpullResult<Vec<FilesystemVersion>> {
        if fs.is_empty() {
            return Err(ZpullError::InvalidPath {
                path: String::new(),
                reason: PathError::EmptyComponent,
            });
        }
        let target = fs.to_string();
        let rows = self.list(
            &VERSION_PROPERTIES,
            &["-t", "snapshot,bookmark", "-d", "1", target.as_str()],
        )?;

        let mut versions = Vec::with_capacity(rows.len());
        for row in rows {
            let version = parse_version(fs, &row)?;
            if filter.filter(&version)? {
                versions.push(version);
            }
        }
        versions.sort();
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn parses_snapshots_and_bookmarks() {
        let fs = DatasetPath::parse("tank/data").unwrap();
        let snap = parse_version(&fs, &row(&["tank/data@zpull_1", "42", "100", "1700000000"]))
            .unwrap();
        assert_eq!(snap.version_type, VersionType::Snapshot);
        assert_eq!(snap.name, "zpull_1");
        assert_eq!(snap.guid, 42);
        assert_eq!(snap.createtxg, 100);

        let mark = parse_version(&fs, &row(&["tank/data#zpull_1", "42", "100", "1700000000"]))
            .unwrap();
        assert_eq!(mark.version_type, VersionType::Bookmark);
        assert_eq!(mark.to_abs_path(&fs), "tank/data#zpull_1");
    }

    #[test]
    fn rejects_foreign_and_malformed_rows() {
        let fs = DatasetPath::parse("tank/data").unwrap();
        for bad in [
            row(&["tank/other@a", "1", "1", "1"]),
            row(&["tank/data", "1", "1", "1"]),
            row(&["tank/data@a", "x", "1", "1"]),
            row(&["tank/data@", "1", "1", "1"]),
            row(&["tank/data@a", "1", "1"]),
        ] {
            assert!(matches!(
                parse_version(&fs, &bad),
                Err(ZpullError::UnexpectedOutput(_))
            ));
        }
    }
}
