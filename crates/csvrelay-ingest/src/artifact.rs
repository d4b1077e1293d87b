//! Local CSV artifacts
//!
//! A [`LocalArtifact`] owns the path `{work_dir}/{source}.csv` for the
//! duration of one source's processing. Dropping it deletes the file, so the
//! file never outlives the source regardless of which step failed.

use crate::error::WriteError;
use crate::table::DataTable;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A file reserved for one source's normalized data
#[derive(Debug)]
pub struct LocalArtifact {
    path: PathBuf,
}

impl LocalArtifact {
    /// Reserve `{work_dir}/{source_name}.csv`. Nothing is created yet.
    pub fn reserve(work_dir: impl AsRef<Path>, source_name: &str) -> Self {
        Self {
            path: work_dir.as_ref().join(format!("{source_name}.csv")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name used on the remote side
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Write `table` as CSV: header row, then data rows. No index column.
    pub fn write(&self, table: &DataTable) -> Result<(), WriteError> {
        let csv_err = |source| WriteError::Csv {
            path: self.path.clone(),
            source,
        };

        let mut writer = csv::Writer::from_path(&self.path).map_err(csv_err)?;
        writer.write_record(table.columns()).map_err(csv_err)?;
        for row in table.rows() {
            writer.write_record(row).map_err(csv_err)?;
        }
        writer.flush().map_err(|source| WriteError::Io {
            path: self.path.clone(),
            source,
        })?;

        info!(file = %self.file_name(), rows = table.row_count(), "Saved artifact");
        Ok(())
    }
}

impl Drop for LocalArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!(file = %self.file_name(), "Deleted artifact"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(file = %self.file_name(), "No artifact to delete")
            },
            Err(e) => warn!(file = %self.file_name(), error = %e, "Failed to delete artifact"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample_table() -> DataTable {
        DataTable::new(
            vec!["id".to_string(), "city".to_string()],
            vec![
                vec!["1".to_string(), "Oslo".to_string()],
                vec!["2".to_string(), "Rio de Janeiro, RJ".to_string()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_reserve_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = LocalArtifact::reserve(dir.path(), "sales");
        assert_eq!(artifact.path(), dir.path().join("sales.csv"));
        assert_eq!(artifact.file_name(), "sales.csv");
        assert!(!artifact.path().exists());
    }

    #[test]
    fn test_write_then_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let artifact = LocalArtifact::reserve(dir.path(), "cities");
            artifact.write(&sample_table()).unwrap();

            let written = std::fs::read_to_string(artifact.path()).unwrap();
            assert_eq!(written, "id,city\n1,Oslo\n2,\"Rio de Janeiro, RJ\"\n");
            artifact.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_without_write_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        drop(LocalArtifact::reserve(dir.path(), "never_written"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = LocalArtifact::reserve(dir.path().join("gone"), "sales");
        let err = artifact.write(&sample_table()).unwrap_err();
        assert!(matches!(err, WriteError::Csv { .. }));
    }
}
