//! Persisted git status of a dependency.
//!
//! Stored as `<build_dir>/git_status`, four newline-terminated lines in fixed
//! order: url, tag, branch, commit.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::util::fs::{read_to_string, write_string};

/// File name of the status record inside a build directory.
pub const STATUS_FILE: &str = "git_status";

/// What a dependency's source looked like after its last fetch or build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusRecord {
    pub url: String,
    pub tag: String,
    pub branch: String,
    pub commit: String,
}

impl StatusRecord {
    pub fn path(build_dir: &Path) -> PathBuf {
        build_dir.join(STATUS_FILE)
    }

    /// Read the record. A missing or truncated file yields `None`.
    pub fn read(build_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(build_dir);
        if !path.exists() {
            return Ok(None);
        }
        let text = read_to_string(&path)?;
        let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
        if lines.len() < 4 {
            tracing::debug!("ignoring truncated status file {}", path.display());
            return Ok(None);
        }
        Ok(Some(StatusRecord {
            url: lines[0].to_string(),
            tag: lines[1].to_string(),
            branch: lines[2].to_string(),
            // older records may carry extra words after the hash
            commit: lines[3].split(' ').next().unwrap_or_default().to_string(),
        }))
    }

    pub fn write(&self, build_dir: &Path) -> Result<()> {
        let text = format!("{}\n{}\n{}\n{}\n", self.url, self.tag, self.branch, self.commit);
        write_string(&Self::path(build_dir), &text)
    }

    /// Delete the record so the next status check treats the source as new.
    pub fn reset(build_dir: &Path) -> Result<()> {
        let path = Self::path(build_dir);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_status_file_layout() {
        let tmp = TempDir::new().unwrap();
        let record = StatusRecord {
            url: "https://x/y.git".into(),
            tag: String::new(),
            branch: "main".into(),
            commit: "abc1234".into(),
        };
        record.write(tmp.path()).unwrap();

        let text = std::fs::read_to_string(tmp.path().join(STATUS_FILE)).unwrap();
        assert_eq!(text, "https://x/y.git\n\nmain\nabc1234\n");
        assert_eq!(StatusRecord::read(tmp.path()).unwrap(), Some(record));
    }

    #[test]
    fn test_missing_or_truncated_status() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(StatusRecord::read(tmp.path()).unwrap(), None);

        std::fs::write(tmp.path().join(STATUS_FILE), "https://x\n").unwrap();
        assert_eq!(StatusRecord::read(tmp.path()).unwrap(), None);

        StatusRecord::reset(tmp.path()).unwrap();
        assert!(!tmp.path().join(STATUS_FILE).exists());
    }
}
