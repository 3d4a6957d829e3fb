use chrono::Duration;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::BackupError;

pub const LOCK_FILE: &str = ".backup.lock";

/// Exclusive hold on a backup directory, released on drop.
#[derive(Debug)]
pub struct BackupLock {
    path: PathBuf,
}

impl BackupLock {
    /// Locks older than this are assumed to belong to a crashed run.
    pub fn stale_after() -> Duration {
        Duration::hours(1)
    }

    pub fn acquire(dir: &Path) -> Result<Self, BackupError> {
        let path = dir.join(LOCK_FILE);

        match Self::create(&path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if !Self::is_stale(&path) {
                    tracing::warn!(lock = %path.display(), "backup lock is held");
                    return Err(BackupError::Locked);
                }
                tracing::warn!(lock = %path.display(), "replacing stale backup lock");
                fs::remove_file(&path)?;
                Self::create(&path).map_err(|e| match e.kind() {
                    ErrorKind::AlreadyExists => BackupError::Locked,
                    _ => BackupError::Io(e),
                })
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                Err(BackupError::DirectoryNotWritable(dir.display().to_string()))
            }
            Err(e) => Err(BackupError::Io(e)),
        }
    }

    fn create(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(
            file,
            "pid={} since={}",
            std::process::id(),
            crate::db::now_rfc3339()
        )?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn is_stale(path: &Path) -> bool {
        let age = fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok());
        match (age, Self::stale_after().to_std()) {
            (Some(age), Ok(limit)) => age > limit,
            _ => false,
        }
    }
}

impl Drop for BackupLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(lock = %self.path.display(), "failed to release backup lock: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[test]
    fn second_acquire_fails_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = BackupLock::acquire(dir.path()).unwrap();
        assert!(dir.path().join(LOCK_FILE).exists());
        assert!(matches!(
            BackupLock::acquire(dir.path()),
            Err(BackupError::Locked)
        ));

        drop(lock);
        assert!(!dir.path().join(LOCK_FILE).exists());
        BackupLock::acquire(dir.path()).unwrap();
    }

    #[test]
    fn stale_lock_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE);
        fs::write(&path, "pid=1").unwrap();
        let old = SystemTime::now() - StdDuration::from_secs(2 * 3600);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(old)
            .unwrap();

        let _lock = BackupLock::acquire(dir.path()).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains(&format!("pid={}", std::process::id())));
    }
}
