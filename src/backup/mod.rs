//! Compressed logical backups of the application database.

pub mod dump;
pub mod job;
pub mod lock;
pub mod record;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::settings::BackupSettings;
use crate::state::DbPool;

pub use job::{run_backup, BackupRun};
pub use lock::BackupLock;
pub use record::{BackupKind, BackupRecord};

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("No tables found in database")]
    NoTables,

    #[error("Backup directory is not writable: {0}")]
    DirectoryNotWritable(String),

    #[error("Invalid backup filename")]
    InvalidFilename,

    #[error("Backup file not found")]
    NotFound,

    #[error("Backup already in progress")]
    Locked,

    #[error("Checksum mismatch for {0}")]
    ChecksumMismatch(String),

    #[error("No checksum recorded for {0}")]
    MissingChecksum(String),

    #[error("Structure-only backups cannot be restored")]
    StructureOnly,

    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] crate::db::RepositoryError),

    #[error("Backup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Outcome of one create run. Failures are carried here, not raised.
#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub success: bool,
    pub kind: BackupKind,
    pub database: String,
    pub filename: Option<String>,
    pub size: u64,
    pub tables: usize,
    pub rows: usize,
    pub checksum: Option<String>,
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl BackupReport {
    fn failed(kind: BackupKind, database: &str, error: &BackupError) -> Self {
        Self {
            success: false,
            kind,
            database: database.to_string(),
            filename: None,
            size: 0,
            tables: 0,
            rows: 0,
            checksum: None,
            error: Some(error.to_string()),
            finished_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    pub filename: String,
    pub tables: usize,
    pub verified: bool,
}

/// Runs backups for one resolved set of settings.
///
/// All methods block; async callers go through `spawn_blocking`.
pub struct BackupEngine {
    pool: DbPool,
    settings: BackupSettings,
}

impl BackupEngine {
    pub fn new(pool: DbPool, settings: BackupSettings) -> Self {
        Self { pool, settings }
    }

    pub fn settings(&self) -> &BackupSettings {
        &self.settings
    }

    fn dir(&self) -> &Path {
        &self.settings.directory
    }

    pub fn create_full_backup(&self) -> BackupReport {
        self.create(BackupKind::Full)
    }

    pub fn create_structure_backup(&self) -> BackupReport {
        self.create(BackupKind::Structure)
    }

    fn create(&self, kind: BackupKind) -> BackupReport {
        tracing::info!(%kind, dir = %self.dir().display(), "starting backup");
        match self.try_create(kind) {
            Ok(report) => {
                tracing::info!(
                    %kind,
                    filename = report.filename.as_deref().unwrap_or_default(),
                    size = report.size,
                    tables = report.tables,
                    "backup completed"
                );
                report
            }
            Err(e) => {
                tracing::error!(%kind, "backup failed: {}", e);
                BackupReport::failed(kind, &self.settings.database_name, &e)
            }
        }
    }

    fn try_create(&self, kind: BackupKind) -> Result<BackupReport, BackupError> {
        self.ensure_writable_dir()?;
        let _lock = BackupLock::acquire(self.dir())?;

        let conn = self.pool.get()?;
        let tables = dump::list_tables(&conn, &self.settings.tables)?;
        if tables.is_empty() {
            return Err(BackupError::NoTables);
        }
        let dump = dump::dump_tables(&conn, &tables, kind.includes_data())?;
        drop(conn);

        let compressed = gzip(dump.sql.as_bytes(), self.settings.compression_level)?;
        let finished_at = Utc::now();
        let filename = record::unique_filename(
            self.dir(),
            &self.settings.database_name,
            kind,
            finished_at,
        );
        write_atomically(&self.dir().join(&filename), &compressed)?;

        let checksum = if self.settings.create_checksum {
            let digest = sha256_hex(&compressed);
            write_atomically(
                &self.dir().join(record::checksum_filename(&filename)),
                format!("{}  {}\n", digest, filename).as_bytes(),
            )?;
            Some(digest)
        } else {
            None
        };

        Ok(BackupReport {
            success: true,
            kind,
            database: self.settings.database_name.clone(),
            filename: Some(filename),
            size: compressed.len() as u64,
            tables: dump.tables,
            rows: dump.rows,
            checksum,
            error: None,
            finished_at,
        })
    }

    fn ensure_writable_dir(&self) -> Result<(), BackupError> {
        let dir = self.dir();
        let not_writable = || BackupError::DirectoryNotWritable(dir.display().to_string());

        fs::create_dir_all(dir).map_err(|e| {
            tracing::error!(dir = %dir.display(), "cannot create backup directory: {}", e);
            not_writable()
        })?;
        let meta = fs::metadata(dir).map_err(|_| not_writable())?;
        if !meta.is_dir() || meta.permissions().readonly() {
            return Err(not_writable());
        }
        Ok(())
    }

    /// Backups in the directory, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupRecord>, BackupError> {
        let dir = self.dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut records = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !record::is_valid_filename(&name) {
                continue;
            }
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let modified: DateTime<Utc> = meta.modified()?.into();
            records.push(BackupRecord {
                kind: record::parse_kind(&name),
                has_checksum: dir.join(record::checksum_filename(&name)).exists(),
                size: meta.len(),
                modified,
                age_seconds: (now - modified).num_seconds().max(0),
                filename: name,
            });
        }

        records.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.filename.cmp(&a.filename))
        });
        Ok(records)
    }

    /// Apply the retention policy. Returns deleted filenames, oldest first.
    pub fn clean_old_backups(&self) -> Result<Vec<String>, BackupError> {
        if !self.dir().exists() {
            return Ok(Vec::new());
        }
        let _lock = BackupLock::acquire(self.dir())?;

        let records = self.list_backups()?;
        let max_age = i64::from(self.settings.retention_days) * 86_400;

        let mut doomed: Vec<&BackupRecord> = records
            .iter()
            .enumerate()
            .filter(|(i, r)| {
                *i >= self.settings.max_backups || (max_age > 0 && r.age_seconds > max_age)
            })
            .map(|(_, r)| r)
            .collect();
        doomed.reverse();

        let mut deleted = Vec::with_capacity(doomed.len());
        for record in doomed {
            match self.remove_with_sidecar(&record.filename) {
                Ok(()) => deleted.push(record.filename.clone()),
                Err(e) => tracing::warn!(filename = %record.filename, "could not delete old backup: {}", e),
            }
        }

        if !deleted.is_empty() {
            tracing::info!(count = deleted.len(), "removed old backups");
        }
        Ok(deleted)
    }

    pub fn delete_backup(&self, filename: &str) -> Result<(), BackupError> {
        self.resolve(filename)?;
        self.remove_with_sidecar(filename)?;
        tracing::info!(filename, "deleted backup");
        Ok(())
    }

    fn remove_with_sidecar(&self, filename: &str) -> Result<(), BackupError> {
        fs::remove_file(self.dir().join(filename))?;
        let sidecar = self.dir().join(record::checksum_filename(filename));
        if sidecar.exists() {
            fs::remove_file(sidecar)?;
        }
        Ok(())
    }

    /// Raw compressed bytes, for download.
    pub fn read_backup(&self, filename: &str) -> Result<Vec<u8>, BackupError> {
        let path = self.resolve(filename)?;
        Ok(fs::read(path)?)
    }

    /// Compare the dump against its `.sha256` sidecar.
    pub fn verify_backup(&self, filename: &str) -> Result<bool, BackupError> {
        let path = self.resolve(filename)?;
        let sidecar = self.dir().join(record::checksum_filename(filename));
        if !sidecar.exists() {
            return Err(BackupError::MissingChecksum(filename.to_string()));
        }

        let recorded = fs::read_to_string(&sidecar)?;
        let expected = recorded.split_whitespace().next().unwrap_or_default();
        let actual = sha256_hex(&fs::read(&path)?);
        let ok = actual.eq_ignore_ascii_case(expected);
        if !ok {
            tracing::warn!(filename, "backup checksum mismatch");
        }
        Ok(ok)
    }

    /// Replace the database contents with a dump.
    pub fn restore_backup(&self, filename: &str) -> Result<RestoreReport, BackupError> {
        let path = self.resolve(filename)?;
        if record::parse_kind(filename) == Some(BackupKind::Structure) {
            tracing::warn!(filename, "refusing to restore a structure-only dump");
            return Err(BackupError::StructureOnly);
        }
        let _lock = BackupLock::acquire(self.dir())?;

        let verified = match self.verify_backup(filename) {
            Ok(true) => true,
            Ok(false) => return Err(BackupError::ChecksumMismatch(filename.to_string())),
            Err(BackupError::MissingChecksum(_)) => false,
            Err(e) => return Err(e),
        };

        tracing::info!(filename, verified, "restoring backup");
        let mut sql = String::new();
        GzDecoder::new(fs::File::open(&path)?).read_to_string(&mut sql)?;
        let script = dump::prepare_for_replay(&sql);
        let tables = dump::count_tables(&sql);

        let conn = self.pool.get()?;
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        // FKs go back on whichever step fails; the connection returns to the pool
        let outcome = conn.execute("BEGIN IMMEDIATE", []).and_then(|_| {
            match conn.execute_batch(&script) {
                Ok(()) => conn.execute("COMMIT", []).map(|_| ()),
                Err(e) => {
                    let _ = conn.execute("ROLLBACK", []);
                    Err(e)
                }
            }
        });
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        outcome?;

        tracing::info!(filename, tables, "restore completed");
        Ok(RestoreReport {
            filename: filename.to_string(),
            tables,
            verified,
        })
    }

    /// Map a user-supplied filename to a path inside the backup directory.
    fn resolve(&self, filename: &str) -> Result<PathBuf, BackupError> {
        if !record::is_valid_filename(filename) {
            tracing::warn!(filename, "rejected backup filename");
            return Err(BackupError::InvalidFilename);
        }
        let dir = fs::canonicalize(self.dir()).map_err(|_| BackupError::NotFound)?;
        let path = fs::canonicalize(dir.join(filename)).map_err(|_| BackupError::NotFound)?;
        if !path.starts_with(&dir) || !path.is_file() {
            tracing::warn!(filename, "backup path escapes the backup directory");
            return Err(BackupError::InvalidFilename);
        }
        Ok(path)
    }
}

fn gzip(data: &[u8], level: u32) -> Result<Vec<u8>, BackupError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Write to `<path>.part`, fsync, then rename into place.
fn write_atomically(path: &Path, data: &[u8]) -> Result<(), BackupError> {
    let mut part = path.as_os_str().to_owned();
    part.push(record::PART_EXTENSION);
    let part = PathBuf::from(part);

    let written = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&part)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&part, path)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&part);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::testing::{insert_user, test_db};
    use std::time::{Duration as StdDuration, SystemTime};
    use tempfile::TempDir;

    fn engine(pool: &DbPool, dir: &Path) -> BackupEngine {
        let mut config = Config::default();
        config.backup.directory = Some(dir.to_path_buf());
        BackupEngine::new(pool.clone(), BackupSettings::from_config(&config))
    }

    fn gunzip(path: &Path) -> String {
        let mut out = String::new();
        GzDecoder::new(fs::File::open(path).unwrap())
            .read_to_string(&mut out)
            .unwrap();
        out
    }

    fn touch(path: &Path, age: StdDuration) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - age)
            .unwrap();
    }

    #[test]
    fn full_backup_writes_compressed_dump() {
        let (pool, _db) = test_db();
        insert_user(&pool, "alice", "user");
        insert_user(&pool, "bob", "admin");
        let dir = TempDir::new().unwrap();
        let engine = engine(&pool, dir.path());

        let report = engine.create_full_backup();
        assert!(report.success, "{:?}", report.error);
        assert!(report.size > 0);
        assert!(report.tables > 0);

        let filename = report.filename.unwrap();
        assert!(filename.starts_with("backup_newsdesk_full_"));
        let sql = gunzip(&dir.path().join(&filename));
        assert_eq!(dump::count_tables(&sql), report.tables);
        assert_eq!(
            sql.lines()
                .filter(|l| l.starts_with("INSERT INTO `users`"))
                .count(),
            2
        );
        assert!(!dir.path().join(lock::LOCK_FILE).exists());
    }

    #[test]
    fn allow_listed_full_backup_counts_only_those_rows() {
        let (pool, _db) = test_db();
        insert_user(&pool, "alice", "user");
        insert_user(&pool, "bob", "user");
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&pool, dir.path());
        engine.settings.tables = vec!["users".into(), "sessions".into()];

        let report = engine.create_full_backup();
        assert!(report.success);
        assert_eq!(report.tables, 2);

        let sql = gunzip(&dir.path().join(report.filename.unwrap()));
        assert_eq!(sql.lines().filter(|l| l.starts_with("INSERT INTO")).count(), 2);
        assert_eq!(sql.lines().filter(|l| l.starts_with("DROP TABLE IF EXISTS")).count(), 2);
    }

    #[test]
    fn structure_backup_has_no_rows() {
        let (pool, _db) = test_db();
        insert_user(&pool, "alice", "user");
        let dir = TempDir::new().unwrap();

        let report = engine(&pool, dir.path()).create_structure_backup();
        assert!(report.success);
        let filename = report.filename.unwrap();
        assert!(filename.contains("_structure_"));
        assert!(!gunzip(&dir.path().join(filename)).contains("INSERT INTO"));
    }

    #[test]
    fn empty_allow_list_match_reports_no_tables() {
        let (pool, _db) = test_db();
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&pool, dir.path());
        engine.settings.tables = vec!["does_not_exist".into()];

        let report = engine.create_full_backup();
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("No tables found in database"));
        assert!(engine.list_backups().unwrap().is_empty());
    }

    #[test]
    fn held_lock_blocks_a_second_run() {
        let (pool, _db) = test_db();
        let dir = TempDir::new().unwrap();
        let engine = engine(&pool, dir.path());

        let _held = BackupLock::acquire(dir.path()).unwrap();
        let report = engine.create_full_backup();
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("Backup already in progress"));
        assert!(engine.list_backups().unwrap().is_empty());
    }

    #[test]
    fn checksum_sidecar_detects_tampering() {
        let (pool, _db) = test_db();
        insert_user(&pool, "alice", "user");
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&pool, dir.path());
        engine.settings.create_checksum = true;

        let report = engine.create_full_backup();
        let filename = report.filename.unwrap();
        assert!(report.checksum.is_some());
        assert!(engine.verify_backup(&filename).unwrap());

        let path = dir.path().join(&filename);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        assert!(!engine.verify_backup(&filename).unwrap());
        assert!(matches!(
            engine.restore_backup(&filename),
            Err(BackupError::ChecksumMismatch(_))
        ));
    }

    #[test]
    fn verify_without_sidecar_is_an_error() {
        let (pool, _db) = test_db();
        let dir = TempDir::new().unwrap();
        let engine = engine(&pool, dir.path());
        let filename = engine.create_full_backup().filename.unwrap();
        assert!(matches!(
            engine.verify_backup(&filename),
            Err(BackupError::MissingChecksum(_))
        ));
    }

    #[test]
    fn list_is_newest_first() {
        let (pool, _db) = test_db();
        let dir = TempDir::new().unwrap();
        let engine = engine(&pool, dir.path());

        for (name, hours) in [("backup_a.sql.gz", 3), ("backup_b.sql.gz", 1), ("backup_c.sql.gz", 2)] {
            let path = dir.path().join(name);
            fs::write(&path, b"x").unwrap();
            touch(&path, StdDuration::from_secs(hours * 3600));
        }
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let names: Vec<String> = engine
            .list_backups()
            .unwrap()
            .into_iter()
            .map(|r| r.filename)
            .collect();
        assert_eq!(names, vec!["backup_b.sql.gz", "backup_c.sql.gz", "backup_a.sql.gz"]);
    }

    #[test]
    fn cleanup_keeps_newest_and_deletes_oldest_first() {
        let (pool, _db) = test_db();
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&pool, dir.path());
        engine.settings.max_backups = 2;

        for i in 0..5u64 {
            let name = format!("backup_n{}.sql.gz", i);
            let path = dir.path().join(&name);
            fs::write(&path, b"x").unwrap();
            fs::write(dir.path().join(record::checksum_filename(&name)), b"y").unwrap();
            // n0 is the newest
            touch(&path, StdDuration::from_secs((i + 1) * 600));
        }

        let deleted = engine.clean_old_backups().unwrap();
        assert_eq!(deleted, vec!["backup_n4.sql.gz", "backup_n3.sql.gz", "backup_n2.sql.gz"]);

        let left: Vec<String> = engine
            .list_backups()
            .unwrap()
            .into_iter()
            .map(|r| r.filename)
            .collect();
        assert_eq!(left, vec!["backup_n0.sql.gz", "backup_n1.sql.gz"]);
        assert!(!dir.path().join("backup_n4.sql.gz.sha256").exists());
    }

    #[test]
    fn cleanup_honours_retention_days() {
        let (pool, _db) = test_db();
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&pool, dir.path());
        engine.settings.retention_days = 7;

        let fresh = dir.path().join("backup_fresh.sql.gz");
        let old = dir.path().join("backup_old.sql.gz");
        fs::write(&fresh, b"x").unwrap();
        fs::write(&old, b"x").unwrap();
        touch(&old, StdDuration::from_secs(8 * 86_400));

        assert_eq!(engine.clean_old_backups().unwrap(), vec!["backup_old.sql.gz"]);
        assert!(fresh.exists());
    }

    #[test]
    fn delete_rejects_traversal_and_foreign_names() {
        let (pool, _db) = test_db();
        let root = TempDir::new().unwrap();
        let dir = root.path().join("backups");
        fs::create_dir_all(&dir).unwrap();
        let outside = root.path().join("backup_outside.sql.gz");
        fs::write(&outside, b"keep me").unwrap();
        let engine = engine(&pool, &dir);

        for bad in [
            "../backup_outside.sql.gz",
            "backup_..%2f.sql.gz",
            "backup_/../../backup_outside.sql.gz",
            "secrets.txt",
        ] {
            assert!(
                matches!(engine.delete_backup(bad), Err(BackupError::InvalidFilename)),
                "{bad}"
            );
        }
        assert!(matches!(
            engine.delete_backup("backup_missing.sql.gz"),
            Err(BackupError::NotFound)
        ));
        assert!(outside.exists());
    }

    #[cfg(unix)]
    #[test]
    fn delete_refuses_symlink_out_of_directory() {
        let (pool, _db) = test_db();
        let root = TempDir::new().unwrap();
        let dir = root.path().join("backups");
        fs::create_dir_all(&dir).unwrap();
        let outside = root.path().join("precious.sql.gz");
        fs::write(&outside, b"keep me").unwrap();
        std::os::unix::fs::symlink(&outside, dir.join("backup_link.sql.gz")).unwrap();

        let engine = engine(&pool, &dir);
        assert!(matches!(
            engine.delete_backup("backup_link.sql.gz"),
            Err(BackupError::InvalidFilename)
        ));
        assert!(outside.exists());
    }

    #[test]
    fn delete_removes_file_and_sidecar() {
        let (pool, _db) = test_db();
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&pool, dir.path());
        engine.settings.create_checksum = true;
        let filename = engine.create_full_backup().filename.unwrap();

        engine.delete_backup(&filename).unwrap();
        assert!(!dir.path().join(&filename).exists());
        assert!(!dir.path().join(record::checksum_filename(&filename)).exists());
    }

    #[test]
    fn restore_brings_back_deleted_rows() {
        let (pool, _db) = test_db();
        insert_user(&pool, "alice", "user");
        insert_user(&pool, "bob", "user");
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&pool, dir.path());
        engine.settings.create_checksum = true;
        let filename = engine.create_full_backup().filename.unwrap();

        pool.get().unwrap().execute("DELETE FROM users", []).unwrap();

        let report = engine.restore_backup(&filename).unwrap();
        assert!(report.verified);
        assert!(report.tables > 0);

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |r| r.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn busy_restore_leaves_foreign_keys_enabled() {
        use r2d2_sqlite::SqliteConnectionManager;

        let (pool, db) = test_db();
        insert_user(&pool, "alice", "user");
        let dir = TempDir::new().unwrap();
        let filename = engine(&pool, dir.path()).create_full_backup().filename.unwrap();

        // One connection, no busy wait, so the failing restore hands back the same one
        let db_path = db.path().join("test.db");
        let single: DbPool = r2d2::Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::file(&db_path).with_init(|conn| {
                conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 0;")
            }))
            .unwrap();

        let writer = rusqlite::Connection::open(&db_path).unwrap();
        writer.execute_batch("BEGIN IMMEDIATE;").unwrap();

        let result = engine(&single, dir.path()).restore_backup(&filename);
        assert!(matches!(result, Err(BackupError::Sql(_))));
        writer.execute_batch("ROLLBACK;").unwrap();

        let fk: i64 = single
            .get()
            .unwrap()
            .query_row("PRAGMA foreign_keys", [], |r| r.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn structure_dumps_are_not_restored() {
        let (pool, _db) = test_db();
        insert_user(&pool, "alice", "user");
        let dir = TempDir::new().unwrap();
        let engine = engine(&pool, dir.path());
        let filename = engine.create_structure_backup().filename.unwrap();

        assert!(matches!(
            engine.restore_backup(&filename),
            Err(BackupError::StructureOnly)
        ));
        let count: i64 = pool
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
