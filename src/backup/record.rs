use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

pub const EXTENSION: &str = ".sql.gz";
pub const CHECKSUM_EXTENSION: &str = ".sha256";
pub const PART_EXTENSION: &str = ".part";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    Full,
    Structure,
}

impl BackupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupKind::Full => "full",
            BackupKind::Structure => "structure",
        }
    }

    pub fn includes_data(&self) -> bool {
        matches!(self, BackupKind::Full)
    }
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dump file found in the backup directory.
#[derive(Debug, Clone, Serialize)]
pub struct BackupRecord {
    pub filename: String,
    /// `None` for files that match the backup pattern but not the naming scheme.
    pub kind: Option<BackupKind>,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub age_seconds: i64,
    pub has_checksum: bool,
}

fn allowed_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^backup_.*\.sql\.gz$").expect("static regex"))
}

fn naming_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^backup_(.+)_(full|structure)_(\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2})(?:_\d+)?\.sql\.gz$",
        )
        .expect("static regex")
    })
}

/// Filenames the engine will read, delete or restore.
///
/// Besides the pattern, anything that could name a path outside the backup
/// directory is refused.
pub fn is_valid_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
        && allowed_pattern().is_match(name)
}

/// Kind encoded in a generated filename.
pub fn parse_kind(name: &str) -> Option<BackupKind> {
    let caps = naming_pattern().captures(name)?;
    match caps.get(2)?.as_str() {
        "full" => Some(BackupKind::Full),
        "structure" => Some(BackupKind::Structure),
        _ => None,
    }
}

/// `backup_<db>_<kind>_<YYYY-MM-DD_HH-mm-ss>.sql.gz`
pub fn filename_for(database: &str, kind: BackupKind, at: DateTime<Utc>) -> String {
    format!(
        "backup_{}_{}_{}{}",
        sanitize_database_name(database),
        kind,
        at.format(TIMESTAMP_FORMAT),
        EXTENSION
    )
}

/// Like [`filename_for`], adding `_1`, `_2`, ... when the name is already taken in `dir`.
pub fn unique_filename(dir: &Path, database: &str, kind: BackupKind, at: DateTime<Utc>) -> String {
    let base = filename_for(database, kind, at);
    if !taken(dir, &base) {
        return base;
    }
    let stem = base.trim_end_matches(EXTENSION);
    (1u32..)
        .map(|n| format!("{}_{}{}", stem, n, EXTENSION))
        .find(|candidate| !taken(dir, candidate))
        .unwrap_or(base)
}

fn taken(dir: &Path, name: &str) -> bool {
    dir.join(name).exists() || dir.join(format!("{}{}", name, PART_EXTENSION)).exists()
}

pub fn checksum_filename(name: &str) -> String {
    format!("{}{}", name, CHECKSUM_EXTENSION)
}

fn sanitize_database_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "database".to_string()
    } else {
        cleaned
    }
}
