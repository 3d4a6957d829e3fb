//! Static defaults merged with key/value overrides from `site_settings`.

use rusqlite::params;
use serde::Serialize;
use std::path::PathBuf;

use crate::config::{BackupConfig, Config};
use crate::db::RepositoryError;
use crate::state::DbPool;

pub const BACKUP_CATEGORY: &str = "backup";

/// Keys accepted in the `backup` category.
pub const BACKUP_KEYS: &[&str] = &[
    "compression_level",
    "max_backups",
    "retention_days",
    "notification_email",
    "storage_path",
    "create_checksum",
    "tables",
    "notify_on_success",
    "notify_on_failure",
    "database_name",
];

/// Effective backup settings for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupSettings {
    pub directory: PathBuf,
    pub database_name: String,
    pub compression_level: u32,
    pub max_backups: usize,
    pub retention_days: u32,
    /// Empty means every table.
    pub tables: Vec<String>,
    pub create_checksum: bool,
    pub notification_email: Option<String>,
    pub notify_on_success: bool,
    pub notify_on_failure: bool,
}

impl BackupSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            directory: config.backup_dir(),
            database_name: config.database.name.clone(),
            compression_level: config.backup.compression_level.min(9),
            max_backups: match config.backup.max_backups {
                0 => {
                    let fallback = BackupConfig::default().max_backups;
                    tracing::warn!(fallback, "max_backups = 0 would delete every backup, using default");
                    fallback
                }
                n => n,
            },
            retention_days: config.backup.retention_days,
            tables: config.backup.tables.clone(),
            create_checksum: config.backup.create_checksum,
            notification_email: config
                .backup
                .notification_email
                .clone()
                .filter(|s| !s.trim().is_empty()),
            notify_on_success: config.backup.notify_on_success,
            notify_on_failure: config.backup.notify_on_failure,
        }
    }

    /// Apply persisted overrides. Values that fail to parse keep the default.
    pub fn with_overrides<'a>(mut self, rows: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        for (key, value) in rows {
            let value = value.trim();
            let applied = match key {
                "compression_level" => value
                    .parse::<u32>()
                    .ok()
                    .filter(|l| *l <= 9)
                    .map(|l| self.compression_level = l),
                "max_backups" => value
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .map(|n| self.max_backups = n),
                "retention_days" => value.parse().ok().map(|d| self.retention_days = d),
                "notification_email" => {
                    self.notification_email = (!value.is_empty()).then(|| value.to_string());
                    Some(())
                }
                "storage_path" => (!value.is_empty()).then(|| self.directory = PathBuf::from(value)),
                "create_checksum" => parse_bool(value).map(|b| self.create_checksum = b),
                "notify_on_success" => parse_bool(value).map(|b| self.notify_on_success = b),
                "notify_on_failure" => parse_bool(value).map(|b| self.notify_on_failure = b),
                "tables" => {
                    self.tables = value
                        .split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(String::from)
                        .collect();
                    Some(())
                }
                "database_name" => (!value.is_empty()).then(|| self.database_name = value.to_string()),
                _ => {
                    tracing::debug!(key, "ignoring unknown backup setting");
                    Some(())
                }
            };

            if applied.is_none() {
                tracing::warn!(key, value, "invalid backup setting, keeping default");
            }
        }
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// All key/value rows of one category.
pub fn load_category(pool: &DbPool, category: &str) -> Result<Vec<(String, String)>, RepositoryError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT setting_key, setting_value FROM site_settings WHERE category = ?1 ORDER BY setting_key",
    )?;
    let rows = stmt
        .query_map(params![category], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Read the `backup` category once and merge it over the config defaults.
pub fn resolve_backup_settings(pool: &DbPool, config: &Config) -> Result<BackupSettings, RepositoryError> {
    let rows = load_category(pool, BACKUP_CATEGORY)?;
    Ok(BackupSettings::from_config(config)
        .with_overrides(rows.iter().map(|(k, v)| (k.as_str(), v.as_str()))))
}

/// Upsert one override.
pub fn put_setting(pool: &DbPool, category: &str, key: &str, value: &str) -> Result<(), RepositoryError> {
    if category == BACKUP_CATEGORY && !BACKUP_KEYS.contains(&key) {
        return Err(RepositoryError::Invalid(format!("Unknown backup setting: {}", key)));
    }
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO site_settings (category, setting_key, setting_value, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(category, setting_key) DO UPDATE SET
           setting_value = excluded.setting_value,
           updated_at = excluded.updated_at",
        params![category, key, value, crate::db::now_rfc3339()],
    )?;
    tracing::info!(category, key, "setting updated");
    Ok(())
}
