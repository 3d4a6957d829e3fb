use serde::Serialize;
use std::sync::Arc;

use super::{BackupEngine, BackupError, BackupKind, BackupReport};
use crate::config::Config;
use crate::notify::{BackupNotifier, MailTransport};
use crate::settings;
use crate::state::DbPool;

/// Everything one backup run did.
#[derive(Debug, Clone, Serialize)]
pub struct BackupRun {
    pub report: BackupReport,
    /// Files removed by the retention pass, oldest first.
    pub removed: Vec<String>,
    pub notified: bool,
}

/// Resolve settings, dump on the blocking pool, optionally apply retention,
/// then send the notification. A failed dump still yields `Ok` with an
/// unsuccessful report.
pub async fn run_backup(
    pool: DbPool,
    config: &Config,
    mailer: Arc<dyn MailTransport>,
    kind: BackupKind,
    cleanup: bool,
) -> Result<BackupRun, BackupError> {
    let settings = {
        let pool = pool.clone();
        let config = config.clone();
        tokio::task::spawn_blocking(move || settings::resolve_backup_settings(&pool, &config))
            .await??
    };

    let engine = BackupEngine::new(pool, settings.clone());
    let (report, removed) = tokio::task::spawn_blocking(move || {
        let report = match kind {
            BackupKind::Full => engine.create_full_backup(),
            BackupKind::Structure => engine.create_structure_backup(),
        };
        let removed = if cleanup && report.success {
            engine.clean_old_backups().unwrap_or_else(|e| {
                tracing::warn!("retention pass failed: {}", e);
                Vec::new()
            })
        } else {
            Vec::new()
        };
        (report, removed)
    })
    .await?;

    let notified = BackupNotifier::new(mailer).notify(&settings, &report).await;
    Ok(BackupRun {
        report,
        removed,
        notified,
    })
}
