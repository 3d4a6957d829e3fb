//! Templated mail for backup runs and the contact form.

pub mod templates;

use askama::Template;
use async_trait::async_trait;
use rusqlite::params;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

use crate::backup::BackupReport;
use crate::db::models::OutboundMail;
use crate::settings::BackupSettings;
use crate::state::DbPool;
use templates::{BackupFailureEmail, BackupSuccessEmail, ContactFormEmail};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub template: &'static str,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Spools mail into `mail_outbox` for an external relay to pick up.
pub struct OutboxTransport {
    pool: DbPool,
}

impl OutboxTransport {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Spooled messages, oldest first.
    pub fn pending(&self) -> Result<Vec<OutboundMail>, MailError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM mail_outbox ORDER BY created_at, id",
            OutboundMail::COLUMNS
        ))?;
        let rows = stmt
            .query_map([], OutboundMail::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[async_trait]
impl MailTransport for OutboxTransport {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO mail_outbox (id, recipient, subject, body, template, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                uuid::Uuid::now_v7().to_string(),
                email.to,
                email.subject,
                email.body,
                email.template,
                crate::db::now_rfc3339(),
            ],
        )?;
        tracing::debug!(to = %email.to, template = email.template, "mail spooled");
        Ok(())
    }
}

/// Sends the success/failure mail after a backup run.
pub struct BackupNotifier {
    transport: Arc<dyn MailTransport>,
}

impl BackupNotifier {
    pub fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self { transport }
    }

    /// Render the mail for a report, or `None` when settings say not to send one.
    pub fn compose(settings: &BackupSettings, report: &BackupReport) -> Result<Option<Email>, MailError> {
        let Some(to) = settings.notification_email.clone() else {
            return Ok(None);
        };
        let finished_at = report.finished_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();

        let email = if report.success {
            if !settings.notify_on_success {
                return Ok(None);
            }
            let body = BackupSuccessEmail {
                kind: report.kind.as_str(),
                database: &report.database,
                filename: report.filename.as_deref().unwrap_or_default(),
                size_human: human_size(report.size),
                tables: report.tables,
                finished_at,
                checksum: report.checksum.as_deref(),
            }
            .render()?;
            Email {
                to,
                subject: format!("[{}] {} backup completed", report.database, report.kind),
                body,
                template: BackupSuccessEmail::NAME,
            }
        } else {
            if !settings.notify_on_failure {
                return Ok(None);
            }
            let body = BackupFailureEmail {
                kind: report.kind.as_str(),
                database: &report.database,
                error: report.error.as_deref().unwrap_or("unknown error"),
                finished_at,
            }
            .render()?;
            Email {
                to,
                subject: format!("[{}] {} backup FAILED", report.database, report.kind),
                body,
                template: BackupFailureEmail::NAME,
            }
        };
        Ok(Some(email))
    }

    /// Returns whether a mail was handed to the transport. Never fails the run.
    pub async fn notify(&self, settings: &BackupSettings, report: &BackupReport) -> bool {
        let email = match Self::compose(settings, report) {
            Ok(Some(email)) => email,
            Ok(None) => return false,
            Err(e) => {
                tracing::error!("failed to render backup notification: {}", e);
                return false;
            }
        };
        match self.transport.send(&email).await {
            Ok(()) => {
                tracing::info!(to = %email.to, template = email.template, "backup notification sent");
                true
            }
            Err(e) => {
                tracing::error!(to = %email.to, "failed to send backup notification: {}", e);
                false
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl ContactForm {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Name is required".into());
        }
        if !crate::auth::credentials::looks_like_email(self.email.trim()) {
            return Err("Invalid email address".into());
        }
        if self.subject.trim().is_empty() {
            return Err("Subject is required".into());
        }
        if self.message.trim().chars().count() < 10 {
            return Err("Message must be at least 10 characters".into());
        }
        Ok(())
    }
}

/// Render a contact-form submission and send it to the site admin.
pub async fn send_contact_form(
    transport: &dyn MailTransport,
    admin_email: &str,
    form: &ContactForm,
) -> Result<(), MailError> {
    let body = ContactFormEmail {
        name: form.name.trim(),
        email: form.email.trim(),
        subject: form.subject.trim(),
        message: form.message.trim(),
    }
    .render()?;

    let email = Email {
        to: admin_email.to_string(),
        subject: format!("Contact form: {}", form.subject.trim()),
        body,
        template: ContactFormEmail::NAME,
    };
    transport.send(&email).await?;
    tracing::info!(from = %form.email.trim(), "contact form forwarded");
    Ok(())
}

/// `1536` -> `1.50 KB`
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BackupKind;
    use crate::config::Config;
    use crate::db::testing::test_db;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Email>>,
        fail: bool,
    }

    #[async_trait]
    impl MailTransport for Recorder {
        async fn send(&self, email: &Email) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::Transport("relay down".into()));
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    fn settings() -> BackupSettings {
        let mut s = BackupSettings::from_config(&Config::default());
        s.notification_email = Some("ops@example.com".into());
        s.notify_on_success = true;
        s
    }

    fn report(success: bool) -> BackupReport {
        BackupReport {
            success,
            kind: BackupKind::Full,
            database: "newsdesk".into(),
            filename: success.then(|| "backup_newsdesk_full_2026-01-01_00-00-00.sql.gz".into()),
            size: 2048,
            tables: 4,
            rows: 10,
            checksum: None,
            error: (!success).then(|| "No tables found in database".into()),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn human_size_formats_units() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(1536), "1.50 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn success_mail_uses_success_template() {
        let email = BackupNotifier::compose(&settings(), &report(true))
            .unwrap()
            .unwrap();
        assert_eq!(email.template, "backup_success");
        assert_eq!(email.to, "ops@example.com");
        assert!(email.body.contains("backup_newsdesk_full_2026-01-01_00-00-00.sql.gz"));
        assert!(email.body.contains("2.00 KB"));
        assert!(!email.body.contains("SHA-256"));
    }

    #[test]
    fn failure_mail_carries_the_error() {
        let email = BackupNotifier::compose(&settings(), &report(false))
            .unwrap()
            .unwrap();
        assert_eq!(email.template, "backup_failure");
        assert!(email.body.contains("No tables found in database"));
        assert!(email.subject.contains("FAILED"));
    }

    #[test]
    fn flags_and_missing_address_suppress_mail() {
        let mut quiet = settings();
        quiet.notify_on_success = false;
        assert!(BackupNotifier::compose(&quiet, &report(true)).unwrap().is_none());

        quiet.notify_on_failure = false;
        assert!(BackupNotifier::compose(&quiet, &report(false)).unwrap().is_none());

        let mut nowhere = settings();
        nowhere.notification_email = None;
        assert!(BackupNotifier::compose(&nowhere, &report(false)).unwrap().is_none());
    }

    #[tokio::test]
    async fn transport_failures_are_swallowed() {
        let notifier = BackupNotifier::new(Arc::new(Recorder {
            fail: true,
            ..Default::default()
        }));
        assert!(!notifier.notify(&settings(), &report(true)).await);
    }

    #[tokio::test]
    async fn outbox_transport_spools_rows() {
        let (pool, _tmp) = test_db();
        let outbox = Arc::new(OutboxTransport::new(pool.clone()));
        let notifier = BackupNotifier::new(outbox.clone());

        assert!(notifier.notify(&settings(), &report(false)).await);
        let pending = outbox.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].recipient, "ops@example.com");
        assert_eq!(pending[0].template, "backup_failure");
    }

    #[tokio::test]
    async fn contact_form_goes_to_admin() {
        let recorder = Recorder::default();
        let form = ContactForm {
            name: "Dana".into(),
            email: "dana@example.com".into(),
            subject: "Quote".into(),
            message: "Could you send a quote for a redesign?".into(),
        };
        form.validate().unwrap();
        send_contact_form(&recorder, "admin@example.com", &form)
            .await
            .unwrap();

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "admin@example.com");
        assert_eq!(sent[0].template, "contact_form");
        assert!(sent[0].body.contains("dana@example.com"));
    }

    #[test]
    fn contact_form_validation() {
        let mut form = ContactForm {
            name: "Dana".into(),
            email: "nope".into(),
            subject: "Hi".into(),
            message: "long enough message".into(),
        };
        assert!(form.validate().is_err());
        form.email = "dana@example.com".into();
        form.message = "short".into();
        assert!(form.validate().is_err());
    }
}
