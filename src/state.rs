use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::csrf::CsrfPolicy;
use crate::auth::remember::RememberTokens;
use crate::comments::CommentWorkflow;
use crate::config::Config;
use crate::moderation::ProjectWorkflow;
use crate::notify::{MailTransport, OutboxTransport};
use crate::tickets::TicketWorkflow;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub csrf: CsrfPolicy,
    pub remember: RememberTokens,
    pub mailer: Arc<dyn MailTransport>,
    pub projects: ProjectWorkflow,
    pub comments: CommentWorkflow,
    pub tickets: TicketWorkflow,
}

impl AppState {
    /// Wire up the services for a pool and config, spooling mail to the outbox.
    pub fn new(db: DbPool, config: Config) -> Self {
        let mailer: Arc<dyn MailTransport> = Arc::new(OutboxTransport::new(db.clone()));
        Self::with_mailer(db, config, mailer)
    }

    pub fn with_mailer(db: DbPool, config: Config, mailer: Arc<dyn MailTransport>) -> Self {
        let csrf = CsrfPolicy::new(
            config.auth.csrf_session_keys.clone(),
            config.auth.csrf_ttl_minutes,
        );
        let remember = RememberTokens::new(db.clone(), config.auth.remember_days);
        Self {
            projects: ProjectWorkflow::sqlite(db.clone()),
            comments: CommentWorkflow::sqlite(db.clone()),
            tickets: TicketWorkflow::sqlite(db.clone()),
            db,
            config,
            csrf,
            remember,
            mailer,
        }
    }
}
