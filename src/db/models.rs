use serde::{Deserialize, Serialize};

use crate::auth::policy::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: String,
}

impl User {
    pub const COLUMNS: &'static str = "id, username, email, password_hash, role, created_at";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let role: String = row.get(4)?;
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            role: Role::parse(&role).unwrap_or(Role::User),
            created_at: row.get(5)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientProfile {
    pub id: String,
    pub user_id: String,
    pub company_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMail {
    pub id: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub template: String,
    pub created_at: String,
}

impl OutboundMail {
    pub const COLUMNS: &'static str = "id, recipient, subject, body, template, created_at";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            recipient: row.get(1)?,
            subject: row.get(2)?,
            body: row.get(3)?,
            template: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}
