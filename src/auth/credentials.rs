use rusqlite::{params, OptionalExtension};
use serde::Deserialize;

use crate::auth::policy::{Actor, Role};
use crate::db::models::{ClientProfile, User};
use crate::db::RepositoryError;
use crate::state::DbPool;

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    fn validate(&self) -> Result<(), RepositoryError> {
        let username = self.username.trim();
        if username.len() < 3 || username.len() > 50 {
            return Err(RepositoryError::Invalid(
                "Username must be between 3 and 50 characters".into(),
            ));
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        {
            return Err(RepositoryError::Invalid(
                "Username may only contain letters, digits, '.', '_' and '-'".into(),
            ));
        }
        if !looks_like_email(self.email.trim()) {
            return Err(RepositoryError::Invalid("Invalid email address".into()));
        }
        if self.password.chars().count() < 8 {
            return Err(RepositoryError::Invalid(
                "Password must be at least 8 characters".into(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn looks_like_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.chars().any(char::is_whitespace)
}

/// Create a plain `user` account.
pub fn register(pool: &DbPool, reg: &Registration, bcrypt_cost: u32) -> Result<User, RepositoryError> {
    reg.validate()?;
    let username = reg.username.trim();
    let email = reg.email.trim().to_lowercase();

    let conn = pool.get()?;
    let taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1 OR email = ?2",
        params![username, email],
        |row| row.get(0),
    )?;
    if taken {
        return Err(RepositoryError::Conflict(
            "Username or email already registered".into(),
        ));
    }

    let password_hash = bcrypt::hash(&reg.password, bcrypt_cost)
        .map_err(|e| RepositoryError::Invalid(format!("Could not hash password: {}", e)))?;
    let id = uuid::Uuid::now_v7().to_string();

    // A concurrent registration can still win between the check and the insert
    match conn.execute(
        "INSERT INTO users (id, username, email, password_hash, role) VALUES (?1, ?2, ?3, ?4, 'user')",
        params![id, username, email, password_hash],
    ) {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            return Err(RepositoryError::Conflict(
                "Username or email already registered".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(user_id = %id, username, "registered new user");

    let user = conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
        params![id],
        User::from_row,
    )?;
    Ok(user)
}

/// Check a username-or-email and password pair.
///
/// Returns `None` for any mismatch so callers cannot tell unknown accounts
/// from wrong passwords.
pub fn verify(pool: &DbPool, login: &str, password: &str) -> Result<Option<User>, RepositoryError> {
    let conn = pool.get()?;
    let login = login.trim();
    let user = conn
        .query_row(
            &format!(
                "SELECT {} FROM users WHERE username = ?1 OR email = ?2",
                User::COLUMNS
            ),
            params![login, login.to_lowercase()],
            User::from_row,
        )
        .optional()?;

    let Some(user) = user else {
        return Ok(None);
    };

    match bcrypt::verify(password, &user.password_hash) {
        Ok(true) => Ok(Some(user)),
        Ok(false) => Ok(None),
        Err(e) => {
            tracing::warn!(user_id = %user.id, "stored password hash unreadable: {}", e);
            Ok(None)
        }
    }
}

/// Build the authorization actor for a user id.
pub fn load_actor(pool: &DbPool, user_id: &str) -> Result<Option<(User, Actor)>, RepositoryError> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
            params![user_id],
            User::from_row,
        )
        .optional()?;

    let Some(user) = user else {
        return Ok(None);
    };

    let client_profile_id: Option<String> = conn
        .query_row(
            "SELECT id FROM client_profiles WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;

    let actor = Actor {
        user_id: user.id.clone(),
        role: user.role,
        client_profile_id,
    };
    Ok(Some((user, actor)))
}

/// Change a user's role; used when promoting staff or onboarding clients.
pub fn set_role(pool: &DbPool, username: &str, role: Role) -> Result<(), RepositoryError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE users SET role = ?1 WHERE username = ?2",
        params![role.as_str(), username],
    )?;
    if rows == 0 {
        return Err(RepositoryError::NotFound(format!("user {}", username)));
    }
    tracing::info!(username, role = %role, "changed user role");
    Ok(())
}

/// Attach a client profile to a user and make them a client.
pub fn create_client_profile(
    pool: &DbPool,
    username: &str,
    company_name: &str,
) -> Result<ClientProfile, RepositoryError> {
    let company_name = company_name.trim();
    if company_name.is_empty() {
        return Err(RepositoryError::Invalid("Company name is required".into()));
    }

    let conn = pool.get()?;
    let user_id: String = conn
        .query_row(
            "SELECT id FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound(format!("user {}", username)))?;

    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM client_profiles WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    if exists {
        return Err(RepositoryError::Conflict(
            "User already has a client profile".into(),
        ));
    }

    let profile = ClientProfile {
        id: uuid::Uuid::now_v7().to_string(),
        user_id,
        company_name: company_name.to_string(),
    };
    conn.execute(
        "INSERT INTO client_profiles (id, user_id, company_name) VALUES (?1, ?2, ?3)",
        params![profile.id, profile.user_id, profile.company_name],
    )?;
    conn.execute(
        "UPDATE users SET role = 'client' WHERE id = ?1 AND role = 'user'",
        params![profile.user_id],
    )?;
    tracing::info!(username, profile_id = %profile.id, "created client profile");
    Ok(profile)
}
