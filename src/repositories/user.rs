//! # User Repository
//!
//! Application accounts. Usernames are stored lower-cased. Passwords are
//! kept as `salt:hex(sha256(salt || password))` with a fresh random salt per
//! hash, and compared in constant time.

use chrono::Utc;
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::{apply, non_blank};
use crate::error::CrmError;
use crate::models::{User, UserRole, user};

const MIN_PASSWORD_LEN: usize = 8;

/// Request data for creating a user
#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: UserRole,
}

/// Partial update for a user
#[derive(Debug, Clone, Default)]
pub struct UpdateUserRequest {
    pub email: Option<Option<String>>,
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    /// New plain-text password; re-hashed with a fresh salt
    pub password: Option<String>,
}

/// Repository for user database operations
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create an active user. Fails with `DuplicateKey` if the username is taken.
    pub async fn create(&self, request: CreateUserRequest) -> Result<user::Model, CrmError> {
        let username = normalize_username(&request.username);
        if username.is_empty() {
            return Err(CrmError::validation("Username is required"));
        }
        validate_password(&request.password)?;

        let now = Utc::now().fixed_offset();
        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.clone()),
            password_hash: Set(hash_password(&request.password)),
            email: Set(non_blank(request.email)),
            first_name: Set(non_blank(request.first_name)),
            last_name: Set(non_blank(request.last_name)),
            role: Set(request.role),
            is_active: Set(true),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .map_err(CrmError::on_write("user", username))?;

        tracing::info!(user_id = %user.id, role = ?user.role, "Created user");
        Ok(user)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<user::Model>, CrmError> {
        Ok(User::find_by_id(id).one(&self.db).await?)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<user::Model>, CrmError> {
        Ok(User::find()
            .filter(user::Column::Username.eq(normalize_username(username)))
            .one(&self.db)
            .await?)
    }

    pub async fn list(&self) -> Result<Vec<user::Model>, CrmError> {
        Ok(User::find()
            .order_by_asc(user::Column::Username)
            .all(&self.db)
            .await?)
    }

    pub async fn count(&self) -> Result<u64, CrmError> {
        Ok(User::find().count(&self.db).await?)
    }

    pub async fn update(&self, id: Uuid, request: UpdateUserRequest) -> Result<user::Model, CrmError> {
        let user = User::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CrmError::not_found("user", id))?;

        let password_hash = match request.password {
            Some(password) => {
                validate_password(&password)?;
                Some(hash_password(&password))
            }
            None => None,
        };

        let mut active = user.into_active_model();
        apply(&mut active.email, request.email);
        apply(&mut active.first_name, request.first_name);
        apply(&mut active.last_name, request.last_name);
        apply(&mut active.role, request.role);
        apply(&mut active.is_active, request.is_active);
        apply(&mut active.password_hash, password_hash);
        active.updated_at = Set(Utc::now().fixed_offset());
        Ok(active.update(&self.db).await?)
    }

    pub async fn record_login(&self, id: Uuid) -> Result<user::Model, CrmError> {
        let user = User::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CrmError::not_found("user", id))?;

        let mut active = user.into_active_model();
        active.last_login_at = Set(Some(Utc::now().fixed_offset()));
        Ok(active.update(&self.db).await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, CrmError> {
        let Some(user) = User::find_by_id(id).one(&self.db).await? else {
            return Ok(false);
        };
        user.delete(&self.db).await?;
        Ok(true)
    }

    /// The active user matching the credentials, if any.
    pub async fn verify_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<user::Model>, CrmError> {
        let Some(user) = self.get_by_username(username).await? else {
            return Ok(None);
        };

        if !user.is_active || !password_matches(&user.password_hash, password) {
            tracing::debug!(user_id = %user.id, "Rejected credentials");
            return Ok(None);
        }

        Ok(Some(user))
    }
}

fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

fn validate_password(password: &str) -> Result<(), CrmError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CrmError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill(&mut salt);
    let salt = hex::encode(salt);
    format!("{salt}:{}", digest(&salt, password))
}

fn password_matches(stored: &str, password: &str) -> bool {
    let Some((salt, expected)) = stored.split_once(':') else {
        return false;
    };
    let actual = digest(salt, password);
    actual.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_salted_and_verifiable() {
        let first = hash_password("correct horse");
        let second = hash_password("correct horse");
        assert_ne!(first, second);

        assert!(password_matches(&first, "correct horse"));
        assert!(password_matches(&second, "correct horse"));
        assert!(!password_matches(&first, "wrong horse"));
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!password_matches("no-separator", "anything"));
        assert!(!password_matches("", ""));
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(matches!(
            validate_password("short"),
            Err(CrmError::Validation(_))
        ));
        assert!(validate_password("long enough").is_ok());
    }

    #[test]
    fn usernames_are_case_insensitive() {
        assert_eq!(normalize_username("  Alice "), "alice");
    }
}
