//! Credential store: registered clients and their handshake key material

use chrono::Utc;
use relay_common::auth::{self, AUTH_KEY_LENGTH, AuthKey};
use relay_common::validators::{self, InfoError, LoginError};
use sqlx::sqlite::SqlitePool;
use thiserror::Error;

use super::password::{self, PasswordError};
use crate::db::sql;

/// A registered client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub id: i64,
    pub login: String,
    pub info: String,
    pub created_at: i64,
}

/// Row type for client queries
type ClientRow = (i64, String, String, String, i64);

/// What the authenticator needs to challenge a client
#[derive(Clone)]
pub struct AuthMaterial {
    pub client_id: i64,
    pub salt: String,
    pub key: AuthKey,
}

impl std::fmt::Debug for AuthMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthMaterial")
            .field("client_id", &self.client_id)
            .field("salt", &self.salt)
            .field("key", &"<REDACTED>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("login '{0}' is already registered")]
    DuplicateLogin(String),
    #[error("login '{0}' is not registered")]
    UnknownLogin(String),
    #[error("invalid login: {0:?}")]
    InvalidLogin(LoginError),
    #[error("invalid info: {0:?}")]
    InvalidInfo(InfoError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error("key derivation failed: {0}")]
    KeyDerivation(#[from] auth::AuthError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Stored secrets for one password: PHC hash plus handshake salt and key
struct Secrets {
    password_hash: String,
    salt: String,
    key: AuthKey,
}

/// Database access for client records
#[derive(Clone)]
pub struct ClientDb {
    pool: SqlitePool,
    fast: bool,
}

impl ClientDb {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, fast: false }
    }

    /// Client store that writes `$FAST$` hashes and salts (tests only)
    pub fn with_fast_hashing(pool: SqlitePool) -> Self {
        Self { pool, fast: true }
    }

    fn derive_secrets(&self, password: &str) -> Result<Secrets, CredentialError> {
        let password_hash = password::hash_password(password, self.fast)?;
        let salt = auth::generate_salt(self.fast);
        let key = auth::derive_auth_key(password, &salt)?;
        Ok(Secrets {
            password_hash,
            salt,
            key,
        })
    }

    /// Register a new client
    ///
    /// # Errors
    ///
    /// `CredentialError::DuplicateLogin` if the login exists, including when a
    /// concurrent registration wins the race to the UNIQUE constraint.
    pub async fn register(
        &self,
        login: &str,
        password: &str,
        info: &str,
    ) -> Result<ClientRecord, CredentialError> {
        validators::validate_login(login).map_err(CredentialError::InvalidLogin)?;
        validators::validate_info(info).map_err(CredentialError::InvalidInfo)?;

        if self.exists(login).await? {
            return Err(CredentialError::DuplicateLogin(login.to_string()));
        }

        let secrets = self.derive_secrets(password)?;
        let created_at = Utc::now().timestamp_millis();

        let result = sqlx::query(sql::SQL_INSERT_CLIENT)
            .bind(login)
            .bind(&secrets.password_hash)
            .bind(info)
            .bind(&secrets.salt)
            .bind(secrets.key.as_slice())
            .bind(created_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => Ok(ClientRecord {
                id: done.last_insert_rowid(),
                login: login.to_string(),
                info: info.to_string(),
                created_at,
            }),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(CredentialError::DuplicateLogin(login.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check a password for a login
    ///
    /// Unknown logins verify as `false`.
    pub async fn verify(&self, login: &str, password: &str) -> Result<bool, CredentialError> {
        let hash: Option<(String,)> = sqlx::query_as(sql::SQL_SELECT_PASSWORD_HASH)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;

        match hash {
            Some((hash,)) => Ok(password::verify_password(password, &hash)?),
            None => Ok(false),
        }
    }

    /// Replace a client's password, rewriting hash, salt and key together
    pub async fn rotate(&self, login: &str, new_password: &str) -> Result<(), CredentialError> {
        let secrets = self.derive_secrets(new_password)?;

        let result = sqlx::query(sql::SQL_UPDATE_CLIENT_PASSWORD)
            .bind(&secrets.password_hash)
            .bind(&secrets.salt)
            .bind(secrets.key.as_slice())
            .bind(login)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CredentialError::UnknownLogin(login.to_string()));
        }
        Ok(())
    }

    /// Handshake material for a login, if registered
    pub async fn auth_material(&self, login: &str) -> Result<Option<AuthMaterial>, sqlx::Error> {
        let row: Option<(i64, String, Vec<u8>)> = sqlx::query_as(sql::SQL_SELECT_AUTH_MATERIAL)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;

        let Some((client_id, salt, key_bytes)) = row else {
            return Ok(None);
        };

        let key: AuthKey = key_bytes.try_into().map_err(|bytes: Vec<u8>| {
            sqlx::Error::Decode(
                format!(
                    "auth_key for '{}' is {} bytes, expected {}",
                    login,
                    bytes.len(),
                    AUTH_KEY_LENGTH
                )
                .into(),
            )
        })?;

        Ok(Some(AuthMaterial {
            client_id,
            salt,
            key,
        }))
    }

    pub async fn get(&self, login: &str) -> Result<Option<ClientRecord>, sqlx::Error> {
        let row: Option<ClientRow> = sqlx::query_as(sql::SQL_SELECT_CLIENT_BY_LOGIN)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(id, login, _hash, info, created_at)| ClientRecord {
            id,
            login,
            info,
            created_at,
        }))
    }

    pub async fn exists(&self, login: &str) -> Result<bool, sqlx::Error> {
        Ok(self.id_for(login).await?.is_some())
    }

    pub(crate) async fn id_for(&self, login: &str) -> Result<Option<i64>, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(sql::SQL_SELECT_CLIENT_ID)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(id,)| id))
    }

    /// All registered logins, alphabetically
    pub async fn logins(&self) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as(sql::SQL_SELECT_ALL_LOGINS)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(login,)| login).collect())
    }
}
