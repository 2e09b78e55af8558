//! Database module for SQLite persistence
//!
//! Every write awaits its commit before returning. File databases run in WAL
//! mode with `synchronous = FULL` so a returned write survives a crash.

pub mod clients;
pub mod contacts;
pub mod history;
pub mod messages;
mod password;
pub mod sql;

#[cfg(test)]
pub mod testing;

pub use clients::{AuthMaterial, ClientDb, ClientRecord, CredentialError};
pub use contacts::{AddContactOutcome, ContactDb, RemoveContactOutcome};
pub use history::{HistoryDb, HistoryRecord};
pub use messages::{MessageDb, MessageRecord};
pub use password::{PasswordError, hash_password, verify_password};

use std::path::{Path, PathBuf};

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::constants::{DATA_DIR_NAME, DATABASE_FILENAME, MAX_DB_CONNECTIONS};

/// All persistence handles, cheap to clone (the pool is reference-counted)
#[derive(Clone)]
pub struct Database {
    pub clients: ClientDb,
    pub history: HistoryDb,
    pub contacts: ContactDb,
    pub messages: MessageDb,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            clients: ClientDb::new(pool.clone()),
            history: HistoryDb::new(pool.clone()),
            contacts: ContactDb::new(pool.clone()),
            messages: MessageDb::new(pool),
        }
    }

    /// Database whose credential store uses fast test hashing
    pub fn with_fast_hashing(pool: SqlitePool) -> Self {
        Self {
            clients: ClientDb::with_fast_hashing(pool.clone()),
            ..Self::new(pool)
        }
    }
}

/// Platform default database location, e.g. `~/.local/share/relayd/relay.db`
pub fn default_database_path() -> Result<PathBuf, String> {
    let data_dir =
        dirs::data_dir().ok_or_else(|| "could not determine platform data directory".to_string())?;
    Ok(data_dir.join(DATA_DIR_NAME).join(DATABASE_FILENAME))
}

/// Open (creating if needed) the database at `path` and run migrations
pub async fn init_db(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_DB_CONNECTIONS)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
