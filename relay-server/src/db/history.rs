//! Login history: one append-only row per successful authentication

use sqlx::sqlite::SqlitePool;

use crate::db::sql;

/// A recorded login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub id: i64,
    pub login_time: i64,
    pub ip_address: String,
}

type HistoryRow = (i64, i64, String);

impl From<HistoryRow> for HistoryRecord {
    fn from(row: HistoryRow) -> Self {
        Self {
            id: row.0,
            login_time: row.1,
            ip_address: row.2,
        }
    }
}

#[derive(Clone)]
pub struct HistoryDb {
    pool: SqlitePool,
}

impl HistoryDb {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a login record, returning its row id
    ///
    /// # Errors
    ///
    /// `sqlx::Error::RowNotFound` if `login` is not registered.
    pub async fn record_login(
        &self,
        login: &str,
        login_time: i64,
        address: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(sql::SQL_INSERT_HISTORY)
            .bind(login_time)
            .bind(address)
            .bind(login)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(result.last_insert_rowid())
    }

    /// Every recorded login for `login`, oldest first
    pub async fn logins_for(&self, login: &str) -> Result<Vec<HistoryRecord>, sqlx::Error> {
        let rows: Vec<HistoryRow> = sqlx::query_as(sql::SQL_SELECT_HISTORY_FOR_LOGIN)
            .bind(login)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(HistoryRecord::from).collect())
    }
}
