//! Per-client contact lists

use sqlx::sqlite::SqlitePool;

use crate::db::clients::ClientDb;
use crate::db::sql;

/// Result of adding a contact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddContactOutcome {
    Added,
    AlreadyPresent,
    /// Owner or contact is not a registered login
    UnknownLogin,
}

/// Result of removing a contact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveContactOutcome {
    Removed,
    NotPresent,
    UnknownLogin,
}

#[derive(Clone)]
pub struct ContactDb {
    pool: SqlitePool,
    clients: ClientDb,
}

impl ContactDb {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            clients: ClientDb::new(pool.clone()),
            pool,
        }
    }

    async fn resolve_pair(
        &self,
        owner: &str,
        contact: &str,
    ) -> Result<Option<(i64, i64)>, sqlx::Error> {
        let Some(owner_id) = self.clients.id_for(owner).await? else {
            return Ok(None);
        };
        let Some(contact_id) = self.clients.id_for(contact).await? else {
            return Ok(None);
        };
        Ok(Some((owner_id, contact_id)))
    }

    pub async fn add_contact(
        &self,
        owner: &str,
        contact: &str,
    ) -> Result<AddContactOutcome, sqlx::Error> {
        let Some((owner_id, contact_id)) = self.resolve_pair(owner, contact).await? else {
            return Ok(AddContactOutcome::UnknownLogin);
        };

        let result = sqlx::query(sql::SQL_INSERT_CONTACT)
            .bind(owner_id)
            .bind(contact_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            Ok(AddContactOutcome::AlreadyPresent)
        } else {
            Ok(AddContactOutcome::Added)
        }
    }

    pub async fn remove_contact(
        &self,
        owner: &str,
        contact: &str,
    ) -> Result<RemoveContactOutcome, sqlx::Error> {
        let Some((owner_id, contact_id)) = self.resolve_pair(owner, contact).await? else {
            return Ok(RemoveContactOutcome::UnknownLogin);
        };

        let result = sqlx::query(sql::SQL_DELETE_CONTACT)
            .bind(owner_id)
            .bind(contact_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            Ok(RemoveContactOutcome::NotPresent)
        } else {
            Ok(RemoveContactOutcome::Removed)
        }
    }

    /// Contacts of `owner` in the order they were added
    pub async fn list_contacts(&self, owner: &str) -> Result<Vec<String>, sqlx::Error> {
        let Some(owner_id) = self.clients.id_for(owner).await? else {
            return Ok(Vec::new());
        };

        let rows: Vec<(String,)> = sqlx::query_as(sql::SQL_SELECT_CONTACTS)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(login,)| login).collect())
    }
}
