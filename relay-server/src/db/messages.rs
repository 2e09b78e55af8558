//! Append-only log of relayed messages

use relay_common::protocol::HistoryEntry;
use sqlx::sqlite::SqlitePool;

use crate::db::sql;

/// A persisted message; an empty `receiver` marks a broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: i64,
    pub sender: String,
    pub receiver: String,
    pub body: String,
    pub timestamp: i64,
}

type MessageRow = (i64, String, String, String, i64);

impl From<MessageRow> for MessageRecord {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.0,
            sender: row.1,
            receiver: row.2,
            body: row.3,
            timestamp: row.4,
        }
    }
}

impl From<MessageRecord> for HistoryEntry {
    fn from(record: MessageRecord) -> Self {
        Self {
            sender: record.sender,
            receiver: record.receiver,
            body: record.body,
            timestamp: record.timestamp,
        }
    }
}

#[derive(Clone)]
pub struct MessageDb {
    pool: SqlitePool,
}

impl MessageDb {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a message and return its id once the write has committed
    pub async fn record_message(
        &self,
        sender: &str,
        receiver: &str,
        body: &str,
        timestamp: i64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(sql::SQL_INSERT_MESSAGE)
            .bind(sender)
            .bind(receiver)
            .bind(body)
            .bind(timestamp)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Messages exchanged between `a` and `b` in either direction, oldest first
    ///
    /// Symmetric: `messages_between(a, b) == messages_between(b, a)`.
    pub async fn messages_between(
        &self,
        a: &str,
        b: &str,
    ) -> Result<Vec<MessageRecord>, sqlx::Error> {
        let rows: Vec<MessageRow> = sqlx::query_as(sql::SQL_SELECT_MESSAGES_BETWEEN)
            .bind(a)
            .bind(b)
            .bind(b)
            .bind(a)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(MessageRecord::from).collect())
    }

    /// Every broadcast, oldest first
    pub async fn broadcasts(&self) -> Result<Vec<MessageRecord>, sqlx::Error> {
        let rows: Vec<MessageRow> = sqlx::query_as(sql::SQL_SELECT_BROADCASTS)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(MessageRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::create_test_db;

    #[tokio::test]
    async fn test_messages_between_is_ordered_and_symmetric() {
        let db = MessageDb::new(create_test_db().await);

        db.record_message("alice", "bob", "second", 200).await.unwrap();
        db.record_message("bob", "alice", "first", 100).await.unwrap();
        db.record_message("alice", "carol", "elsewhere", 150)
            .await
            .unwrap();
        db.record_message("bob", "alice", "third", 300).await.unwrap();

        let ab = db.messages_between("alice", "bob").await.unwrap();
        let ba = db.messages_between("bob", "alice").await.unwrap();

        let bodies: Vec<&str> = ab.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second", "third"]);
        assert_eq!(ab, ba);
        assert!(ab.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_equal_timestamps_keep_insertion_order() {
        let db = MessageDb::new(create_test_db().await);

        for body in ["one", "two", "three"] {
            db.record_message("alice", "bob", body, 42).await.unwrap();
        }

        let bodies: Vec<String> = db
            .messages_between("bob", "alice")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.body)
            .collect();
        assert_eq!(bodies, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_broadcasts_not_in_pair_history() {
        let db = MessageDb::new(create_test_db().await);

        db.record_message("alice", "", "hello all", 10).await.unwrap();
        db.record_message("alice", "bob", "hi bob", 20).await.unwrap();

        assert_eq!(db.messages_between("alice", "bob").await.unwrap().len(), 1);
        let broadcasts = db.broadcasts().await.unwrap();
        assert_eq!(broadcasts.len(), 1);
        assert_eq!(broadcasts[0].body, "hello all");
    }

    #[tokio::test]
    async fn test_record_returns_increasing_ids() {
        let db = MessageDb::new(create_test_db().await);
        let first = db.record_message("a", "b", "x", 1).await.unwrap();
        let second = db.record_message("a", "b", "y", 1).await.unwrap();
        assert!(second > first);
    }
}
