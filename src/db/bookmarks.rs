use crate::db::models::{DbBookmark, parse_timestamp, timestamp};
use crate::db::sqlite::ChowStorage;
use crate::error::ChowError;
use crate::types::{Bookmark, BookmarkKey};
use chrono::Utc;
use sqlx::Row;
use std::collections::HashMap;

const BOOKMARK_COLUMNS: &str = "id, owner_identity, restaurant_id, note, updated_at";

impl ChowStorage {
    /// Get-or-insert on the (owner, restaurant, note) triple.
    pub async fn insert_bookmark_if_absent(
        &self,
        owner: &str,
        restaurant_id: &str,
        note: &str,
    ) -> Result<Bookmark, ChowError> {
        sqlx::query(
            r#"INSERT INTO bookmarks (owner_identity, restaurant_id, note, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(owner_identity, restaurant_id, note) DO NOTHING"#,
        )
        .bind(owner)
        .bind(restaurant_id)
        .bind(note)
        .bind(timestamp(Utc::now()))
        .execute(self.pool())
        .await?;

        let row: DbBookmark = sqlx::query_as(&format!(
            "SELECT {BOOKMARK_COLUMNS} FROM bookmarks
             WHERE owner_identity = ? AND restaurant_id = ? AND note = ?"
        ))
        .bind(owner)
        .bind(restaurant_id)
        .bind(note)
        .fetch_one(self.pool())
        .await?;
        Ok(self.attach_invitees(vec![row]).await?.remove(0))
    }

    pub async fn bookmark(&self, key: BookmarkKey) -> Result<Option<Bookmark>, ChowError> {
        let row: Option<DbBookmark> = sqlx::query_as(&format!(
            "SELECT {BOOKMARK_COLUMNS} FROM bookmarks WHERE id = ?"
        ))
        .bind(key)
        .fetch_optional(self.pool())
        .await?;
        match row {
            Some(row) => Ok(self.attach_invitees(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    pub async fn delete_bookmark(&self, key: BookmarkKey) -> Result<bool, ChowError> {
        let done = sqlx::query("DELETE FROM bookmarks WHERE id = ?")
            .bind(key)
            .execute(self.pool())
            .await?;
        Ok(done.rows_affected() > 0)
    }

    /// Most recently modified first.
    pub async fn bookmarks_by_owner(
        &self,
        owner: &str,
        limit: i64,
    ) -> Result<Vec<Bookmark>, ChowError> {
        let rows: Vec<DbBookmark> = sqlx::query_as(&format!(
            "SELECT {BOOKMARK_COLUMNS} FROM bookmarks
             WHERE owner_identity = ?
             ORDER BY updated_at DESC, id DESC LIMIT ?"
        ))
        .bind(owner)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        self.attach_invitees(rows).await
    }

    /// Bookmarks listing `identity` as an invitee, most recently modified first.
    pub async fn bookmarks_by_invitee(
        &self,
        identity: &str,
        limit: i64,
    ) -> Result<Vec<Bookmark>, ChowError> {
        let rows: Vec<DbBookmark> = sqlx::query_as(
            r#"SELECT b.id, b.owner_identity, b.restaurant_id, b.note, b.updated_at
               FROM bookmarks b
               JOIN bookmark_invitees i ON i.bookmark_id = b.id
               WHERE i.identity = ?
               ORDER BY b.updated_at DESC, b.id DESC LIMIT ?"#,
        )
        .bind(identity)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        self.attach_invitees(rows).await
    }

    /// Replace the invitee list in one transaction and touch the bookmark.
    pub async fn replace_invitees(
        &self,
        key: BookmarkKey,
        identities: &[String],
    ) -> Result<(), ChowError> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM bookmark_invitees WHERE bookmark_id = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;
        for identity in identities {
            sqlx::query(
                "INSERT OR IGNORE INTO bookmark_invitees (bookmark_id, identity) VALUES (?, ?)",
            )
            .bind(key)
            .bind(identity)
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query("UPDATE bookmarks SET updated_at = ? WHERE id = ?")
            .bind(timestamp(Utc::now()))
            .bind(key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn attach_invitees(&self, rows: Vec<DbBookmark>) -> Result<Vec<Bookmark>, ChowError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let invitee_rows = sqlx::query(
            r#"SELECT bookmark_id, identity FROM bookmark_invitees
               WHERE bookmark_id IN (SELECT value FROM json_each(?))
               ORDER BY rowid"#,
        )
        .bind(serde_json::to_string(&ids)?)
        .fetch_all(self.pool())
        .await?;

        let mut invitees: HashMap<i64, Vec<String>> = HashMap::new();
        for row in invitee_rows {
            let bookmark_id: i64 = row.try_get("bookmark_id")?;
            let identity: String = row.try_get("identity")?;
            invitees.entry(bookmark_id).or_default().push(identity);
        }

        rows.into_iter()
            .map(|row| -> Result<Bookmark, ChowError> {
                Ok(Bookmark {
                    key: row.id,
                    invitees: invitees.remove(&row.id).unwrap_or_default(),
                    updated_at: parse_timestamp(&row.updated_at)?,
                    owner: row.owner_identity,
                    restaurant_id: row.restaurant_id,
                    note: row.note,
                })
            })
            .collect()
    }
}
