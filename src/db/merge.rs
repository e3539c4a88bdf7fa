//! Statements used while merging two accounts. All of them run on the
//! caller's transaction and are safe to repeat.

use crate::db::models::timestamp;
use crate::error::ChowError;
use chrono::Utc;
use sqlx::SqliteConnection;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookmarkMoves {
    /// Source bookmarks handed over to the destination.
    pub reassigned: u64,
    /// Source bookmarks folded into an identical destination bookmark.
    pub collapsed: u64,
    /// Invitee entries rewritten from source to destination.
    pub invitations: u64,
}

pub(crate) async fn move_bookmarks(
    conn: &mut SqliteConnection,
    source: &str,
    destination: &str,
) -> Result<BookmarkMoves, ChowError> {
    let now = timestamp(Utc::now());

    // Fold source bookmarks that would collide with an existing destination
    // bookmark on (restaurant, note): keep the destination row, union invitees.
    sqlx::query(
        r#"INSERT OR IGNORE INTO bookmark_invitees (bookmark_id, identity)
           SELECT d.id, i.identity
           FROM bookmarks s
           JOIN bookmarks d
             ON d.owner_identity = ?2 AND d.restaurant_id = s.restaurant_id AND d.note = s.note
           JOIN bookmark_invitees i ON i.bookmark_id = s.id
           WHERE s.owner_identity = ?1"#,
    )
    .bind(source)
    .bind(destination)
    .execute(&mut *conn)
    .await?;

    let collapsed = sqlx::query(
        r#"DELETE FROM bookmarks
           WHERE owner_identity = ?1
             AND EXISTS (
               SELECT 1 FROM bookmarks d
               WHERE d.owner_identity = ?2
                 AND d.restaurant_id = bookmarks.restaurant_id
                 AND d.note = bookmarks.note
             )"#,
    )
    .bind(source)
    .bind(destination)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    let reassigned = sqlx::query(
        "UPDATE bookmarks SET owner_identity = ?2, updated_at = ?3 WHERE owner_identity = ?1",
    )
    .bind(source)
    .bind(destination)
    .bind(&now)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    sqlx::query(
        r#"UPDATE bookmarks SET updated_at = ?2
           WHERE id IN (SELECT bookmark_id FROM bookmark_invitees WHERE identity = ?1)"#,
    )
    .bind(source)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"INSERT OR IGNORE INTO bookmark_invitees (bookmark_id, identity)
           SELECT bookmark_id, ?2 FROM bookmark_invitees WHERE identity = ?1"#,
    )
    .bind(source)
    .bind(destination)
    .execute(&mut *conn)
    .await?;

    let invitations = sqlx::query("DELETE FROM bookmark_invitees WHERE identity = ?")
        .bind(source)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    // Nobody is invited to their own bookmark.
    sqlx::query(
        r#"DELETE FROM bookmark_invitees
           WHERE identity = ?1
             AND bookmark_id IN (SELECT id FROM bookmarks WHERE owner_identity = ?1)"#,
    )
    .bind(destination)
    .execute(&mut *conn)
    .await?;

    Ok(BookmarkMoves {
        reassigned,
        collapsed,
        invitations,
    })
}

pub(crate) async fn delete_account(
    conn: &mut SqliteConnection,
    identity: &str,
) -> Result<(), ChowError> {
    sqlx::query("DELETE FROM accounts WHERE identity = ?")
        .bind(identity)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Strip credentials, leaving an identity-only external stub.
pub(crate) async fn demote_account(
    conn: &mut SqliteConnection,
    identity: &str,
) -> Result<(), ChowError> {
    sqlx::query(
        r#"UPDATE accounts SET user_name = NULL, password_digest = NULL, thumbnail_image = NULL
           WHERE identity = ?"#,
    )
    .bind(identity)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn set_credentials(
    conn: &mut SqliteConnection,
    identity: &str,
    user_name: &str,
    password_digest: Option<&str>,
    thumbnail_image: Option<&str>,
) -> Result<(), ChowError> {
    sqlx::query(
        r#"UPDATE accounts SET user_name = ?, password_digest = ?, thumbnail_image = ?
           WHERE identity = ?"#,
    )
    .bind(user_name)
    .bind(password_digest)
    .bind(thumbnail_image)
    .bind(identity)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
