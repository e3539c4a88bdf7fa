use crate::db::models::{DbAccount, timestamp};
use crate::db::schema::SQLITE_INIT;
use crate::error::ChowError;
use crate::types::{Account, is_local_identity, local_identity};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, SqliteExecutor};
use std::str::FromStr;
use tracing::info;

pub type SqlitePool = Pool<Sqlite>;

pub(crate) const ACCOUNT_COLUMNS: &str =
    "id, identity, kind, user_name, password_digest, thumbnail_image";

#[derive(Clone)]
pub struct ChowStorage {
    pool: SqlitePool,
}

impl ChowStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `database_url` and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, ChowError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // Every connection to `:memory:` is its own database, so pin exactly one.
        let pool_opts = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };
        let pool = pool_opts.connect_with(connect_opts).await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        info!(database_url = %database_url, "storage ready");
        Ok(storage)
    }

    pub async fn in_memory() -> Result<Self, ChowError> {
        Self::connect("sqlite::memory:").await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), ChowError> {
        // One statement per query call.
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn account(&self, identity: &str) -> Result<Option<Account>, ChowError> {
        fetch_account(&self.pool, identity).await
    }

    /// Accounts for each known identity; unknown identities are skipped.
    pub async fn accounts(&self, identities: &[String]) -> Result<Vec<Account>, ChowError> {
        if identities.is_empty() {
            return Ok(Vec::new());
        }
        let ids_json = serde_json::to_string(identities)?;
        let rows: Vec<DbAccount> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts
             WHERE identity IN (SELECT value FROM json_each(?))"
        ))
        .bind(ids_json)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(Account::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn account_by_user_name(
        &self,
        user_name: &str,
    ) -> Result<Option<Account>, ChowError> {
        let row: Option<DbAccount> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_name = ?"
        ))
        .bind(user_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::try_from).transpose()?)
    }

    /// Insert a local account under the `local:` identity namespace.
    pub async fn insert_local(
        &self,
        user_name: &str,
        password_digest: &str,
        thumbnail_image: &str,
    ) -> Result<Account, ChowError> {
        let identity = local_identity(user_name);
        sqlx::query(
            r#"INSERT INTO accounts (identity, kind, user_name, password_digest, thumbnail_image, created_at)
               VALUES (?, 'local', ?, ?, ?, ?)"#,
        )
        .bind(&identity)
        .bind(user_name)
        .bind(password_digest)
        .bind(thumbnail_image)
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;
        self.account(&identity)
            .await?
            .ok_or_else(|| ChowError::DatabaseError(sqlx::Error::RowNotFound))
    }

    /// Get-or-insert an identity-only external account.
    ///
    /// Never hands back a local account, whatever the remote id looks like.
    pub async fn ensure_external(&self, identity: &str) -> Result<Account, ChowError> {
        if identity.is_empty() || is_local_identity(identity) {
            return Err(ChowError::IdentityConflict(identity.to_string()));
        }
        sqlx::query(
            r#"INSERT INTO accounts (identity, kind, created_at) VALUES (?, 'external', ?)
               ON CONFLICT(identity) DO NOTHING"#,
        )
        .bind(identity)
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;
        match self.account(identity).await? {
            Some(account @ Account::External(_)) => Ok(account),
            Some(Account::Local(_)) => Err(ChowError::IdentityConflict(identity.to_string())),
            None => Err(ChowError::DatabaseError(sqlx::Error::RowNotFound)),
        }
    }
}

pub(crate) async fn fetch_account<'e>(
    exec: impl SqliteExecutor<'e>,
    identity: &str,
) -> Result<Option<Account>, ChowError> {
    let row: Option<DbAccount> = sqlx::query_as(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE identity = ?"
    ))
    .bind(identity)
    .fetch_optional(exec)
    .await?;
    Ok(row.map(Account::try_from).transpose()?)
}
