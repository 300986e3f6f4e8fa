// SQLite-backed account store.
//
// Tables:
// - accounts: the standing flags the moderation checks read

use crate::core::moderation::{Account, AccountId, AccountStore, ModerationError};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteAccountStore {
    pool: Pool<Sqlite>,
}

impl SqliteAccountStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL,
                email_confirmed BOOLEAN NOT NULL DEFAULT 0,
                disposable_email BOOLEAN NOT NULL DEFAULT 0,
                banned BOOLEAN NOT NULL DEFAULT 0,
                trust_level INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(())
    }

    /// Insert or replace an account's flags.
    pub async fn upsert_account(&self, account: &Account) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, email, email_confirmed, disposable_email, banned, trust_level)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                email_confirmed = excluded.email_confirmed,
                disposable_email = excluded.disposable_email,
                banned = excluded.banned,
                trust_level = excluded.trust_level
            "#,
        )
        .bind(account.id as i64)
        .bind(&account.email)
        .bind(account.email_confirmed)
        .bind(account.disposable_email)
        .bind(account.banned)
        .bind(account.trust_level as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn get_account(
        &self,
        account_id: AccountId,
    ) -> Result<Option<Account>, ModerationError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, email_confirmed, disposable_email, banned, trust_level
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(account_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(row.map(|row| Account {
            id: row.get::<i64, _>("id") as u64,
            email: row.get("email"),
            email_confirmed: row.get("email_confirmed"),
            disposable_email: row.get("disposable_email"),
            banned: row.get("banned"),
            trust_level: row.get::<i64, _>("trust_level") as u32,
        }))
    }

    async fn set_banned(&self, account_id: AccountId) -> Result<(), ModerationError> {
        let result = sqlx::query("UPDATE accounts SET banned = 1 WHERE id = ?")
            .bind(account_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(ModerationError::AccountNotFound(account_id));
        }
        Ok(())
    }
}
