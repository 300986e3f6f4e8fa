// SQLite-backed script store.
//
// Tables:
// - scripts: one row per published script, holding its current identity
// - script_versions: every accepted version of the code

use crate::core::moderation::{AccountId, ModerationError, ScriptStore};
use crate::core::submission::{ScriptId, Submission};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};

fn storage_error(e: impl std::fmt::Display) -> ModerationError {
    ModerationError::StorageError(e.to_string())
}

pub struct SqliteScriptStore {
    pool: Pool<Sqlite>,
}

impl SqliteScriptStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scripts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                kind TEXT NOT NULL,
                language TEXT NOT NULL,
                namespace TEXT,
                license TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS script_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                script_id INTEGER NOT NULL,
                version TEXT,
                code TEXT NOT NULL,
                metadata TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_script_versions_script
                ON script_versions(script_id);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }
}

#[async_trait]
impl ScriptStore for SqliteScriptStore {
    async fn owner_of(&self, script_id: ScriptId) -> Result<Option<AccountId>, ModerationError> {
        let row = sqlx::query("SELECT author_id FROM scripts WHERE id = ?")
            .bind(script_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(row.map(|row| row.get::<i64, _>("author_id") as u64))
    }

    async fn publish(
        &self,
        submission: &Submission,
        author_id: AccountId,
    ) -> Result<ScriptId, ModerationError> {
        let now = Utc::now().to_rfc3339();
        let metadata = submission
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(storage_error)?;

        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let script_id = match submission.script_id {
            Some(id) => {
                let result = sqlx::query(
                    r#"
                    UPDATE scripts SET
                        name = ?,
                        description = ?,
                        kind = ?,
                        language = ?,
                        namespace = ?,
                        license = ?,
                        updated_at = ?
                    WHERE id = ? AND author_id = ?
                    "#,
                )
                .bind(&submission.name)
                .bind(&submission.description)
                .bind(submission.kind.to_string())
                .bind(submission.code.language.to_string())
                .bind(submission.namespace())
                .bind(submission.license())
                .bind(&now)
                .bind(id as i64)
                .bind(author_id as i64)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;

                if result.rows_affected() == 0 {
                    return Err(ModerationError::ScriptNotOwned(id, author_id));
                }
                id
            }
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO scripts (author_id, name, description, kind, language,
                                         namespace, license, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(author_id as i64)
                .bind(&submission.name)
                .bind(&submission.description)
                .bind(submission.kind.to_string())
                .bind(submission.code.language.to_string())
                .bind(submission.namespace())
                .bind(submission.license())
                .bind(&now)
                .bind(&now)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
                result.last_insert_rowid() as u64
            }
        };

        sqlx::query(
            r#"
            INSERT INTO script_versions (script_id, version, code, metadata, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(script_id as i64)
        .bind(submission.version())
        .bind(&submission.code.text)
        .bind(metadata)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        Ok(script_id)
    }

    async fn delete_content(
        &self,
        script_id: Option<ScriptId>,
        author_id: AccountId,
    ) -> Result<(), ModerationError> {
        let Some(id) = script_id else {
            return Ok(());
        };

        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let result = sqlx::query("DELETE FROM scripts WHERE id = ? AND author_id = ?")
            .bind(id as i64)
            .bind(author_id as i64)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        if result.rows_affected() > 0 {
            sqlx::query("DELETE FROM script_versions WHERE script_id = ?")
                .bind(id as i64)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
        }

        tx.commit().await.map_err(storage_error)?;
        Ok(())
    }
}
