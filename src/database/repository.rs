use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::debug;

use super::{AuthSession, ChatSession, ChatTurn, DbPool, FileRecord, PasswordResetToken, User};

pub struct Repository {
    pool: DbPool,
}

impl Repository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    // ---- users ----------------------------------------------------

    pub async fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (username, email, password_hash, active, created_at)
               VALUES ($1, $2, $3, true, now())
               RETURNING id, username, email, password_hash, active, created_at"#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(self.pool.get_pool())
        .await?;

        Ok(user)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, active, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, active, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(user)
    }

    pub async fn get_user_by_id(&self, user_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, active, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(user)
    }

    pub async fn update_user_password(&self, user_id: i64, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(self.pool.get_pool())
            .await?;

        Ok(())
    }

    // ---- auth sessions ---------------------------------------------

    pub async fn create_auth_session(
        &self,
        token: &str,
        user_id: i64,
        ttl: Duration,
    ) -> Result<AuthSession> {
        let expires_at = Utc::now() + ttl;

        let session = sqlx::query_as::<_, AuthSession>(
            r#"INSERT INTO auth_sessions (token, user_id, created_at, expires_at)
               VALUES ($1, $2, now(), $3)
               RETURNING token, user_id, created_at, expires_at"#,
        )
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(self.pool.get_pool())
        .await?;

        Ok(session)
    }

    pub async fn get_auth_session(&self, token: &str) -> Result<Option<AuthSession>> {
        let session = sqlx::query_as::<_, AuthSession>(
            "SELECT token, user_id, created_at, expires_at FROM auth_sessions WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(session)
    }

    pub async fn delete_auth_session(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE token = $1")
            .bind(token)
            .execute(self.pool.get_pool())
            .await?;

        Ok(())
    }

    // ---- password reset ---------------------------------------------

    pub async fn create_reset_token(
        &self,
        code: &str,
        user_id: i64,
        ttl: Duration,
    ) -> Result<PasswordResetToken> {
        let expires_at = Utc::now() + ttl;

        let token = sqlx::query_as::<_, PasswordResetToken>(
            r#"INSERT INTO password_reset_tokens (code, user_id, created_at, expires_at, used)
               VALUES ($1, $2, now(), $3, false)
               RETURNING code, user_id, created_at, expires_at, used"#,
        )
        .bind(code)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(self.pool.get_pool())
        .await?;

        Ok(token)
    }

    pub async fn get_reset_token(&self, code: &str) -> Result<Option<PasswordResetToken>> {
        let token = sqlx::query_as::<_, PasswordResetToken>(
            "SELECT code, user_id, created_at, expires_at, used FROM password_reset_tokens WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(token)
    }

    pub async fn mark_reset_token_used(&self, code: &str) -> Result<()> {
        sqlx::query("UPDATE password_reset_tokens SET used = true WHERE code = $1")
            .bind(code)
            .execute(self.pool.get_pool())
            .await?;

        Ok(())
    }

    // ---- chat sessions ---------------------------------------------

    pub async fn create_chat_session(
        &self,
        id: &str,
        user_id: i64,
        title: &str,
    ) -> Result<ChatSession> {
        let session = sqlx::query_as::<_, ChatSession>(
            r#"INSERT INTO chat_sessions (id, user_id, title, message_count, created_at, updated_at)
               VALUES ($1, $2, $3, 0, now(), now())
               RETURNING id, user_id, title, message_count, created_at, updated_at"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(title)
        .fetch_one(self.pool.get_pool())
        .await?;

        Ok(session)
    }

    pub async fn get_chat_session(&self, id: &str, user_id: i64) -> Result<Option<ChatSession>> {
        let session = sqlx::query_as::<_, ChatSession>(
            r#"SELECT id, user_id, title, message_count, created_at, updated_at
               FROM chat_sessions WHERE id = $1 AND user_id = $2"#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(session)
    }

    pub async fn get_chat_sessions(&self, user_id: i64) -> Result<Vec<ChatSession>> {
        let sessions = sqlx::query_as::<_, ChatSession>(
            r#"SELECT id, user_id, title, message_count, created_at, updated_at
               FROM chat_sessions WHERE user_id = $1 ORDER BY updated_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(self.pool.get_pool())
        .await?;

        Ok(sessions)
    }

    pub async fn delete_chat_session(&self, id: &str, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM chat_sessions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool.get_pool())
            .await?;

        Ok(())
    }

    /// Bump `message_count` by `increment` and optionally overwrite the
    /// title (set on the first user turn of a session, per conversation
    /// convention).
    pub async fn update_chat_session(
        &self,
        id: &str,
        title: Option<&str>,
        increment: i32,
    ) -> Result<()> {
        if let Some(title) = title {
            sqlx::query(
                r#"UPDATE chat_sessions
                   SET title = $1, message_count = message_count + $2, updated_at = now()
                   WHERE id = $3"#,
            )
            .bind(title)
            .bind(increment)
            .bind(id)
            .execute(self.pool.get_pool())
            .await?;
        } else {
            sqlx::query(
                r#"UPDATE chat_sessions
                   SET message_count = message_count + $1, updated_at = now()
                   WHERE id = $2"#,
            )
            .bind(increment)
            .bind(id)
            .execute(self.pool.get_pool())
            .await?;
        }

        Ok(())
    }

    pub async fn save_chat_turn(&self, session_id: &str, role: &str, content: &str) -> Result<ChatTurn> {
        let turn = sqlx::query_as::<_, ChatTurn>(
            r#"INSERT INTO chat_turns (session_id, role, content, created_at)
               VALUES ($1, $2, $3, now())
               RETURNING id, session_id, role, content, created_at"#,
        )
        .bind(session_id)
        .bind(role)
        .bind(content)
        .fetch_one(self.pool.get_pool())
        .await?;

        Ok(turn)
    }

    pub async fn get_session_messages(&self, session_id: &str) -> Result<Vec<ChatTurn>> {
        let turns = sqlx::query_as::<_, ChatTurn>(
            r#"SELECT id, session_id, role, content, created_at
               FROM chat_turns WHERE session_id = $1 ORDER BY created_at ASC"#,
        )
        .bind(session_id)
        .fetch_all(self.pool.get_pool())
        .await?;

        Ok(turns)
    }

    // ---- files ----------------------------------------------------

    pub async fn save_file_record(
        &self,
        user_id: i64,
        filename: &str,
        page_count: i32,
        chunk_count: i32,
    ) -> Result<FileRecord> {
        let record = sqlx::query_as::<_, FileRecord>(
            r#"INSERT INTO file_records (user_id, filename, page_count, chunk_count, uploaded_at)
               VALUES ($1, $2, $3, $4, now())
               ON CONFLICT (user_id, filename) DO UPDATE
                 SET page_count = EXCLUDED.page_count,
                     chunk_count = EXCLUDED.chunk_count,
                     uploaded_at = now()
               RETURNING id, user_id, filename, page_count, chunk_count, uploaded_at"#,
        )
        .bind(user_id)
        .bind(filename)
        .bind(page_count)
        .bind(chunk_count)
        .fetch_one(self.pool.get_pool())
        .await?;

        debug!("recorded file {} for user {}", filename, user_id);
        Ok(record)
    }

    pub async fn get_user_files(&self, user_id: i64) -> Result<Vec<FileRecord>> {
        let files = sqlx::query_as::<_, FileRecord>(
            r#"SELECT id, user_id, filename, page_count, chunk_count, uploaded_at
               FROM file_records WHERE user_id = $1 ORDER BY uploaded_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(self.pool.get_pool())
        .await?;

        Ok(files)
    }

    pub async fn get_user_file(&self, user_id: i64, filename: &str) -> Result<Option<FileRecord>> {
        let file = sqlx::query_as::<_, FileRecord>(
            r#"SELECT id, user_id, filename, page_count, chunk_count, uploaded_at
               FROM file_records WHERE user_id = $1 AND filename = $2"#,
        )
        .bind(user_id)
        .bind(filename)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(file)
    }

    pub async fn delete_user_file(&self, user_id: i64, filename: &str) -> Result<()> {
        sqlx::query("DELETE FROM file_records WHERE user_id = $1 AND filename = $2")
            .bind(user_id)
            .bind(filename)
            .execute(self.pool.get_pool())
            .await?;

        Ok(())
    }

    pub async fn clear_user_files(&self, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM file_records WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool.get_pool())
            .await?;

        Ok(())
    }
}
