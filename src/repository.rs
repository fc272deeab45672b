use crate::{
    config::Config,
    entities::{TaskList, Todo, User},
};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, types::Json, SqlitePool};

// ids mimic a document-store object id: 12 random bytes rendered as hex
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL DEFAULT (lower(hex(randomblob(12)))),
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    avatar TEXT
);

CREATE TABLE IF NOT EXISTS task_lists (
    id TEXT PRIMARY KEY NOT NULL DEFAULT (lower(hex(randomblob(12)))),
    title TEXT NOT NULL,
    created_at TEXT NOT NULL,
    user_ids TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS todos (
    id TEXT PRIMARY KEY NOT NULL DEFAULT (lower(hex(randomblob(12)))),
    content TEXT NOT NULL,
    is_completed BOOLEAN NOT NULL DEFAULT FALSE,
    task_list_id TEXT NOT NULL
);
"#;

/// Handle on the `users`, `task_lists` and `todos` collections.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &Config) -> Result<Self, sqlx::Error> {
        let mut options = SqlitePoolOptions::new();
        if config.is_in_memory() {
            // every connection to :memory: opens a fresh database
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = options.connect_with(config.connect_options()?).await?;

        let repository = Self::new(pool);
        repository.migrate().await?;
        Ok(repository)
    }

    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    // users

    pub async fn insert_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        avatar: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO users (name, email, password_hash, avatar) VALUES (?, ?, ?, ?) RETURNING *",
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(avatar)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn find_user(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Emails are not unique; the earliest account wins.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE email = ? ORDER BY rowid LIMIT 1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    // task lists

    pub async fn insert_task_list(
        &self,
        title: &str,
        created_at: DateTime<Utc>,
        owner_id: &str,
    ) -> Result<TaskList, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO task_lists (title, created_at, user_ids) VALUES (?, ?, ?) RETURNING *",
        )
        .bind(title)
        .bind(created_at)
        .bind(Json(vec![owner_id.to_string()]))
        .fetch_one(&self.pool)
        .await
    }

    pub async fn find_task_list(&self, id: &str) -> Result<Option<TaskList>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM task_lists WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_task_lists_for_member(
        &self,
        user_id: &str,
    ) -> Result<Vec<TaskList>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM task_lists
             WHERE EXISTS (SELECT 1 FROM json_each(task_lists.user_ids) WHERE json_each.value = ?)
             ORDER BY rowid",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn update_task_list_title(&self, id: &str, title: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE task_lists SET title = ? WHERE id = ?")
            .bind(title)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_task_list(&self, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM task_lists WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Appends to the member array without checking for duplicates.
    pub async fn push_task_list_member(
        &self,
        task_list_id: &str,
        user_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE task_lists SET user_ids = json_insert(user_ids, '$[#]', ?) WHERE id = ?",
        )
        .bind(user_id)
        .bind(task_list_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // todos

    pub async fn insert_todo(
        &self,
        content: &str,
        task_list_id: &str,
    ) -> Result<Todo, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO todos (content, is_completed, task_list_id) VALUES (?, FALSE, ?) RETURNING *",
        )
        .bind(content)
        .bind(task_list_id)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn find_todo(&self, id: &str) -> Result<Option<Todo>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM todos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_todos_for_task_list(
        &self,
        task_list_id: &str,
    ) -> Result<Vec<Todo>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM todos WHERE task_list_id = ? ORDER BY rowid")
            .bind(task_list_id)
            .fetch_all(&self.pool)
            .await
    }

    /// Returns `(completed, total)` for the to-dos referencing a list.
    pub async fn count_todos_for_task_list(
        &self,
        task_list_id: &str,
    ) -> Result<(i64, i64), sqlx::Error> {
        sqlx::query_as(
            "SELECT COALESCE(SUM(is_completed), 0), COUNT(*) FROM todos WHERE task_list_id = ?",
        )
        .bind(task_list_id)
        .fetch_one(&self.pool)
        .await
    }

    /// Only the supplied fields are overwritten.
    pub async fn update_todo(
        &self,
        id: &str,
        content: Option<&str>,
        is_completed: Option<bool>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE todos
             SET content = COALESCE(?, content), is_completed = COALESCE(?, is_completed)
             WHERE id = ?",
        )
        .bind(content)
        .bind(is_completed)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_todo(&self, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
impl Repository {
    /// Row counts of `(users, task_lists, todos)`.
    pub(crate) async fn row_counts(&self) -> (i64, i64, i64) {
        sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM users), (SELECT COUNT(*) FROM task_lists),
                    (SELECT COUNT(*) FROM todos)",
        )
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }
}

#[cfg(test)]
pub(crate) async fn in_memory() -> Repository {
    let config = Config {
        database_uri: "sqlite::memory:".into(),
        database_name: "test".into(),
        jwt_secret: "test-secret".into(),
        port: 0,
    };
    Repository::connect(&config)
        .await
        .expect("in-memory store should open")
}
