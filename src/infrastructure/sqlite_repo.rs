use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::{SqlitePoolOptions, SqliteRow}, Pool, Row, Sqlite};

use crate::domain::{
    repository::TodoRepository,
    todo::{CreateTodo, Todo, TodoId, UpdateTodo},
};

const COLUMNS: &str = "id, title, description, completed, created_at";

#[derive(Clone)]
pub struct SqliteTodoRepository {
    pool: Arc<Pool<Sqlite>>,
}

impl SqliteTodoRepository {
    pub async fn connect(database_url: &str) -> Result<Self> {
        // Every in-memory connection is its own database; pin the pool to one.
        let options = if is_memory_url(database_url) {
            SqlitePoolOptions::new().max_connections(1).idle_timeout(None).max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = options
            .connect(database_url)
            .await
            .with_context(|| format!("connecting to {database_url}"))?;
        Ok(Self { pool: Arc::new(pool) })
    }
}

pub fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

#[async_trait]
impl TodoRepository for SqliteTodoRepository {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS todos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL CHECK (length(title) > 0),
                description TEXT NOT NULL DEFAULT '',
                completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&*self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS todos_created_at ON todos (created_at DESC, id DESC)")
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    async fn create(&self, input: CreateTodo) -> Result<Todo> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO todos (title, description, completed, created_at)
             VALUES (?1, ?2, 0, ?3)
             RETURNING {COLUMNS}"
        ))
        .bind(&input.title)
        .bind(&input.description)
        .bind(format_timestamp(now))
        .fetch_one(&*self.pool)
        .await?;
        let todo = row_to_todo(row)?;
        tracing::debug!(id = %todo.id, "todo inserted");
        Ok(todo)
    }

    async fn get(&self, id: TodoId) -> Result<Option<Todo>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM todos WHERE id = ?1"))
            .bind(id.0)
            .fetch_optional(&*self.pool)
            .await?;
        row.map(row_to_todo).transpose()
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<Vec<Todo>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM todos ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
        ))
        .bind(i64::try_from(limit)?)
        .bind(i64::try_from(offset)?)
        .fetch_all(&*self.pool)
        .await?;
        rows.into_iter().map(row_to_todo).collect()
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM todos")
            .fetch_one(&*self.pool)
            .await?;
        Ok(u64::try_from(count)?)
    }

    async fn update(&self, id: TodoId, input: UpdateTodo) -> Result<Option<Todo>> {
        if input.is_empty() {
            return self.get(id).await;
        }

        let row = sqlx::query(&format!(
            "UPDATE todos SET
                title = COALESCE(?2, title),
                description = COALESCE(?3, description),
                completed = COALESCE(?4, completed)
             WHERE id = ?1
             RETURNING {COLUMNS}"
        ))
        .bind(id.0)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.completed)
        .fetch_optional(&*self.pool)
        .await?;
        row.map(row_to_todo).transpose()
    }

    async fn delete(&self, id: TodoId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ?1")
            .bind(id.0)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// Fixed-width UTC text keeps lexical order equal to chronological order.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_todo(row: SqliteRow) -> Result<Todo> {
    let id: i64 = row.try_get("id")?;
    let title: String = row.try_get("title")?;
    let description: String = row.try_get("description")?;
    let completed: bool = row.try_get("completed")?;
    let created_at_str: String = row.try_get("created_at")?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .with_context(|| format!("bad created_at for todo {id}: {created_at_str}"))?
        .with_timezone(&Utc);

    Ok(Todo {
        id: TodoId(id),
        title,
        description,
        completed,
        created_at,
    })
}
