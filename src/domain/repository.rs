use async_trait::async_trait;
use super::todo::{Todo, TodoId, CreateTodo, UpdateTodo};

/// Persistence port for todos. Every method maps to a single statement so
/// each call is atomic on its own.
#[async_trait]
pub trait TodoRepository: Send + Sync + 'static {
    async fn init(&self) -> anyhow::Result<()>;
    async fn create(&self, input: CreateTodo) -> anyhow::Result<Todo>;
    async fn get(&self, id: TodoId) -> anyhow::Result<Option<Todo>>;
    /// Newest first (`created_at` desc, then `id` desc).
    async fn list(&self, offset: u64, limit: u64) -> anyhow::Result<Vec<Todo>>;
    async fn count(&self) -> anyhow::Result<u64>;
    async fn update(&self, id: TodoId, input: UpdateTodo) -> anyhow::Result<Option<Todo>>;
    async fn delete(&self, id: TodoId) -> anyhow::Result<bool>;
}
