use crate::domain::repository::TodoRepository;
use crate::domain::todo::{CreateTodo, Todo, TodoId, UpdateTodo};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait TodoService: Send + Sync + 'static {
    async fn create(&self, input: CreateTodo) -> Result<Todo>;
    async fn get(&self, id: TodoId) -> Result<Option<Todo>>;
    async fn list(&self, offset: u64, limit: u64) -> Result<Vec<Todo>>;
    async fn count(&self) -> Result<u64>;
    async fn update(&self, id: TodoId, input: UpdateTodo) -> Result<Option<Todo>>;
    async fn delete(&self, id: TodoId) -> Result<bool>;
}

#[derive(Clone)]
pub struct TodoServiceImpl<R: TodoRepository> {
    repo: R,
}

impl<R: TodoRepository> TodoServiceImpl<R> {
    pub fn new(repo: R) -> Self { Self { repo } }
}

#[async_trait]
impl<R: TodoRepository> TodoService for TodoServiceImpl<R> {
    async fn create(&self, input: CreateTodo) -> Result<Todo> {
        let todo = self.repo.create(input).await?;
        tracing::info!(id = %todo.id, "todo created");
        Ok(todo)
    }

    async fn get(&self, id: TodoId) -> Result<Option<Todo>> { self.repo.get(id).await }

    async fn list(&self, offset: u64, limit: u64) -> Result<Vec<Todo>> { self.repo.list(offset, limit).await }

    async fn count(&self) -> Result<u64> { self.repo.count().await }

    async fn update(&self, id: TodoId, input: UpdateTodo) -> Result<Option<Todo>> { self.repo.update(id, input).await }

    async fn delete(&self, id: TodoId) -> Result<bool> {
        let deleted = self.repo.delete(id).await?;
        if deleted { tracing::info!(%id, "todo deleted"); }
        Ok(deleted)
    }
}
