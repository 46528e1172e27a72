#[cfg(test)]
mod tests {
    use super::super::todo_service::{TodoService, TodoServiceImpl};
    use crate::domain::{repository::TodoRepository, todo::{CreateTodo, Todo, TodoId, UpdateTodo}};
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    #[derive(Clone, Default)]
    struct InMemoryRepo {
        items: std::sync::Arc<std::sync::Mutex<Vec<Todo>>>,
    }

    #[async_trait]
    impl TodoRepository for InMemoryRepo {
        async fn init(&self) -> Result<()> { Ok(()) }
        async fn create(&self, input: CreateTodo) -> Result<Todo> {
            let mut items = self.items.lock().unwrap();
            let id = TodoId(items.len() as i64 + 1);
            // Spread timestamps so ordering never depends on clock resolution.
            let created_at = Utc::now() + Duration::seconds(id.0);
            let todo = Todo { id, title: input.title, description: input.description, completed: false, created_at };
            items.push(todo.clone());
            Ok(todo)
        }
        async fn get(&self, id: TodoId) -> Result<Option<Todo>> { Ok(self.items.lock().unwrap().iter().find(|t| t.id == id).cloned()) }
        async fn list(&self, offset: u64, limit: u64) -> Result<Vec<Todo>> {
            let mut items = self.items.lock().unwrap().clone();
            items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(items.into_iter().skip(offset as usize).take(limit as usize).collect())
        }
        async fn count(&self) -> Result<u64> { Ok(self.items.lock().unwrap().len() as u64) }
        async fn update(&self, id: TodoId, input: UpdateTodo) -> Result<Option<Todo>> {
            let mut items = self.items.lock().unwrap();
            let Some(todo) = items.iter_mut().find(|t| t.id == id) else { return Ok(None) };
            if let Some(t) = input.title { todo.title = t; }
            if let Some(d) = input.description { todo.description = d; }
            if let Some(c) = input.completed { todo.completed = c; }
            Ok(Some(todo.clone()))
        }
        async fn delete(&self, id: TodoId) -> Result<bool> {
            let mut items = self.items.lock().unwrap();
            let before = items.len();
            items.retain(|t| t.id != id);
            Ok(items.len() < before)
        }
    }

    #[tokio::test]
    async fn unit_create_and_get() {
        let repo = InMemoryRepo::default();
        let service = TodoServiceImpl::new(repo);
        let created = service.create(CreateTodo::new("X")).await.unwrap();
        assert_eq!(created.title, "X");
        assert!(!created.completed);
        let got = service.get(created.id).await.unwrap().unwrap();
        assert_eq!(got.id, created.id);
    }

    #[tokio::test]
    async fn unit_list_orders_and_counts() {
        let service = TodoServiceImpl::new(InMemoryRepo::default());
        service.create(CreateTodo::new("Primero")).await.unwrap();
        service.create(CreateTodo::new("Segundo")).await.unwrap();

        assert_eq!(service.count().await.unwrap(), 2);
        let items = service.list(0, 20).await.unwrap();
        let titles: Vec<_> = items.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["Segundo", "Primero"]);
        assert!(service.list(5, 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unit_delete_reports_missing() {
        let service = TodoServiceImpl::new(InMemoryRepo::default());
        let created = service.create(CreateTodo::new("X")).await.unwrap();
        assert!(service.delete(created.id).await.unwrap());
        assert!(!service.delete(created.id).await.unwrap());
        assert_eq!(service.count().await.unwrap(), 0);
    }
}
