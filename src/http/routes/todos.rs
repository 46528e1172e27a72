use std::sync::Arc;

use axum::{extract::{rejection::JsonRejection, OriginalUri, Path, Query, State}, routing::get, Router, Json};
use axum::http::{HeaderMap, StatusCode};

use crate::{
    application::{
        serializer::{validate_create, validate_patch, validate_replace, TodoRepresentation, TodoWrite, ValidationError},
        todo_service::TodoService,
    },
    domain::todo::TodoId,
    http::{
        pagination::{base_url, PageQuery, PageRequest, Paginated},
        types::ApiError,
    },
    infrastructure::settings::Settings,
};

pub struct AppState<S: TodoService> {
    pub service: Arc<S>,
    pub settings: Arc<Settings>,
}

impl<S: TodoService> AppState<S> {
    pub fn new(service: S, settings: Arc<Settings>) -> Self {
        Self { service: Arc::new(service), settings }
    }

    fn internal(&self) -> impl Fn(anyhow::Error) -> ApiError + '_ {
        move |e| ApiError::internal(e, self.settings.debug)
    }

    /// Unknown ids win over invalid bodies, so a bad payload for a missing
    /// record still answers 404.
    async fn reject(&self, id: TodoId, errors: ValidationError) -> ApiError {
        match self.service.get(id).await {
            Ok(Some(_)) => {
                tracing::debug!(%id, %errors, "rejected todo update");
                ApiError::Validation(errors)
            }
            Ok(None) => ApiError::not_found(),
            Err(e) => self.internal()(e),
        }
    }

    /// Same precedence for bodies that cannot be read at all.
    async fn unpack(&self, id: TodoId, payload: Payload<TodoWrite>) -> Result<TodoWrite, ApiError> {
        match payload {
            Ok(Json(body)) => Ok(body),
            Err(rejection) => match self.service.get(id).await.map_err(self.internal())? {
                Some(_) => Err(rejection.into()),
                None => Err(ApiError::not_found()),
            },
        }
    }
}

impl<S: TodoService> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self { service: Arc::clone(&self.service), settings: Arc::clone(&self.settings) }
    }
}

pub fn router<S: TodoService>(state: AppState<S>) -> Router {
    Router::new()
        .route("/api/todos/", get(list_todos::<S>).post(create_todo::<S>))
        .route(
            "/api/todos/:id/",
            get(get_todo::<S>).put(replace_todo::<S>).patch(patch_todo::<S>).delete(delete_todo::<S>),
        )
        .with_state(state)
}

type Payload<T> = Result<Json<T>, JsonRejection>;

async fn list_todos<S: TodoService>(
    State(state): State<AppState<S>>,
    Query(query): Query<PageQuery>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Json<Paginated<TodoRepresentation>>, ApiError> {
    let page = PageRequest::parse(&query, state.settings.page_size)?;
    let count = state.service.count().await.map_err(state.internal())?;
    let page = page.resolve(count)?;
    let todos = state.service.list(page.offset(), page.size).await.map_err(state.internal())?;
    let results = todos.into_iter().map(TodoRepresentation::from).collect();
    Ok(Json(Paginated::new(results, count, page, &base_url(&uri, &headers))))
}

async fn create_todo<S: TodoService>(
    State(state): State<AppState<S>>,
    payload: Payload<TodoWrite>,
) -> Result<(StatusCode, Json<TodoRepresentation>), ApiError> {
    let Json(payload) = payload?;
    let input = validate_create(payload)?;
    let todo = state.service.create(input).await.map_err(state.internal())?;
    Ok((StatusCode::CREATED, Json(todo.into())))
}

async fn get_todo<S: TodoService>(State(state): State<AppState<S>>, Path(id): Path<String>) -> Result<Json<TodoRepresentation>, ApiError> {
    let id = parse_id(&id)?;
    match state.service.get(id).await.map_err(state.internal())? {
        Some(t) => Ok(Json(t.into())),
        None => Err(ApiError::not_found()),
    }
}

async fn replace_todo<S: TodoService>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    payload: Payload<TodoWrite>,
) -> Result<Json<TodoRepresentation>, ApiError> {
    let id = parse_id(&id)?;
    let payload = state.unpack(id, payload).await?;
    let input = match validate_replace(payload) {
        Ok(input) => input,
        Err(errors) => return Err(state.reject(id, errors).await),
    };
    match state.service.update(id, input).await.map_err(state.internal())? {
        Some(t) => Ok(Json(t.into())),
        None => Err(ApiError::not_found()),
    }
}

async fn patch_todo<S: TodoService>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    payload: Payload<TodoWrite>,
) -> Result<Json<TodoRepresentation>, ApiError> {
    let id = parse_id(&id)?;
    let payload = state.unpack(id, payload).await?;
    let input = match validate_patch(payload) {
        Ok(input) => input,
        Err(errors) => return Err(state.reject(id, errors).await),
    };
    match state.service.update(id, input).await.map_err(state.internal())? {
        Some(t) => Ok(Json(t.into())),
        None => Err(ApiError::not_found()),
    }
}

async fn delete_todo<S: TodoService>(State(state): State<AppState<S>>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let deleted = state.service.delete(id).await.map_err(state.internal())?;
    if deleted { Ok(StatusCode::NO_CONTENT) } else { Err(ApiError::not_found()) }
}

// Non-numeric ids cannot name a record.
fn parse_id(s: &str) -> Result<TodoId, ApiError> { s.parse::<i64>().map(TodoId).map_err(|_| ApiError::not_found()) }
