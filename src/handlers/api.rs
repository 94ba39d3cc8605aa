use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::{http::StatusCode, Json};
use tracing::info;

use crate::error::AppError;
use crate::models::{CreateTodo, Created, Deleted, TodoList, UpdateTodo, Updated};
use crate::service::TodoService;
use crate::AppState;

pub async fn list_todos(State(state): State<AppState>) -> Result<Json<TodoList>, AppError> {
    let data = state.todos.list().await?;
    info!(count = data.len(), "Listed todos");
    Ok(Json(TodoList {
        message: "All todos retrieved".to_string(),
        data,
    }))
}

pub async fn create_todo(
    State(state): State<AppState>,
    payload: Result<Json<CreateTodo>, JsonRejection>,
) -> Result<(StatusCode, Json<Created>), AppError> {
    let Json(req) = payload?;
    let id = state.todos.create(&req.title).await?;

    Ok((
        StatusCode::CREATED,
        Json(Created {
            message: "Todo created successfully".to_string(),
            id: id.to_string(),
        }),
    ))
}

pub async fn update_todo(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<UpdateTodo>, JsonRejection>,
) -> Result<Json<Updated>, AppError> {
    let Path(id) = path?;
    TodoService::parse_id(&id)?;
    let Json(req) = payload?;
    let modified_count = state.todos.update(&id, &req.title, req.completed).await?;

    Ok(Json(Updated {
        message: "Updated successfully".to_string(),
        modified_count,
    }))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Deleted>, AppError> {
    let Path(id) = path?;
    let deleted_count = state.todos.delete(&id).await?;

    Ok(Json(Deleted {
        message: "Item deleted successfully".to_string(),
        deleted_count,
    }))
}
