use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::db::Document;

/// Stored form of a todo item. The id lives beside the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoDocument {
    pub title: String,
    pub completed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Fields an update may overwrite; `created_at` is never patched.
#[derive(Debug, Clone, Serialize)]
pub struct TodoPatch<'a> {
    pub title: &'a str,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub title: String,
    pub completed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Document<TodoDocument>> for Todo {
    fn from(doc: Document<TodoDocument>) -> Self {
        Todo {
            id: doc.id.to_string(),
            title: doc.body.title,
            completed: doc.body.completed,
            created_at: doc.body.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTodo {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTodo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TodoList {
    pub message: String,
    pub data: Vec<Todo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Created {
    pub message: String,
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Updated {
    pub message: String,
    pub modified_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deleted {
    pub message: String,
    pub deleted_count: u64,
}
