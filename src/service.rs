use time::OffsetDateTime;
use tracing::{debug, info};

use crate::db::{Collection, Database, StorageError};
use crate::models::{Todo, TodoDocument, TodoPatch};
use crate::object_id::{InvalidObjectId, ObjectId};

pub const COLLECTION: &str = "todo";

#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] InvalidObjectId),
    #[error("todo not found")]
    NotFound,
    #[error("{action}: {source}")]
    Storage {
        action: &'static str,
        #[source]
        source: StorageError,
    },
}

fn storage(action: &'static str) -> impl FnOnce(StorageError) -> TodoError {
    move |source| TodoError::Storage { action, source }
}

/// Validation and mapping between request input and stored todo documents.
#[derive(Clone)]
pub struct TodoService {
    todos: Collection<TodoDocument>,
}

impl TodoService {
    pub fn new(db: &Database) -> Self {
        TodoService {
            todos: db.collection(COLLECTION),
        }
    }

    pub fn parse_id(raw: &str) -> Result<ObjectId, TodoError> {
        Ok(raw.parse()?)
    }

    /// Every stored item, in no particular order.
    pub async fn list(&self) -> Result<Vec<Todo>, TodoError> {
        let docs = self
            .todos
            .find_all()
            .await
            .map_err(storage("could not fetch the todo collection"))?;
        debug!(collection = self.todos.name(), count = docs.len(), "Fetched todos");
        Ok(docs.into_iter().map(Todo::from).collect())
    }

    pub async fn create(&self, title: &str) -> Result<ObjectId, TodoError> {
        validate_title(title)?;

        let doc = TodoDocument {
            title: title.to_string(),
            completed: false,
            created_at: OffsetDateTime::now_utc(),
        };
        let id = self
            .todos
            .insert_one(&doc)
            .await
            .map_err(storage("failed to insert data into the database"))?;

        info!(%id, title, "Created todo");
        Ok(id)
    }

    /// Overwrites title and completion of the item with `id`.
    ///
    /// An id that matches nothing is not an error; it reports zero modified.
    pub async fn update(&self, id: &str, title: &str, completed: bool) -> Result<u64, TodoError> {
        let id = Self::parse_id(id)?;
        validate_title(title)?;

        let result = self
            .todos
            .update_one(id, &TodoPatch { title, completed })
            .await
            .map_err(storage("failed to update data in the database"))?;

        info!(
            %id,
            matched = result.matched_count,
            modified = result.modified_count,
            "Updated todo"
        );
        Ok(result.modified_count)
    }

    pub async fn delete(&self, id: &str) -> Result<u64, TodoError> {
        let id = Self::parse_id(id)?;

        let deleted = self
            .todos
            .delete_one(id)
            .await
            .map_err(storage("error deleting data from the database"))?;

        if deleted == 0 {
            return Err(TodoError::NotFound);
        }
        info!(%id, "Deleted todo");
        Ok(deleted)
    }
}

fn validate_title(title: &str) -> Result<(), TodoError> {
    if title.trim().is_empty() {
        return Err(TodoError::Validation("title cannot be empty"));
    }
    Ok(())
}
