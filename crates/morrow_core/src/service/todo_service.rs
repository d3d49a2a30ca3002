//! Todo use-case service.
//!
//! # Responsibility
//! - Provide owner-scoped CRUD entry points for API callers.
//! - Apply the completion-transition contract before persistence.
//!
//! # Invariants
//! - Every operation is keyed by the authenticated owner; a foreign todo
//!   surfaces as not-found.
//! - `completed_at` is only ever written through `Todo::set_completed`.

use crate::model::todo::{normalize_tags, Priority, Todo, TodoId, DEFAULT_CATEGORY};
use crate::model::user::UserId;
use crate::repo::{RepoResult, TodoRepository};
use chrono::Utc;

/// Fields accepted when creating a todo.
#[derive(Debug, Clone, Default)]
pub struct CreateTodoInput {
    pub title: String,
    pub completed: bool,
    pub due_date: Option<i64>,
    pub priority: Option<Priority>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub notes: Option<String>,
}

/// Partial update; absent fields stay untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateTodoInput {
    pub title: Option<String>,
    pub completed: Option<bool>,
    pub due_date: Option<i64>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
    pub notes: Option<String>,
}

/// Use-case service wrapper for todo CRUD.
pub struct TodoService<R: TodoRepository> {
    repo: R,
}

impl<R: TodoRepository> TodoService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Lists all todos owned by `owner` in stable insertion order.
    pub fn list(&self, owner: UserId) -> RepoResult<Vec<Todo>> {
        self.repo.list_todos(owner)
    }

    /// Creates a todo for `owner`.
    ///
    /// # Contract
    /// - `completed_at` is never backfilled, even when created completed;
    ///   only a later completion transition stamps it.
    pub fn create(&mut self, owner: UserId, input: CreateTodoInput) -> RepoResult<Todo> {
        self.create_at(owner, input, Utc::now().timestamp_millis())
    }

    pub fn create_at(
        &mut self,
        owner: UserId,
        input: CreateTodoInput,
        now_ms: i64,
    ) -> RepoResult<Todo> {
        let mut todo = Todo::new(owner, input.title, now_ms);
        todo.completed = input.completed;
        todo.due_date = input.due_date;
        if let Some(priority) = input.priority {
            todo.priority = priority;
        }
        todo.tags = normalize_tags(&input.tags);
        if let Some(category) = input.category.filter(|value| !value.trim().is_empty()) {
            todo.category = category;
        } else {
            todo.category = DEFAULT_CATEGORY.to_string();
        }
        if let Some(notes) = input.notes {
            todo.notes = notes;
        }

        self.repo.create_todo(&todo)?;
        Ok(todo)
    }

    /// Applies a partial update to an owned todo and returns the new state.
    pub fn update(
        &mut self,
        owner: UserId,
        id: TodoId,
        input: UpdateTodoInput,
    ) -> RepoResult<Todo> {
        self.update_at(owner, id, input, Utc::now().timestamp_millis())
    }

    pub fn update_at(
        &mut self,
        owner: UserId,
        id: TodoId,
        input: UpdateTodoInput,
        now_ms: i64,
    ) -> RepoResult<Todo> {
        let mut todo = self
            .repo
            .get_todo(id, owner)?
            .ok_or(crate::repo::RepoError::TodoNotFound(id))?;

        if let Some(title) = input.title {
            todo.title = title;
        }
        if let Some(completed) = input.completed {
            todo.set_completed(completed, now_ms);
        }
        if let Some(due_date) = input.due_date {
            todo.due_date = Some(due_date);
        }
        if let Some(priority) = input.priority {
            todo.priority = priority;
        }
        if let Some(tags) = input.tags {
            todo.tags = normalize_tags(&tags);
        }
        if let Some(category) = input.category.filter(|value| !value.trim().is_empty()) {
            todo.category = category;
        }
        if let Some(notes) = input.notes {
            todo.notes = notes;
        }

        self.repo.update_todo(&todo)?;
        Ok(todo)
    }

    /// Deletes an owned todo; foreign or missing ids report not-found.
    pub fn delete(&mut self, owner: UserId, id: TodoId) -> RepoResult<()> {
        self.repo.delete_todo(id, owner)
    }
}
