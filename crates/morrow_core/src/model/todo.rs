//! Todo domain model.
//!
//! # Responsibility
//! - Define the per-user task record and its completion lifecycle.
//! - Provide tag normalization shared by write paths.
//!
//! # Invariants
//! - `completed_at` is set only by a false -> true completion transition,
//!   never backfilled on creation.
//! - The owning `user_uuid` never changes after creation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a todo.
pub type TodoId = Uuid;

/// Default category assigned when the caller provides none.
pub const DEFAULT_CATEGORY: &str = "general";

/// Task priority used by the planning engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Validation errors raised before a todo reaches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoValidationError {
    EmptyTitle,
}

impl Display for TodoValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "todo title must not be empty"),
        }
    }
}

impl Error for TodoValidationError {}

/// Canonical per-user task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    /// Stable global ID.
    pub uuid: TodoId,
    /// Owning user; fixed for the lifetime of the record.
    pub user_uuid: Uuid,
    pub title: String,
    pub completed: bool,
    /// Set iff `completed`, by a completion transition. Epoch milliseconds.
    pub completed_at: Option<i64>,
    /// Planned-for instant (local midnight of the target day). Epoch ms.
    pub due_date: Option<i64>,
    pub priority: Priority,
    /// Lowercased, deduplicated tags.
    pub tags: Vec<String>,
    pub category: String,
    pub notes: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl Todo {
    /// Creates a new pending todo with defaults matching the API contract.
    pub fn new(user_uuid: Uuid, title: impl Into<String>, created_at: i64) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            user_uuid,
            title: title.into(),
            completed: false,
            completed_at: None,
            due_date: None,
            priority: Priority::Medium,
            tags: Vec::new(),
            category: DEFAULT_CATEGORY.to_string(),
            notes: String::new(),
            created_at,
        }
    }

    /// Checks storage-level invariants before persistence.
    pub fn validate(&self) -> Result<(), TodoValidationError> {
        if self.title.trim().is_empty() {
            return Err(TodoValidationError::EmptyTitle);
        }
        Ok(())
    }

    /// Applies a completion transition.
    ///
    /// # Contract
    /// - false -> true stamps `completed_at = now_ms`.
    /// - true -> false clears `completed_at`.
    /// - Re-asserting the current state leaves `completed_at` untouched.
    pub fn set_completed(&mut self, completed: bool, now_ms: i64) {
        if completed && !self.completed {
            self.completed_at = Some(now_ms);
        } else if !completed {
            self.completed_at = None;
        }
        self.completed = completed;
    }
}

/// Normalizes one tag value; `None` when empty after trimming.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes and deduplicates tag values, preserving sorted order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut unique = BTreeSet::new();
    for tag in tags {
        if let Some(value) = normalize_tag(tag) {
            unique.insert(value);
        }
    }
    unique.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::{normalize_tags, Priority, Todo, TodoValidationError};
    use uuid::Uuid;

    #[test]
    fn new_todo_defaults() {
        let todo = Todo::new(Uuid::new_v4(), "write report", 100);
        assert!(!todo.completed);
        assert!(todo.completed_at.is_none());
        assert!(todo.due_date.is_none());
        assert_eq!(todo.priority, Priority::Medium);
        assert_eq!(todo.category, "general");
    }

    #[test]
    fn completion_transition_stamps_and_clears() {
        let mut todo = Todo::new(Uuid::new_v4(), "t", 0);

        todo.set_completed(true, 5_000);
        assert_eq!(todo.completed_at, Some(5_000));

        // Re-asserting completion must not move the stamp.
        todo.set_completed(true, 9_000);
        assert_eq!(todo.completed_at, Some(5_000));

        todo.set_completed(false, 10_000);
        assert!(todo.completed_at.is_none());
    }

    #[test]
    fn validate_rejects_blank_title() {
        let todo = Todo::new(Uuid::new_v4(), "   ", 0);
        assert_eq!(todo.validate(), Err(TodoValidationError::EmptyTitle));
    }

    #[test]
    fn tags_are_normalized_and_deduplicated() {
        let tags = vec![
            " Work ".to_string(),
            "work".to_string(),
            String::new(),
            "Home".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["home", "work"]);
    }
}
