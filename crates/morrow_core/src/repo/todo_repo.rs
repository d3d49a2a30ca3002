//! Todo repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide owner-scoped CRUD over the `todos` table.
//! - Own tag-link replacement with atomic semantics.
//! - Provide the due-window queries used by the planning engine.
//!
//! # Invariants
//! - Every read and write is constrained by `user_uuid`; a foreign todo is
//!   indistinguishable from a missing one.
//! - Write paths call `Todo::validate()` before SQL mutations.
//! - Tag replacement happens in a single transaction with the row write.

use crate::model::todo::{Priority, Todo, TodoId};
use crate::model::user::UserId;
use crate::repo::{bool_to_int, ensure_connection_ready, parse_bool, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

const TODO_SELECT_SQL: &str = "SELECT
    uuid,
    user_uuid,
    title,
    completed,
    completed_at,
    due_date,
    priority,
    category,
    notes,
    created_at
FROM todos";

const TODO_COLUMNS: &[&str] = &[
    "uuid",
    "user_uuid",
    "title",
    "completed",
    "completed_at",
    "due_date",
    "priority",
    "category",
    "notes",
    "created_at",
];

/// Repository interface for owner-scoped todo persistence.
pub trait TodoRepository {
    fn create_todo(&mut self, todo: &Todo) -> RepoResult<TodoId>;
    /// Persists all mutable fields; the owner key is part of the predicate.
    fn update_todo(&mut self, todo: &Todo) -> RepoResult<()>;
    fn get_todo(&self, id: TodoId, owner: UserId) -> RepoResult<Option<Todo>>;
    /// Lists all todos of one user in stable insertion order.
    fn list_todos(&self, owner: UserId) -> RepoResult<Vec<Todo>>;
    fn delete_todo(&mut self, id: TodoId, owner: UserId) -> RepoResult<()>;
    /// Counts todos due inside `[start_ms, end_ms)`.
    fn count_due_between(&self, owner: UserId, start_ms: i64, end_ms: i64) -> RepoResult<u32>;
    /// Lists todos due inside `[start_ms, end_ms)` in stable insertion order.
    fn list_due_between(&self, owner: UserId, start_ms: i64, end_ms: i64) -> RepoResult<Vec<Todo>>;
    /// Reassigns only the due date; the planner's single write primitive.
    fn set_due_date(&self, id: TodoId, owner: UserId, due_ms: i64) -> RepoResult<()>;
}

/// SQLite-backed todo repository.
pub struct SqliteTodoRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteTodoRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[("todos", TODO_COLUMNS), ("todo_tags", &["todo_uuid", "tag"])])?;
        Ok(Self { conn })
    }
}

impl TodoRepository for SqliteTodoRepository<'_> {
    fn create_todo(&mut self, todo: &Todo) -> RepoResult<TodoId> {
        todo.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO todos (
                uuid,
                user_uuid,
                title,
                completed,
                completed_at,
                due_date,
                priority,
                category,
                notes,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                todo.uuid.to_string(),
                todo.user_uuid.to_string(),
                todo.title.as_str(),
                bool_to_int(todo.completed),
                todo.completed_at,
                todo.due_date,
                priority_to_db(todo.priority),
                todo.category.as_str(),
                todo.notes.as_str(),
                todo.created_at,
            ],
        )?;
        replace_tags_in_tx(&tx, todo)?;
        tx.commit()?;

        Ok(todo.uuid)
    }

    fn update_todo(&mut self, todo: &Todo) -> RepoResult<()> {
        todo.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE todos
             SET
                title = ?1,
                completed = ?2,
                completed_at = ?3,
                due_date = ?4,
                priority = ?5,
                category = ?6,
                notes = ?7
             WHERE uuid = ?8
               AND user_uuid = ?9;",
            params![
                todo.title.as_str(),
                bool_to_int(todo.completed),
                todo.completed_at,
                todo.due_date,
                priority_to_db(todo.priority),
                todo.category.as_str(),
                todo.notes.as_str(),
                todo.uuid.to_string(),
                todo.user_uuid.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::TodoNotFound(todo.uuid));
        }

        replace_tags_in_tx(&tx, todo)?;
        tx.commit()?;
        Ok(())
    }

    fn get_todo(&self, id: TodoId, owner: UserId) -> RepoResult<Option<Todo>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TODO_SELECT_SQL}
             WHERE uuid = ?1
               AND user_uuid = ?2;"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), owner.to_string()])?;
        if let Some(row) = rows.next()? {
            let mut todo = parse_todo_row(row)?;
            todo.tags = load_tags(self.conn, id)?;
            return Ok(Some(todo));
        }

        Ok(None)
    }

    fn list_todos(&self, owner: UserId) -> RepoResult<Vec<Todo>> {
        self.query_todos(
            &format!(
                "{TODO_SELECT_SQL}
                 WHERE user_uuid = ?1
                 ORDER BY created_at ASC, rowid ASC;"
            ),
            params![owner.to_string()],
        )
    }

    fn delete_todo(&mut self, id: TodoId, owner: UserId) -> RepoResult<()> {
        // todo_tags rows follow via ON DELETE CASCADE.
        let changed = self.conn.execute(
            "DELETE FROM todos WHERE uuid = ?1 AND user_uuid = ?2;",
            params![id.to_string(), owner.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::TodoNotFound(id));
        }

        Ok(())
    }

    fn count_due_between(&self, owner: UserId, start_ms: i64, end_ms: i64) -> RepoResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM todos
             WHERE user_uuid = ?1
               AND due_date >= ?2
               AND due_date < ?3;",
            params![owner.to_string(), start_ms, end_ms],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn list_due_between(&self, owner: UserId, start_ms: i64, end_ms: i64) -> RepoResult<Vec<Todo>> {
        self.query_todos(
            &format!(
                "{TODO_SELECT_SQL}
                 WHERE user_uuid = ?1
                   AND due_date >= ?2
                   AND due_date < ?3
                 ORDER BY created_at ASC, rowid ASC;"
            ),
            params![owner.to_string(), start_ms, end_ms],
        )
    }

    fn set_due_date(&self, id: TodoId, owner: UserId, due_ms: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE todos
             SET due_date = ?1
             WHERE uuid = ?2
               AND user_uuid = ?3;",
            params![due_ms, id.to_string(), owner.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::TodoNotFound(id));
        }

        Ok(())
    }
}

impl SqliteTodoRepository<'_> {
    fn query_todos(
        &self,
        sql: &str,
        query_params: impl rusqlite::Params,
    ) -> RepoResult<Vec<Todo>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(query_params)?;
        let mut todos = Vec::new();
        while let Some(row) = rows.next()? {
            todos.push(parse_todo_row(row)?);
        }
        drop(rows);
        drop(stmt);

        for todo in &mut todos {
            todo.tags = load_tags(self.conn, todo.uuid)?;
        }
        Ok(todos)
    }
}

fn replace_tags_in_tx(tx: &Transaction<'_>, todo: &Todo) -> RepoResult<()> {
    let todo_uuid = todo.uuid.to_string();
    tx.execute(
        "DELETE FROM todo_tags WHERE todo_uuid = ?1;",
        [todo_uuid.as_str()],
    )?;
    for tag in &todo.tags {
        tx.execute(
            "INSERT OR IGNORE INTO todo_tags (todo_uuid, tag) VALUES (?1, ?2);",
            params![todo_uuid.as_str(), tag.as_str()],
        )?;
    }
    Ok(())
}

fn load_tags(conn: &Connection, todo_uuid: TodoId) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT tag
         FROM todo_tags
         WHERE todo_uuid = ?1
         ORDER BY tag ASC;",
    )?;
    let mut rows = stmt.query([todo_uuid.to_string()])?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        tags.push(value);
    }
    Ok(tags)
}

fn parse_todo_row(row: &Row<'_>) -> RepoResult<Todo> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = parse_uuid(&uuid_text, "todos.uuid")?;

    let owner_text: String = row.get("user_uuid")?;
    let user_uuid = parse_uuid(&owner_text, "todos.user_uuid")?;

    let priority_text: String = row.get("priority")?;
    let priority = parse_priority(&priority_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid priority value `{priority_text}` in todos.priority"
        ))
    })?;

    let completed = parse_bool(row.get::<_, i64>("completed")?, "todos.completed")?;

    Ok(Todo {
        uuid,
        user_uuid,
        title: row.get("title")?,
        completed,
        completed_at: row.get("completed_at")?,
        due_date: row.get("due_date")?,
        priority,
        tags: Vec::new(),
        category: row.get("category")?,
        notes: row.get("notes")?,
        created_at: row.get("created_at")?,
    })
}

fn priority_to_db(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
    }
}

fn parse_priority(value: &str) -> Option<Priority> {
    match value {
        "low" => Some(Priority::Low),
        "medium" => Some(Priority::Medium),
        "high" => Some(Priority::High),
        _ => None,
    }
}
