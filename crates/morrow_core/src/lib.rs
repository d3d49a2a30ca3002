//! Core domain logic for Morrow, a personal task-management backend.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod mail;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{AppConfig, ConfigError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use mail::{LogMailer, MailError, Mailer};
pub use model::todo::{Priority, Todo, TodoId, TodoValidationError};
pub use model::user::{User, UserId, UserProfile};
pub use repo::todo_repo::{SqliteTodoRepository, TodoRepository};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use repo::{RepoError, RepoResult};
pub use service::auth_service::{AuthError, AuthService, AuthSession};
pub use service::planner_service::{
    CategoryStats, CompletionAnalysis, PlanError, PlanOutcome, PlannerService,
};
pub use service::scheduler::{plan_all_users, PlanRunSummary};
pub use service::todo_service::{CreateTodoInput, TodoService, UpdateTodoInput};
pub use service::token_service::{TokenError, TokenService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
