//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep the HTTP layer decoupled from storage details.

pub mod auth_service;
pub mod password;
pub mod planner_service;
pub mod scheduler;
pub mod todo_service;
pub mod token_service;
