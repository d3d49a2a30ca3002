//! Domain model for users and todos.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep lifecycle transitions (verification, completion) in one place.
//!
//! # Invariants
//! - Every domain object is identified by a stable UUID.
//! - A todo's owner never changes after creation.

pub mod todo;
pub mod user;
