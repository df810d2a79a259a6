//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define the storage contracts the attendance core depends on (roster
//!   reads, session reads, the single combined session write).
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Every query is scoped by `ClassRef`; a scope/owner mismatch reads as
//!   "class not found".
//! - A session header and its records are only ever written together in one
//!   IMMEDIATE transaction.

pub mod error;
pub mod roster_repo;
mod schema;
pub mod session_repo;
