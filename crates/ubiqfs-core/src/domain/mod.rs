//! Domain entities and business logic
//!
//! This module contains the core domain types for ubiqfs:
//! - Newtypes for type-safe identifiers and validated paths
//! - Indexed items and their sync flags
//! - The index query lifecycle state machine
//! - Domain-specific error types

pub mod errors;
pub mod indexed_item;
pub mod newtypes;
pub mod query_state;

// Re-export commonly used types
pub use errors::DomainError;
pub use indexed_item::{IndexedItem, SyncStatus};
pub use newtypes::*;
pub use query_state::{QueryState, SetupFailure};
