//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the norm store contract used by services.
//! - Isolate SQLite details from use-case orchestration.
//!
//! # Invariants
//! - Repository writes enforce `Norm::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`,
//!   `ConflictingVersion`) in addition to storage errors.

pub mod norm_repo;
pub mod sqlite_norm_repo;
