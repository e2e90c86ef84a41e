//! Domain model for regulatory norms and the subjects acting on them.
//!
//! # Responsibility
//! - Define the canonical norm/version/modification records.
//! - Define users and their privilege tier.
//!
//! # Invariants
//! - A norm always holds at least one version; numbering is `1..=n`.
//! - Existing versions are never edited; change happens by appending.

pub mod norm;
pub mod user;
