//! Flutter-facing bindings for the Lex Dinámica core.

pub mod api;
