//! Use-case layer over repositories, access checks and the text service.

pub mod chat_session;
pub mod modification_workflow;
pub mod norm_service;
