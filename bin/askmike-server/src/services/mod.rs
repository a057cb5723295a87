//! Request-spanning logic shared by several route modules.

pub mod chat;
pub mod users;
