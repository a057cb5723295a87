pub mod chat;
pub mod document;

pub use chat::{Chat, Message, NewChat};
pub use document::{Document, DocumentKind, Suggestion};
