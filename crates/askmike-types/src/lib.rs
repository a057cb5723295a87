//! Wire types shared by `askmike-server` and `askmike-client`.
//!
//! Everything here serializes with camelCase keys, which is what the browser
//! front-end sends and expects.

pub mod chat;
pub mod user;

pub use chat::{StreamEvent, Visibility};
pub use user::{User, UserAttributes};
