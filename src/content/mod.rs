//! Translatable content shapes and their flat translation-exchange projection

pub mod document;
pub mod message;
pub mod te;

pub use document::DocumentNode;
pub use message::{ArrayMessage, KvMessage, MessageBody};
pub use te::{TEContent, TEContents};
