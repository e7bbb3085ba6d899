pub mod backend;
pub mod client;
pub mod keep_alive;

pub use backend::{GenerationBackend, HuggingFaceBackend};
pub use client::EmojiClient;
