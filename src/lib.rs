pub mod app;
pub mod client;
pub mod config;
pub mod handler;
pub mod logging;
pub mod markdown;
pub mod message;
pub mod scene;
pub mod stream;
pub mod tui;
pub mod ui;
pub mod viewer;

// Re-export main types for convenience
pub use app::App;
pub use client::{ChatClient, ChatError, ReplyEvent};
pub use config::{Config, Theme};
pub use message::{Conversation, Message, Role};
pub use scene::Scene;
pub use stream::{StreamIngestor, StreamUpdate};
