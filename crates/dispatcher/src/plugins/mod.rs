//! Built-in plugins

mod file;
mod log;
mod webhook;

pub use file::{FilePlugin, FilePluginConfig};
pub use log::LogPlugin;
pub use webhook::{message_color, should_notify, WebhookPlugin, WebhookPluginConfig, WEBHOOK_KINDS};
