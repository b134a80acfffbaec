pub mod client;
pub mod webhook;

pub use client::{LineClient, UserProfile};
pub use webhook::{TextMessageEvent, WebhookEnvelope, WebhookEvent};
