//! Microsoft Graph mail access.

pub mod client;
pub mod drafts;
pub mod retrieval;
pub mod types;

pub use client::GraphClient;
pub use drafts::{create_reply_draft, web_link};
pub use retrieval::{MessageQuery, QueryFilter, fetch_messages, fetch_messages_at, window_and_order};
pub use types::{Me, Message, Recipient};
