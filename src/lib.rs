//! Mail Brief: summarize recent Outlook mail and draft replies.

pub mod auth;
pub mod config;
pub mod digest;
pub mod error;
pub mod graph;
pub mod llm;
pub mod mail;
pub mod summary;
pub mod web;
