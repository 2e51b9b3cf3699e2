//! Local processing of retrieved messages.

pub mod clean;
pub mod participants;

pub use clean::{MAX_BODY_CHARS, trim_email_body};
pub use participants::extract_participants;
