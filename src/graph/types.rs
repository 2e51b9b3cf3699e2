//! Wire types for the Graph mail endpoints.
//!
//! Every field except `id` is optional: `$select` trims the payload and the
//! service omits null properties.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A mail message as returned by `/me/messages`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub from: Option<Recipient>,
    #[serde(default)]
    pub to_recipients: Option<Vec<Recipient>>,
    #[serde(default)]
    pub cc_recipients: Option<Vec<Recipient>>,
    /// Kept as the raw string; see [`Message::received_at`].
    #[serde(default)]
    pub received_date_time: Option<String>,
    #[serde(default)]
    pub body: Option<ItemBody>,
    #[serde(default)]
    pub body_preview: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub web_link: Option<String>,
}

impl Message {
    /// Parsed receipt time. `None` when absent or not RFC 3339.
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.received_date_time.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn sender_address(&self) -> Option<&str> {
        self.from.as_ref().and_then(Recipient::address)
    }

    pub fn to_addresses(&self) -> Vec<&str> {
        addresses(self.to_recipients.as_deref())
    }

    pub fn cc_addresses(&self) -> Vec<&str> {
        addresses(self.cc_recipients.as_deref())
    }

    /// HTML (or text) body content, empty when the body was not selected.
    pub fn body_content(&self) -> &str {
        self.body
            .as_ref()
            .and_then(|b| b.content.as_deref())
            .unwrap_or("")
    }

    pub fn subject_or_empty(&self) -> &str {
        self.subject.as_deref().unwrap_or("")
    }
}

fn addresses(list: Option<&[Recipient]>) -> Vec<&str> {
    list.unwrap_or_default()
        .iter()
        .filter_map(Recipient::address)
        .collect()
}

/// `{ "emailAddress": { "name": ..., "address": ... } }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    #[serde(default)]
    pub email_address: Option<EmailAddress>,
}

impl Recipient {
    pub fn new(address: &str) -> Self {
        Self {
            email_address: Some(EmailAddress {
                name: None,
                address: Some(address.to_string()),
            }),
        }
    }

    /// The address, skipping missing or blank values.
    pub fn address(&self) -> Option<&str> {
        self.email_address
            .as_ref()
            .and_then(|e| e.address.as_deref())
            .filter(|a| !a.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// A collection page: `{ "value": [...] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagePage {
    #[serde(default)]
    pub value: Vec<Message>,
}

/// The signed-in user, as returned by `GET /me`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Me {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Me {
    /// `upn • mail • id=...`
    pub fn summary_line(&self) -> String {
        format!(
            "{} • {} • id={}",
            self.user_principal_name.as_deref().unwrap_or(""),
            self.mail.as_deref().unwrap_or(""),
            self.id.as_deref().unwrap_or("")
        )
    }
}
