//! Reply drafts: create a reply to a message, then replace its body.

use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::GraphError;

use super::client::GraphClient;

#[derive(Debug, Deserialize)]
struct CreatedDraft {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebLink {
    #[serde(default)]
    web_link: Option<String>,
}

/// Create a reply draft to `message_id` with `reply_html` as its body.
///
/// Returns the draft id. The draft is left unsent in the Drafts folder.
pub async fn create_reply_draft(
    client: &GraphClient,
    message_id: &str,
    reply_html: &str,
) -> Result<String, GraphError> {
    let draft: CreatedDraft = client
        .post(&format!("/me/messages/{message_id}/createReply"), &json!({}))
        .await?;

    client
        .patch(
            &format!("/me/messages/{}", draft.id),
            &json!({ "body": { "contentType": "HTML", "content": reply_html } }),
        )
        .await?;

    info!(draft_id = %draft.id, reply_to = message_id, "Reply draft created");
    Ok(draft.id)
}

/// Outlook web link for a message or draft, if the service returns one.
pub async fn web_link(client: &GraphClient, message_id: &str) -> Result<Option<String>, GraphError> {
    let link: WebLink = client
        .get(
            &format!("/me/messages/{message_id}"),
            &[("$select", "webLink".to_string())],
        )
        .await?;
    Ok(link.web_link.filter(|l| !l.is_empty()))
}
