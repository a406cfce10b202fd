use std::time::Duration;

use serde::{Deserialize, Serialize};
use siteask_core::{SiteaskError, SiteaskResult};
use siteask_session::ParticipantInfo;
use tracing::debug;

/// Response to a successful conversation create.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedConversation {
    /// Identifier assigned by the conversation service.
    pub conversation_id: String,
    /// The typed participant records as the service stored them.
    pub participants: Vec<ParticipantInfo>,
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    title: &'a str,
    participants: &'a [ParticipantInfo],
    enable_ai: bool,
}

/// Client for the external conversation HTTP surface.
///
/// Consumed, not served: `POST /chat/create` and
/// `GET /chat/conversations/{id}`. Participants travel as the typed
/// record in both directions — the client offers no way to send a
/// bare identifier list.
pub struct ConversationClient {
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl ConversationClient {
    /// Creates a client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
            timeout,
        }
    }

    /// Creates a conversation, expecting `201` with the assigned id.
    pub async fn create(
        &self,
        title: &str,
        participants: &[ParticipantInfo],
        enable_ai: bool,
    ) -> SiteaskResult<CreatedConversation> {
        let url = format!("{}/chat/create", self.base_url);
        let resp = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&CreateRequest {
                title,
                participants,
                enable_ai,
            })
            .send()
            .await
            .map_err(|e| SiteaskError::Http(format!("conversation service unreachable: {e}")))?;

        let status = resp.status();
        if status != reqwest::StatusCode::CREATED {
            return Err(SiteaskError::Http(format!(
                "conversation create returned {status}"
            )));
        }

        let created: CreatedConversation = resp
            .json()
            .await
            .map_err(|e| SiteaskError::Http(format!("bad conversation create response: {e}")))?;
        debug!(conversation = %created.conversation_id, "conversation created");
        Ok(created)
    }

    /// Fetches a conversation document, or `None` on `404`.
    pub async fn get(&self, id: &str) -> SiteaskResult<Option<serde_json::Value>> {
        let url = format!("{}/chat/conversations/{id}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SiteaskError::Http(format!("conversation service unreachable: {e}")))?;

        match resp.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = resp.json().await.map_err(|e| {
                    SiteaskError::Http(format!("bad conversation response: {e}"))
                })?;
                Ok(Some(body))
            }
            status => Err(SiteaskError::Http(format!(
                "conversation fetch returned {status}"
            ))),
        }
    }
}
