use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

use super::{Inbox, MailProvider, Message, MessageSummary};
use crate::http::retrying_client;

#[derive(Debug, thiserror::Error)]
pub enum AgentMailError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest_middleware::Error),

    #[error("Invalid response: {0}")]
    Response(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// AgentMail REST client.
#[derive(Clone)]
pub struct AgentMailClient {
    client: ClientWithMiddleware,
    api_key: String,
    base_url: String,
}

impl AgentMailClient {
    pub const BASE_URL: &str = "https://api.agentmail.to/v0";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: retrying_client(),
            api_key: api_key.into(),
            base_url: Self::BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, AgentMailError> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await?;
            return Err(AgentMailError::Api { status, message });
        }
        Ok(resp)
    }
}

#[derive(Debug, Deserialize)]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageSummary>,
}

impl MailProvider for AgentMailClient {
    type Error = AgentMailError;

    #[tracing::instrument(skip(self))]
    async fn create_inbox(&self) -> Result<Inbox, AgentMailError> {
        let resp = self
            .client
            .post(format!("{}/inboxes", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({}))
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        let inbox = Self::check(resp).await?.json::<Inbox>().await?;
        tracing::info!(inbox_id = %inbox.inbox_id, "Created disposable inbox");
        Ok(inbox)
    }

    #[tracing::instrument(skip(self))]
    async fn list_messages(&self, inbox_id: &str) -> Result<Vec<MessageSummary>, AgentMailError> {
        let resp = self
            .client
            .get(format!("{}/inboxes/{}/messages", self.base_url, inbox_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        let listing = Self::check(resp).await?.json::<ListMessagesResponse>().await?;
        Ok(listing.messages)
    }

    #[tracing::instrument(skip(self))]
    async fn get_message(&self, inbox_id: &str, message_id: &str) -> Result<Message, AgentMailError> {
        let resp = self
            .client
            .get(format!(
                "{}/inboxes/{}/messages/{}",
                self.base_url, inbox_id, message_id
            ))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        Ok(Self::check(resp).await?.json::<Message>().await?)
    }
}
