//! Disposable inbox handling.
//!
//! Every signup runs under a throwaway identity: a fresh inbox whose address
//! doubles as the account email. [`await_verification`] then watches that
//! inbox for the product's verification email while a browser agent sits on
//! the "verify your email" page.

mod agentmail;

use std::{future::Future, sync::LazyLock, time::Duration};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

pub use agentmail::{AgentMailClient, AgentMailError};

use crate::{llm::VerificationExtractor, timeline::truncate_chars};

static SIX_DIGIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{6})\b").expect("valid regex"));
static FOUR_DIGIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})\b").expect("valid regex"));

/// Provider of disposable inboxes.
pub trait MailProvider {
    type Error: std::fmt::Debug;

    fn create_inbox(&self) -> impl Future<Output = Result<Inbox, Self::Error>>;

    /// Lists message summaries, newest first.
    fn list_messages(
        &self,
        inbox_id: &str,
    ) -> impl Future<Output = Result<Vec<MessageSummary>, Self::Error>>;

    fn get_message(
        &self,
        inbox_id: &str,
        message_id: &str,
    ) -> impl Future<Output = Result<Message, Self::Error>>;
}

/// A disposable inbox. The id is the email address itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inbox {
    pub inbox_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSummary {
    pub message_id: String,
    pub from: Option<String>,
    pub subject: Option<String>,
    pub preview: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub subject: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
    pub preview: Option<String>,
}

impl Message {
    /// Best available body: plain text, then HTML, then the preview.
    pub fn body(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or(self.html.as_deref())
            .or(self.preview.as_deref())
    }
}

/// Signup identity derived from a disposable inbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn for_inbox(inbox_id: &str) -> Self {
        let username = inbox_id.split('@').next().unwrap_or(inbox_id).to_string();
        Self {
            email: inbox_id.to_string(),
            username,
            password: generate_password(),
        }
    }
}

// 16 chars covering the character classes signup forms usually require.
fn generate_password() -> String {
    let seed = Uuid::new_v4().simple().to_string();
    format!("{}!Aa1", &seed[..12])
}

/// What a verification email turned out to contain.
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    /// A clickable verification URL.
    Link(String),
    /// A numeric code the user is meant to type in.
    Code(String),
    /// Neither; the leading slice of the email body.
    Body(String),
}

/// Searches `text` for a verification code, preferring 6-digit codes.
pub fn find_verification_code(text: &str) -> Option<String> {
    SIX_DIGIT_RE
        .captures(text)
        .or_else(|| FOUR_DIGIT_RE.captures(text))
        .map(|caps| caps[1].to_string())
}

/// Watches an inbox until a verification email arrives or `timeout` passes.
///
/// The newest message is run through the LLM extractor first; if that yields
/// no URL the body is searched for a numeric code. A message with neither is
/// remembered and returned as [`Verification::Body`] at timeout, in case the
/// caller can still make something of it. Returns `Ok(None)` when nothing
/// arrived at all.
#[tracing::instrument(skip(mail, extractor))]
pub async fn await_verification<M, X>(
    mail: &M,
    extractor: &X,
    inbox_id: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> anyhow::Result<Option<Verification>>
where
    M: MailProvider,
    X: VerificationExtractor,
{
    let deadline = Instant::now() + timeout;
    let mut fallback_body: Option<String> = None;

    while Instant::now() < deadline {
        let messages = mail
            .list_messages(inbox_id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to list inbox messages: {e:?}"))?;

        if let Some(summary) = messages.first() {
            let subject = summary.subject.clone().unwrap_or_default();
            let body = match mail.get_message(inbox_id, &summary.message_id).await {
                Ok(message) => message.body().unwrap_or_default().to_string(),
                Err(e) => {
                    tracing::warn!(error = ?e, "Failed to fetch full message, using preview");
                    summary.preview.clone().unwrap_or_default()
                }
            };

            match extractor.extract_verification(&subject, &body).await {
                Ok(Some(url)) if url.starts_with("http") => {
                    tracing::info!(url = %url, "Verification link found");
                    return Ok(Some(Verification::Link(url)));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = ?e, "Verification extraction failed, trying code search")
                }
            }

            if let Some(code) = find_verification_code(&body) {
                tracing::info!(code = %code, "Verification code found");
                return Ok(Some(Verification::Code(code)));
            }

            fallback_body = Some(truncate_chars(&body, 1000).to_string());
        }

        tokio::time::sleep(poll_interval).await;
    }

    tracing::warn!(
        timeout_s = timeout.as_secs(),
        "No verification email arrived in time"
    );
    Ok(fallback_body.map(Verification::Body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_six_digit_codes_over_four() {
        assert_eq!(
            find_verification_code("Your code is 123456, or use 9999."),
            Some("123456".into())
        );
        assert_eq!(
            find_verification_code("Your PIN: 4321"),
            Some("4321".into())
        );
        assert_eq!(find_verification_code("no numbers here"), None);
        // 5-digit runs match neither pattern
        assert_eq!(find_verification_code("ref 12345 attached"), None);
    }

    #[test]
    fn credentials_derive_the_username_from_the_address() {
        let creds = Credentials::for_inbox("wobbly-otter@agentmail.to");
        assert_eq!(creds.email, "wobbly-otter@agentmail.to");
        assert_eq!(creds.username, "wobbly-otter");
    }

    #[test]
    fn generated_passwords_are_long_and_mixed() {
        let password = generate_password();
        assert_eq!(password.chars().count(), 16);
        assert!(password.contains('!'));
        assert!(password.chars().any(|c| c.is_ascii_uppercase()));
        assert!(password.chars().any(|c| c.is_ascii_digit()));
    }

    #[test]
    fn message_body_prefers_text_over_html_over_preview() {
        let mut message = Message {
            message_id: "m1".into(),
            subject: None,
            text: Some("plain".into()),
            html: Some("<b>rich</b>".into()),
            preview: Some("prev".into()),
        };
        assert_eq!(message.body(), Some("plain"));
        message.text = None;
        assert_eq!(message.body(), Some("<b>rich</b>"));
        message.html = None;
        assert_eq!(message.body(), Some("prev"));
    }
}
