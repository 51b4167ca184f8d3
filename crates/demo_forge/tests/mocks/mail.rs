use std::sync::{Arc, Mutex};

use demo_forge::{
    mail::{Message, MessageSummary},
    Inbox, MailProvider,
};

/// Inbox seam serving at most one canned message.
#[derive(Clone, Default)]
pub struct MockMail {
    pub message: Option<Message>,
    pub inboxes_created: Arc<Mutex<u32>>,
    pub list_calls: Arc<Mutex<u32>>,
    pub fail_with: Option<String>,
}

impl MockMail {
    /// An inbox that immediately holds a verification email with `body`.
    pub fn with_verification(body: &str) -> Self {
        Self {
            message: Some(Message {
                message_id: "m1".to_string(),
                subject: Some("Verify your email".to_string()),
                text: Some(body.to_string()),
                html: None,
                preview: None,
            }),
            ..Self::default()
        }
    }

    /// An inbox that never receives anything.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Self::default()
        }
    }
}

impl MailProvider for MockMail {
    type Error = anyhow::Error;

    async fn create_inbox(&self) -> anyhow::Result<Inbox> {
        if let Some(ref msg) = self.fail_with {
            return Err(anyhow::anyhow!("{}", msg));
        }
        let mut count = self.inboxes_created.lock().unwrap();
        *count += 1;
        Ok(Inbox {
            inbox_id: format!("tester-{count}@agentmail.to"),
        })
    }

    async fn list_messages(&self, _inbox_id: &str) -> anyhow::Result<Vec<MessageSummary>> {
        *self.list_calls.lock().unwrap() += 1;
        Ok(self
            .message
            .iter()
            .map(|m| MessageSummary {
                message_id: m.message_id.clone(),
                from: None,
                subject: m.subject.clone(),
                preview: m.preview.clone(),
            })
            .collect())
    }

    async fn get_message(&self, _inbox_id: &str, message_id: &str) -> anyhow::Result<Message> {
        self.message
            .clone()
            .filter(|m| m.message_id == message_id)
            .ok_or_else(|| anyhow::anyhow!("no such message: {message_id}"))
    }
}
