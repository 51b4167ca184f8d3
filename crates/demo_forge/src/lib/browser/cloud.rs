use std::time::Duration;

use serde::Deserialize;
use tokio::{sync::watch, time::Instant};

use super::{BrowserAutomation, BrowserSession, BrowserTask};
use crate::timeline::TimelineEvent;

const API_KEY_HEADER: &str = "X-Browser-Use-API-Key";

#[derive(Debug, thiserror::Error)]
pub enum BrowserUseError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {0} attempts")]
    RateLimited(u32),
}

/// Browser-Use cloud API client.
///
/// Session creation handles 429s itself with a linear backoff, so this
/// client sits on a plain reqwest client rather than the shared retry stack;
/// retrying task polls blindly would just delay status detection.
#[derive(Debug, Clone)]
pub struct BrowserUseClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    timeline_poll_interval: Duration,
    rate_limit_step: Duration,
    poll_retry_delay: Duration,
}

impl BrowserUseClient {
    pub const BASE_URL: &str = "https://api.browser-use.com/api/v2";

    const SESSION_CREATE_ATTEMPTS: u32 = 3;

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: Self::BASE_URL.to_string(),
            poll_interval: Duration::from_secs(5),
            timeline_poll_interval: Duration::from_secs(2),
            rate_limit_step: Duration::from_secs(15),
            poll_retry_delay: Duration::from_secs(5),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Poll cadence for plain waits and for timeline-capturing waits.
    pub fn with_poll_intervals(mut self, task: Duration, timeline: Duration) -> Self {
        self.poll_interval = task;
        self.timeline_poll_interval = timeline;
        self
    }

    /// Backoff unit for 429s on session creation, and the extra delay after
    /// a failed task poll.
    pub fn with_backoffs(mut self, rate_limit_step: Duration, poll_retry_delay: Duration) -> Self {
        self.rate_limit_step = rate_limit_step;
        self.poll_retry_delay = poll_retry_delay;
        self
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, BrowserUseError> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await?;
            return Err(BrowserUseError::Api { status, message });
        }
        Ok(resp)
    }
}

#[derive(Debug, Deserialize)]
struct CreatedTask {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShareResponse {
    share_url: Option<String>,
}

impl BrowserAutomation for BrowserUseClient {
    const AGENT_LLM: &str = "browser-use-llm";

    type Error = BrowserUseError;

    #[tracing::instrument(skip(self))]
    async fn create_session(&self, start_url: Option<&str>) -> Result<BrowserSession, BrowserUseError> {
        let mut payload = serde_json::json!({});
        if let Some(url) = start_url {
            payload["startUrl"] = url.into();
        }

        for attempt in 0..Self::SESSION_CREATE_ATTEMPTS {
            let resp = self
                .client
                .post(format!("{}/sessions", self.base_url))
                .header(API_KEY_HEADER, &self.api_key)
                .json(&payload)
                .send()
                .await
                .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

            if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let wait = self.rate_limit_step * (attempt + 1);
                tracing::warn!(
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "Rate limited creating session, backing off"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            let session = Self::check(resp).await?.json::<BrowserSession>().await?;
            tracing::info!(session_id = %session.id, "Created browser session");
            return Ok(session);
        }

        Err(BrowserUseError::RateLimited(Self::SESSION_CREATE_ATTEMPTS))
    }

    #[tracing::instrument(skip(self))]
    async fn stop_session(&self, session_id: &str) -> Result<(), BrowserUseError> {
        let resp = self
            .client
            .patch(format!("{}/sessions/{}", self.base_url, session_id))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&serde_json::json!({ "action": "stop" }))
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        Self::check(resp).await?;
        tracing::info!(session_id, "Stopped browser session");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get_session(&self, session_id: &str) -> Result<BrowserSession, BrowserUseError> {
        let resp = self
            .client
            .get(format!("{}/sessions/{}", self.base_url, session_id))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        Ok(Self::check(resp).await?.json::<BrowserSession>().await?)
    }

    #[tracing::instrument(skip(self, description))]
    async fn create_task(
        &self,
        description: &str,
        session_id: Option<&str>,
        start_url: Option<&str>,
    ) -> Result<String, BrowserUseError> {
        let mut payload = serde_json::json!({
            "task": description,
            "llm": Self::AGENT_LLM,
        });
        if let Some(sid) = session_id {
            payload["sessionId"] = sid.into();
        }
        if let Some(url) = start_url {
            payload["startUrl"] = url.into();
        }

        let resp = self
            .client
            .post(format!("{}/tasks", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&payload)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        let created = Self::check(resp).await?.json::<CreatedTask>().await?;
        tracing::info!(task_id = %created.id, "Created browser task");
        Ok(created.id)
    }

    #[tracing::instrument(skip(self))]
    async fn get_task(&self, task_id: &str) -> Result<BrowserTask, BrowserUseError> {
        let resp = self
            .client
            .get(format!("{}/tasks/{}", self.base_url, task_id))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        Ok(Self::check(resp).await?.json::<BrowserTask>().await?)
    }

    #[tracing::instrument(skip(self, task_id))]
    async fn wait_for_task(
        &self,
        task_id: watch::Receiver<String>,
        capture_timeline: bool,
    ) -> Result<(BrowserTask, Vec<TimelineEvent>), BrowserUseError> {
        let interval = if capture_timeline {
            self.timeline_poll_interval
        } else {
            self.poll_interval
        };
        let started = Instant::now();
        let mut current_id = task_id.borrow().clone();
        let mut events: Vec<TimelineEvent> = Vec::new();
        let mut seen_steps = 0usize;

        loop {
            tokio::time::sleep(interval).await;

            let latest_id = task_id.borrow().clone();
            if latest_id != current_id {
                tracing::info!(from = %current_id, to = %latest_id, "Waiting on a new task id");
                current_id = latest_id;
                seen_steps = 0;
                events.clear();
            }

            let task = match self.get_task(&current_id).await {
                Ok(task) => task,
                Err(err) => {
                    tracing::warn!(error = %err, task_id = %current_id, "Task poll failed, retrying");
                    tokio::time::sleep(self.poll_retry_delay).await;
                    continue;
                }
            };

            if capture_timeline && task.steps.len() > seen_steps {
                for (position, step) in task.steps.iter().enumerate().skip(seen_steps) {
                    events.push(TimelineEvent::from_step(step, position, started.elapsed()));
                }
                seen_steps = task.steps.len();
            }

            if task.status.is_terminal() {
                tracing::info!(
                    task_id = %current_id,
                    status = ?task.status,
                    steps = events.len(),
                    "Task reached terminal status"
                );
                return Ok((task, events));
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn share_link(&self, session_id: &str) -> Option<String> {
        let result: Result<ShareResponse, BrowserUseError> = async {
            let resp = self
                .client
                .post(format!("{}/sessions/{}/public-share", self.base_url, session_id))
                .header(API_KEY_HEADER, &self.api_key)
                .send()
                .await?;
            Ok(Self::check(resp).await?.json::<ShareResponse>().await?)
        }
        .await;

        match result {
            Ok(share) => share.share_url,
            Err(err) => {
                tracing::warn!(error = %err, session_id, "Failed to fetch share link");
                None
            }
        }
    }
}
