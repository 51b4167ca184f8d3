//! Cloud browser automation.
//!
//! Sessions are remote Chrome instances; tasks are natural-language missions
//! an agent executes inside one. Everything the pipeline needs from the
//! provider sits behind [`BrowserAutomation`].

mod cloud;

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

pub use cloud::{BrowserUseClient, BrowserUseError};

use crate::timeline::TimelineEvent;

/// Driver of cloud browser agent sessions.
pub trait BrowserAutomation {
    /// Agent model requested for created tasks.
    const AGENT_LLM: &str;

    type Error: std::fmt::Debug;

    /// Opens a new browser session, optionally at `start_url`.
    fn create_session(
        &self,
        start_url: Option<&str>,
    ) -> impl Future<Output = Result<BrowserSession, Self::Error>>;

    /// Stops a session so it releases its browser.
    fn stop_session(&self, session_id: &str) -> impl Future<Output = Result<(), Self::Error>>;

    /// Fetches a session's current state. The live URL can be absent in the
    /// creation response and only show up here once the browser is ready.
    fn get_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<BrowserSession, Self::Error>>;

    /// Submits a task description to the agent, returning the task id.
    fn create_task(
        &self,
        description: &str,
        session_id: Option<&str>,
        start_url: Option<&str>,
    ) -> impl Future<Output = Result<String, Self::Error>>;

    fn get_task(&self, task_id: &str) -> impl Future<Output = Result<BrowserTask, Self::Error>>;

    /// Polls until the watched task reaches a terminal status.
    ///
    /// The id arrives through a watch channel rather than as a plain string
    /// because the task can be replaced mid-wait: when a verification email
    /// lands, the caller swaps in the continuation task's id and the waiter
    /// follows it. With `capture_timeline` set, every agent step is folded
    /// into the returned event list exactly once, in order of appearance.
    /// Transient poll failures are logged and retried, never surfaced.
    fn wait_for_task(
        &self,
        task_id: watch::Receiver<String>,
        capture_timeline: bool,
    ) -> impl Future<Output = Result<(BrowserTask, Vec<TimelineEvent>), Self::Error>>;

    /// Fetches a public share link for a session's recording, if the
    /// provider grants one. Failures degrade to `None`.
    fn share_link(&self, session_id: &str) -> impl Future<Output = Option<String>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserSession {
    pub id: String,
    pub live_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Started,
    Paused,
    Finished,
    Stopped,
    Failed,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Finished | TaskStatus::Stopped | TaskStatus::Failed
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TaskStatus::Started => "started",
            TaskStatus::Paused => "paused",
            TaskStatus::Finished => "finished",
            TaskStatus::Stopped => "stopped",
            TaskStatus::Failed => "failed",
            TaskStatus::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserTask {
    pub id: String,
    pub status: TaskStatus,
    pub output: Option<String>,
    #[serde(default)]
    pub steps: Vec<TaskStep>,
}

/// One agent step as reported by the provider. Fields are sparse; consumers
/// treat everything beyond the step's existence as optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStep {
    pub number: Option<u32>,
    pub url: Option<String>,
    pub screenshot_url: Option<String>,
    pub memory: Option<String>,
    pub next_goal: Option<String>,
    pub evaluation_previous_goal: Option<String>,
    #[serde(default)]
    pub actions: Vec<String>,
}
