use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use demo_forge::{BrowserAutomation, BrowserSession, BrowserTask, TaskStatus, TaskStep, TimelineEvent};
use tokio::sync::watch;

/// Browser seam that settles every task immediately with a configured
/// terminal status and step list.
#[derive(Clone)]
pub struct MockBrowser {
    pub final_status: TaskStatus,
    pub task_output: Option<String>,
    pub steps: Vec<TaskStep>,
    pub sessions_created: Arc<Mutex<Vec<Option<String>>>>,
    pub tasks_created: Arc<Mutex<Vec<String>>>,
    pub stopped_sessions: Arc<Mutex<Vec<String>>>,
    pub session_lookups: Arc<Mutex<Vec<String>>>,
    pub fail_with: Option<String>,
    /// When set, creation responses carry no live URL; it only shows up on
    /// a session lookup.
    pub defer_live_urls: bool,
    next_id: Arc<Mutex<u32>>,
}

impl MockBrowser {
    pub fn finished(output: &str) -> Self {
        Self {
            final_status: TaskStatus::Finished,
            task_output: Some(output.to_string()),
            steps: Vec::new(),
            sessions_created: Arc::new(Mutex::new(Vec::new())),
            tasks_created: Arc::new(Mutex::new(Vec::new())),
            stopped_sessions: Arc::new(Mutex::new(Vec::new())),
            session_lookups: Arc::new(Mutex::new(Vec::new())),
            fail_with: None,
            defer_live_urls: false,
            next_id: Arc::new(Mutex::new(0)),
        }
    }

    pub fn failed() -> Self {
        Self {
            final_status: TaskStatus::Failed,
            task_output: None,
            ..Self::finished("")
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Self::finished("")
        }
    }

    pub fn with_steps(mut self, steps: Vec<TaskStep>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_deferred_live_urls(mut self) -> Self {
        self.defer_live_urls = true;
        self
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        format!("{prefix}-{next}")
    }
}

impl BrowserAutomation for MockBrowser {
    const AGENT_LLM: &str = "mock-agent";

    type Error = anyhow::Error;

    async fn create_session(&self, start_url: Option<&str>) -> anyhow::Result<BrowserSession> {
        if let Some(ref msg) = self.fail_with {
            return Err(anyhow::anyhow!("{}", msg));
        }
        let id = self.next_id("sess");
        self.sessions_created
            .lock()
            .unwrap()
            .push(start_url.map(str::to_owned));
        let live_url = if self.defer_live_urls {
            None
        } else {
            Some(format!("https://live.test/{id}"))
        };
        Ok(BrowserSession { live_url, id })
    }

    async fn stop_session(&self, session_id: &str) -> anyhow::Result<()> {
        self.stopped_sessions
            .lock()
            .unwrap()
            .push(session_id.to_owned());
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> anyhow::Result<BrowserSession> {
        self.session_lookups
            .lock()
            .unwrap()
            .push(session_id.to_owned());
        Ok(BrowserSession {
            id: session_id.to_owned(),
            live_url: Some(format!("https://live.test/{session_id}")),
        })
    }

    async fn create_task(
        &self,
        description: &str,
        _session_id: Option<&str>,
        _start_url: Option<&str>,
    ) -> anyhow::Result<String> {
        if let Some(ref msg) = self.fail_with {
            return Err(anyhow::anyhow!("{}", msg));
        }
        self.tasks_created.lock().unwrap().push(description.to_owned());
        Ok(self.next_id("task"))
    }

    async fn get_task(&self, task_id: &str) -> anyhow::Result<BrowserTask> {
        Ok(BrowserTask {
            id: task_id.to_owned(),
            status: self.final_status,
            output: self.task_output.clone(),
            steps: self.steps.clone(),
        })
    }

    async fn wait_for_task(
        &self,
        task_id: watch::Receiver<String>,
        capture_timeline: bool,
    ) -> anyhow::Result<(BrowserTask, Vec<TimelineEvent>)> {
        if let Some(ref msg) = self.fail_with {
            return Err(anyhow::anyhow!("{}", msg));
        }
        let id = task_id.borrow().clone();
        let events = if capture_timeline {
            self.steps
                .iter()
                .enumerate()
                .map(|(position, step)| {
                    TimelineEvent::from_step(step, position, Duration::from_secs(5 * (position as u64 + 1)))
                })
                .collect()
        } else {
            Vec::new()
        };
        Ok((
            BrowserTask {
                id,
                status: self.final_status,
                output: self.task_output.clone(),
                steps: self.steps.clone(),
            },
            events,
        ))
    }

    async fn share_link(&self, session_id: &str) -> Option<String> {
        Some(format!("https://share.test/{session_id}"))
    }
}
