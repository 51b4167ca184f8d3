//! Course batch execution.
//!
//! Each course runs under a fresh identity in two phases. Phase 1 signs up
//! at the product URL and parks the agent at the verification wall while
//! the inbox is watched. Phase 2 opens a new session directly at the
//! verification link and walks the course's UI steps there, with the screen
//! recorder running and the task timeline captured step by step.

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use itertools::Itertools;
use serde::Serialize;
use tokio::sync::watch;

use crate::{
    browser::{BrowserAutomation, TaskStatus},
    course::Course,
    llm::VerificationExtractor,
    mail::{await_verification, Credentials, MailProvider, Verification},
    record::{RecordingHandle, SessionRecorder},
    reports::site_host,
    timeline::{truncate_chars, CourseTimeline, TimelineEvent},
};

/// Upper estimate for one course demo, used to bound the screen capture.
const ESTIMATED_COURSE_DURATION: Duration = Duration::from_secs(120);

/// Delay between consecutive course starts, to stay under rate limits.
const STAGGER_STEP: Duration = Duration::from_secs(10);

/// Recording continues this long past the terminal status so the final
/// frames make it into the capture.
const RECORDING_TAIL: Duration = Duration::from_secs(3);

/// How a course run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Finished,
    Stopped,
    Failed,
    /// The run itself errored before reaching a terminal task status.
    Exception,
}

impl From<TaskStatus> for OutcomeStatus {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Finished => OutcomeStatus::Finished,
            TaskStatus::Stopped => OutcomeStatus::Stopped,
            _ => OutcomeStatus::Failed,
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OutcomeStatus::Finished => "finished",
            OutcomeStatus::Stopped => "stopped",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::Exception => "exception",
        })
    }
}

/// Everything one course run produced.
#[derive(Debug, Clone, Serialize)]
pub struct CourseOutcome {
    pub course_index: usize,
    pub course_title: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_seconds: f64,
    pub session_id: Option<String>,
    pub task_id: Option<String>,
    pub share_url: Option<String>,
    pub live_url: Option<String>,
    pub video_file: Option<PathBuf>,
    pub credentials: Option<Credentials>,
    pub timeline: Vec<TimelineEvent>,
    pub total_steps: usize,
}

impl CourseOutcome {
    fn failed(
        index: usize,
        title: &str,
        status: OutcomeStatus,
        error: String,
        duration: Duration,
    ) -> Self {
        Self {
            course_index: index,
            course_title: title.to_owned(),
            status,
            error: Some(error),
            duration_seconds: duration.as_secs_f64(),
            session_id: None,
            task_id: None,
            share_url: None,
            live_url: None,
            video_file: None,
            credentials: None,
            timeline: Vec::new(),
            total_steps: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == OutcomeStatus::Finished
    }

    /// The captured timeline as a standalone document, when steps exist.
    pub fn timeline_data(&self) -> Option<CourseTimeline> {
        if self.timeline.is_empty() {
            return None;
        }
        Some(CourseTimeline {
            course_index: self.course_index,
            course_title: self.course_title.clone(),
            session_id: self
                .session_id
                .clone()
                .unwrap_or_else(|| "unknown".to_owned()),
            task_id: self.task_id.clone().unwrap_or_else(|| "unknown".to_owned()),
            recording_url: self.share_url.clone(),
            duration_seconds: self.duration_seconds,
            total_steps: self.total_steps,
            events: self.timeline.clone(),
        })
    }
}

/// Runs generated courses as recorded browser sessions.
pub struct CourseRunner<'a, B, M, X, R> {
    browser: &'a B,
    mail: &'a M,
    extractor: &'a X,
    recorder: &'a R,
    output_dir: &'a Path,
    verification_timeout: Duration,
    verification_poll_interval: Duration,
}

impl<'a, B, M, X, R> CourseRunner<'a, B, M, X, R>
where
    B: BrowserAutomation,
    M: MailProvider,
    X: VerificationExtractor,
    R: SessionRecorder,
{
    pub fn new(
        browser: &'a B,
        mail: &'a M,
        extractor: &'a X,
        recorder: &'a R,
        output_dir: &'a Path,
    ) -> Self {
        Self {
            browser,
            mail,
            extractor,
            recorder,
            output_dir,
            verification_timeout: crate::explorer::DEFAULT_VERIFICATION_TIMEOUT,
            verification_poll_interval: crate::explorer::DEFAULT_VERIFICATION_POLL_INTERVAL,
        }
    }

    /// Overrides how long each course waits for its verification email.
    pub fn verification_window(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.verification_timeout = timeout;
        self.verification_poll_interval = poll_interval;
        self
    }

    /// Runs all courses concurrently and returns one outcome per course,
    /// in input order. Failures never cross course boundaries.
    #[tracing::instrument(skip_all, fields(courses = courses.len()))]
    pub async fn run_all(&self, courses: &[Course], product_url: &str) -> Vec<CourseOutcome> {
        tracing::info!(product_url, count = courses.len(), "Executing course batch");

        let runs = courses
            .iter()
            .enumerate()
            .map(|(index, course)| self.run_one(course, index, product_url));
        let outcomes = futures::future::join_all(runs).await;

        let by_status = outcomes.iter().counts_by(|outcome| outcome.status);
        let finished = by_status
            .get(&OutcomeStatus::Finished)
            .copied()
            .unwrap_or(0);
        tracing::info!(
            total = outcomes.len(),
            finished,
            failed = outcomes.len() - finished,
            "Course batch done"
        );

        outcomes
    }

    async fn run_one(&self, course: &Course, index: usize, product_url: &str) -> CourseOutcome {
        let started = Instant::now();
        match self.try_run(course, index, product_url, started).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(error = %err, course = %course.title, "Course run errored");
                let message = format!("{err:#}");
                CourseOutcome::failed(
                    index,
                    &course.title,
                    OutcomeStatus::Exception,
                    truncate_chars(&message, 500).to_owned(),
                    started.elapsed(),
                )
            }
        }
    }

    #[tracing::instrument(skip_all, fields(course = %course.title, index))]
    async fn try_run(
        &self,
        course: &Course,
        index: usize,
        product_url: &str,
        started: Instant,
    ) -> anyhow::Result<CourseOutcome> {
        if index > 0 {
            let stagger = STAGGER_STEP * index as u32;
            tracing::debug!(delay_s = stagger.as_secs(), "Staggering course start");
            tokio::time::sleep(stagger).await;
        }

        let inbox = self
            .mail
            .create_inbox()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create inbox: {e:?}"))?;
        let credentials = Credentials::for_inbox(&inbox.inbox_id);
        tracing::info!(email = %credentials.email, "Starting course run");

        // Phase 1: create the account, stopping at the verification wall.
        let signup_session = self
            .browser
            .create_session(Some(product_url))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create signup session: {e:?}"))?;
        let signup_task_id = self
            .browser
            .create_task(
                &signup_mission(&credentials),
                Some(&signup_session.id),
                Some(product_url),
            )
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create signup task: {e:?}"))?;

        let (_signup_tx, signup_rx) = watch::channel(signup_task_id);
        let (signup_result, verification) = tokio::join!(
            self.browser.wait_for_task(signup_rx, false),
            await_verification(
                self.mail,
                self.extractor,
                &inbox.inbox_id,
                self.verification_timeout,
                self.verification_poll_interval,
            )
        );
        let (signup_task, _) = signup_result
            .map_err(|e| anyhow::anyhow!("Failed while waiting for the signup task: {e:?}"))?;
        tracing::info!(status = ?signup_task.status, "Signup task settled");

        // Phase 1 browser is done either way.
        if let Err(err) = self.browser.stop_session(&signup_session.id).await {
            tracing::warn!(error = ?err, "Failed to stop signup session");
        }

        let verification_url = match verification {
            Ok(Some(Verification::Link(url))) => Some(url),
            Ok(Some(Verification::Code(code))) => {
                tracing::warn!(code = %code, "Verification arrived as a code, cannot continue unattended");
                None
            }
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(error = %err, "Verification watch failed");
                None
            }
        };
        let Some(verification_url) = verification_url else {
            tracing::warn!("No verification link, abandoning course run");
            return Ok(CourseOutcome::failed(
                index,
                &course.title,
                OutcomeStatus::Failed,
                "No verification email".to_owned(),
                started.elapsed(),
            ));
        };

        // Phase 2: run the course demo from the verification link.
        tracing::info!("Verification link received, running the course demo");
        let session = self
            .browser
            .create_session(Some(&verification_url))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create course session: {e:?}"))?;
        let mission = course_mission(course, &credentials, product_url);
        let task_id = self
            .browser
            .create_task(&mission, Some(&session.id), Some(&verification_url))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create course task: {e:?}"))?;

        // The creation response can omit the live URL while the browser is
        // still coming up; one lookup usually fills it in.
        let live_url = match session.live_url.clone() {
            Some(url) => Some(url),
            None => match self.browser.get_session(&session.id).await {
                Ok(refreshed) => refreshed.live_url,
                Err(err) => {
                    tracing::warn!(error = ?err, "Failed to look up the course session");
                    None
                }
            },
        };

        let video_path = self
            .output_dir
            .join(format!("course_{}_{}_live.mp4", index + 1, session.id));
        let recording = match &live_url {
            Some(live_url) => match self
                .recorder
                .start(live_url, &video_path, ESTIMATED_COURSE_DURATION)
                .await
            {
                Ok(handle) => Some(handle),
                Err(err) => {
                    tracing::warn!(error = ?err, "Failed to start screen recording");
                    None
                }
            },
            None => {
                tracing::warn!("Session has no live URL, skipping screen recording");
                None
            }
        };

        let (_task_tx, task_rx) = watch::channel(task_id);
        let wait_result = self.browser.wait_for_task(task_rx, true).await;

        let video_file = match recording {
            Some(handle) => {
                tokio::time::sleep(RECORDING_TAIL).await;
                handle.stop().await
            }
            None => None,
        };

        let (task, timeline) = wait_result
            .map_err(|e| anyhow::anyhow!("Failed while waiting for the course task: {e:?}"))?;
        let share_url = self.browser.share_link(&session.id).await;

        let duration = started.elapsed();
        let status = OutcomeStatus::from(task.status);
        tracing::info!(
            status = ?status,
            duration_s = duration.as_secs_f64(),
            steps = timeline.len(),
            video = video_file.is_some(),
            "Course run settled"
        );

        Ok(CourseOutcome {
            course_index: index,
            course_title: course.title.clone(),
            status,
            error: None,
            duration_seconds: duration.as_secs_f64(),
            session_id: Some(session.id),
            task_id: Some(task.id),
            share_url,
            live_url,
            video_file,
            credentials: Some(credentials),
            total_steps: timeline.len(),
            timeline,
        })
    }
}

fn signup_mission(credentials: &Credentials) -> String {
    format!(
        "Sign up for a new account on this website.\n\
         \n\
         Credentials:\n\
         - Email: {email}\n\
         - Password: {password}\n\
         \n\
         Steps:\n\
         1. Find and click the \"Sign Up\" or \"Create Account\" button\n\
         2. Fill in the signup form with the credentials above\n\
         3. Submit the form\n\
         4. If asked to verify email, wait on the verification page\n\
         \n\
         Do NOT proceed past the \"verify your email\" message.\n",
        email = credentials.email,
        password = credentials.password,
    )
}

/// The phase 2 mission: finish verification, log in if needed, then walk
/// the course's UI steps one by one.
fn course_mission(course: &Course, credentials: &Credentials, product_url: &str) -> String {
    let implementation = &course.implementation;

    let mut demo = format!(
        "You are demonstrating the course: \"{title}\"\n\
         \n\
         IMPORTANT: Stay on {site} throughout. Complete this specific course demo.\n\
         \n\
         COURSE OBJECTIVE:\n\
         {key_idea}\n\
         \n\
         STARTING POINT: {starting_point}\n\
         \n\
         STEP-BY-STEP INSTRUCTIONS:\n",
        title = course.title,
        site = site_host(product_url),
        key_idea = course.key_idea,
        starting_point = implementation.starting_point,
    );
    for step in &implementation.ui_steps {
        demo.push_str(&format!(
            "\nStep {}: {}\nExpected result: {}\n",
            step.step_number, step.action, step.expected_result
        ));
    }
    demo.push_str(&format!(
        "\n\
         CREDENTIALS (if needed):\n\
         - Email: {email}\n\
         - Password: {password}\n\
         \n\
         EXPECTED OUTCOME:\n\
         {outcome}\n\
         \n\
         Execute each step carefully and verify the expected results.\n\
         Provide a summary of what was accomplished.\n",
        email = credentials.email,
        password = credentials.password,
        outcome = implementation.expected_outcome,
    ));

    format!(
        "STEP 1: Complete email verification\n\
         You are starting at the verification URL. Wait for the page to load and verify.\n\
         \n\
         STEP 2: Login if needed\n\
         After verification, you may need to login:\n\
         - Email: {email}\n\
         - Password: {password}\n\
         \n\
         STEP 3: Execute course demo\n\
         {demo}\n\
         Complete all steps of the course demonstration.\n",
        email = credentials.email,
        password = credentials.password,
    )
}
