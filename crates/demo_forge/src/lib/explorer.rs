//! Product exploration under a throwaway identity.
//!
//! Creates a disposable inbox, signs the agent up for the product inside a
//! cloud browser session and lets it explore, while a verification watcher
//! runs alongside. When a verification link lands, the watcher tears down
//! the signup session, opens a fresh one directly at the link and re-issues
//! the mission there; the waiter follows the replacement task through the
//! shared watch channel.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    browser::{BrowserAutomation, BrowserSession, TaskStatus},
    exploration::{parse_analysis, ExplorationReport},
    llm::VerificationExtractor,
    mail::{await_verification, Credentials, MailProvider, Verification},
    reports::site_host,
};

const EXPLORATION_MISSION: &str = include_str!("./prompts/exploration_mission.txt");

/// How long the signup verification email is awaited by default.
pub const DEFAULT_VERIFICATION_TIMEOUT: Duration = Duration::from_secs(90);

/// Default pause between inbox checks.
pub const DEFAULT_VERIFICATION_POLL_INTERVAL: Duration = Duration::from_secs(3);

pub struct ProductExplorer<'a, B, M, X> {
    browser: &'a B,
    mail: &'a M,
    extractor: &'a X,
    verification_timeout: Duration,
    verification_poll_interval: Duration,
}

impl<'a, B, M, X> ProductExplorer<'a, B, M, X>
where
    B: BrowserAutomation,
    M: MailProvider,
    X: VerificationExtractor,
{
    pub fn new(browser: &'a B, mail: &'a M, extractor: &'a X) -> Self {
        Self {
            browser,
            mail,
            extractor,
            verification_timeout: DEFAULT_VERIFICATION_TIMEOUT,
            verification_poll_interval: DEFAULT_VERIFICATION_POLL_INTERVAL,
        }
    }

    /// Overrides how long the signup verification email is awaited.
    pub fn verification_window(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.verification_timeout = timeout;
        self.verification_poll_interval = poll_interval;
        self
    }

    /// Explores `product_url` end to end and returns the structured report.
    ///
    /// Infrastructure failures (inbox, session or task creation) surface as
    /// errors. An exploration that ran but did not finish cleanly still
    /// yields a report, with `success` unset and whatever output the agent
    /// produced.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, product_url: &str) -> anyhow::Result<ExplorationReport> {
        let started_at = Utc::now();

        let inbox = self
            .mail
            .create_inbox()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create inbox: {e:?}"))?;
        let credentials = Credentials::for_inbox(&inbox.inbox_id);
        tracing::info!(email = %credentials.email, "Created throwaway identity");

        let mission = exploration_mission(product_url, &credentials);

        let session = self
            .browser
            .create_session(Some(product_url))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create browser session: {e:?}"))?;
        if let Some(live_url) = &session.live_url {
            tracing::info!(live_url, "Watch the exploration live");
        }

        let task_id = self
            .browser
            .create_task(&mission, Some(&session.id), Some(product_url))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create exploration task: {e:?}"))?;

        let (task_tx, task_rx) = watch::channel(task_id);
        let cancel = CancellationToken::new();

        // The waiter owns the terminal condition; once the (possibly
        // swapped) task settles, the verification watcher has nothing left
        // to act on and is cancelled.
        let waiter = async {
            let result = self.browser.wait_for_task(task_rx, false).await;
            cancel.cancel();
            result
        };
        let watcher = async {
            tokio::select! {
                () = cancel.cancelled() => None,
                swapped = self.follow_verification(
                    &inbox.inbox_id,
                    &credentials,
                    product_url,
                    &session.id,
                    &task_tx,
                ) => swapped,
            }
        };

        let (wait_result, swapped_session) = tokio::join!(waiter, watcher);
        let (task, _) = wait_result
            .map_err(|e| anyhow::anyhow!("Failed while waiting for the exploration task: {e:?}"))?;

        let duration_seconds = (Utc::now() - started_at).num_milliseconds() as f64 / 1000.0;
        let final_session = swapped_session.unwrap_or(session);

        tracing::info!(
            status = ?task.status,
            duration_s = duration_seconds,
            "Exploration finished"
        );

        let share_url = self.browser.share_link(&final_session.id).await;
        let raw_output = task.output.unwrap_or_default();

        Ok(ExplorationReport {
            product_url: product_url.to_owned(),
            explored_at: started_at,
            duration_seconds,
            credentials,
            session_id: final_session.id,
            task_id: task.id,
            live_url: final_session.live_url,
            share_url,
            status: task.status,
            success: task.status == TaskStatus::Finished,
            analysis: parse_analysis(&raw_output),
        })
    }

    /// Waits for the verification email and acts on what it contains.
    ///
    /// A link is the strong case: the agent cannot open the inbox itself,
    /// so the session is replaced by one that starts at the link and the
    /// mission is re-issued there. Codes and bare bodies are only logged;
    /// there is no channel back into a running agent. Returns the
    /// replacement session when one was created.
    async fn follow_verification(
        &self,
        inbox_id: &str,
        credentials: &Credentials,
        product_url: &str,
        session_id: &str,
        task_tx: &watch::Sender<String>,
    ) -> Option<BrowserSession> {
        let verification = match await_verification(
            self.mail,
            self.extractor,
            inbox_id,
            self.verification_timeout,
            self.verification_poll_interval,
        )
        .await
        {
            Ok(Some(verification)) => verification,
            Ok(None) => {
                tracing::info!("No verification email arrived, assuming none was required");
                return None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Verification watch failed");
                return None;
            }
        };

        match verification {
            Verification::Link(link) => {
                self.swap_to_verified_session(&link, credentials, product_url, session_id, task_tx)
                    .await
            }
            Verification::Code(code) => {
                tracing::warn!(code = %code, "Verification arrived as a code, not a link");
                None
            }
            Verification::Body(_) => {
                tracing::warn!("Verification email had neither link nor code");
                None
            }
        }
    }

    async fn swap_to_verified_session(
        &self,
        link: &str,
        credentials: &Credentials,
        product_url: &str,
        old_session_id: &str,
        task_tx: &watch::Sender<String>,
    ) -> Option<BrowserSession> {
        tracing::info!(link, "Verification link received, moving to a verified session");

        if let Err(err) = self.browser.stop_session(old_session_id).await {
            tracing::warn!(error = ?err, "Failed to stop the signup session");
        }

        let session = match self.browser.create_session(Some(link)).await {
            Ok(session) => session,
            Err(err) => {
                tracing::error!(error = ?err, "Failed to open a session at the verification link");
                return None;
            }
        };
        if let Some(live_url) = &session.live_url {
            tracing::info!(live_url, "Verified session live view");
        }

        let mission = continuation_mission(product_url, credentials);
        match self
            .browser
            .create_task(&mission, Some(&session.id), Some(link))
            .await
        {
            Ok(task_id) => {
                if task_tx.send(task_id).is_err() {
                    tracing::warn!("Task waiter already finished, continuation task orphaned");
                }
                Some(session)
            }
            Err(err) => {
                tracing::error!(error = ?err, "Failed to create the continuation task");
                None
            }
        }
    }
}

fn exploration_mission(product_url: &str, credentials: &Credentials) -> String {
    EXPLORATION_MISSION
        .replace("{product_url}", product_url)
        .replace("{site_name}", &site_host(product_url))
        .replace("{email}", &credentials.email)
        .replace("{username}", &credentials.username)
        .replace("{password}", &credentials.password)
}

/// The full mission again, framed for a session that starts at an already
/// opened verification link.
fn continuation_mission(product_url: &str, credentials: &Credentials) -> String {
    format!(
        "NOTE: The email verification link has already been opened. You may already be \
         verified.\n\n{}\n\nIMPORTANT: Since you're starting at the verification URL, you may \
         skip directly to being logged in.\nCheck if you're already logged in. If not, proceed \
         with login using the credentials above.\n",
        exploration_mission(product_url, credentials)
    )
}


#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            email: "pilot@agentmail.to".into(),
            username: "pilot".into(),
            password: "s3cretAbc12!Aa1".into(),
        }
    }

    #[test]
    fn mission_fills_in_identity_and_site() {
        let mission = exploration_mission("https://app.example.com/welcome", &credentials());

        assert!(mission.contains("Stay on app.example.com throughout"));
        assert!(mission.contains("Email: pilot@agentmail.to"));
        assert!(mission.contains("Username (if asked): pilot"));
        assert!(mission.contains("Password: s3cretAbc12!Aa1"));
        assert!(mission.contains("**URL:** https://app.example.com/welcome"));
        assert!(!mission.contains("{email}"));
        assert!(!mission.contains("{site_name}"));
    }

    #[test]
    fn continuation_mission_wraps_the_full_mission() {
        let mission = continuation_mission("https://app.example.com", &credentials());

        assert!(mission.starts_with("NOTE: The email verification link has already been opened."));
        assert!(mission.contains("PHASE 2: PRODUCT EXPLORATION & ANALYSIS"));
        assert!(mission.ends_with("proceed with login using the credentials above.\n"));
    }
}
