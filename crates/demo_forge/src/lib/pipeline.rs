//! The end-to-end pipeline.
//!
//! Wires the seams together in order: explore the product under a throwaway
//! identity, design courses from the analysis, re-run each course as a
//! recorded browser session, then narrate, composite and document the runs.
//! Later stages are skipped when an earlier one is disabled or comes back
//! empty, and every stage leaves its artifacts in the output directory
//! before the next one starts.

pub mod builder;

use std::{path::PathBuf, time::Duration};

use anyhow::Context;

use crate::{
    avatar::{render_script_segments, AvatarRenderer, ClipKind},
    browser::BrowserAutomation,
    compose::{ComposeJob, Compositor},
    course::{CourseCatalog, ProductContext},
    executor::{CourseOutcome, CourseRunner},
    exploration::ExplorationReport,
    explorer::ProductExplorer,
    llm::{CourseDesigner, DocWriter, Narrator, VerificationExtractor},
    mail::MailProvider,
    record::SessionRecorder,
    reports::{self, CatalogArtifacts, ExecutionArtifacts, ExplorationArtifacts},
    timeline::truncate_chars,
};

/// How much of the raw analysis the doc writer gets as product context.
const PRODUCT_OVERVIEW_CHARS: usize = 1000;

/// What the pipeline produced, stage by stage. Stages that never ran leave
/// their fields `None` or empty.
#[derive(Debug)]
pub struct PipelineSummary {
    pub exploration: ExplorationArtifacts,
    pub exploration_succeeded: bool,
    pub catalog: Option<CatalogArtifacts>,
    pub courses_designed: usize,
    pub execution: Option<ExecutionArtifacts>,
    pub courses_finished: usize,
    pub courses_failed: usize,
    pub final_videos: Vec<PathBuf>,
    pub docs: Vec<PathBuf>,
}

pub struct DemoPipeline<B, M, X, D, N, A, R, V>
where
    B: BrowserAutomation + Send + Sync + 'static,
    M: MailProvider + Send + Sync + 'static,
    X: VerificationExtractor + Send + Sync + 'static,
    D: CourseDesigner + Send + Sync + 'static,
    N: Narrator + DocWriter + Send + Sync + 'static,
    A: AvatarRenderer + Send + Sync + 'static,
    R: SessionRecorder + Send + Sync + 'static,
    V: Compositor + Send + Sync + 'static,
{
    output_dir: PathBuf,
    browser: B,
    mail: M,
    extractor: X,
    designer: D,
    narrator: N,
    avatar_renderer: A,
    recorder: R,
    compositor: V,
    course_count: usize,
    max_courses: Option<usize>,
    generate_courses: bool,
    execute_courses: bool,
    narrate: bool,
    verification_timeout: Duration,
    verification_poll_interval: Duration,
}

impl<B, M, X, D, N, A, R, V> DemoPipeline<B, M, X, D, N, A, R, V>
where
    B: BrowserAutomation + Send + Sync + 'static,
    M: MailProvider + Send + Sync + 'static,
    X: VerificationExtractor + Send + Sync + 'static,
    D: CourseDesigner + Send + Sync + 'static,
    N: Narrator + DocWriter + Send + Sync + 'static,
    A: AvatarRenderer + Send + Sync + 'static,
    R: SessionRecorder + Send + Sync + 'static,
    V: Compositor + Send + Sync + 'static,
{
    #[tracing::instrument(skip(self))]
    pub async fn run(self, product_url: &str) -> anyhow::Result<PipelineSummary> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create output directory {}",
                    self.output_dir.display()
                )
            })?;

        let report = ProductExplorer::new(&self.browser, &self.mail, &self.extractor)
            .verification_window(self.verification_timeout, self.verification_poll_interval)
            .run(product_url)
            .await?;

        let exploration = reports::write_exploration_report(&self.output_dir, &report).await?;

        let mut summary = PipelineSummary {
            exploration,
            exploration_succeeded: report.success,
            catalog: None,
            courses_designed: 0,
            execution: None,
            courses_finished: 0,
            courses_failed: 0,
            final_videos: Vec::new(),
            docs: Vec::new(),
        };

        if !self.generate_courses {
            tracing::info!("Course generation disabled, stopping after exploration");
            return Ok(summary);
        }
        if !report.success {
            tracing::warn!(
                status = %report.status,
                "Exploration did not finish cleanly, skipping course design"
            );
            return Ok(summary);
        }

        let catalog = match self
            .designer
            .design_courses(
                &report.analysis.raw_output,
                &report.product_url,
                self.course_count,
            )
            .await
        {
            Ok(catalog) => catalog,
            Err(err) => {
                tracing::error!(error = ?err, "Course design failed");
                return Ok(summary);
            }
        };
        tracing::info!(
            courses = catalog.courses.len(),
            product = %catalog.product_name,
            "Courses designed"
        );
        summary.courses_designed = catalog.courses.len();
        summary.catalog =
            Some(reports::write_course_catalog(&self.output_dir, &catalog, &report).await?);

        if !self.execute_courses {
            return Ok(summary);
        }

        let limit = self
            .max_courses
            .map_or(catalog.courses.len(), |max| max.min(catalog.courses.len()));
        let outcomes = CourseRunner::new(
            &self.browser,
            &self.mail,
            &self.extractor,
            &self.recorder,
            &self.output_dir,
        )
        .verification_window(self.verification_timeout, self.verification_poll_interval)
        .run_all(&catalog.courses[..limit], product_url)
        .await;

        summary.courses_finished = outcomes.iter().filter(|o| o.is_finished()).count();
        summary.courses_failed = outcomes.len() - summary.courses_finished;
        summary.execution = Some(
            reports::write_execution_artifacts(&self.output_dir, &outcomes, &catalog, product_url)
                .await?,
        );

        if self.narrate {
            summary.final_videos = self.narrate_outcomes(&catalog, &outcomes).await;
        }

        summary.docs = self
            .write_course_docs(&catalog, &outcomes, product_url, &report)
            .await;

        tracing::info!(
            designed = summary.courses_designed,
            finished = summary.courses_finished,
            failed = summary.courses_failed,
            videos = summary.final_videos.len(),
            docs = summary.docs.len(),
            "Pipeline complete"
        );
        Ok(summary)
    }

    /// Scripts, renders and composites a final video for every finished
    /// course run that has both a recording and a timeline. Failures here
    /// cost one video, never the run.
    #[tracing::instrument(skip_all)]
    async fn narrate_outcomes(
        &self,
        catalog: &CourseCatalog,
        outcomes: &[CourseOutcome],
    ) -> Vec<PathBuf> {
        let mut videos = Vec::new();

        for outcome in outcomes {
            if !outcome.is_finished() {
                continue;
            }
            let Some(browser_recording) = outcome.video_file.as_deref() else {
                tracing::warn!(
                    course = %outcome.course_title,
                    "No recording captured, skipping narration"
                );
                continue;
            };
            let Some(timeline) = outcome.timeline_data() else {
                tracing::warn!(
                    course = %outcome.course_title,
                    "No timeline captured, skipping narration"
                );
                continue;
            };
            let Some(course) = catalog.courses.get(outcome.course_index) else {
                continue;
            };

            let script = match self
                .narrator
                .write_script(
                    &course.title,
                    &course.key_idea,
                    &catalog.product_name,
                    &timeline,
                )
                .await
            {
                Ok(script) => script,
                Err(err) => {
                    tracing::error!(
                        error = ?err,
                        course = %outcome.course_title,
                        "Narration script generation failed"
                    );
                    continue;
                }
            };
            if let Err(err) = reports::write_script_json(
                &self.output_dir,
                outcome.course_index,
                &timeline.session_id,
                &script,
            )
            .await
            {
                tracing::warn!(error = ?err, "Failed to persist narration script");
            }

            let clips =
                render_script_segments(&self.avatar_renderer, &script, &self.output_dir).await;
            let Some(intro_clip) = clips
                .iter()
                .find(|c| c.kind == ClipKind::Intro)
                .and_then(|c| c.video_file.as_deref())
            else {
                tracing::warn!(
                    course = %outcome.course_title,
                    "Intro clip was not rendered, skipping composition"
                );
                continue;
            };
            let overlays: Vec<_> = clips
                .iter()
                .filter(|c| c.kind == ClipKind::Narration)
                .cloned()
                .collect();

            let job = ComposeJob {
                intro_clip,
                browser_recording,
                overlays: &overlays,
                intro_duration: script.effective_intro_duration(),
                course_index: outcome.course_index,
                session_id: &timeline.session_id,
                output_dir: &self.output_dir,
            };
            match self.compositor.compose(&job).await {
                Ok(Some(video)) => {
                    tracing::info!(
                        video = %video.display(),
                        course = %outcome.course_title,
                        "Final video composed"
                    );
                    videos.push(video);
                }
                Ok(None) => tracing::warn!(
                    course = %outcome.course_title,
                    "Composition produced no video"
                ),
                Err(err) => tracing::error!(
                    error = ?err,
                    course = %outcome.course_title,
                    "Composition failed"
                ),
            }
        }

        videos
    }

    /// Writes an MDX doc for every finished course run, grounded in the
    /// captured timeline rather than the course plan alone.
    #[tracing::instrument(skip_all)]
    async fn write_course_docs(
        &self,
        catalog: &CourseCatalog,
        outcomes: &[CourseOutcome],
        product_url: &str,
        report: &ExplorationReport,
    ) -> Vec<PathBuf> {
        let product = ProductContext {
            product_name: catalog.product_name.clone(),
            product_url: product_url.to_owned(),
            product_overview: truncate_chars(&report.analysis.raw_output, PRODUCT_OVERVIEW_CHARS)
                .to_owned(),
        };

        let mut docs = Vec::new();
        for outcome in outcomes {
            if !outcome.is_finished() {
                continue;
            }
            let Some(timeline) = outcome.timeline_data() else {
                continue;
            };
            let Some(course) = catalog.courses.get(outcome.course_index) else {
                continue;
            };

            let mdx = match self
                .narrator
                .write_course_doc(course, &timeline, &product)
                .await
            {
                Ok(mdx) => mdx,
                Err(err) => {
                    tracing::error!(
                        error = ?err,
                        course = %outcome.course_title,
                        "Course doc generation failed"
                    );
                    continue;
                }
            };
            match reports::write_mdx(&self.output_dir, outcome.course_index, &course.title, &mdx)
                .await
            {
                Ok(path) => docs.push(path),
                Err(err) => tracing::error!(error = ?err, "Failed to write course doc"),
            }
        }

        docs
    }
}
