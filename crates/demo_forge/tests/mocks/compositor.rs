use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use demo_forge::{ComposeJob, Compositor};

/// What the compositor was asked to do, flattened for assertions.
#[derive(Debug, Clone)]
pub struct ComposedJob {
    pub intro_duration: f64,
    pub overlays: usize,
    pub session_id: String,
}

/// Compositor seam recording every job instead of running ffmpeg.
#[derive(Clone, Default)]
pub struct MockCompositor {
    pub jobs: Arc<Mutex<Vec<ComposedJob>>>,
}

impl Compositor for MockCompositor {
    type Error = anyhow::Error;

    async fn compose(&self, job: &ComposeJob<'_>) -> anyhow::Result<Option<PathBuf>> {
        self.jobs.lock().unwrap().push(ComposedJob {
            intro_duration: job.intro_duration,
            overlays: job.overlays.len(),
            session_id: job.session_id.to_owned(),
        });
        let output = job
            .output_dir
            .join(format!("course_{}_{}_final.mp4", job.course_index + 1, job.session_id));
        tokio::fs::write(&output, b"final").await?;
        Ok(Some(output))
    }
}
