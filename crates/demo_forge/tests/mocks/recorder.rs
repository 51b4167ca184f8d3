use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use demo_forge::{RecordingHandle, SessionRecorder};

/// Recorder seam that writes a stub video file when stopped.
#[derive(Clone, Default)]
pub struct MockRecorder {
    pub starts: Arc<Mutex<Vec<String>>>,
}

pub struct MockRecording {
    file: PathBuf,
}

impl SessionRecorder for MockRecorder {
    type Handle = MockRecording;
    type Error = anyhow::Error;

    async fn start(
        &self,
        live_url: &str,
        output: &Path,
        _expected_duration: Duration,
    ) -> anyhow::Result<MockRecording> {
        self.starts.lock().unwrap().push(live_url.to_owned());
        Ok(MockRecording {
            file: output.to_path_buf(),
        })
    }
}

impl RecordingHandle for MockRecording {
    async fn stop(self) -> Option<PathBuf> {
        tokio::fs::write(&self.file, b"recording").await.ok()?;
        Some(self.file)
    }
}
