use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use demo_forge::{AvatarRenderer, ClipKind};

/// Avatar seam that "renders" by writing a stub file, or skips every
/// segment when built with [`MockAvatar::skipping`].
#[derive(Clone, Default)]
pub struct MockAvatar {
    pub rendered: Arc<Mutex<Vec<(ClipKind, String)>>>,
    pub skip_all: bool,
}

impl MockAvatar {
    pub fn skipping() -> Self {
        Self {
            skip_all: true,
            ..Self::default()
        }
    }
}

impl AvatarRenderer for MockAvatar {
    type Error = anyhow::Error;

    async fn render_clip(
        &self,
        text: &str,
        kind: ClipKind,
        dest: &Path,
    ) -> anyhow::Result<Option<PathBuf>> {
        self.rendered.lock().unwrap().push((kind, text.to_owned()));
        if self.skip_all {
            return Ok(None);
        }
        tokio::fs::write(dest, b"clip").await?;
        Ok(Some(dest.to_path_buf()))
    }
}
