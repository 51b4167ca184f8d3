use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use futures::StreamExt;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use tokio::{io::AsyncWriteExt, time::Instant};

use super::{AvatarRenderer, ClipKind};
use crate::http::retrying_client;

const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Debug, thiserror::Error)]
pub enum HeyGenError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest_middleware::Error),

    #[error("Invalid response: {0}")]
    Response(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// HeyGen avatar video client.
#[derive(Clone)]
pub struct HeyGenClient {
    client: ClientWithMiddleware,
    api_key: String,
    base_url: String,
    avatar_id: String,
    voice_id: String,
    poll_interval: Duration,
    render_timeout: Duration,
}

impl HeyGenClient {
    pub const BASE_URL: &str = "https://api.heygen.com";

    pub const DEFAULT_AVATAR_ID: &str = "ade9d90c5cd64482abbd5aaf15069c4a";
    pub const DEFAULT_VOICE_ID: &str = "Xfk8GMWcOK3klRS7h9s3";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: retrying_client(),
            api_key: api_key.into(),
            base_url: Self::BASE_URL.to_string(),
            avatar_id: Self::DEFAULT_AVATAR_ID.to_string(),
            voice_id: Self::DEFAULT_VOICE_ID.to_string(),
            poll_interval: Duration::from_secs(5),
            render_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_avatar(mut self, avatar_id: impl Into<String>) -> Self {
        self.avatar_id = avatar_id.into();
        self
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    pub fn with_polling(mut self, poll_interval: Duration, render_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.render_timeout = render_timeout;
        self
    }

    /// Submits a render job, returning the provider's video id.
    async fn generate_video(&self, text: &str, kind: ClipKind) -> Result<Option<String>, HeyGenError> {
        let (width, height) = kind.dimensions();
        let payload = serde_json::json!({
            "video_inputs": [{
                "character": {
                    "type": "avatar",
                    "avatar_id": self.avatar_id,
                    "avatar_style": "normal",
                },
                "voice": {
                    "type": "text",
                    "input_text": text,
                    "voice_id": self.voice_id,
                },
                "background": {
                    "type": "color",
                    "value": "#FFFFFF",
                },
            }],
            "dimension": { "width": width, "height": height },
            "test": false,
        });

        let resp = self
            .client
            .post(format!("{}/v2/video/generate", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&payload)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        let envelope = Self::check(resp).await?.json::<Envelope<GeneratedVideo>>().await?;
        match envelope.data.and_then(|d| d.video_id) {
            Some(video_id) => {
                tracing::info!(video_id = %video_id, kind = kind.as_str(), "Avatar render submitted");
                Ok(Some(video_id))
            }
            None => {
                tracing::warn!("Generate response carried no video id");
                Ok(None)
            }
        }
    }

    /// Polls until the video completes, fails or the render timeout passes.
    async fn wait_for_video(&self, video_id: &str) -> Result<Option<String>, HeyGenError> {
        let deadline = Instant::now() + self.render_timeout;

        while Instant::now() < deadline {
            tokio::time::sleep(self.poll_interval).await;

            let status = match self.video_status(video_id).await {
                Ok(status) => status,
                Err(err) => {
                    tracing::warn!(error = %err, video_id, "Status poll failed, retrying");
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
            };

            match status.status.as_str() {
                "completed" => return Ok(status.video_url),
                "failed" => {
                    tracing::warn!(video_id, error = ?status.error, "Avatar render failed");
                    return Ok(None);
                }
                _ => {}
            }
        }

        tracing::warn!(
            video_id,
            timeout_s = self.render_timeout.as_secs(),
            "Timed out waiting for avatar video"
        );
        Ok(None)
    }

    async fn video_status(&self, video_id: &str) -> Result<VideoStatus, HeyGenError> {
        let resp = self
            .client
            .get(format!("{}/v1/video_status.get", self.base_url))
            .query(&[("video_id", video_id)])
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let envelope = Self::check(resp).await?.json::<Envelope<VideoStatus>>().await?;
        Ok(envelope.data.unwrap_or_default())
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), HeyGenError> {
        let resp = self.client.get(url).send().await?;
        let resp = Self::check(resp).await?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }

    pub async fn list_avatars(&self) -> Result<Vec<AvatarSummary>, HeyGenError> {
        let resp = self
            .client
            .get(format!("{}/v2/avatars", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let envelope = Self::check(resp).await?.json::<Envelope<AvatarListing>>().await?;
        Ok(envelope.data.map(|d| d.avatars).unwrap_or_default())
    }

    pub async fn list_voices(&self) -> Result<Vec<VoiceSummary>, HeyGenError> {
        let resp = self
            .client
            .get(format!("{}/v2/voices", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let envelope = Self::check(resp).await?.json::<Envelope<VoiceListing>>().await?;
        Ok(envelope.data.map(|d| d.voices).unwrap_or_default())
    }

    pub async fn list_avatar_groups(&self, include_public: bool) -> Result<AvatarGroupList, HeyGenError> {
        let resp = self
            .client
            .get(format!("{}/v2/avatar_group.list", self.base_url))
            .query(&[("include_public", include_public.to_string())])
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let envelope = Self::check(resp).await?.json::<Envelope<AvatarGroupList>>().await?;
        Ok(envelope.data.unwrap_or_default())
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, HeyGenError> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await?;
            return Err(HeyGenError::Api { status, message });
        }
        Ok(resp)
    }
}

impl AvatarRenderer for HeyGenClient {
    type Error = HeyGenError;

    #[tracing::instrument(skip(self, text))]
    async fn render_clip(
        &self,
        text: &str,
        kind: ClipKind,
        dest: &Path,
    ) -> Result<Option<PathBuf>, HeyGenError> {
        let Some(video_id) = self.generate_video(text, kind).await? else {
            return Ok(None);
        };
        let Some(video_url) = self.wait_for_video(&video_id).await? else {
            return Ok(None);
        };
        self.download(&video_url, dest).await?;
        tracing::info!(dest = %dest.display(), "Avatar clip downloaded");
        Ok(Some(dest.to_path_buf()))
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct GeneratedVideo {
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VideoStatus {
    #[serde(default)]
    status: String,
    video_url: Option<String>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AvatarListing {
    #[serde(default)]
    avatars: Vec<AvatarSummary>,
}

#[derive(Debug, Deserialize)]
struct VoiceListing {
    #[serde(default)]
    voices: Vec<VoiceSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarSummary {
    pub avatar_id: String,
    pub avatar_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSummary {
    pub voice_id: String,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub gender: Option<String>,
    pub language: Option<String>,
    pub voice_type: Option<String>,
}

impl VoiceSummary {
    /// Preferred human-readable name.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("unnamed")
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AvatarGroupList {
    #[serde(default)]
    pub total_count: u32,
    #[serde(default)]
    pub avatar_group_list: Vec<AvatarGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarGroup {
    pub id: String,
    pub name: Option<String>,
    pub group_type: Option<String>,
    pub train_status: Option<String>,
    pub num_looks: Option<u32>,
    pub default_voice_id: Option<String>,
}
