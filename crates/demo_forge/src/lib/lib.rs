//! # demo_forge
//!
//! Explores a web product with a cloud browser agent under a disposable
//! email identity, designs tutorial courses from what the agent finds,
//! re-executes those courses as recorded browser sessions, and composites
//! narrated picture-in-picture tutorial videos plus MDX course docs.
//!
//! The heavy lifting is delegated to external services (Browser-Use,
//! AgentMail, OpenAI, HeyGen) behind small traits, so the orchestration in
//! [`DemoPipeline`] stays testable without touching the network.

pub mod avatar;
pub mod browser;
pub mod compose;
pub mod course;
pub mod executor;
pub mod exploration;
pub mod explorer;
mod http;
pub mod llm;
pub mod mail;
mod pipeline;
pub mod record;
pub mod reports;
pub mod script;
pub mod timeline;
pub mod tracing;

pub use avatar::{render_script_segments, AvatarRenderer, ClipKind, HeyGenClient, RenderedClip};
pub use browser::{
    BrowserAutomation, BrowserSession, BrowserTask, BrowserUseClient, TaskStatus, TaskStep,
};
pub use compose::{ComposeJob, Compositor, FfmpegCompositor};
pub use course::{Course, CourseCatalog, ProductContext};
pub use executor::{CourseOutcome, CourseRunner, OutcomeStatus};
pub use exploration::{parse_analysis, ExplorationReport, ProductAnalysis};
pub use explorer::ProductExplorer;
pub use llm::{CourseDesigner, DocWriter, Narrator, OpenAIClient, VerificationExtractor};
pub use mail::{await_verification, AgentMailClient, Credentials, Inbox, MailProvider, Verification};
pub use pipeline::{builder::DemoPipelineBuilder, DemoPipeline, PipelineSummary};
pub use record::{FfmpegScreenRecorder, NoopRecorder, RecordingHandle, SessionRecorder};
pub use script::{ScriptSegment, SegmentKind, VideoScript};
pub use timeline::{CourseTimeline, TimelineEvent};
