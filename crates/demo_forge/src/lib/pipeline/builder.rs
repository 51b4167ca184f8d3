use std::{path::PathBuf, time::Duration};

use crate::{
    avatar::AvatarRenderer,
    browser::BrowserAutomation,
    compose::Compositor,
    explorer::{DEFAULT_VERIFICATION_POLL_INTERVAL, DEFAULT_VERIFICATION_TIMEOUT},
    llm::{CourseDesigner, DocWriter, Narrator, VerificationExtractor},
    mail::MailProvider,
    record::SessionRecorder,
    DemoPipeline,
};

/// Builds a [`DemoPipeline`]. Each seam starts as `()` and `build` only
/// exists once all eight have been provided.
pub struct DemoPipelineBuilder<B = (), M = (), X = (), D = (), N = (), A = (), R = (), V = ()> {
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

impl DemoPipelineBuilder {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            browser: (),
            mail: (),
            extractor: (),
            designer: (),
            narrator: (),
            avatar_renderer: (),
            recorder: (),
            compositor: (),
            course_count: 5,
            max_courses: None,
            generate_courses: true,
            execute_courses: false,
            narrate: false,
            verification_timeout: DEFAULT_VERIFICATION_TIMEOUT,
            verification_poll_interval: DEFAULT_VERIFICATION_POLL_INTERVAL,
        }
    }
}

impl<B, M, X, D, N, A, R, V> DemoPipelineBuilder<B, M, X, D, N, A, R, V> {
    pub fn browser<B2: BrowserAutomation + Send + Sync + 'static>(
        self,
        browser: B2,
    ) -> DemoPipelineBuilder<B2, M, X, D, N, A, R, V> {
        DemoPipelineBuilder {
            output_dir: self.output_dir,
            browser,
            mail: self.mail,
            extractor: self.extractor,
            designer: self.designer,
            narrator: self.narrator,
            avatar_renderer: self.avatar_renderer,
            recorder: self.recorder,
            compositor: self.compositor,
            course_count: self.course_count,
            max_courses: self.max_courses,
            generate_courses: self.generate_courses,
            execute_courses: self.execute_courses,
            narrate: self.narrate,
            verification_timeout: self.verification_timeout,
            verification_poll_interval: self.verification_poll_interval,
        }
    }

    pub fn mail<M2: MailProvider + Send + Sync + 'static>(
        self,
        mail: M2,
    ) -> DemoPipelineBuilder<B, M2, X, D, N, A, R, V> {
        DemoPipelineBuilder {
            output_dir: self.output_dir,
            browser: self.browser,
            mail,
            extractor: self.extractor,
            designer: self.designer,
            narrator: self.narrator,
            avatar_renderer: self.avatar_renderer,
            recorder: self.recorder,
            compositor: self.compositor,
            course_count: self.course_count,
            max_courses: self.max_courses,
            generate_courses: self.generate_courses,
            execute_courses: self.execute_courses,
            narrate: self.narrate,
            verification_timeout: self.verification_timeout,
            verification_poll_interval: self.verification_poll_interval,
        }
    }

    pub fn extractor<X2: VerificationExtractor + Send + Sync + 'static>(
        self,
        extractor: X2,
    ) -> DemoPipelineBuilder<B, M, X2, D, N, A, R, V> {
        DemoPipelineBuilder {
            output_dir: self.output_dir,
            browser: self.browser,
            mail: self.mail,
            extractor,
            designer: self.designer,
            narrator: self.narrator,
            avatar_renderer: self.avatar_renderer,
            recorder: self.recorder,
            compositor: self.compositor,
            course_count: self.course_count,
            max_courses: self.max_courses,
            generate_courses: self.generate_courses,
            execute_courses: self.execute_courses,
            narrate: self.narrate,
            verification_timeout: self.verification_timeout,
            verification_poll_interval: self.verification_poll_interval,
        }
    }

    pub fn designer<D2: CourseDesigner + Send + Sync + 'static>(
        self,
        designer: D2,
    ) -> DemoPipelineBuilder<B, M, X, D2, N, A, R, V> {
        DemoPipelineBuilder {
            output_dir: self.output_dir,
            browser: self.browser,
            mail: self.mail,
            extractor: self.extractor,
            designer,
            narrator: self.narrator,
            avatar_renderer: self.avatar_renderer,
            recorder: self.recorder,
            compositor: self.compositor,
            course_count: self.course_count,
            max_courses: self.max_courses,
            generate_courses: self.generate_courses,
            execute_courses: self.execute_courses,
            narrate: self.narrate,
            verification_timeout: self.verification_timeout,
            verification_poll_interval: self.verification_poll_interval,
        }
    }

    pub fn narrator<N2: Narrator + DocWriter + Send + Sync + 'static>(
        self,
        narrator: N2,
    ) -> DemoPipelineBuilder<B, M, X, D, N2, A, R, V> {
        DemoPipelineBuilder {
            output_dir: self.output_dir,
            browser: self.browser,
            mail: self.mail,
            extractor: self.extractor,
            designer: self.designer,
            narrator,
            avatar_renderer: self.avatar_renderer,
            recorder: self.recorder,
            compositor: self.compositor,
            course_count: self.course_count,
            max_courses: self.max_courses,
            generate_courses: self.generate_courses,
            execute_courses: self.execute_courses,
            narrate: self.narrate,
            verification_timeout: self.verification_timeout,
            verification_poll_interval: self.verification_poll_interval,
        }
    }

    pub fn avatar_renderer<A2: AvatarRenderer + Send + Sync + 'static>(
        self,
        avatar_renderer: A2,
    ) -> DemoPipelineBuilder<B, M, X, D, N, A2, R, V> {
        DemoPipelineBuilder {
            output_dir: self.output_dir,
            browser: self.browser,
            mail: self.mail,
            extractor: self.extractor,
            designer: self.designer,
            narrator: self.narrator,
            avatar_renderer,
            recorder: self.recorder,
            compositor: self.compositor,
            course_count: self.course_count,
            max_courses: self.max_courses,
            generate_courses: self.generate_courses,
            execute_courses: self.execute_courses,
            narrate: self.narrate,
            verification_timeout: self.verification_timeout,
            verification_poll_interval: self.verification_poll_interval,
        }
    }

    pub fn recorder<R2: SessionRecorder + Send + Sync + 'static>(
        self,
        recorder: R2,
    ) -> DemoPipelineBuilder<B, M, X, D, N, A, R2, V> {
        DemoPipelineBuilder {
            output_dir: self.output_dir,
            browser: self.browser,
            mail: self.mail,
            extractor: self.extractor,
            designer: self.designer,
            narrator: self.narrator,
            avatar_renderer: self.avatar_renderer,
            recorder,
            compositor: self.compositor,
            course_count: self.course_count,
            max_courses: self.max_courses,
            generate_courses: self.generate_courses,
            execute_courses: self.execute_courses,
            narrate: self.narrate,
            verification_timeout: self.verification_timeout,
            verification_poll_interval: self.verification_poll_interval,
        }
    }

    pub fn compositor<V2: Compositor + Send + Sync + 'static>(
        self,
        compositor: V2,
    ) -> DemoPipelineBuilder<B, M, X, D, N, A, R, V2> {
        DemoPipelineBuilder {
            output_dir: self.output_dir,
            browser: self.browser,
            mail: self.mail,
            extractor: self.extractor,
            designer: self.designer,
            narrator: self.narrator,
            avatar_renderer: self.avatar_renderer,
            recorder: self.recorder,
            compositor,
            course_count: self.course_count,
            max_courses: self.max_courses,
            generate_courses: self.generate_courses,
            execute_courses: self.execute_courses,
            narrate: self.narrate,
            verification_timeout: self.verification_timeout,
            verification_poll_interval: self.verification_poll_interval,
        }
    }

    /// How many courses to ask the designer for.
    pub fn course_count(mut self, course_count: usize) -> Self {
        self.course_count = course_count;
        self
    }

    /// Caps how many designed courses are actually executed.
    pub fn max_courses(mut self, max_courses: usize) -> Self {
        self.max_courses = Some(max_courses);
        self
    }

    pub fn generate_courses(mut self, generate_courses: bool) -> Self {
        self.generate_courses = generate_courses;
        self
    }

    pub fn execute_courses(mut self, execute_courses: bool) -> Self {
        self.execute_courses = execute_courses;
        self
    }

    pub fn narrate(mut self, narrate: bool) -> Self {
        self.narrate = narrate;
        self
    }

    pub fn verification_window(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.verification_timeout = timeout;
        self.verification_poll_interval = poll_interval;
        self
    }
}

impl<B, M, X, D, N, A, R, V> DemoPipelineBuilder<B, M, X, D, N, A, R, V>
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
    pub fn build(self) -> DemoPipeline<B, M, X, D, N, A, R, V> {
        DemoPipeline {
            output_dir: self.output_dir,
            browser: self.browser,
            mail: self.mail,
            extractor: self.extractor,
            designer: self.designer,
            narrator: self.narrator,
            avatar_renderer: self.avatar_renderer,
            recorder: self.recorder,
            compositor: self.compositor,
            course_count: self.course_count,
            max_courses: self.max_courses,
            generate_courses: self.generate_courses,
            execute_courses: self.execute_courses,
            narrate: self.narrate,
            verification_timeout: self.verification_timeout,
            verification_poll_interval: self.verification_poll_interval,
        }
    }
}
