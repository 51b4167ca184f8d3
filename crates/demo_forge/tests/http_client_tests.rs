use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use wiremock::{
    matchers::{body_partial_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use demo_forge::{
    await_verification,
    browser::BrowserUseError,
    course::{CourseImplementation, UiStep},
    llm::OpenAIError,
    AgentMailClient, AvatarRenderer, BrowserAutomation, BrowserUseClient, ClipKind, Course,
    CourseCatalog, CourseDesigner, HeyGenClient, OpenAIClient, TaskStatus, Verification,
    VerificationExtractor,
};

fn fast_browser(server: &MockServer) -> BrowserUseClient {
    BrowserUseClient::new("test-key")
        .with_base_url(server.uri())
        .with_poll_intervals(Duration::from_millis(10), Duration::from_millis(10))
        .with_backoffs(Duration::from_millis(10), Duration::from_millis(10))
}

// ─── Browser-Use task polling ────────────────────────────────────────────────

#[tokio::test]
async fn task_wait_polls_until_a_terminal_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks/t1"))
        .and(header("X-Browser-Use-API-Key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "t1", "status": "started", "output": null, "steps": []
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "t1", "status": "finished", "output": "all done", "steps": []
        })))
        .mount(&server)
        .await;

    let (_tx, rx) = watch::channel("t1".to_string());
    let (task, events) = fast_browser(&server).wait_for_task(rx, false).await.unwrap();

    assert_eq!(task.status, TaskStatus::Finished);
    assert_eq!(task.output.as_deref(), Some("all done"));
    assert!(events.is_empty());
}

#[tokio::test]
async fn task_wait_follows_a_replacement_task_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "t1", "status": "started", "output": null, "steps": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks/t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "t2", "status": "finished", "output": "continuation done", "steps": []
        })))
        .mount(&server)
        .await;

    let (tx, rx) = watch::channel("t1".to_string());
    let client = fast_browser(&server);
    let swap = async {
        tokio::time::sleep(Duration::from_millis(40)).await;
        tx.send("t2".to_string()).unwrap();
    };
    let (wait_result, ()) = tokio::join!(client.wait_for_task(rx, false), swap);

    let (task, _events) = wait_result.unwrap();
    assert_eq!(task.id, "t2", "The waiter should settle on the swapped-in task");
    assert_eq!(task.output.as_deref(), Some("continuation done"));
}

#[tokio::test]
async fn timeline_capture_folds_each_step_exactly_once() {
    let server = MockServer::start().await;
    let step_one = json!({
        "number": 1, "url": "https://app.test/home",
        "screenshotUrl": "https://cdn.test/1.png",
        "memory": "Opened the home page", "actions": ["{\"click\": {\"index\": 1}}"]
    });
    let step_two = json!({
        "number": 2, "url": "https://app.test/notes",
        "screenshotUrl": "https://cdn.test/2.png",
        "memory": "Created a note", "actions": []
    });
    Mock::given(method("GET"))
        .and(path("/tasks/t9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "t9", "status": "started", "output": null, "steps": [step_one]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks/t9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "t9", "status": "finished", "output": "done", "steps": [step_one, step_two]
        })))
        .mount(&server)
        .await;

    let (_tx, rx) = watch::channel("t9".to_string());
    let (_task, events) = fast_browser(&server).wait_for_task(rx, true).await.unwrap();

    assert_eq!(events.len(), 2, "Re-reported steps must not duplicate events");
    assert_eq!(events[0].step_number, 1);
    assert_eq!(events[1].step_number, 2);
    assert_eq!(events[1].url.as_deref(), Some("https://app.test/notes"));
}

// ─── Browser-Use session creation ────────────────────────────────────────────

#[tokio::test]
async fn session_creation_backs_off_on_a_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sessions"))
        .and(body_partial_json(json!({ "startUrl": "https://app.test" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sess-1", "liveUrl": "https://live.test/sess-1"
        })))
        .mount(&server)
        .await;

    let session = fast_browser(&server)
        .create_session(Some("https://app.test"))
        .await
        .unwrap();

    assert_eq!(session.id, "sess-1");
    assert_eq!(session.live_url.as_deref(), Some("https://live.test/sess-1"));
}

#[tokio::test]
async fn session_lookup_returns_the_current_live_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/sess-1"))
        .and(header("X-Browser-Use-API-Key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sess-1", "liveUrl": "https://live.test/sess-1"
        })))
        .mount(&server)
        .await;

    let session = fast_browser(&server).get_session("sess-1").await.unwrap();

    assert_eq!(session.id, "sess-1");
    assert_eq!(session.live_url.as_deref(), Some("https://live.test/sess-1"));
}

#[tokio::test]
async fn session_creation_gives_up_after_repeated_rate_limits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = fast_browser(&server)
        .create_session(None)
        .await
        .expect_err("persistent 429s should fail session creation");

    assert!(matches!(err, BrowserUseError::RateLimited(3)), "got: {err}");
}

// ─── Verification email watching ─────────────────────────────────────────────

#[tokio::test]
async fn verification_wait_times_out_to_none_on_an_empty_inbox() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/inboxes/pilot@agentmail.to/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": [] })))
        .mount(&server)
        .await;

    let mail = AgentMailClient::new("mail-key").with_base_url(server.uri());
    // never called: the extractor only sees non-empty inboxes
    let extractor = OpenAIClient::new("llm-key").with_base_url(server.uri());

    let result = await_verification(
        &mail,
        &extractor,
        "pilot@agentmail.to",
        Duration::from_millis(100),
        Duration::from_millis(20),
    )
    .await
    .unwrap();

    assert_eq!(result, None);
}

#[tokio::test]
async fn verification_link_is_extracted_from_the_newest_message() {
    let link = "https://app.test/verify?token=abc123";
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/inboxes/pilot@agentmail.to/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{
                "message_id": "m1",
                "from": "noreply@app.test",
                "subject": "Verify your email",
                "preview": "Click the link"
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/inboxes/pilot@agentmail.to/messages/m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message_id": "m1",
            "subject": "Verify your email",
            "text": format!("Welcome! Click {link} to verify."),
            "html": null,
            "preview": null
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": link, "refusal": null } }]
        })))
        .mount(&server)
        .await;

    let mail = AgentMailClient::new("mail-key").with_base_url(server.uri());
    let extractor = OpenAIClient::new("llm-key").with_base_url(server.uri());

    let result = await_verification(
        &mail,
        &extractor,
        "pilot@agentmail.to",
        Duration::from_secs(5),
        Duration::from_millis(20),
    )
    .await
    .unwrap();

    assert_eq!(result, Some(Verification::Link(link.to_string())));
}

// ─── OpenAI structured outputs ───────────────────────────────────────────────

fn one_course_catalog() -> CourseCatalog {
    CourseCatalog {
        product_name: "Notesy".to_string(),
        product_category: "Note taking".to_string(),
        learning_path_overview: "One course, start to finish".to_string(),
        courses: vec![Course {
            title: "Create your first note".to_string(),
            key_idea: "Notes are the core object".to_string(),
            target_user: "New users".to_string(),
            difficulty_level: "beginner".to_string(),
            estimated_time_minutes: 5,
            concepts: vec![],
            implementation: CourseImplementation {
                starting_point: "Dashboard".to_string(),
                ui_steps: vec![UiStep {
                    step_number: 1,
                    action: "Click New Note".to_string(),
                    expected_result: "The editor opens".to_string(),
                    screenshot_description: "An empty editor".to_string(),
                }],
                expected_outcome: "A note exists".to_string(),
                common_pitfalls: vec![],
            },
            real_world_use_case: "Meeting minutes".to_string(),
            next_steps: vec![],
        }],
    }
}

#[tokio::test]
async fn course_design_round_trips_through_structured_outputs() {
    let catalog = one_course_catalog();
    let content = serde_json::to_string(&catalog).unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "model": "o3-mini",
            "response_format": {
                "type": "json_schema",
                "json_schema": { "name": "course_catalog", "strict": true }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": content, "refusal": null } }]
        })))
        .mount(&server)
        .await;

    let client = OpenAIClient::new("llm-key").with_base_url(server.uri());
    let designed = client
        .design_courses("the exploration analysis", "https://app.test", 1)
        .await
        .unwrap();

    assert_eq!(designed, catalog);
}

#[tokio::test]
async fn model_refusals_surface_as_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": null, "refusal": "I cannot do that" } }]
        })))
        .mount(&server)
        .await;

    let client = OpenAIClient::new("llm-key").with_base_url(server.uri());
    let err = client
        .extract_verification("Verify", "body")
        .await
        .expect_err("refusals are errors");

    assert!(matches!(err, OpenAIError::Refusal(ref msg) if msg == "I cannot do that"));
}

// ─── HeyGen rendering ────────────────────────────────────────────────────────

#[tokio::test]
async fn avatar_render_times_out_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/video/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "video_id": "v1" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/video_status.get"))
        .and(query_param("video_id", "v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "status": "processing" }
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("clip.mp4");
    let client = HeyGenClient::new("avatar-key")
        .with_base_url(server.uri())
        .with_polling(Duration::from_millis(10), Duration::from_millis(60));

    let rendered = client
        .render_clip("Hello there", ClipKind::Narration, &dest)
        .await
        .unwrap();

    assert_eq!(rendered, None);
    assert!(!dest.exists());
}

#[tokio::test]
async fn avatar_render_downloads_the_completed_video() {
    let server = MockServer::start().await;
    let video_url = format!("{}/files/v1.mp4", server.uri());

    Mock::given(method("POST"))
        .and(path("/v2/video/generate"))
        .and(body_partial_json(json!({
            "dimension": { "width": 1280, "height": 720 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "video_id": "v1" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/video_status.get"))
        .and(query_param("video_id", "v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "status": "processing" }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/video_status.get"))
        .and(query_param("video_id", "v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "status": "completed", "video_url": video_url }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/v1.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"mp4 bytes".to_vec(), "video/mp4"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("intro.mp4");
    let client = HeyGenClient::new("avatar-key")
        .with_base_url(server.uri())
        .with_polling(Duration::from_millis(10), Duration::from_secs(5));

    let rendered = client
        .render_clip("Welcome to the course", ClipKind::Intro, &dest)
        .await
        .unwrap();

    assert_eq!(rendered.as_deref(), Some(dest.as_path()));
    assert_eq!(std::fs::read(&dest).unwrap(), b"mp4 bytes");
}
