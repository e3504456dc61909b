use crate::binder::{BindOptions, Binder, ToggleMode, CONTENT_CLASS, HEADER_CLASS};
use crate::fetcher::mock::MockTransport;
use crate::fetcher::{FailureKind, ResultFetcher, TOKEN_HEADER};
use crate::notify::{ToastLevel, ToastQueue};
use crate::render::{RenderSurface, SUPPLEMENT_STYLE_ID};
use crate::sanitize::{sanitize, ScriptPolicy};
use crate::session::{ApplyOutcome, LookupSession, SessionOptions, SessionState};

const ENDPOINT: &str = "http://provider.test/api/result";

const SEMESTER_PAGE: &str = r#"<html><head><title>Result</title></head><body>
<h2>Student: 2300541539001</h2>
<div class="headerclass" id="h1">Sem1</div>
<div class="contentclass" id="h1"><table><tr><td>Marks: 78</td></tr></table></div>
<a href="https://portal.example/other">Other results</a>
<script>document.title = "tracked";</script>
</body></html>"#;

fn session_with(transport: MockTransport, options: SessionOptions) -> LookupSession<MockTransport> {
    LookupSession::new(
        ResultFetcher::new(transport, ENDPOINT),
        "signed-token",
        ToastQueue::new(),
        options,
    )
}

fn content_hidden(surface: &RenderSurface, key: &str) -> bool {
    let dom = surface.document().unwrap().dom();
    dom.elements_by_class(CONTENT_CLASS)
        .into_iter()
        .filter(|id| dom.element(*id).unwrap().id() == Some(key))
        .all(|id| dom.is_hidden(id))
}

#[test]
fn token_header_name_matches_provider() {
    assert_eq!(TOKEN_HEADER, "x-secure-token");
}

#[tokio::test]
async fn trimmed_roll_is_sent_exactly_once() {
    let transport = MockTransport::ok_html("<p>ok</p>");
    let mut session = session_with(transport.clone(), SessionOptions::default());

    session.lookup("  2300541539001 ").await.unwrap();

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].endpoint, ENDPOINT);
    assert_eq!(calls[0].token, "signed-token");
    let body: serde_json::Value = serde_json::from_str(&calls[0].body).unwrap();
    assert_eq!(body, serde_json::json!({ "rollNo": "2300541539001" }));
}

#[tokio::test]
async fn blank_roll_never_reaches_the_network() {
    let transport = MockTransport::ok_html("<p>ok</p>");
    let mut session = session_with(transport.clone(), SessionOptions::default());

    assert!(session.lookup(" \t ").await.is_err());
    assert!(transport.calls().is_empty());
    assert_eq!(session.state(), &SessionState::MissingInput);
}

#[tokio::test]
async fn semester_scenario_starts_collapsed_and_expands_on_click() {
    let transport = MockTransport::ok_html(SEMESTER_PAGE);
    let mut session = session_with(transport, SessionOptions::default());

    let outcome = session.lookup("2300541539001").await.unwrap();
    let report = match outcome {
        ApplyOutcome::Rendered { bind, .. } => bind.unwrap(),
        other => panic!("unexpected outcome {other:?}"),
    };
    assert_eq!(report.sections_bound, 1);
    assert_eq!(report.anchors_disabled, 1);

    let doc = session.surface().document().unwrap();
    let header = doc.dom().elements_by_class(HEADER_CLASS)[0];
    assert_eq!(doc.dom().text_content(header), "Sem1");
    assert!(!doc.dom().is_hidden(header));
    assert!(content_hidden(session.surface(), "h1"));

    assert!(session.click_section("h1"));
    assert!(!content_hidden(session.surface(), "h1"));
    let doc = session.surface().document().unwrap();
    let content = doc.dom().elements_by_class(CONTENT_CLASS)[0];
    assert!(doc.dom().text_content(content).contains("Marks"));
}

#[test]
fn anchors_suppress_navigation_after_bind() {
    let mut surface = RenderSurface::with_binder(Binder::new(BindOptions::default()));
    surface.render(&sanitize(SEMESTER_PAGE, ScriptPolicy::Strip));
    surface.complete_load();

    let anchor = surface.document().unwrap().dom().elements_by_tag("a")[0];
    let dispatch = surface.click(anchor).unwrap();
    assert!(dispatch.default_prevented);
    assert_eq!(dispatch.navigation, None);

    let dom = surface.document().unwrap().dom();
    assert_eq!(dom.style(anchor, "pointer-events").as_deref(), Some("none"));
    assert_eq!(dom.style(anchor, "cursor").as_deref(), Some("not-allowed"));
}

#[test]
fn binding_twice_toggles_once() {
    let mut surface = RenderSurface::new();
    surface.render(&sanitize(SEMESTER_PAGE, ScriptPolicy::Strip));
    surface.complete_load();
    surface.attach_binder(Binder::new(BindOptions::default()));
    surface.attach_binder(Binder::new(BindOptions::default()));

    let header = surface.document().unwrap().dom().elements_by_class(HEADER_CLASS)[0];
    let dispatch = surface.click(header).unwrap();
    assert_eq!(dispatch.toggles, vec!["h1".to_string()]);
    assert!(surface.document().unwrap().is_expanded("h1"));
}

#[test]
fn accordion_click_a_then_b_leaves_only_b_open() {
    let page = r#"<div class="headerclass" id="a">A</div><div class="contentclass" id="a">a</div>
        <div class="headerclass" id="b">B</div><div class="contentclass" id="b">b</div>"#;
    let mut surface = RenderSurface::with_binder(Binder::new(BindOptions {
        toggle_mode: ToggleMode::Accordion,
        auto_height: false,
    }));
    surface.render(&sanitize(page, ScriptPolicy::Strip));
    surface.complete_load();

    surface.click_section("a").unwrap();
    surface.click_section("b").unwrap();
    assert!(content_hidden(&surface, "a"));
    assert!(!content_hidden(&surface, "b"));
}

#[tokio::test]
async fn remote_error_toasts_and_keeps_previous_document() {
    let transport = MockTransport::ok_html(SEMESTER_PAGE);
    transport.push(500, r#"{"message":"roll not found"}"#);
    let toasts = ToastQueue::new();
    let mut session = LookupSession::new(
        ResultFetcher::new(transport, ENDPOINT),
        "signed-token",
        toasts.clone(),
        SessionOptions::default(),
    );

    session.lookup("2300541539001").await.unwrap();
    let serial = session.surface().document().unwrap().serial();

    let outcome = session.lookup("999").await.unwrap();
    match outcome {
        ApplyOutcome::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::RemoteError);
            assert_eq!(failure.message, "roll not found");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(session.surface().document().unwrap().serial(), serial);
    assert!(matches!(session.state(), SessionState::Failed(_)));

    let drained = toasts.drain();
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].level, ToastLevel::Error);
    assert!(drained[0].message.contains("roll not found"));
}

#[tokio::test]
async fn empty_result_is_not_rendered() {
    let transport = MockTransport::respond(200, r#"{"result":""}"#);
    let mut session = session_with(transport, SessionOptions::default());

    let outcome = session.lookup("2300541539001").await.unwrap();
    match outcome {
        ApplyOutcome::Failed(failure) => assert_eq!(failure.kind, FailureKind::EmptyPayload),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(!session.surface().has_content());
}

#[tokio::test]
async fn network_failure_is_retryable() {
    let transport = MockTransport::failing();
    transport.push(200, r#"{"result":"<p>late</p>"}"#);
    let mut session = session_with(transport, SessionOptions::default());

    let outcome = session.lookup("1").await.unwrap();
    assert!(matches!(
        outcome,
        ApplyOutcome::Failed(ref f) if f.kind == FailureKind::NetworkError
    ));
    let outcome = session.retry_lookup().await.unwrap();
    assert!(matches!(outcome, ApplyOutcome::Rendered { .. }));
}

#[tokio::test]
async fn strip_policy_leaves_no_script_and_style_is_last() {
    let transport = MockTransport::ok_html(SEMESTER_PAGE);
    let mut session = session_with(transport, SessionOptions::default());
    session.lookup("2300541539001").await.unwrap();

    let doc = session.surface().document().unwrap();
    assert!(doc.dom().elements_by_tag("script").is_empty());
    assert!(!doc.to_html().contains("tracked"));

    let head = doc.dom().head().unwrap();
    let last = *doc.dom().children(head).last().unwrap();
    assert_eq!(
        doc.dom().element(last).unwrap().attr("id"),
        Some(SUPPLEMENT_STYLE_ID)
    );
}

#[tokio::test]
async fn print_before_and_after_render() {
    #[derive(Default)]
    struct Capture(Vec<String>);

    impl crate::print::PrintSink for Capture {
        fn print(&mut self, html: &str) -> Result<(), crate::print::PrintError> {
            self.0.push(html.to_string());
            Ok(())
        }
    }

    let toasts = ToastQueue::new();
    let mut session = LookupSession::new(
        ResultFetcher::new(MockTransport::ok_html(SEMESTER_PAGE), ENDPOINT),
        "signed-token",
        toasts.clone(),
        SessionOptions::default(),
    );
    let mut sink = Capture::default();

    assert_eq!(
        session.print(&mut sink).unwrap(),
        crate::print::PrintOutcome::NotReady
    );
    assert_eq!(toasts.drain()[0].message, crate::print::NOT_READY_MESSAGE);

    session.lookup("2300541539001").await.unwrap();
    assert!(matches!(
        session.print(&mut sink).unwrap(),
        crate::print::PrintOutcome::Printed { .. }
    ));
    assert!(sink.0[0].contains("Sem1"));
}
