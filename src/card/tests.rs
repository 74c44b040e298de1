//! Session tests against an in-process proxy with a scripted upstream.

use super::*;
use crate::llm::{ChatCompletion, Config, ConfigError, CredentialSource};
use crate::preprocessing::PromptTemplates;
use crate::render::{DirectorySaver, MemoryClipboard, NativeCapabilities, SvgRasterizer};
use crate::server::{serve_on, AppState};
use crate::testing::{test_config, GatedUpstream, ScriptedUpstream, CARD_SVG};
use resvg::tiny_skia::Pixmap;
use resvg::usvg::fontdb;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_test::{assert_err, assert_ok};

struct Fixture {
    session: CardSession,
    notices: Arc<RecordingNotifier>,
    clipboard: Arc<MemoryClipboard>,
    dir: TempDir,
    server: JoinHandle<()>,
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn fixture_over(upstream: Arc<dyn ChatCompletion>, configured: bool) -> Fixture {
    let credentials: Arc<dyn CredentialSource> = if configured {
        Arc::new(|| Ok::<Config, ConfigError>(test_config()))
    } else {
        Arc::new(|| Err::<Config, ConfigError>(ConfigError::Missing(vec!["API_KEY"])))
    };
    let state = AppState::new(
        PromptTemplates::embedded().unwrap(),
        credentials,
        upstream,
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let _ = serve_on(listener, state).await;
    });

    let dir = tempdir().unwrap();
    let clipboard = Arc::new(MemoryClipboard::new());
    let notices = Arc::new(RecordingNotifier::new());
    let capabilities = NativeCapabilities::new(
        SvgRasterizer::with_fonts(fontdb::Database::new()),
        Box::new(clipboard.clone()),
        Box::new(DirectorySaver::new(dir.path())),
    );
    let client = CardClient::new(&format!("http://{}", addr)).unwrap();
    let session = CardSession::new(client, Box::new(capabilities), Box::new(notices.clone()));

    Fixture {
        session,
        notices,
        clipboard,
        dir,
        server,
    }
}

async fn fixture_with(
    upstream: ScriptedUpstream,
    configured: bool,
) -> (Fixture, Arc<ScriptedUpstream>) {
    let upstream = Arc::new(upstream);
    (fixture_over(upstream.clone(), configured).await, upstream)
}

async fn fixture(reply: &str) -> Fixture {
    fixture_with(ScriptedUpstream::replying(reply), true).await.0
}

async fn wait_for(what: &str, mut ready: impl FnMut() -> bool) {
    let poll = async {
        while !ready() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    if tokio::time::timeout(Duration::from_secs(5), poll).await.is_err() {
        panic!("timed out waiting for {}", what);
    }
}

async fn wait_for_view(session: &CardSession, ready: impl Fn(&CardView) -> bool) {
    let poll = async {
        while !ready(&session.view().await) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    if tokio::time::timeout(Duration::from_secs(5), poll).await.is_err() {
        panic!("timed out waiting for the card view, now {:?}", session.view().await);
    }
}

#[tokio::test]
async fn starts_idle() {
    let f = fixture(CARD_SVG).await;
    assert_eq!(f.session.phase().await, Phase::Idle);
    assert_eq!(f.session.view().await, CardView::default());
}

#[tokio::test]
async fn empty_word_is_rejected_locally() {
    let (f, upstream) = fixture_with(ScriptedUpstream::replying(CARD_SVG), true).await;

    assert_eq!(f.session.submit("").await, SubmitOutcome::Rejected);

    assert_eq!(upstream.calls(), 0);
    assert_eq!(
        f.notices.last(),
        Some((Level::Error, notify::EMPTY_INPUT.to_string()))
    );
    assert_eq!(f.session.phase().await, Phase::Idle);
}

#[tokio::test]
async fn submit_displays_the_card() {
    let reply = format!("好的\n{}\n", CARD_SVG);
    let (f, upstream) = fixture_with(ScriptedUpstream::replying(&reply), true).await;

    assert_eq!(f.session.submit("内卷").await, SubmitOutcome::Generated);

    let view = f.session.view().await;
    assert_eq!(view.phase(), Phase::Loaded);
    assert_eq!(view.svg.as_deref(), Some(CARD_SVG));
    assert_eq!(
        f.notices.last(),
        Some((Level::Success, notify::GENERATED.to_string()))
    );

    let (_, request) = upstream.last_request().unwrap();
    assert_eq!(request.messages[1].content, "(汉语新解 内卷)");
}

#[tokio::test]
async fn reply_without_svg_keeps_previous_card() {
    let f = fixture("只有文字").await;
    f.session.display(CARD_SVG).await;

    assert_eq!(f.session.submit("躺平").await, SubmitOutcome::NoSvg);

    assert_eq!(f.session.view().await.svg.as_deref(), Some(CARD_SVG));
    assert_eq!(
        f.notices.last(),
        Some((Level::Error, notify::NO_SVG.to_string()))
    );
}

#[tokio::test]
async fn server_error_reply_counts_as_no_svg() {
    let (f, upstream) = fixture_with(ScriptedUpstream::replying(CARD_SVG), false).await;

    assert_eq!(f.session.submit("内卷").await, SubmitOutcome::NoSvg);
    assert_eq!(upstream.calls(), 0);
    assert_eq!(f.session.phase().await, Phase::Idle);
}

#[tokio::test]
async fn unreachable_proxy_is_reported() {
    let f = fixture(CARD_SVG).await;
    let client = CardClient::new("http://127.0.0.1:9").unwrap();
    let session = CardSession::new(
        client,
        Box::new(NativeCapabilities::new(
            SvgRasterizer::with_fonts(fontdb::Database::new()),
            Box::new(MemoryClipboard::new()),
            Box::new(DirectorySaver::new(f.dir.path())),
        )),
        Box::new(f.notices.clone()),
    );

    assert_eq!(session.submit("内卷").await, SubmitOutcome::Failed);
    assert!(!session.view().await.loading);
    assert_eq!(
        f.notices.last(),
        Some((Level::Error, notify::GENERATION_FAILED.to_string()))
    );
}

#[tokio::test]
async fn exports_need_a_card() {
    let f = fixture(CARD_SVG).await;

    assert_err!(f.session.copy_svg().await);
    assert_err!(f.session.download_png().await);
    assert_err!(f.session.copy_png().await);

    let notices = f.notices.notices();
    assert_eq!(notices.len(), 3);
    assert!(notices
        .iter()
        .all(|(level, msg)| *level == Level::Error && msg == notify::SVG_ELEMENT_MISSING));
}

#[tokio::test]
async fn exports_after_generation() {
    let f = fixture(CARD_SVG).await;
    f.session.submit("内卷").await;

    assert_ok!(f.session.copy_svg().await);
    assert_eq!(f.clipboard.read_text().as_deref(), Some(CARD_SVG));

    let path = assert_ok!(f.session.download_png().await);
    assert_eq!(path.file_name().unwrap(), "generated.png");
    let saved = Pixmap::decode_png(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!((saved.width(), saved.height()), (400, 600));

    assert_ok!(f.session.copy_png().await);
    let image = f.clipboard.read_image().unwrap();
    assert_eq!((image.width, image.height), (400, 600));

    let levels: Vec<Level> = f.notices.notices().into_iter().map(|(l, _)| l).collect();
    assert!(levels.iter().all(|l| *l == Level::Success));
}

#[tokio::test]
async fn broken_markup_reports_image_failure() {
    let f = fixture(CARD_SVG).await;
    f.session.display("<svg width=\"10\" height=\"10\"><g>").await;

    assert_err!(f.session.download_png().await);
    assert_eq!(
        f.notices.last(),
        Some((Level::Error, notify::IMAGE_CREATE_FAILED.to_string()))
    );

    // The raw markup can still be copied.
    assert_ok!(f.session.copy_svg().await);
}

#[tokio::test]
async fn later_display_overwrites_earlier_card() {
    let f = fixture(CARD_SVG).await;
    f.session.submit("内卷").await;
    f.session.display("<svg width=\"1\" height=\"1\"></svg>").await;

    assert_eq!(
        f.session.view().await.svg.as_deref(),
        Some("<svg width=\"1\" height=\"1\"></svg>")
    );
}

#[tokio::test]
async fn submit_passes_through_loading() {
    let (upstream, mut gates) = GatedUpstream::new(&[("内卷", CARD_SVG)]);
    let upstream = Arc::new(upstream);
    let f = fixture_over(upstream.clone(), true).await;
    assert_eq!(f.session.phase().await, Phase::Idle);

    let (outcome, ()) = tokio::join!(f.session.submit("内卷"), async {
        wait_for("the request to reach upstream", || upstream.waiting() == 1).await;
        assert_eq!(f.session.phase().await, Phase::Loading);
        assert!(f.session.view().await.svg.is_none());
        gates.release("内卷");
    });

    assert_eq!(outcome, SubmitOutcome::Generated);
    assert_eq!(f.session.phase().await, Phase::Loaded);
}

#[tokio::test]
async fn overlapping_submits_show_the_last_reply_to_land() {
    let first = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"></svg>"#;
    let second = r#"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="20"></svg>"#;
    let (upstream, mut gates) = GatedUpstream::new(&[("内卷", first), ("躺平", second)]);
    let upstream = Arc::new(upstream);
    let f = fixture_over(upstream.clone(), true).await;

    let (a, b, ()) = tokio::join!(
        f.session.submit("内卷"),
        f.session.submit("躺平"),
        async {
            wait_for("both requests to reach upstream", || upstream.waiting() == 2).await;
            // The later submit resolves first.
            gates.release("躺平");
            wait_for_view(&f.session, |v| v.svg.as_deref() == Some(second)).await;
            gates.release("内卷");
        }
    );

    assert_eq!((a, b), (SubmitOutcome::Generated, SubmitOutcome::Generated));
    let view = f.session.view().await;
    assert_eq!(view.svg.as_deref(), Some(first));
    assert!(!view.loading);
}
