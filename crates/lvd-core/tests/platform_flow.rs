//! Integration test: the reqwest transport and the engine against a local
//! platform/SSO server, from login through a finished download task.

mod common;

use std::sync::Arc;

use lvd_core::auth::CredentialEncryptor;
use lvd_core::cache::StateDb;
use lvd_core::config::LvdConfig;
use lvd_core::error::DiscoveryError;
use lvd_core::http::{HttpError, HttpTransport, ReqwestTransport};
use lvd_core::model::{Credentials, Semester, Term};
use lvd_core::orchestrator::TaskStatus;
use lvd_core::sink::HttpSink;
use lvd_core::{Engine, EngineError};
use tempfile::tempdir;

use common::platform_server::{self, PlatformServer};

/// Hex of the plaintext; the local server only checks that E2 is present.
struct PlainEncryptor;

impl CredentialEncryptor for PlainEncryptor {
    fn encrypt(&self, plaintext: &[u8], _m: &str, _e: &str) -> anyhow::Result<Vec<u8>> {
        Ok(plaintext.to_vec())
    }
}

struct Fixture {
    server: PlatformServer,
    engine: Engine,
    transport: Arc<ReqwestTransport>,
    downloads: tempfile::TempDir,
    _state: tempfile::TempDir,
}

async fn fixture() -> Fixture {
    let server = platform_server::start();
    let downloads = tempdir().unwrap();
    let state = tempdir().unwrap();
    let config = LvdConfig {
        platform_origin: server.base.clone(),
        sso_origin: server.base.clone(),
        request_timeout_secs: 5,
        payload_timeout_secs: 5,
        min_payload_bytes: 1024,
        download_dir: Some(downloads.path().to_path_buf()),
        ..LvdConfig::default()
    };
    let db = StateDb::open_at(state.path().join("lvd.db")).await.unwrap();
    let transport = Arc::new(ReqwestTransport::from_config(&config).unwrap());
    let sink = Arc::new(HttpSink::new(&config.user_agent).unwrap());
    let engine = Engine::with_parts(
        config,
        db,
        transport.clone(),
        Arc::new(PlainEncryptor),
        sink,
    );
    Fixture {
        server,
        engine,
        transport,
        downloads,
        _state: state,
    }
}

fn term() -> Term {
    Term::new(2024, Semester::Second)
}

const LISTING: &str = "/local/ubion/user/index.php?year=2024&semester=20";

#[tokio::test]
async fn login_discover_and_download_over_http() {
    let f = fixture().await;

    let session = f
        .engine
        .login(&Credentials::new("2020123456", "secret"))
        .await
        .expect("login");
    assert_eq!(session.user_id, "2020123456");

    let snapshot = f.engine.discover_courses(term(), false).await.unwrap();
    assert_eq!(snapshot.courses.len(), 1);
    assert_eq!(snapshot.courses[0].professor, "Park");
    assert_eq!(snapshot.lectures.len(), 2);
    assert_eq!(snapshot.lectures[0].title, "Intro");

    // Served from cache.
    f.engine.discover_courses(term(), false).await.unwrap();
    assert_eq!(f.server.hits(LISTING), 1);

    let id = f
        .engine
        .create_task(vec!["7_1".into(), "7_2".into()], term())
        .unwrap();
    let rec = f.engine.wait_terminal(id).await.unwrap();
    assert_eq!(rec.status, TaskStatus::Completed, "{:?}", rec.log);
    assert_eq!(rec.completed_count, 1);
    assert_eq!(rec.failed_count, 1);
    assert_eq!(rec.progress_percent, 100);

    let saved = f
        .downloads
        .path()
        .join("2024-20-Computer_Networks")
        .join("Week_1_Intro.mp4");
    assert_eq!(std::fs::read(&saved).unwrap(), platform_server::media_body());
    assert!(!saved.with_extension("mp4.part").exists());
    assert_eq!(f.server.hits("/media/71/index.m3u8"), 0);
}

#[tokio::test]
async fn dropped_cookies_surface_as_expired_session() {
    let f = fixture().await;
    f.engine
        .login(&Credentials::new("2020123456", "secret"))
        .await
        .unwrap();

    f.transport.reset_session();
    let err = f.engine.discover_courses(term(), true).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Discovery(DiscoveryError::SessionExpired)
    ));
    assert!(f.engine.session().is_none());
}

#[tokio::test]
async fn home_page_without_cookie_has_no_logout_link() {
    let f = fixture().await;
    let home = f.transport.get(&format!("{}/", f.server.base)).await.unwrap();
    assert!(!home.body.contains("logout"));
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let f = fixture().await;
    let err = f
        .transport
        .post_form(&format!("{}/nowhere", f.server.base), &[("a", "b")])
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Status { status: 404, .. }));
}

#[tokio::test]
async fn session_download_streams_into_place() {
    let f = fixture().await;
    f.engine
        .login(&Credentials::new("2020123456", "secret"))
        .await
        .unwrap();

    let dest = f.downloads.path().join("nested").join("70.mp4");
    let written = f
        .transport
        .download_to(&format!("{}/media/70.mp4", f.server.base), &dest)
        .await
        .unwrap();
    assert_eq!(written, platform_server::media_body().len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), platform_server::media_body());
    assert!(!dest.with_extension("mp4.part").exists());
}

#[tokio::test]
async fn failed_session_download_leaves_nothing_behind() {
    let f = fixture().await;
    let dest = f.downloads.path().join("missing.mp4");
    let err = f
        .transport
        .download_to(&format!("{}/media/404.mp4", f.server.base), &dest)
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Status { status: 404, .. }));
    assert!(!dest.exists());
    assert!(!dest.with_extension("mp4.part").exists());
}

#[tokio::test]
async fn course_materials_over_http() {
    let f = fixture().await;
    f.engine
        .login(&Credentials::new("2020123456", "secret"))
        .await
        .unwrap();

    let report = f.engine.download_materials("7", term()).await.unwrap();
    let saved = f
        .downloads
        .path()
        .join("2024-20-Computer_Networks")
        .join("Week_2_Syllabus.pdf");
    assert_eq!(report.saved, vec![saved.clone()]);
    assert_eq!(std::fs::read(&saved).unwrap(), platform_server::SYLLABUS);

    // A second run finds the file in place.
    let again = f.engine.download_materials("7", term()).await.unwrap();
    assert!(again.saved.is_empty());
    assert_eq!(again.existing, 1);
    assert_eq!(f.server.hits("/mod/resource/view.php?id=80"), 1);
}
