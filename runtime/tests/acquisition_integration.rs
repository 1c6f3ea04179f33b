//! Acquisition engine integration tests.
//!
//! Drives the download engine against a local mock server: retry on
//! transient status codes, the content-type gate, unresolvable hosts,
//! idempotent re-runs, post-processing and the metadata file.

use std::io::Cursor;
use std::time::Duration;

use assert_json_diff::assert_json_eq;
use harvest_runtime::acquisition::{AcquisitionEngine, AcquisitionOutcome, HttpClient};
use harvest_runtime::config::ClientConfig;
use harvest_runtime::error::DownloadError;
use harvest_runtime::extraction::{classify, CategorizedCandidates, ImageCandidate};
use harvest_runtime::metadata::{RecordLog, METADATA_FILE};
use harvest_runtime::progress::EventEmitter;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ──

fn fast_client() -> HttpClient {
    let mut config = ClientConfig::default();
    config.retry.backoff_factor = Duration::from_millis(5);
    config.download_timeout = Duration::from_secs(10);
    HttpClient::new(&config).unwrap()
}

fn engine(dir: &TempDir, target_size: Option<(u32, u32)>) -> AcquisitionEngine {
    AcquisitionEngine::new(fast_client(), dir.path(), target_size, 4)
}

fn encoded(format: image::ImageFormat, width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 7) as u8, (y * 5) as u8, 128])
    }));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

fn jpeg() -> Vec<u8> {
    encoded(image::ImageFormat::Jpeg, 32, 24)
}

fn candidate(url: &str, alt: &str, title: &str) -> ImageCandidate {
    ImageCandidate {
        raw_url: url.to_string(),
        normalized_url: Url::parse(url).unwrap(),
        alt_text: alt.to_string(),
        title_text: title.to_string(),
        context_labels: Vec::new(),
        label: Some(alt.to_string()),
    }
}

fn one_category(name: &str, candidates: Vec<ImageCandidate>) -> CategorizedCandidates {
    let mut grouped = CategorizedCandidates::new();
    grouped.insert(classify(name), candidates);
    grouped
}

fn image_response(body: Vec<u8>, content_type: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", content_type)
        .set_body_bytes(body)
}

// ── Tests ──

#[tokio::test]
async fn test_transient_503_then_image_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/sunset.jpg"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/sunset.jpg"))
        .respond_with(image_response(jpeg(), "image/jpeg"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let url = format!("{}/img/sunset.jpg", server.uri());
    let grouped = one_category("sunset", vec![candidate(&url, "Sunset", "")]);

    let (records, counts) = engine(&dir, None).acquire_collect(&grouped).await;

    assert_eq!(counts.succeeded, 1);
    assert_eq!(counts.total(), 1);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].filename, "sunset.jpg");
    assert_eq!(records[0].category, "sunset");
    assert_eq!(
        std::fs::read(dir.path().join("sunset/sunset.jpg")).unwrap(),
        jpeg()
    );
}

#[tokio::test]
async fn test_html_payload_is_skipped_and_not_written() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/fake.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string("<html>login required</html>"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let url = format!("{}/img/fake.jpg", server.uri());
    let category = classify("misc");
    let outcome = engine(&dir, None)
        .acquire_one(&category, &candidate(&url, "", ""))
        .await;

    assert!(matches!(
        outcome,
        AcquisitionOutcome::Skipped(DownloadError::NonImageContent { .. })
    ));
    assert!(!dir.path().join("misc/fake.jpg").exists());
}

#[tokio::test]
async fn test_content_type_gate_ignores_case() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/loud.jpg"))
        .respond_with(image_response(jpeg(), "Image/JPEG"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let url = format!("{}/img/loud.jpg", server.uri());
    let outcome = engine(&dir, None)
        .acquire_one(&classify("misc"), &candidate(&url, "", ""))
        .await;

    assert!(matches!(outcome, AcquisitionOutcome::Succeeded(_)));
    assert_eq!(std::fs::read(dir.path().join("misc/loud.jpg")).unwrap(), jpeg());
}

#[tokio::test]
async fn test_unresolvable_host_fails_without_request() {
    let dir = TempDir::new().unwrap();
    let grouped = one_category(
        "ghost",
        vec![candidate("https://no-such-host.invalid/a.jpg", "", "")],
    );

    let (records, counts) = engine(&dir, None).acquire_collect(&grouped).await;

    assert!(records.is_empty());
    assert_eq!(counts.failed, 1);
    assert_eq!(counts.total(), 1);
    assert!(!dir.path().join("ghost/a.jpg").exists());
}

#[tokio::test]
async fn test_http_error_is_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let url = format!("{}/gone.jpg", server.uri());
    let outcome = engine(&dir, None)
        .acquire_one(&classify("misc"), &candidate(&url, "", ""))
        .await;

    assert!(matches!(
        outcome,
        AcquisitionOutcome::Failed(DownloadError::HttpStatus { status: 404, .. })
    ));
}

#[tokio::test]
async fn test_rerun_skips_everything_and_keeps_files() {
    let server = MockServer::start().await;
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        Mock::given(method("GET"))
            .and(path(format!("/img/{name}")))
            .respond_with(image_response(jpeg(), "image/jpeg"))
            .expect(1)
            .mount(&server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let grouped = one_category(
        "people",
        ["a.jpg", "b.jpg", "c.jpg"]
            .iter()
            .map(|n| candidate(&format!("{}/img/{n}", server.uri()), "", ""))
            .collect(),
    );
    let engine = engine(&dir, None);

    let (_, first) = engine.acquire_collect(&grouped).await;
    assert_eq!(first.succeeded, 3);
    let before = std::fs::read(dir.path().join("people/b.jpg")).unwrap();

    let (records, second) = engine.acquire_collect(&grouped).await;
    assert_eq!(second.succeeded, 0);
    assert_eq!(second.skipped, 3);
    assert!(records.is_empty());
    assert_eq!(std::fs::read(dir.path().join("people/b.jpg")).unwrap(), before);
}

#[tokio::test]
async fn test_duplicate_url_across_categories_downloads_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/shared.jpg"))
        .respond_with(image_response(jpeg(), "image/jpeg"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/img/shared.jpg", server.uri());
    let mut grouped = CategorizedCandidates::new();
    grouped.insert(classify("alpha"), vec![candidate(&url, "", "")]);
    grouped.insert(classify("beta"), vec![candidate(&url, "", "")]);

    let dir = TempDir::new().unwrap();
    let (records, counts) = engine(&dir, None).acquire_collect(&grouped).await;

    assert_eq!(counts.total(), 1);
    assert_eq!(records[0].category, "alpha");
    assert!(!dir.path().join("beta").exists());
}

#[tokio::test]
async fn test_resize_to_target_size() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/wide.png"))
        .respond_with(image_response(
            encoded(image::ImageFormat::Png, 40, 30),
            "image/png",
        ))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let url = format!("{}/img/wide.png", server.uri());
    let grouped = one_category("landscape", vec![candidate(&url, "", "")]);
    let (_, counts) = engine(&dir, Some((16, 12))).acquire_collect(&grouped).await;

    assert_eq!(counts.succeeded, 1);
    let saved = image::open(dir.path().join("landscape/wide.png")).unwrap();
    assert_eq!((saved.width(), saved.height()), (16, 12));
}

#[tokio::test]
async fn test_undecodable_image_is_removed_when_resizing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/broken.jpg"))
        .respond_with(image_response(b"definitely not a jpeg".to_vec(), "image/jpeg"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let url = format!("{}/img/broken.jpg", server.uri());
    let outcome = engine(&dir, Some((16, 16)))
        .acquire_one(&classify("broken"), &candidate(&url, "", ""))
        .await;

    assert!(matches!(
        outcome,
        AcquisitionOutcome::Failed(DownloadError::Processing { .. })
    ));
    assert!(!dir.path().join("broken/broken.jpg").exists());
}

#[tokio::test]
async fn test_cancelled_resize_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/large.png"))
        .respond_with(image_response(
            encoded(image::ImageFormat::Png, 1200, 900),
            "image/png",
        ))
        .mount(&server)
        .await;

    let url = format!("{}/img/large.png", server.uri());
    let category = classify("large");
    let mut cancelled = Vec::new();
    // Cut the download off at increasing points, some of them inside the resize.
    for step in 0..20u64 {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, Some((64, 48)));
        let attempt = tokio::time::timeout(
            Duration::from_millis(step * 10),
            engine.acquire_one(&category, &candidate(&url, "", "")),
        )
        .await;
        match attempt {
            Ok(outcome) => assert!(matches!(outcome, AcquisitionOutcome::Succeeded(_))),
            Err(_) => cancelled.push(dir),
        }
    }

    // Give any blocking work that outlived its download time to finish.
    tokio::time::sleep(Duration::from_millis(500)).await;
    for dir in &cancelled {
        assert!(!dir.path().join("large/large.png").exists());
    }
}

#[tokio::test]
async fn test_metadata_file_contents() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/cafe.jpg"))
        .respond_with(image_response(jpeg(), "image/jpeg"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let url = format!("{}/img/cafe.jpg", server.uri());
    let grouped = one_category("cafe", vec![candidate(&url, "Café Olé", "Night shot")]);

    let log = RecordLog::new();
    let counts = engine(&dir, None)
        .acquire(&grouped, &log, &EventEmitter::disabled())
        .await;
    assert_eq!(counts.succeeded, 1);

    let written = log.persist(dir.path()).unwrap().unwrap();
    assert_eq!(written, dir.path().join(METADATA_FILE));

    let text = std::fs::read_to_string(&written).unwrap();
    assert!(text.contains("Café Olé"));
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_json_eq!(
        value,
        serde_json::json!([{
            "url": url,
            "category": "cafe",
            "filename": "cafe.jpg",
            "title": "Night shot",
            "alt": "Café Olé"
        }])
    );
}
