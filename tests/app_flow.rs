//! End-to-end tests of the client state against an in-memory service.
//!
//! The mock service echoes `<format>:<file name>` as the converted image and
//! can be told to fail on chosen file names, so every scenario runs without
//! a network.

use imgconv::{
    App, ConversionParams, ConversionService, ImgConvError, PreviewEntry, PreviewStore,
    SelectedFile, SelectionState, ValidationError,
};
use std::sync::{Mutex, Once};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route library logs to the test harness; `RUST_LOG=imgconv=debug` shows them.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[derive(Default)]
struct MockService {
    formats: Option<Vec<String>>,
    fail_on: Vec<String>,
    requests: Mutex<Vec<(String, ConversionParams)>>,
}

impl MockService {
    fn failing_on(names: &[&str]) -> Self {
        Self {
            fail_on: names.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ConversionService for MockService {
    async fn supported_formats(&self) -> Result<Vec<String>, ImgConvError> {
        self.formats.clone().ok_or_else(|| ImgConvError::RequestFailed {
            url: "mock://supported-formats".into(),
            reason: "connection refused".into(),
        })
    }

    async fn convert(
        &self,
        file: &SelectedFile,
        params: &ConversionParams,
    ) -> Result<Vec<u8>, ImgConvError> {
        self.requests
            .lock()
            .unwrap()
            .push((file.name().to_string(), params.clone()));
        if self.fail_on.iter().any(|f| f == file.name()) {
            return Err(ImgConvError::Service {
                status: 500,
                detail: "Image processing failed".into(),
            });
        }
        Ok(format!("{}:{}", params.format, file.name()).into_bytes())
    }
}

fn jpeg(name: &str) -> SelectedFile {
    SelectedFile::new(name, "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0, name.len() as u8])
}

fn app(service: MockService) -> (App<MockService>, PreviewStore) {
    init_tracing();
    let store = PreviewStore::new().unwrap();
    (App::with_store(service, store.clone()), store)
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_jpeg_to_png() {
    let (mut app, _) = app(MockService::default());
    app.add_files([jpeg("cat.jpg")]).unwrap();
    {
        let form = app.form_mut();
        form.format = "png".into();
        form.quality = "90".into();
        form.grayscale = false;
    }

    assert_eq!(app.submit().await.unwrap(), 1);
    assert_eq!(app.results().len(), 1);
    assert_eq!(app.results().get(0).unwrap().format(), "png");
    assert!(app.error().is_none());
}

#[tokio::test]
async fn heic_file_gets_sentinel_preview() {
    let (mut app, _) = app(MockService::default());
    app.add_files([SelectedFile::new("photo.heic", "image/heic", vec![1, 2, 3, 4])])
        .unwrap();
    assert!(matches!(
        app.selection().previews()[0],
        PreviewEntry::Unsupported
    ));
}

#[tokio::test]
async fn width_without_height_is_rejected_before_any_request() {
    let (mut app, _) = app(MockService::default());
    app.add_files([jpeg("a.jpg")]).unwrap();
    app.form_mut().width = "100".into();
    app.form_mut().height = String::new();

    let err = app.submit().await.unwrap_err();
    assert!(matches!(
        err,
        ImgConvError::Validation(ValidationError::InvalidDimensions)
    ));
    assert_eq!(app.form_error(), Some(&ValidationError::InvalidDimensions));
    assert!(app.error().is_none(), "validation must not touch the app error");
    assert_eq!(app.selection().len(), 1, "validation must not touch the selection");
}

#[tokio::test]
async fn first_of_three_failing_leaves_no_results() {
    let mock = MockService::failing_on(&["one.jpg"]);
    let (mut app, store) = app(mock);
    app.add_files([jpeg("one.jpg"), jpeg("two.jpg"), jpeg("three.jpg")])
        .unwrap();

    let err = app.submit().await.unwrap_err();
    assert!(matches!(err, ImgConvError::Service { status: 500, .. }));
    assert!(app.results().is_empty());
    assert_eq!(
        app.error(),
        Some("Conversion failed: Image processing failed")
    );
    assert!(!app.is_busy());
    // Only the selection's three previews remain alive.
    assert_eq!(store.live_count(), 3);
}

#[tokio::test]
async fn prior_results_are_cleared_before_a_failing_attempt() {
    let (mut app, store) = app(MockService::failing_on(&["bad.jpg"]));
    app.add_files([jpeg("good.jpg")]).unwrap();
    app.submit().await.unwrap();
    assert_eq!(app.results().len(), 1);

    app.add_files([jpeg("bad.jpg")]).unwrap();
    assert!(app.results().is_empty(), "new selection invalidates results");
    app.submit().await.unwrap_err();
    assert!(app.results().is_empty());
    assert_eq!(store.live_count(), 2);
}

// ── Properties ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn results_follow_input_order() {
    let (mut app, _) = app(MockService::default());
    let names = ["d.jpg", "a.jpg", "c.jpg", "b.jpg"];
    app.add_files(names.iter().map(|n| jpeg(n))).unwrap();
    app.form_mut().format = "webp".into();

    assert_eq!(app.submit().await.unwrap(), names.len());
    let contents: Vec<String> = app
        .results()
        .iter()
        .map(|r| String::from_utf8(r.bytes().unwrap()).unwrap())
        .collect();
    let expected: Vec<String> = names.iter().map(|n| format!("webp:{n}")).collect();
    assert_eq!(contents, expected);
}

#[tokio::test]
async fn duplicate_selection_adds_nothing() {
    let (mut app, _) = app(MockService::default());
    app.add_files([jpeg("a.jpg")]).unwrap();
    let outcome = app.add_files([jpeg("a.jpg")]).unwrap();
    assert_eq!(outcome.added, 0);
    assert_eq!(outcome.skipped_duplicates, 1);
    assert_eq!(app.selection().len(), 1);
}

#[tokio::test]
async fn clear_all_resets_everything() {
    let (mut app, store) = app(MockService::failing_on(&["x.jpg"]));
    app.add_files([jpeg("a.jpg"), jpeg("b.jpg")]).unwrap();
    app.submit().await.unwrap();
    app.add_files([jpeg("x.jpg")]).unwrap();
    app.submit().await.unwrap_err();
    assert!(app.error().is_some());

    app.clear_all();
    assert_eq!(app.selection().state(), SelectionState::Empty);
    assert!(app.selection().previews().is_empty());
    assert!(app.results().is_empty());
    assert!(app.error().is_none());
    assert!(app.form_error().is_none());
    assert_eq!(store.live_count(), 0);
}

#[tokio::test]
async fn resize_sent_only_when_both_dimensions_valid() {
    let (mut app, _) = app(MockService::default());
    app.add_files([jpeg("a.jpg")]).unwrap();

    app.submit().await.unwrap();
    app.form_mut().width = "320".into();
    app.form_mut().height = "240".into();
    app.submit().await.unwrap();

    let requests = sent_params(&app);
    assert_eq!(requests[0].resize, None);
    let r = requests[1].resize.expect("resize must be sent");
    assert_eq!((r.width, r.height), (320, 240));
}

#[tokio::test]
async fn out_of_range_quality_blocks_submission() {
    for q in ["0", "101", "abc"] {
        let (mut app, _) = app(MockService::default());
        app.add_files([jpeg("a.jpg")]).unwrap();
        app.form_mut().quality = q.into();
        let err = app.submit().await.unwrap_err();
        assert!(
            matches!(err, ImgConvError::Validation(ValidationError::InvalidQuality)),
            "quality {q:?}"
        );
        assert!(app.results().is_empty());
    }
}

#[tokio::test]
async fn submit_with_nothing_selected() {
    let (mut app, _) = app(MockService::default());
    let err = app.submit().await.unwrap_err();
    assert!(matches!(err, ImgConvError::Validation(ValidationError::NoFiles)));
    assert!(!app.can_submit());
}

#[tokio::test]
async fn formats_fall_back_when_service_is_down() {
    let (mut app, _) = app(MockService::default());
    let formats = app.load_supported_formats().await.to_vec();
    assert_eq!(formats, ["jpeg", "png", "webp"]);
}

#[tokio::test]
async fn formats_come_from_service_when_available() {
    let mock = MockService {
        formats: Some(vec!["png".into(), "jpeg".into(), "jpg".into(), "webp".into()]),
        ..MockService::default()
    };
    let (mut app, _) = app(mock);
    app.load_supported_formats().await;
    assert_eq!(app.supported_formats().len(), 4);

    app.add_files([jpeg("a.jpg")]).unwrap();
    app.form_mut().format = "jpg".into();
    app.submit().await.unwrap();
    assert_eq!(app.results().download_name(0).as_deref(), Some("converted_image_1.jpg"));
}

#[tokio::test]
async fn dismissing_errors() {
    let (mut app, _) = app(MockService::failing_on(&["a.jpg"]));
    app.add_files([jpeg("a.jpg")]).unwrap();
    app.submit().await.unwrap_err();
    assert!(app.error().is_some());
    app.dismiss_error();
    assert!(app.error().is_none());

    app.form_mut().quality = "0".into();
    app.submit().await.unwrap_err();
    assert!(app.form_error().is_some());
    app.dismiss_form_error();
    assert!(app.form_error().is_none());
}

#[tokio::test]
async fn archive_of_results() {
    let (mut app, _) = app(MockService::default());
    app.add_files([jpeg("a.jpg"), jpeg("b.jpg")]).unwrap();
    app.form_mut().format = "png".into();
    app.submit().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = app
        .results()
        .save_archive(dir.path().join("converted_images.zip"))
        .await
        .unwrap();
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        [
            "converted_images/",
            "converted_images/converted_image_1.png",
            "converted_images/converted_image_2.png"
        ]
    );
    assert!(archive.by_name("converted_images/converted_image_1.png").is_ok());
}

fn sent_params(app: &App<MockService>) -> Vec<ConversionParams> {
    app.service()
        .requests
        .lock()
        .unwrap()
        .iter()
        .map(|(_, p)| p.clone())
        .collect()
}

#[tokio::test]
async fn no_request_for_rejected_form() {
    let (mut app, _) = app(MockService::default());
    app.add_files([jpeg("a.jpg")]).unwrap();
    app.form_mut().width = "100".into();
    let _ = app.submit().await;
    assert_eq!(app.service().request_count(), 0);
}
