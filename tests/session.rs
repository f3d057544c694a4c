use std::cell::{Cell, RefCell};
use std::path::PathBuf;

use clearview::client::build_request;
use clearview::encoded::OUTPUT_MEDIA_TYPE;
use clearview::{
    EncodedImage, Error, GeminiClient, GeminiConfig, ImageProcessor, Instruction,
    NotificationKind, Phase, ProcessingOptions, Result, Session, MAX_UPLOAD_BYTES,
};

const PNG_PREFIX: &str = "data:image/png;base64,";

/// Records every call and answers with a canned result.
struct FakeProcessor {
    reply: RefCell<Option<Result<EncodedImage>>>,
    calls: Cell<u32>,
    seen: RefCell<Vec<ProcessingOptions>>,
}

impl FakeProcessor {
    fn replying(reply: Result<EncodedImage>) -> Self {
        Self {
            reply: RefCell::new(Some(reply)),
            calls: Cell::new(0),
            seen: RefCell::new(Vec::new()),
        }
    }
}

impl ImageProcessor for FakeProcessor {
    async fn process(
        &self,
        _image: &EncodedImage,
        options: &ProcessingOptions,
    ) -> Result<EncodedImage> {
        self.calls.set(self.calls.get() + 1);
        self.seen.borrow_mut().push(*options);
        self.reply
            .borrow_mut()
            .take()
            .unwrap_or(Err(Error::NoImageData))
    }
}

fn write_png(dir: &tempfile::TempDir, name: &str, size: usize) -> PathBuf {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.resize(size, 0);
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn result_png() -> EncodedImage {
    EncodedImage::from_base64(OUTPUT_MEDIA_TYPE, "cHJvY2Vzc2Vk")
}

#[tokio::test]
async fn upload_adjust_and_process() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_png(&dir, "photo.png", 2 * 1024 * 1024);
    let mut session = Session::new(FakeProcessor::replying(Ok(result_png())));

    assert!(session.select_file(&input).await);
    assert_eq!(session.phase(), Phase::Preview);

    session
        .update_options(ProcessingOptions::new(80, false))
        .unwrap();
    assert_eq!(session.options().instruction(), Instruction::Aggressive);

    assert!(session.process().await);
    assert_eq!(session.phase(), Phase::Completed);
    let processed = session.processed_image().unwrap();
    assert!(processed.as_str().starts_with(PNG_PREFIX));
    assert_eq!(processed, &result_png());
    assert_eq!(session.processor().seen.borrow()[0].aggressiveness, 80);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_png(&dir, "huge.png", 6 * 1024 * 1024);
    let mut session = Session::new(FakeProcessor::replying(Ok(result_png())));

    assert!(!session.select_file(&input).await);
    assert_eq!(session.phase(), Phase::Idle);
    let note = session.notification().unwrap();
    assert_eq!(note.kind, NotificationKind::Error);
    assert!(note.message.contains("too large"));
}

#[tokio::test]
async fn unreadable_upload_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"just text").unwrap();
    let mut session = Session::new(FakeProcessor::replying(Ok(result_png())));

    assert!(!session.select_file(&path).await);
    assert_eq!(session.phase(), Phase::Idle);
    assert!(session
        .notification()
        .unwrap()
        .message
        .starts_with("Failed to read image"));
}

#[tokio::test]
async fn reselect_from_completed_clears_result() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_png(&dir, "a.png", 1024);
    let second = write_png(&dir, "b.png", 2048);
    let mut session = Session::new(FakeProcessor::replying(Ok(result_png())));

    session.select_file(&first).await;
    session.process().await;
    assert_eq!(session.phase(), Phase::Completed);

    assert!(session.select_file(&second).await);
    assert_eq!(session.phase(), Phase::Preview);
    assert!(session.processed_image().is_none());
    assert!(session.notification().is_none());
}

#[tokio::test]
async fn process_without_image_is_a_no_op() {
    let mut session = Session::new(FakeProcessor::replying(Ok(result_png())));

    assert!(!session.process().await);
    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(session.processor().calls.get(), 0);
}

#[tokio::test]
async fn text_reply_returns_to_preview() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_png(&dir, "photo.png", 4096);
    let reply = Err(Error::TextInsteadOfImage {
        text: "Sorry, I can't help with that.".to_string(),
    });
    let mut session = Session::new(FakeProcessor::replying(reply));

    session.select_file(&input).await;
    assert!(!session.process().await);

    assert_eq!(session.phase(), Phase::Preview);
    assert!(session.processed_image().is_none());
    assert!(session.original_image().is_some());
    let note = session.notification().unwrap();
    assert_eq!(note.kind, NotificationKind::Error);
    assert!(note.message.contains("text instead of an image"));
}

#[tokio::test]
async fn failure_can_be_retried() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_png(&dir, "photo.png", 4096);
    let mut session = Session::new(FakeProcessor::replying(Err(Error::Remote {
        status: 503,
        message: "The model is overloaded".to_string(),
    })));

    session.select_file(&input).await;
    assert!(!session.process().await);
    assert_eq!(
        session.notification().unwrap().message,
        "The model is overloaded"
    );

    *session.processor().reply.borrow_mut() = Some(Ok(result_png()));
    assert!(session.process().await);
    assert_eq!(session.processor().calls.get(), 2);
}

#[tokio::test]
async fn missing_credential_returns_to_preview() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_png(&dir, "photo.png", 4096);
    let client = GeminiClient::new(GeminiConfig::default().with_api_key(None)).unwrap();
    let mut session = Session::new(client);

    assert!(session.select_file(&input).await);
    assert!(!session.process().await);

    assert_eq!(session.phase(), Phase::Preview);
    let note = session.notification().unwrap();
    assert_eq!(note.kind, NotificationKind::Error);
    assert!(note.message.contains("API Key is missing"));
}

#[tokio::test]
async fn reset_after_result_and_download() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_png(&dir, "photo.png", 4096);
    let mut session = Session::new(FakeProcessor::replying(Ok(result_png())));

    session.select_file(&input).await;
    session.process().await;

    let download = session.download(1_700_000_000_000).unwrap().unwrap();
    let saved = download.save_to(dir.path()).unwrap();
    assert_eq!(
        saved.file_name().unwrap().to_str().unwrap(),
        "clearview-cleaned-1700000000000.png"
    );
    assert_eq!(std::fs::read(saved).unwrap(), b"processed");

    session.reset();
    assert_eq!(session.phase(), Phase::Idle);
    assert!(session.original_image().is_none());
    assert!(session.processed_image().is_none());
    assert!(session.download(1).unwrap().is_none());
}

#[tokio::test]
async fn upload_limit_is_inclusive() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_png(&dir, "limit.png", usize::try_from(MAX_UPLOAD_BYTES).unwrap());
    let mut session = Session::new(FakeProcessor::replying(Ok(result_png())));

    assert!(session.select_file(&input).await);
}

#[test]
fn request_follows_selected_image() {
    let image = EncodedImage::from_bytes("image/webp", b"RIFF....WEBP");
    let request = build_request(&image, &ProcessingOptions::new(5, false));
    let inline = request.contents[0].parts[0].inline_data.as_ref().unwrap();

    assert_eq!(inline.mime_type, "image/webp");
    assert_eq!(inline.data, image.payload());
}
