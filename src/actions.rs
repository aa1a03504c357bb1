//! Download and share for the displayed image.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, error, info, warn};

use crate::constants::{EMBEDDED_PREFIX, FILE_NAME_PREFIX, IMAGE_LOAD_TIMEOUT, SHARE_TITLE};
use crate::controller::SessionState;
use crate::error::ActionError;
use crate::render::{ImageRef, extension_for, preview};

/// An image file handed to the share sheet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShareFile {
    /// File name
    pub name: String,
    /// Media type, e.g. `image/png`
    pub media_type: String,
    /// File contents
    pub bytes: Vec<u8>,
}

/// What gets shared.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ShareContent {
    /// The decoded embedded image
    File(ShareFile),
    /// A remote image URL
    Url(String),
}

/// Everything passed to the share sheet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SharePayload {
    /// Share title
    pub title: String,
    /// Share text
    pub text: String,
    /// File or URL
    pub content: ShareContent,
}

/// Best-effort platform services. Missing capabilities are normal, not errors.
pub trait Platform {
    /// Saves a file for the user, returning where it went.
    fn save_file(&mut self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ActionError>;
    /// Opens a reference somewhere the user can save it by hand.
    fn open_external(&mut self, reference: &str);
    /// Whether a native share sheet exists.
    fn can_share(&self) -> bool;
    /// Shares through the native share sheet.
    fn share(&mut self, payload: &SharePayload) -> Result<(), ActionError>;
    /// Puts text on the clipboard.
    fn copy_to_clipboard(&mut self, text: &str) -> Result<(), ActionError>;
    /// Shows an informational message.
    fn notify(&mut self, message: &str);
    /// Last resort: shows the text so the user can copy it.
    fn prompt_copy(&mut self, message: &str, text: &str);
}

/// Saves into a directory, opens links in the default browser and copies with the
/// system clipboard.
///
/// There is no share sheet, so sharing always takes the fallback path.
#[derive(Clone, Debug)]
pub struct LocalPlatform {
    out_dir: PathBuf,
}

impl LocalPlatform {
    /// Platform saving into `out_dir`.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Where files are saved.
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }
}

impl Platform for LocalPlatform {
    fn save_file(&mut self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ActionError> {
        std::fs::create_dir_all(&self.out_dir)?;
        // staged next to the target, removed on drop unless persisted
        let mut staged = tempfile::NamedTempFile::new_in(&self.out_dir)?;
        staged.write_all(bytes)?;
        staged.flush()?;
        let target = self.out_dir.join(file_name);
        staged
            .persist(&target)
            .map_err(|err| ActionError::Io(err.error))?;
        Ok(target)
    }

    fn open_external(&mut self, reference: &str) {
        match webbrowser::open(reference) {
            Ok(()) => info!("Opened the image in the browser"),
            Err(err) => {
                debug!("Could not open a browser: {}", err);
                eprintln!("Open this image in your browser to save it: {reference}");
            }
        }
    }

    fn can_share(&self) -> bool {
        false
    }

    fn share(&mut self, _payload: &SharePayload) -> Result<(), ActionError> {
        Err(ActionError::Unavailable("Native sharing"))
    }

    fn copy_to_clipboard(&mut self, text: &str) -> Result<(), ActionError> {
        arboard::Clipboard::new()
            .and_then(|mut clipboard| clipboard.set_text(text))
            .map_err(|err| ActionError::Clipboard(err.to_string()))
    }

    fn notify(&mut self, message: &str) {
        eprintln!("{message}");
    }

    fn prompt_copy(&mut self, message: &str, text: &str) {
        eprintln!("{message} {text}");
    }
}

/// Which download path ran.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// Saved to this path.
    Saved(PathBuf),
    /// Saving failed; the reference was opened for a manual save.
    OpenedExternally(ActionError),
}

/// Which share path ran.
#[derive(Debug, Eq, PartialEq)]
pub enum ShareOutcome {
    /// Handed to the share sheet.
    Shared,
    /// Link copied to the clipboard.
    Copied,
    /// Link shown for a manual copy.
    Prompted,
    /// Embedded image; the user was told to use download instead.
    Notified,
}

/// Saves the displayed image, falling back to opening it externally.
pub async fn download<F: Platform>(
    session: &SessionState,
    http: &reqwest::Client,
    platform: &mut F,
) -> Result<DownloadOutcome, ActionError> {
    let Some(reference) = session.image_ref() else {
        error!("No image available for download");
        return Err(ActionError::NoImage);
    };
    info!("Downloading image: {}", preview(reference));

    let stem = format!(
        "{FILE_NAME_PREFIX}-{}-{}",
        file_safe(session.dreamer_name().unwrap_or("user")),
        Utc::now().timestamp_millis()
    );

    let saved = match ImageRef::classify(reference) {
        Ok(ImageRef::Embedded(embedded)) => embedded
            .decode_payload()
            .map_err(ActionError::from)
            .and_then(|bytes| {
                platform.save_file(&format!("{stem}.{}", embedded.extension()), &bytes)
            }),
        Ok(ImageRef::Remote(url)) => match fetch_remote(http, &url).await {
            Ok((bytes, extension)) => platform.save_file(&format!("{stem}.{extension}"), &bytes),
            Err(err) => Err(err),
        },
        Err(err) => Err(ActionError::from(err)),
    };

    match saved {
        Ok(path) => {
            info!("Image saved to {}", path.display());
            Ok(DownloadOutcome::Saved(path))
        }
        Err(err) => {
            warn!("Download failed, opening the image instead: {}", err);
            platform.open_external(reference);
            Ok(DownloadOutcome::OpenedExternally(err))
        }
    }
}

/// Fetches a remote image, returning its bytes and a file extension.
async fn fetch_remote(http: &reqwest::Client, url: &str) -> Result<(Vec<u8>, String), ActionError> {
    let response = http
        .get(url)
        .timeout(IMAGE_LOAD_TIMEOUT)
        .send()
        .await
        .map_err(|err| ActionError::Fetch(err.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(ActionError::Fetch(format!("HTTP error! status: {status}")));
    }
    let extension = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(extension_for)
        .unwrap_or("jpg")
        .to_string();
    let bytes = response
        .bytes()
        .await
        .map_err(|err| ActionError::Fetch(err.to_string()))?;
    debug!("Fetched {} bytes from {}", bytes.len(), url);
    Ok((bytes.to_vec(), extension))
}

/// Shares the displayed image, falling back to the clipboard or a notice.
pub fn share<F: Platform>(
    session: &SessionState,
    platform: &mut F,
) -> Result<ShareOutcome, ActionError> {
    let Some(reference) = session.image_ref() else {
        error!("No image available for sharing");
        return Err(ActionError::NoImage);
    };
    info!("Sharing image: {}", preview(reference));

    if platform.can_share() {
        let shared = share_payload(session, reference)
            .and_then(|payload| platform.share(&payload));
        match shared {
            Ok(()) => return Ok(ShareOutcome::Shared),
            Err(err) => warn!("Share failed, falling back: {}", err),
        }
    }

    if reference.starts_with(EMBEDDED_PREFIX) {
        platform.notify("Your image is ready! Use download to save it.");
        return Ok(ShareOutcome::Notified);
    }

    match platform.copy_to_clipboard(reference) {
        Ok(()) => {
            platform.notify("Image link copied to the clipboard!");
            Ok(ShareOutcome::Copied)
        }
        Err(err) => {
            debug!("Clipboard unavailable: {}", err);
            platform.prompt_copy("Copy the image link:", reference);
            Ok(ShareOutcome::Prompted)
        }
    }
}

fn share_payload(session: &SessionState, reference: &str) -> Result<SharePayload, ActionError> {
    let name = session.dreamer_name();
    let content = match ImageRef::classify(reference)? {
        ImageRef::Embedded(embedded) => ShareContent::File(ShareFile {
            name: format!(
                "{FILE_NAME_PREFIX}-{}.{}",
                file_safe(name.unwrap_or("user")),
                embedded.extension()
            ),
            bytes: embedded.decode_payload()?,
            media_type: embedded.media_type,
        }),
        ImageRef::Remote(url) => ShareContent::Url(url),
    };
    Ok(SharePayload {
        title: SHARE_TITLE.to_string(),
        text: format!("See {}'s dream world!", name.unwrap_or("A user")),
        content,
    })
}

/// Keeps letters, digits, `-` and `_`; everything else becomes `_`.
fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dream::DreamRequest;
    use base64::Engine;
    use base64::engine::general_purpose;

    #[derive(Default)]
    struct FakePlatform {
        saved: Vec<(String, Vec<u8>)>,
        opened: Vec<String>,
        shared: Vec<SharePayload>,
        notices: Vec<String>,
        prompts: Vec<String>,
        clipboard: Option<String>,
        can_share: bool,
        share_fails: bool,
        clipboard_works: bool,
        save_fails: bool,
    }

    impl Platform for FakePlatform {
        fn save_file(&mut self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ActionError> {
            if self.save_fails {
                return Err(ActionError::Unavailable("Saving"));
            }
            self.saved.push((file_name.to_string(), bytes.to_vec()));
            Ok(PathBuf::from(file_name))
        }

        fn open_external(&mut self, reference: &str) {
            self.opened.push(reference.to_string());
        }

        fn can_share(&self) -> bool {
            self.can_share
        }

        fn share(&mut self, payload: &SharePayload) -> Result<(), ActionError> {
            if self.share_fails {
                return Err(ActionError::Share("dismissed".to_string()));
            }
            self.shared.push(payload.clone());
            Ok(())
        }

        fn copy_to_clipboard(&mut self, text: &str) -> Result<(), ActionError> {
            if !self.clipboard_works {
                return Err(ActionError::Unavailable("Clipboard"));
            }
            self.clipboard = Some(text.to_string());
            Ok(())
        }

        fn notify(&mut self, message: &str) {
            self.notices.push(message.to_string());
        }

        fn prompt_copy(&mut self, _message: &str, text: &str) {
            self.prompts.push(text.to_string());
        }
    }

    fn request() -> DreamRequest {
        DreamRequest {
            name: "Ada Lovelace".to_string(),
            colors: "blue".to_string(),
            locations: "moon".to_string(),
            atmosphere: "calm".to_string(),
            characters: "owls".to_string(),
            details: "stars".to_string(),
        }
    }

    fn embedded_bytes() -> Vec<u8> {
        (0u8..=200).collect()
    }

    fn embedded_session() -> SessionState {
        let reference = format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(embedded_bytes())
        );
        SessionState::displayed(reference, request())
    }

    fn remote_session() -> SessionState {
        SessionState::displayed("https://images.example/dream.jpg".to_string(), request())
    }

    #[tokio::test]
    async fn download_without_image_is_an_error() {
        let mut platform = FakePlatform::default();
        let result = download(
            &SessionState::default(),
            &reqwest::Client::new(),
            &mut platform,
        )
        .await;
        assert!(matches!(result, Err(ActionError::NoImage)));
        assert!(platform.opened.is_empty());
    }

    #[tokio::test]
    async fn download_embedded_saves_decoded_bytes() {
        let mut platform = FakePlatform::default();
        let outcome = download(&embedded_session(), &reqwest::Client::new(), &mut platform)
            .await
            .expect("download");
        assert!(matches!(outcome, DownloadOutcome::Saved(_)));
        let (name, bytes) = &platform.saved[0];
        assert!(name.starts_with("dream-world-Ada_Lovelace-"));
        assert!(name.ends_with(".png"));
        assert_eq!(bytes, &embedded_bytes());
    }

    #[tokio::test]
    async fn failed_save_opens_externally() {
        let mut platform = FakePlatform {
            save_fails: true,
            ..Default::default()
        };
        let session = embedded_session();
        let outcome = download(&session, &reqwest::Client::new(), &mut platform)
            .await
            .expect("download");
        assert!(matches!(outcome, DownloadOutcome::OpenedExternally(_)));
        assert_eq!(platform.opened, vec![session.image_ref().unwrap_or_default()]);
    }

    #[test]
    fn share_embedded_as_file() {
        let mut platform = FakePlatform {
            can_share: true,
            ..Default::default()
        };
        let outcome = share(&embedded_session(), &mut platform).expect("share");
        assert_eq!(outcome, ShareOutcome::Shared);
        let payload = &platform.shared[0];
        assert_eq!(payload.title, "My Dream World");
        assert_eq!(payload.text, "See Ada Lovelace's dream world!");
        match &payload.content {
            ShareContent::File(file) => {
                assert_eq!(file.name, "dream-world-Ada_Lovelace.png");
                assert_eq!(file.media_type, "image/png");
                assert_eq!(file.bytes, embedded_bytes());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn share_remote_as_url() {
        let mut platform = FakePlatform {
            can_share: true,
            ..Default::default()
        };
        share(&remote_session(), &mut platform).expect("share");
        assert_eq!(
            platform.shared[0].content,
            ShareContent::Url("https://images.example/dream.jpg".to_string())
        );
    }

    #[test]
    fn failed_share_copies_remote_link() {
        let mut platform = FakePlatform {
            can_share: true,
            share_fails: true,
            clipboard_works: true,
            ..Default::default()
        };
        let outcome = share(&remote_session(), &mut platform).expect("share");
        assert_eq!(outcome, ShareOutcome::Copied);
        assert_eq!(
            platform.clipboard.as_deref(),
            Some("https://images.example/dream.jpg")
        );
        assert_eq!(platform.notices.len(), 1);
    }

    #[test]
    fn no_share_no_clipboard_prompts() {
        let mut platform = FakePlatform::default();
        let outcome = share(&remote_session(), &mut platform).expect("share");
        assert_eq!(outcome, ShareOutcome::Prompted);
        assert_eq!(platform.prompts, vec!["https://images.example/dream.jpg"]);
    }

    #[test]
    fn embedded_without_share_notifies() {
        let mut platform = FakePlatform {
            clipboard_works: true,
            ..Default::default()
        };
        let outcome = share(&embedded_session(), &mut platform).expect("share");
        assert_eq!(outcome, ShareOutcome::Notified);
        assert!(platform.clipboard.is_none());
    }

    #[test]
    fn local_platform_saves_into_out_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut platform = LocalPlatform::new(dir.path().join("downloads"));
        let path = platform
            .save_file("dream.png", b"image bytes")
            .expect("save");
        assert_eq!(path, dir.path().join("downloads").join("dream.png"));
        assert_eq!(std::fs::read(&path).expect("read"), b"image bytes");
        let leftovers = std::fs::read_dir(platform.out_dir())
            .expect("read dir")
            .count();
        assert_eq!(leftovers, 1);
        assert!(!platform.can_share());
    }

    #[tokio::test]
    async fn missing_remote_image_opens_externally() {
        use axum::Router;
        use axum::http::StatusCode;
        use axum::routing::get;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let router = Router::new().route("/gone.png", get(|| async { StatusCode::NOT_FOUND }));
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        let url = format!("http://{addr}/gone.png");
        let session = SessionState::displayed(url.clone(), request());

        let mut platform = FakePlatform::default();
        let outcome = download(&session, &reqwest::Client::new(), &mut platform)
            .await
            .expect("download");
        match outcome {
            DownloadOutcome::OpenedExternally(ActionError::Fetch(reason)) => {
                assert!(reason.contains("404"), "{reason}")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(platform.saved.is_empty());
        assert_eq!(platform.opened, vec![url]);
    }

    #[test]
    fn anonymous_share_text() {
        let session = SessionState::displayed(
            "https://images.example/dream.jpg".to_string(),
            DreamRequest {
                name: "  ".to_string(),
                ..request()
            },
        );
        let payload = share_payload(&session, "https://images.example/dream.jpg").expect("payload");
        assert_eq!(payload.text, "See A user's dream world!");
    }

    #[test]
    fn local_platform_uses_the_system_clipboard() {
        let mut platform = LocalPlatform::new(".");
        // headless machines have no clipboard; that must surface as a clipboard error
        match platform.copy_to_clipboard("https://images.example/dream.jpg") {
            Ok(()) => {}
            Err(ActionError::Clipboard(reason)) => assert!(!reason.is_empty()),
            Err(other) => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn file_names_are_sanitised() {
        assert_eq!(file_safe("Ada/../x y"), "Ada____x_y");
    }
}
