//! Classifies image references and gets them on screen.

use std::future::Future;
use std::io::Cursor;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose;
use tracing::{debug, error, info};

use crate::constants::{EMBEDDED_PREFIX, IMAGE_LOAD_TIMEOUT, MIN_EMBEDDED_PAYLOAD, REMOTE_PREFIX};
use crate::error::{ContentError, DreamError};
use crate::presenter::PresentationPort;

/// An image reference that passed the structural checks.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ImageRef {
    /// `data:image/...` reference carrying the image itself.
    Embedded(EmbeddedImage),
    /// Remote `http(s)` URL.
    Remote(String),
}

/// The parts of an embedded-data reference.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EmbeddedImage {
    /// Media type, e.g. `image/png`.
    pub media_type: String,
    /// Whether the payload is base64 rather than raw text.
    pub base64: bool,
    /// Everything after the comma.
    pub payload: String,
}

impl EmbeddedImage {
    /// The raw image bytes.
    pub fn decode_payload(&self) -> Result<Vec<u8>, base64::DecodeError> {
        if !self.base64 {
            return Ok(self.payload.as_bytes().to_vec());
        }
        let compact: String = self
            .payload
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        general_purpose::STANDARD.decode(compact)
    }

    /// File extension matching the media type.
    pub fn extension(&self) -> &str {
        extension_for(&self.media_type).unwrap_or("png")
    }
}

/// File extension for a raster media type the decoder can load.
pub fn extension_for(media_type: &str) -> Option<&'static str> {
    let essence = media_type.split(';').next().unwrap_or_default().trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

impl ImageRef {
    /// Classifies a reference by prefix and checks embedded data is plausible.
    ///
    /// Nothing is loaded here; a failure means no load should be attempted.
    pub fn classify(reference: &str) -> Result<Self, ContentError> {
        if reference.trim().is_empty() {
            return Err(ContentError::InvalidReference);
        }

        if let Some(rest) = reference.strip_prefix(EMBEDDED_PREFIX) {
            let Some((meta, payload)) = rest.split_once(',') else {
                return Err(ContentError::MalformedEmbedded);
            };
            let length = payload.chars().count();
            if length < MIN_EMBEDDED_PAYLOAD {
                return Err(ContentError::TruncatedEmbedded { length });
            }
            let mut parts = meta.split(';');
            let media_type = format!("image/{}", parts.next().unwrap_or_default());
            let base64 = parts.any(|part| part.eq_ignore_ascii_case("base64"));
            return Ok(ImageRef::Embedded(EmbeddedImage {
                media_type,
                base64,
                payload: payload.to_string(),
            }));
        }

        if reference.starts_with(REMOTE_PREFIX) {
            return Ok(ImageRef::Remote(reference.to_string()));
        }

        Err(ContentError::UnknownFormat)
    }

    /// Which kind of reference this is.
    pub fn kind(&self) -> ImageKind {
        match self {
            ImageRef::Embedded(_) => ImageKind::Embedded,
            ImageRef::Remote(_) => ImageKind::Remote,
        }
    }
}

/// Embedded data or remote URL.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImageKind {
    /// `data:image/...`
    Embedded,
    /// `http(s)://...`
    Remote,
}

/// What the decoder learnt about a loadable image.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Detected format, e.g. `Png`
    pub format: Option<String>,
}

/// Loads an image far enough to know it can be displayed.
pub trait ImageDecoder {
    /// Loads the image, returning a failure description when it can't be decoded.
    fn decode(&self, image: &ImageRef) -> impl Future<Output = Result<ImageInfo, String>> + Send;
}

/// Decodes with the `image` crate, fetching remote images over HTTP first.
#[derive(Clone, Debug)]
pub struct ImageCrateDecoder {
    http: reqwest::Client,
}

impl ImageCrateDecoder {
    /// Decoder fetching remote images with the given client.
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP status {status}"));
        }
        let bytes = response.bytes().await.map_err(|err| err.to_string())?;
        Ok(bytes.to_vec())
    }
}

impl ImageDecoder for ImageCrateDecoder {
    async fn decode(&self, image: &ImageRef) -> Result<ImageInfo, String> {
        let bytes = match image {
            ImageRef::Embedded(embedded) => {
                embedded.decode_payload().map_err(|err| err.to_string())?
            }
            ImageRef::Remote(url) => self.fetch(url).await?,
        };
        tokio::task::spawn_blocking(move || decode_bytes(&bytes))
            .await
            .map_err(|err| err.to_string())?
    }
}

/// Decodes image bytes, guessing the format from the content.
pub fn decode_bytes(bytes: &[u8]) -> Result<ImageInfo, String> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| format!("Failed to guess image format: {err}"))?;
    let format = reader.format().map(|format| format!("{format:?}"));
    let decoded = reader
        .decode()
        .map_err(|err| format!("Failed to decode image: {err}"))?;
    Ok(ImageInfo {
        width: decoded.width(),
        height: decoded.height(),
        format,
    })
}

/// An image that made it on screen.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DisplayedImage {
    /// The reference as received.
    pub reference: String,
    /// Embedded or remote
    pub kind: ImageKind,
    /// Decoded dimensions and format
    pub info: ImageInfo,
}

/// Where the renderer is.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum RenderState {
    /// Nothing requested yet, or reset for a new dream.
    #[default]
    Idle,
    /// Waiting for the decoder.
    Loading,
    /// The image is shown.
    Displayed(DisplayedImage),
    /// The image couldn't be shown.
    Failed(ContentError),
}

/// Result of one render.
pub type RenderOutcome = Result<DisplayedImage, ContentError>;

/// Runs `Idle -> Loading -> {Displayed | Failed}` for image references.
#[derive(Debug)]
pub struct Renderer<D> {
    decoder: D,
    load_timeout: Duration,
    state: RenderState,
}

impl<D: ImageDecoder> Renderer<D> {
    /// Renderer loading through the given decoder.
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            load_timeout: IMAGE_LOAD_TIMEOUT,
            state: RenderState::Idle,
        }
    }

    /// Overrides how long one image may take to load.
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Current state.
    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Back to idle, for a new dream.
    pub fn reset(&mut self) {
        self.state = RenderState::Idle;
    }

    /// Verifies the reference loads and shows it, or shows why it doesn't.
    pub async fn render<P: PresentationPort>(
        &mut self,
        image_ref: &str,
        presenter: &mut P,
    ) -> RenderOutcome {
        self.state = RenderState::Loading;

        let image = match ImageRef::classify(image_ref) {
            Ok(image) => image,
            Err(err) => {
                error!("Rejected image reference {}: {}", preview(image_ref), err);
                return self.fail(err, presenter);
            }
        };
        debug!(
            "Loading {:?} image, reference length {}",
            image.kind(),
            image_ref.len()
        );

        let loaded = tokio::time::timeout(self.load_timeout, self.decoder.decode(&image))
            .await
            .unwrap_or_else(|_| {
                Err(format!(
                    "timed out after {}s",
                    self.load_timeout.as_secs_f32()
                ))
            });
        match loaded {
            Ok(info) => {
                info!("Image loaded: {}x{}", info.width, info.height);
                let displayed = DisplayedImage {
                    reference: image_ref.to_string(),
                    kind: image.kind(),
                    info,
                };
                presenter.hide_error();
                presenter.show_image(&displayed);
                self.state = RenderState::Displayed(displayed.clone());
                Ok(displayed)
            }
            Err(detail) => {
                error!("Image load failed for {}: {}", preview(image_ref), detail);
                let err = match image {
                    ImageRef::Embedded(_) => ContentError::CorruptEmbedded(detail),
                    ImageRef::Remote(_) => ContentError::UnreachableRemote(detail),
                };
                self.fail(err, presenter)
            }
        }
    }

    fn fail<P: PresentationPort>(&mut self, err: ContentError, presenter: &mut P) -> RenderOutcome {
        presenter.show_error(&DreamError::Content(err.clone()).to_string());
        self.state = RenderState::Failed(err.clone());
        Err(err)
    }
}

/// First 50 characters of a reference, for logs.
pub(crate) fn preview(reference: &str) -> String {
    let mut preview: String = reference.chars().take(50).collect();
    if preview.len() < reference.len() {
        preview.push_str("...");
    }
    preview
}
