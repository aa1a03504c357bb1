//! Error handling

use std::time::Duration;

use crate::validate::ValidationResult;

/// Why a dream request didn't produce an image.
#[derive(Debug)]
pub enum RequestError {
    /// The webhook didn't answer within the timeout.
    Timeout(Duration),
    /// The webhook couldn't be reached and the demo fallback is off.
    Connection(String),
    /// Any other transport failure.
    Network(String),
    /// The webhook answered with a non-success status.
    Http {
        /// HTTP status code
        status: u16,
        /// Response body, verbatim
        body: String,
    },
    /// The response didn't declare a JSON content type.
    NonJsonResponse {
        /// The declared content type, if any
        content_type: Option<String>,
        /// Response body, verbatim
        body: String,
    },
    /// The body wasn't a JSON object.
    MalformedResponse(String),
    /// The workflow reported its own error message.
    Rejected(String),
    /// The workflow ran but said it didn't succeed.
    SuccessFlagFalse,
    /// Success was reported without an image reference.
    MissingImageReference,
    /// The webhook answered with an empty body.
    EmptyResponse,
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout(after) => write!(
                f,
                "Image generation timed out ({} seconds). Please try again.",
                after.as_secs()
            ),
            Self::Connection(err) => write!(f, "Could not reach the dream webhook: {err}"),
            Self::Network(err) => write!(f, "Network error: {err}"),
            Self::Http { status, body } => write!(f, "HTTP error! status: {status} - {body}"),
            Self::NonJsonResponse { .. } => write!(
                f,
                "The webhook response is not JSON. The workflow may have failed."
            ),
            Self::MalformedResponse(detail) => {
                write!(f, "The webhook response is not a valid JSON object: {detail}")
            }
            Self::Rejected(message) => write!(f, "{message}"),
            Self::SuccessFlagFalse => write!(f, "The workflow failed (success: false)"),
            Self::MissingImageReference => {
                write!(f, "The workflow did not return an image reference")
            }
            Self::EmptyResponse => write!(f, "The workflow returned an empty response"),
        }
    }
}

impl std::error::Error for RequestError {}

/// Why an image reference couldn't be displayed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ContentError {
    /// Empty or blank reference.
    InvalidReference,
    /// Neither embedded data nor a remote URL.
    UnknownFormat,
    /// Embedded data without the `,` separating metadata from payload.
    MalformedEmbedded,
    /// Embedded payload too short to be an image.
    TruncatedEmbedded {
        /// Payload length in characters
        length: usize,
    },
    /// Embedded payload didn't decode to an image.
    CorruptEmbedded(String),
    /// Remote image couldn't be fetched or decoded.
    UnreachableRemote(String),
}

impl std::fmt::Display for ContentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidReference => write!(f, "Received invalid image data."),
            Self::UnknownFormat => {
                write!(f, "Unknown image format. Check the webhook response.")
            }
            Self::MalformedEmbedded => {
                write!(f, "Embedded image is malformed (missing comma separator).")
            }
            Self::TruncatedEmbedded { length } => write!(
                f,
                "Embedded image data is missing or too short ({length} characters)."
            ),
            Self::CorruptEmbedded(_) => write!(
                f,
                "Embedded image data is corrupt or in an unsupported format."
            ),
            Self::UnreachableRemote(_) => write!(
                f,
                "Could not load the image URL. The image server may be failing."
            ),
        }
    }
}

impl std::error::Error for ContentError {}

/// Download and share failures. These always have a fallback path.
#[derive(Debug)]
pub enum ActionError {
    /// Nothing is displayed yet.
    NoImage,
    /// The image reference can't be acted on.
    Content(ContentError),
    /// Fetching a remote image failed.
    Fetch(String),
    /// Embedded payload wasn't valid base64.
    Decode(base64::DecodeError),
    /// Writing the file failed.
    Io(std::io::Error),
    /// The platform doesn't offer this capability.
    Unavailable(&'static str),
    /// The system clipboard refused the text.
    Clipboard(String),
    /// The platform's share sheet failed or was dismissed.
    Share(String),
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoImage => write!(f, "No image available"),
            Self::Content(err) => write!(f, "{err}"),
            Self::Fetch(err) => write!(f, "Failed to fetch image: {err}"),
            Self::Decode(err) => write!(f, "Failed to decode embedded image: {err}"),
            Self::Io(err) => write!(f, "Failed to save image: {err}"),
            Self::Unavailable(what) => write!(f, "{what} is not available"),
            Self::Clipboard(err) => write!(f, "Clipboard error: {err}"),
            Self::Share(err) => write!(f, "Share failed: {err}"),
        }
    }
}

impl std::error::Error for ActionError {}

impl From<std::io::Error> for ActionError {
    fn from(err: std::io::Error) -> Self {
        ActionError::Io(err)
    }
}

impl From<base64::DecodeError> for ActionError {
    fn from(err: base64::DecodeError) -> Self {
        ActionError::Decode(err)
    }
}

impl From<ContentError> for ActionError {
    fn from(err: ContentError) -> Self {
        ActionError::Content(err)
    }
}

/// Broad class of a [`DreamError`], deciding how it is presented.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// The user must correct their input.
    Validation,
    /// Timeout or unreachable webhook.
    Network,
    /// The webhook answered with something unusable.
    Protocol,
    /// The image reference is bad.
    Content,
    /// Download or share failed.
    Action,
}

/// Any error the dream flow can surface.
#[derive(Debug)]
pub enum DreamError {
    /// Form input problems
    Validation(ValidationResult),
    /// Webhook request problems
    Request(RequestError),
    /// Image reference problems
    Content(ContentError),
    /// Download/share problems
    Action(ActionError),
}

impl DreamError {
    /// Which class of the taxonomy this error belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) => ErrorClass::Validation,
            Self::Request(
                RequestError::Timeout(_)
                | RequestError::Connection(_)
                | RequestError::Network(_),
            ) => ErrorClass::Network,
            Self::Request(
                RequestError::Http { .. }
                | RequestError::NonJsonResponse { .. }
                | RequestError::MalformedResponse(_)
                | RequestError::EmptyResponse,
            ) => ErrorClass::Protocol,
            Self::Request(
                RequestError::Rejected(_)
                | RequestError::SuccessFlagFalse
                | RequestError::MissingImageReference,
            ) => ErrorClass::Content,
            Self::Content(_) => ErrorClass::Content,
            Self::Action(_) => ErrorClass::Action,
        }
    }

    /// What the user can do about it, when the class suggests something.
    pub fn hint(&self) -> Option<&'static str> {
        match self.class() {
            ErrorClass::Network => Some("Check that the image workflow is active and reachable"),
            ErrorClass::Protocol => {
                Some("The webhook answered without an image result, check the workflow's response step")
            }
            ErrorClass::Validation | ErrorClass::Content | ErrorClass::Action => None,
        }
    }
}

impl std::fmt::Display for DreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(result) => write!(f, "{}", result.summary()),
            Self::Request(err) => write!(f, "{err}"),
            Self::Content(err) => write!(f, "{err} Please try again."),
            Self::Action(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for DreamError {}

impl From<ValidationResult> for DreamError {
    fn from(result: ValidationResult) -> Self {
        DreamError::Validation(result)
    }
}

impl From<RequestError> for DreamError {
    fn from(err: RequestError) -> Self {
        DreamError::Request(err)
    }
}

impl From<ContentError> for DreamError {
    fn from(err: ContentError) -> Self {
        DreamError::Content(err)
    }
}

impl From<ActionError> for DreamError {
    fn from(err: ActionError) -> Self {
        DreamError::Action(err)
    }
}
