//! Shared constants and defaults
//!

use std::time::Duration;

/// Webhook the client posts to when nothing else is configured.
pub const DEFAULT_WEBHOOK_URL: &str = "http://localhost:5678/webhook-test/dream-generator";

/// Hard limit on a single dream request; image generation is slow.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Artificial delay before a demo response is returned.
pub const DEMO_DELAY: Duration = Duration::from_secs(2);

/// When to tell the user that generation is taking longer than usual.
pub const SLOW_WARNING_AFTER: Duration = Duration::from_secs(45);

/// Limit on loading an image for display or download.
pub const IMAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimum trimmed length of every form field, in characters.
pub const MIN_FIELD_LENGTH: usize = 2;

/// Embedded payloads shorter than this can't be a real image.
pub const MIN_EMBEDDED_PAYLOAD: usize = 100;

/// Prefix of an embedded-data image reference.
pub const EMBEDDED_PREFIX: &str = "data:image/";

/// Prefix of a remote image reference.
pub const REMOTE_PREFIX: &str = "http";

/// Marker the response content type must contain.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Stock images returned by the demo fallback.
pub const DEMO_IMAGES: [&str; 4] = [
    "https://images.unsplash.com/photo-1506905925346-21bda4d32df4?w=1024&h=1024&fit=crop",
    "https://images.unsplash.com/photo-1518837695005-2083093ee35b?w=1024&h=1024&fit=crop",
    "https://images.unsplash.com/photo-1441974231531-c6227db76b6e?w=1024&h=1024&fit=crop",
    "https://images.unsplash.com/photo-1470071459604-3b5ec3a7fe05?w=1024&h=1024&fit=crop",
];

/// Prefix of downloaded and shared file names.
pub const FILE_NAME_PREFIX: &str = "dream-world";

/// Title used when sharing an image.
pub const SHARE_TITLE: &str = "My Dream World";
