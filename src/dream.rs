//! Dream requests and the webhook's answers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RequestError;
use crate::validate::{ValidationResult, validate};

/// The six required form fields, in form order.
pub const FIELDS: [&str; 6] = [
    "name",
    "colors",
    "locations",
    "atmosphere",
    "characters",
    "details",
];

/// Human-readable label for a form field.
pub fn field_label(field: &str) -> &str {
    match field {
        "name" => "Name",
        "colors" => "Colors",
        "locations" => "Locations",
        "atmosphere" => "Atmosphere",
        "characters" => "Characters",
        "details" => "Details",
        other => other,
    }
}

/// A validated, trimmed dream description. This is exactly what gets posted.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DreamRequest {
    /// Who is dreaming
    pub name: String,
    /// Colors of the dream
    pub colors: String,
    /// Places in the dream
    pub locations: String,
    /// Mood of the dream
    pub atmosphere: String,
    /// Who shows up
    pub characters: String,
    /// Anything else
    pub details: String,
}

impl DreamRequest {
    /// Validates the field mapping and builds a request from the trimmed values.
    pub fn from_fields(fields: &BTreeMap<String, String>) -> Result<Self, ValidationResult> {
        let result = validate(fields);
        if !result.is_valid() {
            return Err(result);
        }
        let get = |key: &str| {
            fields
                .get(key)
                .map(|value| value.trim().to_string())
                .unwrap_or_default()
        };
        Ok(Self {
            name: get("name"),
            colors: get("colors"),
            locations: get("locations"),
            atmosphere: get("atmosphere"),
            characters: get("characters"),
            details: get("details"),
        })
    }

    /// The image prompt the demo fallback reports, built from the descriptive fields.
    pub fn demo_prompt(&self) -> String {
        format!(
            "A surreal dreamscape inspired by {}, featuring {}, in a {} mood, colors {}, with {}, highly detailed, cinematic lighting, 1024x1024",
            self.locations, self.characters, self.atmosphere, self.colors, self.details
        )
    }
}

/// A successfully generated image.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DreamImage {
    /// Remote URL or embedded data reference.
    pub image_ref: String,
    /// Prompt the workflow used, when it says.
    pub prompt_used: Option<String>,
    /// Format hint from the workflow, e.g. `png` or `url`.
    pub image_format: Option<String>,
    /// True when this came from the local demo fallback, not the webhook.
    pub demo: bool,
}

/// Outcome of one dream request.
pub type DreamResponse = Result<DreamImage, RequestError>;
