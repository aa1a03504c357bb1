//! Talks to the dream webhook.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::constants::{DEMO_IMAGES, JSON_CONTENT_TYPE};
use crate::dream::{DreamImage, DreamRequest, DreamResponse};
use crate::error::RequestError;

/// Sends dream requests to the configured webhook.
#[derive(Clone, Debug)]
pub struct DreamClient {
    http: reqwest::Client,
    config: ClientConfig,
}

/// Failure of the POST itself, before the answer is interpreted.
enum PostError {
    /// Nothing answered at the other end.
    Connect(reqwest::Error),
    Request(RequestError),
}

impl From<RequestError> for PostError {
    fn from(err: RequestError) -> Self {
        PostError::Request(err)
    }
}

impl DreamClient {
    /// Builds a client with its own HTTP connection pool.
    pub fn new(config: ClientConfig) -> Result<Self, RequestError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|err| RequestError::Network(err.to_string()))?;
        Ok(Self::with_http(http, config))
    }

    /// Builds a client on top of an existing HTTP client.
    pub fn with_http(http: reqwest::Client, config: ClientConfig) -> Self {
        Self { http, config }
    }

    /// The HTTP client, shared with the image decoder and downloads.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Posts the dream and classifies the answer.
    ///
    /// When the webhook can't be reached at all and the demo fallback is on,
    /// this answers with a demo image instead of an error.
    pub async fn send_dream_request(&self, request: &DreamRequest) -> DreamResponse {
        info!("Sending dream request to {}", self.config.endpoint);
        debug!("Dream data: {:?}", request);

        let payload = match tokio::time::timeout(self.config.timeout, self.post(request)).await {
            Ok(Ok(payload)) => payload,
            Ok(Err(PostError::Connect(err))) => {
                if self.config.demo_fallback {
                    return Ok(self.demo_response(request, &err).await);
                }
                error!("Dream webhook unreachable: {}", err);
                return Err(RequestError::Connection(err.to_string()));
            }
            Ok(Err(PostError::Request(err))) => {
                error!("Dream request failed: {}", err);
                return Err(err);
            }
            Err(_) => {
                error!(
                    "Dream request timed out after {}s",
                    self.config.timeout.as_secs()
                );
                return Err(RequestError::Timeout(self.config.timeout));
            }
        };

        interpret_payload(&payload)
    }

    /// Sends a fixed test dream and reports whether the webhook produced an image.
    ///
    /// A demo answer means the webhook wasn't reached, so it counts as a failure.
    pub async fn check_connection(&self) -> Result<DreamImage, RequestError> {
        let request = DreamRequest {
            name: "Test User".to_string(),
            colors: "blue, green".to_string(),
            locations: "forest, lake".to_string(),
            atmosphere: "peaceful".to_string(),
            characters: "unicorn".to_string(),
            details: "stars".to_string(),
        };
        info!("Testing dream webhook connection");
        let image = self.send_dream_request(&request).await?;
        if image.demo {
            return Err(RequestError::Connection(format!(
                "{} did not answer, the demo fallback did",
                self.config.endpoint
            )));
        }
        Ok(image)
    }

    async fn post(&self, request: &DreamRequest) -> Result<Map<String, Value>, PostError> {
        let response = self
            .http
            .post(self.config.endpoint.clone())
            .header(ACCEPT, JSON_CONTENT_TYPE)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .json(request)
            .send()
            .await
            .map_err(|err| {
                if err.is_connect() {
                    PostError::Connect(err)
                } else {
                    PostError::Request(RequestError::Network(err.to_string()))
                }
            })?;

        let status = response.status();
        debug!("Webhook response status: {}", status);

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = response
            .text()
            .await
            .map_err(|err| RequestError::Network(err.to_string()))?;

        if !status.is_success() {
            return Err(RequestError::Http {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        if !content_type
            .as_deref()
            .is_some_and(|value| value.contains(JSON_CONTENT_TYPE))
        {
            debug!("Non-JSON response body: {}", body);
            return Err(RequestError::NonJsonResponse { content_type, body }.into());
        }

        Ok(parse_payload(&body)?)
    }

    async fn demo_response(&self, request: &DreamRequest, err: &reqwest::Error) -> DreamImage {
        warn!(
            "Dream webhook at {} unreachable ({}), falling back to demo mode",
            self.config.endpoint, err
        );
        tokio::time::sleep(self.config.demo_delay).await;
        let image_ref = DEMO_IMAGES[rand::random_range(0..DEMO_IMAGES.len())];
        DreamImage {
            image_ref: image_ref.to_string(),
            prompt_used: Some(request.demo_prompt()),
            image_format: Some("url".to_string()),
            demo: true,
        }
    }
}

/// Parses a response body, which must be a JSON object.
pub fn parse_payload(body: &str) -> Result<Map<String, Value>, RequestError> {
    if body.trim().is_empty() {
        return Err(RequestError::EmptyResponse);
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(RequestError::MalformedResponse(format!(
            "expected an object, got {}",
            json_kind(&other)
        ))),
        Err(err) => Err(RequestError::MalformedResponse(err.to_string())),
    }
}

/// Decides whether a parsed webhook answer carries an image.
pub fn interpret_payload(payload: &Map<String, Value>) -> DreamResponse {
    let success = payload.get("success").is_some_and(is_truthy);
    let image_ref = payload
        .get("image_url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if success && let Some(image_ref) = image_ref {
        let optional_string = |key: &str| {
            payload
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let image_format = optional_string("image_format");
        info!(
            "Image generation successful, image type: {}",
            image_format.as_deref().unwrap_or("unknown")
        );
        return Ok(DreamImage {
            image_ref: image_ref.to_string(),
            prompt_used: optional_string("prompt_used"),
            image_format,
            demo: false,
        });
    }

    if let Some(message) = payload.get("error").filter(|value| is_truthy(value)) {
        let message = match message {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        return Err(RequestError::Rejected(message));
    }
    if !success {
        return Err(RequestError::SuccessFlagFalse);
    }
    Err(RequestError::MissingImageReference)
}

/// JSON truthiness, the way the workflow engine's scripts see it.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
