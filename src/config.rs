//! Config handling

use std::time::Duration;

use tracing::log::LevelFilter;
use url::Url;

use crate::constants::{DEMO_DELAY, IMAGE_LOAD_TIMEOUT, REQUEST_TIMEOUT};

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("reqwest", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Settings for talking to the dream webhook.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Where dream requests are posted.
    pub endpoint: Url,
    /// Hard limit for one request, including reading the body.
    pub timeout: Duration,
    /// Answer with a demo image when the webhook can't be reached at all.
    pub demo_fallback: bool,
    /// Artificial delay before the demo answer.
    pub demo_delay: Duration,
    /// Limit on fetching and decoding the returned image.
    pub image_timeout: Duration,
}

impl ClientConfig {
    /// Config for the given endpoint with every other setting at its default.
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            timeout: REQUEST_TIMEOUT,
            demo_fallback: true,
            demo_delay: DEMO_DELAY,
            image_timeout: IMAGE_LOAD_TIMEOUT,
        }
    }

    /// Overrides the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Turns the demo fallback on or off.
    pub fn with_demo_fallback(mut self, enabled: bool) -> Self {
        self.demo_fallback = enabled;
        self
    }

    /// Overrides the demo delay.
    pub fn with_demo_delay(mut self, delay: Duration) -> Self {
        self.demo_delay = delay;
        self
    }

    /// Overrides the image load timeout.
    pub fn with_image_timeout(mut self, timeout: Duration) -> Self {
        self.image_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_WEBHOOK_URL;

    fn default_config() -> ClientConfig {
        ClientConfig::new(Url::parse(DEFAULT_WEBHOOK_URL).expect("valid default URL"))
    }

    #[test]
    fn defaults_match_the_webhook_contract() {
        let config = default_config();
        assert_eq!(config.endpoint.as_str(), DEFAULT_WEBHOOK_URL);
        assert_eq!(config.timeout, Duration::from_secs(90));
        assert!(config.demo_fallback);
        assert_eq!(config.image_timeout, Duration::from_secs(30));
    }

    #[test]
    fn builders_override_defaults() {
        let config = default_config()
            .with_timeout(Duration::from_millis(10))
            .with_demo_fallback(false)
            .with_demo_delay(Duration::ZERO)
            .with_image_timeout(Duration::from_secs(1));
        assert_eq!(config.timeout, Duration::from_millis(10));
        assert!(!config.demo_fallback);
        assert_eq!(config.demo_delay, Duration::ZERO);
        assert_eq!(config.image_timeout, Duration::from_secs(1));
    }
}
