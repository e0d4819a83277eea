//! Weather feed sources.
//!
//! A feed answers "what is the weather in `city` right now". Any failure to
//! get a usable payload is reported as `None`; the caller skips that city for
//! the tick, exactly as it would for a reading that fails validation.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;

use crate::mock::MockGenerator;
use crate::models::RawReading;

// ---

pub trait FeedSource: Send + Sync {
    fn fetch(&self, city: &str) -> impl Future<Output = Option<RawReading>> + Send;
}

/// OpenWeatherMap current-weather client. Requests are made without a
/// `units` parameter so temperatures arrive in Kelvin.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    // ---
    pub fn new(base_url: &str, api_key: &str) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn request(&self, city: &str) -> reqwest::Result<RawReading> {
        // ---
        self.client
            .get(&self.base_url)
            .query(&[("q", city), ("appid", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json::<RawReading>()
            .await
    }
}

impl FeedSource for OpenWeatherClient {
    async fn fetch(&self, city: &str) -> Option<RawReading> {
        // ---
        tracing::debug!("Fetching current weather for {}", city);

        match self.request(city).await {
            Ok(reading) => Some(reading),
            Err(e) => {
                tracing::warn!("Failed to fetch weather for {}: {}", city, e);
                None
            }
        }
    }
}

/// Feed backed by the mock generator, stamped with the current time.
#[derive(Debug)]
pub struct MockFeed {
    generator: MockGenerator,
    rng: Mutex<StdRng>,
}

impl MockFeed {
    pub fn new(generator: MockGenerator, rng: StdRng) -> Self {
        Self {
            generator,
            rng: Mutex::new(rng),
        }
    }

    /// Run `f` with exclusive access to the random source.
    pub fn with_rng<T>(&self, f: impl FnOnce(&MockGenerator, &mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&self.generator, &mut rng)
    }
}

impl FeedSource for MockFeed {
    async fn fetch(&self, city: &str) -> Option<RawReading> {
        Some(self.with_rng(|generator, rng| generator.reading_at(city, Utc::now(), rng)))
    }
}

/// Either configured feed, so the driver stays monomorphic.
#[derive(Debug)]
pub enum Feed {
    Live(OpenWeatherClient),
    Mock(MockFeed),
}

impl FeedSource for Feed {
    async fn fetch(&self, city: &str) -> Option<RawReading> {
        match self {
            Self::Live(client) => client.fetch(city).await,
            Self::Mock(feed) => feed.fetch(city).await,
        }
    }
}
