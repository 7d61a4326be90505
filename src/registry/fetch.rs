use crate::error::CrawlError;
use crate::registry::config::FetchConfig;
use rand::Rng;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use std::thread;
use std::time::Duration;

const USER_AGENTS: [&str; 6] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
];

const ACCEPT_VALUE: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE_VALUE: &str = "fr-CA,fr;q=0.9,en-US;q=0.6,en;q=0.5";
const REFERER_VALUE: &str = "https://www.google.com/";

pub trait Fetcher {
    fn fetch_page(&self, url: &str) -> Result<String, CrawlError>;
    fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, CrawlError>;
}

pub fn random_user_agent() -> &'static str {
    let idx = rand::rng().random_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base_ms: u64) -> Self {
        Self {
            max_retries,
            backoff_base: Duration::from_millis(backoff_base_ms),
        }
    }

    /// Exponential: base, 2*base, 4*base, ...
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }

    pub fn run<T>(
        &self,
        what: &str,
        mut op: impl FnMut() -> Result<T, CrawlError>,
    ) -> Result<T, CrawlError> {
        let mut attempt = 0u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let backoff = self.backoff_for(attempt);
                    tracing::warn!(
                        target_url = what,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "request failed, retrying after backoff"
                    );
                    thread::sleep(backoff);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Called once after every document download attempt.
pub trait Pacer {
    fn pause(&self);
}

/// Randomized pause between document downloads.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    min_ms: u64,
    max_ms: u64,
}

impl Throttle {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms,
        }
    }

    pub fn from_config(cfg: &FetchConfig) -> Self {
        Self::new(cfg.delay_min_ms, cfg.delay_max_ms)
    }

    pub fn sample(&self) -> Duration {
        if self.max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(self.min_ms..=self.max_ms))
    }

}

impl Pacer for Throttle {
    fn pause(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "politeness delay");
            thread::sleep(delay);
        }
    }
}

pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn from_config(cfg: &FetchConfig) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|err| CrawlError::Network {
                url: String::new(),
                message: format!("failed to build http client: {err}"),
            })?;
        Ok(Self {
            client,
            retry: RetryPolicy::new(cfg.max_retries, cfg.backoff_base_ms),
        })
    }

    fn get(&self, url: &str) -> Result<Response, CrawlError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, random_user_agent())
            .header(ACCEPT, ACCEPT_VALUE)
            .header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGE_VALUE)
            .header(REFERER, REFERER_VALUE)
            .send()
            .map_err(|err| network_error(url, err))?;
        if !response.status().is_success() {
            return Err(CrawlError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

fn network_error(url: &str, err: reqwest::Error) -> CrawlError {
    CrawlError::Network {
        url: url.to_string(),
        message: err.to_string(),
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_page(&self, url: &str) -> Result<String, CrawlError> {
        self.retry.run(url, || {
            self.get(url)?
                .text()
                .map_err(|err| network_error(url, err))
        })
    }

    fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, CrawlError> {
        self.retry.run(url, || {
            let bytes = self
                .get(url)?
                .bytes()
                .map_err(|err| network_error(url, err))?;
            Ok(bytes.to_vec())
        })
    }
}
