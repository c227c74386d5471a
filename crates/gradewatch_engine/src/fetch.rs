use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use watch_logging::watch_info;

use crate::{FailureKind, FetchError, FetchMetadata, FetchOutput, FetchProgress};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            redirect_limit: 10,
            max_bytes: 20 * 1024 * 1024,
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, progress: FetchProgress);
}

/// Discards progress; used for small requests such as form posts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _progress: FetchProgress) {}
}

/// Logs download progress in 20% steps, or once per MiB when the size is unknown.
#[derive(Debug, Default)]
pub struct LogProgressSink {
    last_step: AtomicU64,
}

impl ProgressSink for LogProgressSink {
    fn emit(&self, progress: FetchProgress) {
        const MIB: u64 = 1024 * 1024;
        let step = match progress.total {
            Some(total) if total > 0 => progress.bytes * 5 / total,
            _ => progress.bytes / MIB,
        };
        if step <= self.last_step.swap(step, Ordering::Relaxed) {
            return;
        }
        match progress.total {
            Some(total) if total > 0 => watch_info!(
                "Downloading: {}% ({}/{} bytes)",
                progress.bytes * 100 / total,
                progress.bytes,
                total
            ),
            _ => watch_info!("Downloaded: {} bytes...", progress.bytes),
        }
    }
}

/// HTTP access with a session that survives between calls.
///
/// Non-2xx responses are returned as regular output; only transport failures
/// become errors.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, url: &str, sink: &dyn ProgressSink) -> Result<FetchOutput, FetchError>;

    async fn post_form(
        &self,
        url: &str,
        fields: &[(String, String)],
    ) -> Result<FetchOutput, FetchError>;
}

/// Fetcher over one long-lived reqwest client with a cookie store.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
    client: reqwest::Client,
    redirect_counter: Arc<AtomicUsize>,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let redirect_counter = Arc::new(AtomicUsize::new(0));
        let client = build_client(&settings, redirect_counter.clone())?;
        Ok(Self {
            settings,
            client,
            redirect_counter,
        })
    }

    async fn read_response(
        &self,
        url: &str,
        response: reqwest::Response,
        sink: &dyn ProgressSink,
    ) -> Result<FetchOutput, FetchError> {
        let status = response.status().as_u16();
        let total = response.content_length();
        if let Some(content_len) = total {
            if content_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        sink.emit(FetchProgress {
            url: url.to_string(),
            bytes: 0,
            total,
        });

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
            sink.emit(FetchProgress {
                url: url.to_string(),
                bytes: bytes.len() as u64,
                total,
            });
        }

        let metadata = FetchMetadata {
            original_url: url.to_string(),
            final_url,
            redirect_count: self.redirect_counter.load(Ordering::Relaxed),
            content_type,
            byte_len: bytes.len() as u64,
        };

        Ok(FetchOutput {
            status,
            bytes,
            metadata,
        })
    }
}

fn build_client(
    settings: &FetchSettings,
    redirect_counter: Arc<AtomicUsize>,
) -> Result<reqwest::Client, FetchError> {
    let redirect_limit = settings.redirect_limit;
    let policy = reqwest::redirect::Policy::custom(move |attempt| {
        let count = attempt.previous().len();
        redirect_counter.store(count, Ordering::Relaxed);
        if count > redirect_limit {
            attempt.error("redirect limit exceeded")
        } else {
            attempt.follow()
        }
    });

    reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .redirect(policy)
        .cookie_store(true)
        .build()
        .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
}

fn parse_url(url: &str) -> Result<reqwest::Url, FetchError> {
    reqwest::Url::parse(url).map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn get(&self, url: &str, sink: &dyn ProgressSink) -> Result<FetchOutput, FetchError> {
        let parsed = parse_url(url)?;
        // Requests are sequential, so one counter serves every call.
        self.redirect_counter.store(0, Ordering::Relaxed);

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        self.read_response(url, response, sink).await
    }

    async fn post_form(
        &self,
        url: &str,
        fields: &[(String, String)],
    ) -> Result<FetchOutput, FetchError> {
        let parsed = parse_url(url)?;
        self.redirect_counter.store(0, Ordering::Relaxed);

        let response = self
            .client
            .post(parsed)
            .form(fields)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        self.read_response(url, response, &NoProgress).await
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
