use crate::errors::PsxError;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use std::time::Duration;
use url::Url;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can hand back the body of a page. Every call is independent,
/// implementations must not carry cookies or other state between calls.
pub trait PageSource: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<String, PsxError>>;
}

/// Fetches pages over HTTP with a browser-like user agent and a fixed timeout.
/// The underlying client's connection pool is reused across calls.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, PsxError> {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, PsxError> {
        let client = match Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("Failed to build http client\nError : {}", e);
                return Err(PsxError::UnknownError(e.to_string()));
            }
        };
        Ok(Self { client })
    }

    #[tracing::instrument(skip(self))]
    async fn get_text(&self, url: &Url) -> Result<String, PsxError> {
        let response = match self.client.get(url.as_str()).send().await {
            Err(e) => {
                tracing::error!("Error fetching page {}", url);
                tracing::error!("{}", e);
                return Err(map_reqwest_error(e, url));
            }
            Ok(r) => {
                if !r.status().is_success() {
                    tracing::error!("Error status code received : {} |{}|", r.status(), url);
                    return Err(PsxError::ErrorStatusCode {
                        status_code: r.status().to_string(),
                        url: url.to_string(),
                    });
                }
                r
            }
        };

        match response.text().await {
            Ok(body) => {
                tracing::debug!("Fetched {} bytes from {}", body.len(), url);
                Ok(body)
            }
            Err(e) => {
                tracing::error!("Error reading body of {}\nError : {}", url, e);
                Err(map_reqwest_error(e, url))
            }
        }
    }
}

impl PageSource for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<String, PsxError>> {
        self.get_text(url).boxed()
    }
}

fn map_reqwest_error(e: reqwest::Error, url: &Url) -> PsxError {
    if e.is_timeout() {
        PsxError::Timeout(url.to_string())
    } else if let Some(status) = e.status() {
        PsxError::ErrorStatusCode {
            status_code: status.to_string(),
            url: url.to_string(),
        }
    } else {
        PsxError::NetworkError(format!("{url} | {e}"))
    }
}
