//! Source fetching over HTTP.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Url};

use crate::error::PipelineError;

/// An open source response: declared length plus the body stream.
pub struct SourceBody {
    /// `Content-Length` of the response, 0 when absent or unparsable
    pub declared_total: u64,
    pub stream: BoxStream<'static, Result<Bytes, reqwest::Error>>,
}

/// Issues the GET that starts every relay.
#[derive(Clone)]
pub struct SourceFetcher {
    client: Client,
}

impl SourceFetcher {
    /// Only connecting is bounded; a slow transfer of a large file is allowed to run.
    pub fn new(connect_timeout: Duration) -> Result<Self, anyhow::Error> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, source_url: &str) -> Result<SourceBody, PipelineError> {
        let url = Url::parse(source_url.trim()).map_err(|e| {
            PipelineError::SourceFetch(format!("invalid URL '{}': {}", source_url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(PipelineError::SourceFetch(format!(
                "unsupported URL scheme '{}'",
                url.scheme()
            )));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::SourceFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::SourceFetch(format!("HTTP {}", status)));
        }

        let declared_total = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(0);

        Ok(SourceBody {
            declared_total,
            stream: response.bytes_stream().boxed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> SourceFetcher {
        SourceFetcher::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_reads_declared_length() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 1234]))
            .mount(&server)
            .await;

        let body = fetcher()
            .fetch(&format!("{}/a.mp4", server.uri()))
            .await
            .unwrap();
        assert_eq!(body.declared_total, 1234);

        let mut received = 0usize;
        let mut stream = body.stream;
        while let Some(chunk) = stream.next().await {
            received += chunk.unwrap().len();
        }
        assert_eq!(received, 1234);
    }

    #[tokio::test]
    async fn test_non_success_status_is_source_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = fetcher()
            .fetch(&format!("{}/missing.mp4", server.uri()))
            .await;
        match result {
            Err(err @ PipelineError::SourceFetch(_)) => {
                assert_eq!(err.to_string(), "source fetch failed: HTTP 404 Not Found");
            }
            _ => panic!("expected a source fetch error"),
        }
    }

    #[tokio::test]
    async fn test_rejects_malformed_and_non_http_urls() {
        assert!(matches!(
            fetcher().fetch("not a url").await,
            Err(PipelineError::SourceFetch(_))
        ));
        assert!(matches!(
            fetcher().fetch("ftp://example.com/a.mp4").await,
            Err(PipelineError::SourceFetch(msg)) if msg.contains("ftp")
        ));
    }
}
