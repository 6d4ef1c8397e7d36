// src/services/upstream.rs

//! HTTP access to the upstream CMS.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, ETAG, HeaderMap, IF_NONE_MATCH, LAST_MODIFIED};

use crate::error::Result;
use crate::models::{CrawlerConfig, FetchedDocument};

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Response to a (possibly conditional) artifact fetch.
#[derive(Debug, Clone, Default)]
pub struct UpstreamResponse {
    pub status: u16,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Source of artifact bytes.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Fetch `url`, sending `If-None-Match` only when an ETag is known.
    async fn fetch(&self, url: &str, etag: Option<&str>) -> Result<UpstreamResponse>;
}

/// `reqwest`-backed upstream client.
#[derive(Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
        })
    }

    /// Fetch an HTML document for extraction, following redirects.
    ///
    /// The returned document carries the final URL after redirects.
    pub async fn fetch_document(&self, url: &str) -> Result<FetchedDocument> {
        let response = self.client.get(url).send().await?;
        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(FetchedDocument::new(final_url, status, body))
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self, url: &str, etag: Option<&str>) -> Result<UpstreamResponse> {
        let mut request = self.client.get(url);
        if let Some(etag) = etag {
            request = request.header(IF_NONE_MATCH, etag);
        }
        let response = request.send().await?;

        let status = response.status().as_u16();
        let headers = response.headers();
        let etag = header_string(headers, ETAG.as_str());
        let last_modified = header_string(headers, LAST_MODIFIED.as_str());
        let content_type = header_string(headers, CONTENT_TYPE.as_str());
        let body = response.bytes().await?.to_vec();

        Ok(UpstreamResponse {
            status,
            etag,
            last_modified,
            content_type,
            body,
        })
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn upstream() -> HttpUpstream {
        HttpUpstream::new(&CrawlerConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_unconditional_fetch_returns_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Documents/a.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("etag", "\"v1\"")
                    .insert_header("last-modified", "Tue, 15 Nov 1994 12:45:26 GMT")
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(b"%PDF".to_vec()),
            )
            .mount(&server)
            .await;

        let url = format!("{}/Documents/a.pdf", server.uri());
        let response = upstream().fetch(&url, None).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.etag.as_deref(), Some("\"v1\""));
        assert_eq!(
            response.last_modified.as_deref(),
            Some("Tue, 15 Nov 1994 12:45:26 GMT")
        );
        assert_eq!(response.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(response.body, b"%PDF");

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("if-none-match").is_none());
    }

    #[tokio::test]
    async fn test_conditional_fetch_sends_etag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Documents/a.pdf"))
            .and(header("if-none-match", "\"v1\""))
            .respond_with(ResponseTemplate::new(304))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/Documents/a.pdf", server.uri());
        let response = upstream().fetch(&url, Some("\"v1\"")).await.unwrap();
        assert_eq!(response.status, 304);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_document_reports_final_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Documents/Folder"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", "/Documents/Forms/AllItems.aspx"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Documents/Forms/AllItems.aspx"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let doc = upstream()
            .fetch_document(&format!("{}/Documents/Folder", server.uri()))
            .await
            .unwrap();
        assert_eq!(doc.status, 200);
        assert_eq!(
            doc.url,
            format!("{}/Documents/Forms/AllItems.aspx", server.uri())
        );
        assert_eq!(doc.body, "<html></html>");
    }
}
