//! Authenticated HTTP transport for the clearinghouse download endpoint.

use crate::clearinghouse::error::ClearinghouseError;
use async_compression::tokio::bufread::GzipDecoder;
use futures_util::TryStreamExt;
use log::warn;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_DISPOSITION, COOKIE, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;

pub(crate) const DEFAULT_BASE_URL: &str = "https://pems.dot.ca.gov/";
pub(crate) const DEFAULT_MAX_RETRIES: u32 = 5;
pub(crate) const DEFAULT_BACKOFF_FACTOR: f64 = 1.0;

// The clearinghouse serves logged-in browser sessions, so requests present a
// browser user agent alongside the session cookie.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/113.0.0.0 Safari/537.36";

/// HTTP access to the clearinghouse, authenticated by a session cookie.
///
/// The cookie and user agent are installed as default headers at
/// construction; transient failures (connection errors, timeouts, HTTP 429
/// and 5xx) are retried with exponential backoff before surfacing. One
/// instance belongs to one [`crate::Pems`] client for its lifetime.
pub struct ClearinghouseClient {
    http: Client,
    base_url: String,
    max_retries: u32,
    backoff_factor: f64,
}

impl ClearinghouseClient {
    pub(crate) fn new(
        cookie: &str,
        base_url: String,
        max_retries: u32,
        backoff_factor: f64,
    ) -> Result<Self, ClearinghouseError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(cookie).map_err(ClearinghouseError::InvalidCookie)?,
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(ClearinghouseError::ClientBuild)?;
        Ok(Self {
            http,
            base_url,
            max_retries,
            backoff_factor,
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves a catalog-relative download path against the base URL.
    pub(crate) fn absolute_url(&self, relative: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            relative.trim_start_matches('/')
        )
    }

    /// Issues a GET, retrying transient failures up to the configured limit
    /// with `backoff_factor * 2^attempt` seconds between attempts.
    pub(crate) async fn get_with_retry(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Response, ClearinghouseError> {
        let mut attempt: u32 = 0;
        loop {
            let error = match self.attempt_get(url, query).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };
            if !is_transient(&error) {
                return Err(error);
            }
            if attempt >= self.max_retries {
                return Err(ClearinghouseError::RetriesExhausted {
                    url: url.to_string(),
                    attempts: attempt + 1,
                    source: Box::new(error),
                });
            }
            let delay =
                Duration::from_secs_f64(self.backoff_factor * f64::from(1u32 << attempt.min(16)));
            warn!(
                "Transient failure for {url} (attempt {}), retrying in {delay:?}: {error}",
                attempt + 1
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt_get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Response, ClearinghouseError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| ClearinghouseError::NetworkRequest(url.to_string(), e))?;
        match response.error_for_status() {
            Ok(response) => Ok(response),
            Err(e) => match e.status() {
                Some(status) => Err(ClearinghouseError::HttpStatus {
                    url: url.to_string(),
                    status,
                    source: e,
                }),
                None => Err(ClearinghouseError::NetworkRequest(url.to_string(), e)),
            },
        }
    }

    /// Downloads a catalog-relative path, buffering the whole body.
    ///
    /// Also returns the attachment filename when the response names one.
    pub(crate) async fn download_named(
        &self,
        relative: &str,
    ) -> Result<(Vec<u8>, Option<String>), ClearinghouseError> {
        let url = self.absolute_url(relative);
        let response = self.get_with_retry(&url, &[]).await?;
        let filename = attachment_filename(response.headers());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClearinghouseError::NetworkRequest(url, e))?;
        Ok((bytes.to_vec(), filename))
    }

    /// Downloads a gzip-compressed body, decompressing it as it streams in.
    pub(crate) async fn download_gzip_decompressed(
        &self,
        relative: &str,
    ) -> Result<(Vec<u8>, Option<String>), ClearinghouseError> {
        let url = self.absolute_url(relative);
        let response = self.get_with_retry(&url, &[]).await?;
        let filename = attachment_filename(response.headers());
        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let stream_reader = StreamReader::new(stream);
        let mut decoder = GzipDecoder::new(stream_reader);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).await?;
        Ok((decompressed, filename))
    }
}

fn is_transient(error: &ClearinghouseError) -> bool {
    match error {
        ClearinghouseError::NetworkRequest(_, e) => e.is_timeout() || e.is_connect(),
        ClearinghouseError::HttpStatus { status, .. } => {
            status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
        }
        _ => false,
    }
}

/// Extracts the filename from a `Content-Disposition: attachment` header.
pub(crate) fn attachment_filename(headers: &HeaderMap) -> Option<String> {
    let disposition = headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;
    let after = disposition.split("filename=").nth(1)?;
    let name = after
        .split(';')
        .next()
        .unwrap_or(after)
        .trim()
        .trim_matches('"');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_DISPOSITION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn parses_attachment_filename() {
        let headers =
            headers_with("attachment; filename=d04_text_station_5min_2017_01_01.txt.gz");
        assert_eq!(
            attachment_filename(&headers).as_deref(),
            Some("d04_text_station_5min_2017_01_01.txt.gz")
        );
    }

    #[test]
    fn parses_quoted_filename() {
        let headers = headers_with("attachment; filename=\"meta_2017_01_01.txt\"; size=12");
        assert_eq!(
            attachment_filename(&headers).as_deref(),
            Some("meta_2017_01_01.txt")
        );
    }

    #[test]
    fn missing_disposition_is_none() {
        assert_eq!(attachment_filename(&HeaderMap::new()), None);
        assert_eq!(attachment_filename(&headers_with("inline")), None);
    }

    #[test]
    fn resolves_relative_urls() {
        let client = ClearinghouseClient::new(
            "PHPSESSID=abc",
            DEFAULT_BASE_URL.to_string(),
            DEFAULT_MAX_RETRIES,
            DEFAULT_BACKOFF_FACTOR,
        )
        .unwrap();
        assert_eq!(
            client.absolute_url("/?download=1"),
            "https://pems.dot.ca.gov/?download=1"
        );
        assert_eq!(
            client.absolute_url("archive/day.zip"),
            "https://pems.dot.ca.gov/archive/day.zip"
        );
    }

    #[test]
    fn rejects_non_ascii_cookie() {
        let result = ClearinghouseClient::new(
            "bad\ncookie",
            DEFAULT_BASE_URL.to_string(),
            DEFAULT_MAX_RETRIES,
            DEFAULT_BACKOFF_FACTOR,
        );
        assert!(matches!(result, Err(ClearinghouseError::InvalidCookie(_))));
    }
}
