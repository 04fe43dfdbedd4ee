//! Typed response decoding — execute a prepared request, decode the body.
//!
//! One generic pipeline (execute, read, status-check, parse) is shared by
//! every encoding; the encodings themselves plug in through [`BodyFormat`].
//! Execution goes through the [`RequestDoer`] capability so tests can
//! substitute a stub for a real `reqwest::Client`.
//!
//! Nothing here retries. A request either produces a typed value or one of
//! the [`FetchError`] variants, once.

use async_trait::async_trait;
use futures::future::BoxFuture;
use reqwest::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// Non-200 error bodies are reported truncated to this many characters.
const MAX_ERROR_BODY_CHARS: usize = 256;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to read response body: {0}")]
    BodyRead(#[source] reqwest::Error),

    #[error("unexpected status code {status} for {url}, response: {snippet}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        snippet: String,
    },

    #[error("failed to decode {format} response: {detail}")]
    Decode {
        format: &'static str,
        detail: String,
    },
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Anything that can turn a prepared request into a response.
#[async_trait]
pub trait RequestDoer: Send + Sync {
    async fn execute(&self, request: Request) -> std::result::Result<Response, reqwest::Error>;
}

#[async_trait]
impl RequestDoer for reqwest::Client {
    async fn execute(&self, request: Request) -> std::result::Result<Response, reqwest::Error> {
        reqwest::Client::execute(self, request).await
    }
}

/// Parse capability injected into the shared decode pipeline — implemented
/// once per encoding instead of duplicating the request/read/status scaffold.
pub trait BodyFormat {
    const NAME: &'static str;

    fn parse<T: DeserializeOwned>(body: &[u8]) -> std::result::Result<T, String>;
}

/// JSON bodies via serde_json.
pub struct Json;

impl BodyFormat for Json {
    const NAME: &'static str = "JSON";

    fn parse<T: DeserializeOwned>(body: &[u8]) -> std::result::Result<T, String> {
        serde_json::from_slice(body).map_err(|err| err.to_string())
    }
}

/// XML bodies via quick-xml's serde support.
pub struct Xml;

impl BodyFormat for Xml {
    const NAME: &'static str = "XML";

    fn parse<T: DeserializeOwned>(body: &[u8]) -> std::result::Result<T, String> {
        let text = std::str::from_utf8(body).map_err(|err| err.to_string())?;
        quick_xml::de::from_str(text).map_err(|err| err.to_string())
    }
}

/// Execute `request` and decode the body as `F` into a `T`.
///
/// The full body is read before the status check so a non-200 error can
/// carry a snippet of whatever the upstream sent back. The response is
/// consumed on every path; the connection returns to the pool either way.
pub async fn decode_from_request<T, F, D>(doer: &D, request: Request) -> Result<T>
where
    T: DeserializeOwned,
    F: BodyFormat,
    D: RequestDoer + ?Sized,
{
    let url = request.url().to_string();

    let response = doer.execute(request).await.map_err(FetchError::Transport)?;
    let status = response.status();

    let body = response.bytes().await.map_err(FetchError::BodyRead)?;

    if status != StatusCode::OK {
        let snippet = truncate_chars(&String::from_utf8_lossy(&body), MAX_ERROR_BODY_CHARS);
        debug!(url = %url, status = status.as_u16(), "Upstream returned non-OK status");
        return Err(FetchError::UnexpectedStatus {
            status: status.as_u16(),
            url,
            snippet,
        });
    }

    F::parse(&body).map_err(|detail| FetchError::Decode {
        format: F::NAME,
        detail,
    })
}

/// Execute `request` and decode the body as JSON.
pub async fn decode_json_from_request<T, D>(doer: &D, request: Request) -> Result<T>
where
    T: DeserializeOwned,
    D: RequestDoer + ?Sized,
{
    decode_from_request::<T, Json, D>(doer, request).await
}

/// Execute `request` and decode the body as XML.
pub async fn decode_xml_from_request<T, D>(doer: &D, request: Request) -> Result<T>
where
    T: DeserializeOwned,
    D: RequestDoer + ?Sized,
{
    decode_from_request::<T, Xml, D>(doer, request).await
}

fn decode_task<T, F>(
    client: reqwest::Client,
) -> impl Fn(Request) -> BoxFuture<'static, Result<T>> + Clone
where
    T: DeserializeOwned + Send + 'static,
    F: BodyFormat + 'static,
{
    move |request| {
        let client = client.clone();
        Box::pin(async move { decode_from_request::<T, F, _>(&client, request).await })
    }
}

/// Curried form of [`decode_json_from_request`], directly usable as a
/// worker-pool task over prepared requests.
pub fn decode_json_task<T>(
    client: reqwest::Client,
) -> impl Fn(Request) -> BoxFuture<'static, Result<T>> + Clone
where
    T: DeserializeOwned + Send + 'static,
{
    decode_task::<T, Json>(client)
}

/// Curried form of [`decode_xml_from_request`].
pub fn decode_xml_task<T>(
    client: reqwest::Client,
) -> impl Fn(Request) -> BoxFuture<'static, Result<T>> + Clone
where
    T: DeserializeOwned + Send + 'static,
{
    decode_task::<T, Xml>(client)
}

/// Truncate to at most `max_chars` characters, never splitting a multi-byte
/// sequence.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((boundary, _)) => text[..boundary].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        a: i32,
    }

    #[test]
    fn json_parse_round() {
        let value: Payload = Json::parse(br#"{"a":1}"#).unwrap();
        assert_eq!(value, Payload { a: 1 });

        let err = Json::parse::<Payload>(b"{not json").unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn xml_parse_round() {
        let value: Payload = Xml::parse(b"<payload><a>1</a></payload>").unwrap();
        assert_eq!(value, Payload { a: 1 });

        assert!(Xml::parse::<Payload>(b"<payload><a>1</a>").is_err());
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let ascii = "a".repeat(300);
        assert_eq!(truncate_chars(&ascii, 256).chars().count(), 256);

        // 3 bytes per character; a byte-based cut at 256 would land mid-char.
        let multibyte = "\u{65e5}".repeat(300);
        let snippet = truncate_chars(&multibyte, 256);
        assert_eq!(snippet.chars().count(), 256);
        assert!(multibyte.starts_with(&snippet));

        assert_eq!(truncate_chars("short", 256), "short");
    }
}
