//! Streaming client for the chat backend.
//!
//! The backend exposes `POST /chat` taking `{message, language}` and
//! replies with the model output as plain chunked UTF-8 text — no SSE
//! framing. The stream is lazy, finite, and non-restartable; it may
//! fail at any point, surfaced as an error item to the relay.

use crate::config::LlmConfig;
use crate::error::{RelayError, Result};
use async_stream::try_stream;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    language: &'a str,
}

/// HTTP client for the streaming chat backend.
pub struct LlmClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| RelayError::Llm(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    /// Send a user message and return the reply as a stream of text
    /// chunks.
    ///
    /// Network chunks are re-assembled across UTF-8 boundaries: a
    /// multi-byte character split between two reads is held back until
    /// its remaining bytes arrive, so every yielded chunk is valid text.
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be sent or the backend returns a
    /// non-success status. Mid-stream transport errors surface as
    /// stream items.
    pub async fn chat_stream(
        &self,
        message: &str,
        language: &str,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let url = format!("{}/chat", self.config.base_url.trim_end_matches('/'));
        info!("sending chat request ({language}) to {url}");

        let response = self
            .http
            .post(&url)
            .json(&ChatRequest { message, language })
            .send()
            .await
            .map_err(|e| RelayError::Llm(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Llm(format!("backend returned {status}: {body}")));
        }

        let stream = try_stream! {
            let mut body = response.bytes_stream();
            let mut decoder = Utf8StreamDecoder::default();
            while let Some(chunk) = body.next().await {
                let chunk =
                    chunk.map_err(|e| RelayError::Llm(format!("stream read failed: {e}")))?;
                let text = decoder.push(&chunk);
                if !text.is_empty() {
                    yield text;
                }
            }
            let tail = decoder.finish();
            if !tail.is_empty() {
                yield tail;
            }
        };
        Ok(stream.boxed())
    }
}

/// Incremental UTF-8 decoder tolerating chunk boundaries that fall
/// inside multi-byte sequences.
#[derive(Debug, Default)]
struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    /// Decode as much of the accumulated bytes as possible.
    ///
    /// An incomplete sequence at the end is held back for the next
    /// call; invalid bytes become U+FFFD.
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    out.push_str(s);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let rest = self.pending.split_off(e.valid_up_to());
                    if let Ok(s) = std::str::from_utf8(&self.pending) {
                        out.push_str(s);
                    }
                    self.pending = rest;
                    match e.error_len() {
                        // Possibly-complete sequence cut off mid-way:
                        // wait for more bytes.
                        None => break,
                        Some(n) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..n);
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush any held-back bytes at end of stream, replacing an
    /// incomplete tail.
    fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }
}
