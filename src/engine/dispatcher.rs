//! Request Dispatcher
//!
//! Engine-side request loop: read one frame, apply it to the store, write one
//! response frame, repeat.
//!
//! The next request is never read before the previous response has been
//! written and flushed. That strict alternation is what lets the client match
//! responses to requests by position alone.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::error::Result;
use crate::protocol::{Frame, FrameReader, Request, Response};

// == Serve Summary ==
/// Counters for one `serve` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServeSummary {
    /// Frames answered
    pub requests: u64,
    /// Frames answered with an error response
    pub rejected: u64,
}

// == Dispatcher ==
/// Applies decoded requests to a shared cache store.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Arc<RwLock<CacheStore>>,
    log_frames: bool,
}

impl Dispatcher {
    pub fn new(store: Arc<RwLock<CacheStore>>) -> Self {
        Self {
            store,
            log_frames: false,
        }
    }

    /// Enables debug logging of raw frame bytes.
    pub fn with_frame_logging(mut self, enabled: bool) -> Self {
        self.log_frames = enabled;
        self
    }

    // == Handle Frame ==
    /// Decodes and applies one request frame.
    ///
    /// A frame that fails to decode is answered with [`Response::Error`]
    /// instead of being dropped, so the client is never left waiting.
    pub async fn handle_frame(&self, frame: &Frame) -> Response {
        match Request::decode(frame) {
            Ok(request) => self.apply(request).await,
            Err(err) => {
                warn!(%err, command = frame[0], "rejecting malformed request frame");
                Response::Error(err.to_string())
            }
        }
    }

    // == Apply ==
    /// Applies a decoded request to the store.
    pub async fn apply(&self, request: Request) -> Response {
        let mut store = self.store.write().await;

        match request {
            Request::Insert {
                key,
                value,
                inserted_at,
                ttl_seconds,
            } => {
                // The engine clock is authoritative; the client stamp is informational
                let skew = store.now().abs_diff(inserted_at);
                debug!(%key, ttl_seconds, skew, "insert");
                store.insert(key, value, ttl_seconds);
                Response::Ack
            }
            Request::Get { key } => match store.get(&key) {
                Some(value) => {
                    debug!(%key, "get hit");
                    Response::Value(value)
                }
                None => {
                    debug!(%key, "get miss");
                    Response::Miss
                }
            },
            Request::Remove { key } => {
                let removed = store.remove(&key);
                debug!(%key, removed, "remove");
                Response::Ack
            }
        }
    }

    // == Serve ==
    /// Runs the request loop until `reader` reaches end of stream.
    ///
    /// Returns an error on I/O failure or when the stream ends mid-frame.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<ServeSummary>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut frames = FrameReader::new(reader);
        let mut summary = ServeSummary::default();

        while let Some(frame) = frames.next_frame().await? {
            if self.log_frames {
                debug!(direction = "in", frame = ?&frame[..], "request frame");
            }

            let response = self.handle_frame(&frame).await;
            if matches!(response, Response::Error(_)) {
                summary.rejected += 1;
            }

            let encoded = response.encode();
            if self.log_frames {
                debug!(direction = "out", frame = ?&encoded[..], "response frame");
            }

            writer.write_all(&encoded).await?;
            writer.flush().await?;
            summary.requests += 1;
        }

        info!(
            requests = summary.requests,
            rejected = summary.rejected,
            "request stream closed"
        );
        Ok(summary)
    }
}
